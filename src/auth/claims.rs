use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type of JWT: access or refresh. Supabase session tokens carry no kind
/// and count as access tokens.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    #[default]
    #[serde(alias = "Access")]
    Access,
    #[serde(alias = "Refresh")]
    Refresh,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppMetadata {
    #[serde(default)]
    pub provider: Option<String>,
}

/// JWT payload: Supabase session claims plus our token kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,      // auth subject (Supabase user id or phone sign-in id)
    pub iat: usize,     // issued at (unix timestamp)
    pub exp: usize,     // expires at (unix timestamp)
    pub iss: String,    // issuer
    pub aud: String,    // audience
    #[serde(default)]
    pub kind: TokenKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_metadata: Option<AppMetadata>,
}

impl Claims {
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref().filter(|e| !e.is_empty())
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref().filter(|p| !p.is_empty())
    }

    pub fn provider(&self) -> &str {
        self.app_metadata
            .as_ref()
            .and_then(|m| m.provider.as_deref())
            .unwrap_or(if self.email().is_some() { "email" } else { "phone" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supabase_payload_defaults_to_access() {
        let raw = serde_json::json!({
            "sub": "7d3c2a54-1f1e-4c4a-9a57-0f5b2d1f0a11",
            "iat": 1, "exp": 2,
            "iss": "https://x.supabase.co/auth/v1",
            "aud": "authenticated",
            "email": "eater@example.com",
            "phone": "",
            "role": "authenticated",
            "app_metadata": {"provider": "email", "providers": ["email"]}
        });
        let claims: Claims = serde_json::from_value(raw).unwrap();
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.email(), Some("eater@example.com"));
        assert_eq!(claims.phone(), None);
        assert_eq!(claims.provider(), "email");
    }
}
