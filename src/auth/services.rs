use lazy_static::lazy_static;
use regex::Regex;

use super::{
    dto::{AuthResponse, PublicUser},
    jwt::JwtKeys,
    repo_types::User,
};

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Normalises a phone number to E.164. Ten bare digits are taken as a US
/// number; anything else must already carry a country code.
pub(crate) fn normalize_phone(raw: &str) -> Option<String> {
    let has_plus = raw.trim_start().starts_with('+');
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let allowed = raw
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')' | '.'));
    if !allowed {
        return None;
    }
    match (has_plus, digits.len()) {
        (false, 10) => Some(format!("+1{digits}")),
        (false, 11) if digits.starts_with('1') => Some(format!("+{digits}")),
        (true, 8..=15) => Some(format!("+{digits}")),
        _ => None,
    }
}

/// Issues an access/refresh pair for `user`.
pub(crate) fn issue_tokens(keys: &JwtKeys, user: User) -> anyhow::Result<AuthResponse> {
    let access_token = keys.sign_access(&user)?;
    let refresh_token = keys.sign_refresh(&user)?;
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser::from(user),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{claims::TokenKind, jwt::tests::{keys, user}};

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.com"));
    }

    #[test]
    fn phone_normalisation() {
        assert_eq!(normalize_phone("(512) 555-0100").as_deref(), Some("+15125550100"));
        assert_eq!(normalize_phone("1-512-555-0100").as_deref(), Some("+15125550100"));
        assert_eq!(normalize_phone("+44 20 7946 0958").as_deref(), Some("+442079460958"));
        assert_eq!(normalize_phone("555-0100"), None);
        assert_eq!(normalize_phone("512555010x"), None);
    }

    #[test]
    fn issued_pair_has_both_kinds() {
        let keys = keys();
        let u = user();
        let subject = u.auth_subject;
        let pair = issue_tokens(&keys, u).unwrap();
        assert_eq!(keys.verify(&pair.access_token).unwrap().kind, TokenKind::Access);
        assert_eq!(keys.verify_refresh(&pair.refresh_token).unwrap().sub, subject);
        assert_eq!(pair.user.email.as_deref(), Some("eater@example.com"));
    }
}
