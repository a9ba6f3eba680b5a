//! Outbound SMS for phone verification codes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    config::TwilioConfig,
    error::{AppError, LimitReason},
};

#[derive(Debug, Error)]
pub enum SmsError {
    #[error("sms provider throttled the request")]
    RateLimited,
    #[error("sms provider unavailable: {0}")]
    Unavailable(String),
    #[error("sms rejected: {0}")]
    Rejected(String),
}

impl From<SmsError> for AppError {
    fn from(e: SmsError) -> Self {
        match e {
            SmsError::RateLimited => AppError::RateLimited {
                reason: LimitReason::Throttle,
                retry_after: 60,
            },
            SmsError::Unavailable(_) => {
                AppError::ServiceUnavailable("SMS delivery is temporarily unavailable".into())
            }
            SmsError::Rejected(msg) => AppError::BadRequest(format!("Could not send SMS: {msg}")),
        }
    }
}

#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> Result<(), SmsError>;
}

pub struct TwilioSender {
    client: Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl TwilioSender {
    pub fn new(cfg: &TwilioConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            account_sid: cfg.account_sid.clone(),
            auth_token: cfg.auth_token.clone(),
            from_number: cfg.from_number.clone(),
        })
    }
}

#[async_trait]
impl SmsSender for TwilioSender {
    async fn send(&self, to: &str, body: &str) -> Result<(), SmsError> {
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.account_sid
        );
        let response = self
            .client
            .post(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", self.from_number.as_str()), ("Body", body)])
            .send()
            .await
            .map_err(|e| SmsError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        warn!(%status, body = %text, "twilio rejected message");
        Err(match status.as_u16() {
            429 => SmsError::RateLimited,
            s if s >= 500 => SmsError::Unavailable(format!("status {s}")),
            _ => SmsError::Rejected(status.to_string()),
        })
    }
}

/// Development sender: logs the message instead of delivering it.
pub struct LogSender;

#[async_trait]
impl SmsSender for LogSender {
    async fn send(&self, to: &str, body: &str) -> Result<(), SmsError> {
        info!(%to, %body, "sms (not delivered, twilio not configured)");
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every message for assertions.
    #[derive(Default)]
    pub struct RecordingSender {
        pub sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingSender {
        pub fn last_body(&self) -> Option<String> {
            self.sent.lock().unwrap().last().map(|(_, b)| b.clone())
        }
    }

    #[async_trait]
    impl SmsSender for RecordingSender {
        async fn send(&self, to: &str, body: &str) -> Result<(), SmsError> {
            self.sent.lock().unwrap().push((to.to_string(), body.to_string()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn sms_errors_map_to_api_errors() {
        assert_eq!(AppError::from(SmsError::RateLimited).status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            AppError::from(SmsError::Unavailable("x".into())).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::from(SmsError::Rejected("bad number".into())).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
