use std::time::Duration;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{rngs::OsRng, Rng};
use tracing::{error, info, warn};

use crate::{
    error::{AppError, AppResult, LimitReason},
    sms::SmsSender,
    store::KvStore,
};

pub const CODE_TTL: Duration = Duration::from_secs(10 * 60);
pub const MAX_SENDS: u64 = 3;
pub const MAX_ATTEMPTS: u64 = 5;

fn code_key(phone: &str) -> String {
    format!("otp:code:{phone}")
}

fn sends_key(phone: &str) -> String {
    format!("otp:sends:{phone}")
}

fn attempts_key(phone: &str) -> String {
    format!("otp:attempts:{phone}")
}

pub fn generate_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

pub fn is_code_shape(code: &str) -> bool {
    code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit())
}

pub fn hash_code(code: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(code.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_code(code: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default().verify_password(code.as_bytes(), &parsed).is_ok())
}

/// Generates, stores and texts a fresh code for an E.164 `phone`.
pub async fn send_code(store: &dyn KvStore, sms: &dyn SmsSender, phone: &str) -> AppResult<()> {
    let sends = store.incr(&sends_key(phone), CODE_TTL).await?;
    if sends.count > MAX_SENDS {
        warn!(%phone, "verification send throttled");
        return Err(AppError::RateLimited {
            reason: LimitReason::Throttle,
            retry_after: sends.ttl.as_secs().max(1),
        });
    }

    let code = generate_code();
    store.set(&code_key(phone), &hash_code(&code)?, CODE_TTL).await?;
    store.delete(&attempts_key(phone)).await?;

    let body = format!(
        "Your Austin Food Club verification code is {code}. It expires in {} minutes.",
        CODE_TTL.as_secs() / 60
    );
    sms.send(phone, &body).await?;
    info!(%phone, "verification code sent");
    Ok(())
}

/// Checks `code` against the stored hash; consumes it on success.
pub async fn check_code(store: &dyn KvStore, phone: &str, code: &str) -> AppResult<()> {
    let Some(hash) = store.get(&code_key(phone)).await? else {
        return Err(AppError::BadRequest("Verification code expired or not found".into()));
    };

    let attempts = store.incr(&attempts_key(phone), CODE_TTL).await?;
    if attempts.count > MAX_ATTEMPTS {
        store.delete(&code_key(phone)).await?;
        warn!(%phone, "verification attempts exhausted");
        return Err(AppError::BadRequest(
            "Too many attempts, request a new code".into(),
        ));
    }

    if !verify_code(code, &hash)? {
        return Err(AppError::BadRequest("Invalid verification code".into()));
    }

    store.delete(&code_key(phone)).await?;
    store.delete(&attempts_key(phone)).await?;
    Ok(())
}
