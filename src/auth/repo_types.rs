use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub auth_subject: Uuid,         // `sub` of the tokens this user signs in with
    pub email: Option<String>,
    pub phone: Option<String>,      // E.164
    pub name: Option<String>,
    pub provider: String,           // email | phone | google | ...
    pub email_verified: bool,
    pub is_admin: bool,
    pub last_login: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}
