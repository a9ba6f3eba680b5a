use sqlx::PgPool;
use uuid::Uuid;

use super::claims::Claims;
use crate::auth::repo_types::User;

const USER_COLUMNS: &str = "id, auth_subject, email, phone, name, provider, email_verified, \
                            is_admin, last_login, created_at";

impl User {
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn find_by_subject(db: &PgPool, subject: Uuid) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE auth_subject = $1"
        ))
        .bind(subject)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_phone(db: &PgPool, phone: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE phone = $1"))
            .bind(phone)
            .fetch_optional(db)
            .await
    }

    /// Returns the user behind `claims`, creating the row on first sight.
    pub async fn resolve_from_claims(db: &PgPool, claims: &Claims) -> sqlx::Result<User> {
        if let Some(user) = Self::find_by_subject(db, claims.sub).await? {
            return Ok(user);
        }
        // Concurrent first requests collapse onto the unique auth_subject.
        // An email or phone already held by another account is left off the
        // new row rather than linking the two identities.
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (auth_subject, email, phone, provider, email_verified)
            SELECT $1, e.email, p.phone, $4, e.email IS NOT NULL AND $5
              FROM (SELECT CASE WHEN EXISTS (SELECT 1 FROM users WHERE email = $2)
                                THEN NULL ELSE $2 END AS email) e,
                   (SELECT CASE WHEN EXISTS (SELECT 1 FROM users WHERE phone = $3)
                                THEN NULL ELSE $3 END AS phone) p
            ON CONFLICT (auth_subject) DO UPDATE SET auth_subject = EXCLUDED.auth_subject
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(claims.sub)
        .bind(claims.email())
        .bind(claims.phone())
        .bind(claims.provider())
        .bind(claims.email().is_some())
        .fetch_one(db)
        .await
    }

    /// Creates a user after a successful phone verification.
    pub async fn create_phone_user(db: &PgPool, phone: &str, name: Option<&str>) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (auth_subject, phone, name, provider, last_login)
            VALUES ($1, $2, $3, 'phone', now())
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(phone)
        .bind(name)
        .fetch_one(db)
        .await
    }

    pub async fn touch_login(db: &PgPool, id: Uuid) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET last_login = now() WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .fetch_one(db)
        .await
    }

    pub async fn update_profile(
        db: &PgPool,
        id: Uuid,
        name: Option<&str>,
        email: Option<&str>,
    ) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET name = COALESCE($2, name),
                   email = COALESCE($3, email),
                   email_verified = CASE WHEN $3 IS NULL OR $3 = email THEN email_verified ELSE FALSE END
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(name)
        .bind(email)
        .fetch_one(db)
        .await
    }
}
