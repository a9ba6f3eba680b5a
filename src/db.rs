use std::time::Duration;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::warn;

pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
        .context("connect to database")
}

pub async fn migrate(db: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("run migrations")
}

/// `SELECT 1` round trip used by the health endpoint.
pub async fn ping(db: &PgPool) -> bool {
    match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(db).await {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "database ping failed");
            false
        }
    }
}

/// Helpers for tests that need a real Postgres (`TEST_DATABASE_URL`).
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use uuid::Uuid;

    pub async fn pool() -> PgPool {
        let url = std::env::var("TEST_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .expect("TEST_DATABASE_URL or DATABASE_URL must be set");
        let db = connect(&url).await.unwrap();
        migrate(&db).await.unwrap();
        db
    }

    pub async fn seed_user(db: &PgPool) -> Uuid {
        sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO users (auth_subject, name) VALUES ($1, 'Test Eater') RETURNING id",
        )
        .bind(Uuid::new_v4())
        .fetch_one(db)
        .await
        .unwrap()
    }

    pub async fn seed_restaurant(db: &PgPool) -> Uuid {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO restaurants (name, cuisine, city_id)
            SELECT 'Test Smokehouse', 'Barbecue', id FROM cities WHERE slug = 'austin'
            RETURNING id
            "#,
        )
        .fetch_one(db)
        .await
        .unwrap()
    }
}
