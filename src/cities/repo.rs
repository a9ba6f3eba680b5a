use sqlx::PgPool;

use super::repo_types::City;

impl City {
    pub async fn list_active(db: &PgPool) -> sqlx::Result<Vec<City>> {
        sqlx::query_as::<_, City>(
            r#"
            SELECT id, slug, name, display_name, state, timezone, is_active, created_at
              FROM cities
             WHERE is_active
             ORDER BY name
            "#,
        )
        .fetch_all(db)
        .await
    }

    pub async fn find_by_slug(db: &PgPool, slug: &str) -> sqlx::Result<Option<City>> {
        sqlx::query_as::<_, City>(
            r#"
            SELECT id, slug, name, display_name, state, timezone, is_active, created_at
              FROM cities
             WHERE slug = $1
            "#,
        )
        .bind(slug)
        .fetch_optional(db)
        .await
    }
}
