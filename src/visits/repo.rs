use sqlx::{PgPool, Postgres, Transaction};
use time::Date;
use uuid::Uuid;

use super::repo_types::{VerifiedVisit, VisitRow, VisitStats};
use crate::visits::services::LONG_REVIEW_CHARS;

pub(crate) const VISIT_ROW_SELECT: &str = r#"
    SELECT v.id, v.user_id, v.restaurant_id, v.photo_key, v.rating, v.review, v.visit_date,
           v.created_at, r.name AS restaurant_name, r.cuisine, u.name AS user_name
      FROM verified_visits v
      JOIN restaurants r ON r.id = v.restaurant_id
      JOIN users u ON u.id = v.user_id
"#;

pub struct NewVisit<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub restaurant_id: Uuid,
    pub photo_key: &'a str,
    pub rating: i16,
    pub review: Option<&'a str>,
    pub visit_date: Date,
}

impl VerifiedVisit {
    pub async fn insert_tx(
        tx: &mut Transaction<'_, Postgres>,
        v: &NewVisit<'_>,
    ) -> sqlx::Result<VerifiedVisit> {
        sqlx::query_as::<_, VerifiedVisit>(
            r#"
            INSERT INTO verified_visits (id, user_id, restaurant_id, photo_key, rating, review, visit_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, user_id, restaurant_id, photo_key, rating, review, visit_date, created_at
            "#,
        )
        .bind(v.id)
        .bind(v.user_id)
        .bind(v.restaurant_id)
        .bind(v.photo_key)
        .bind(v.rating)
        .bind(v.review)
        .bind(v.visit_date)
        .fetch_one(&mut **tx)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<VerifiedVisit>> {
        sqlx::query_as::<_, VerifiedVisit>(
            r#"
            SELECT id, user_id, restaurant_id, photo_key, rating, review, visit_date, created_at
              FROM verified_visits
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    pub async fn delete(db: &PgPool, id: Uuid, user_id: Uuid) -> sqlx::Result<bool> {
        let done = sqlx::query("DELETE FROM verified_visits WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    pub async fn count_for_user_at(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        restaurant_id: Uuid,
    ) -> sqlx::Result<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM verified_visits WHERE user_id = $1 AND restaurant_id = $2",
        )
        .bind(user_id)
        .bind(restaurant_id)
        .fetch_one(&mut **tx)
        .await
    }
}

impl VisitRow {
    pub async fn list_for_user(
        db: &PgPool,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> sqlx::Result<Vec<VisitRow>> {
        sqlx::query_as::<_, VisitRow>(&format!(
            "{VISIT_ROW_SELECT} WHERE v.user_id = $1 ORDER BY v.visit_date DESC, v.created_at DESC \
             LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
    }

    pub async fn list_for_restaurant(
        db: &PgPool,
        restaurant_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> sqlx::Result<Vec<VisitRow>> {
        sqlx::query_as::<_, VisitRow>(&format!(
            "{VISIT_ROW_SELECT} WHERE v.restaurant_id = $1 ORDER BY v.created_at DESC \
             LIMIT $2 OFFSET $3"
        ))
        .bind(restaurant_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
    }

    pub async fn find(db: &PgPool, id: Uuid) -> sqlx::Result<Option<VisitRow>> {
        sqlx::query_as::<_, VisitRow>(&format!("{VISIT_ROW_SELECT} WHERE v.id = $1"))
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// Most recent visits of all users.
    pub async fn recent(db: &PgPool, limit: i64, offset: i64) -> sqlx::Result<Vec<VisitRow>> {
        sqlx::query_as::<_, VisitRow>(&format!(
            "{VISIT_ROW_SELECT} ORDER BY v.created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
    }
}

pub async fn count_for_user(db: &PgPool, user_id: Uuid) -> sqlx::Result<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM verified_visits WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(db)
        .await
}

pub async fn count_for_restaurant(db: &PgPool, restaurant_id: Uuid) -> sqlx::Result<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM verified_visits WHERE restaurant_id = $1")
        .bind(restaurant_id)
        .fetch_one(db)
        .await
}

pub async fn count_all(db: &PgPool) -> sqlx::Result<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM verified_visits")
        .fetch_one(db)
        .await
}

impl VisitStats {
    pub async fn for_user<'e, E: sqlx::PgExecutor<'e>>(ex: E, user_id: Uuid) -> sqlx::Result<VisitStats> {
        sqlx::query_as::<_, VisitStats>(
            r#"
            SELECT COUNT(*) AS visits,
                   COUNT(DISTINCT v.restaurant_id) AS restaurants,
                   COUNT(DISTINCT lower(r.cuisine)) AS cuisines,
                   COUNT(*) FILTER (WHERE length(trim(coalesce(v.review, ''))) > 0) AS reviews,
                   COUNT(*) FILTER (WHERE length(trim(coalesce(v.review, ''))) >= $2) AS long_reviews,
                   AVG(v.rating)::float8 AS average_rating
              FROM verified_visits v
              JOIN restaurants r ON r.id = v.restaurant_id
             WHERE v.user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(LONG_REVIEW_CHARS as i32)
        .fetch_one(ex)
        .await
    }
}
