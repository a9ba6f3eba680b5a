use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{Rsvp, RsvpDay, RsvpStatus, RsvpWithRestaurant};

const RSVP_COLUMNS: &str = "id, user_id, restaurant_id, day, status, created_at, updated_at";

impl Rsvp {
    /// One row per (user, restaurant); a second call replaces day and status.
    pub async fn upsert(
        db: &PgPool,
        user_id: Uuid,
        restaurant_id: Uuid,
        day: RsvpDay,
        status: RsvpStatus,
    ) -> sqlx::Result<Rsvp> {
        sqlx::query_as::<_, Rsvp>(&format!(
            r#"
            INSERT INTO rsvps (user_id, restaurant_id, day, status)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, restaurant_id) DO UPDATE
               SET day = EXCLUDED.day,
                   status = EXCLUDED.status,
                   updated_at = now()
            RETURNING {RSVP_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(restaurant_id)
        .bind(day)
        .bind(status)
        .fetch_one(db)
        .await
    }

    pub async fn list_for_user(db: &PgPool, user_id: Uuid) -> sqlx::Result<Vec<RsvpWithRestaurant>> {
        sqlx::query_as::<_, RsvpWithRestaurant>(
            r#"
            SELECT v.id, v.user_id, v.restaurant_id, v.day, v.status, v.created_at, v.updated_at,
                   r.name AS restaurant_name
              FROM rsvps v
              JOIN restaurants r ON r.id = v.restaurant_id
             WHERE v.user_id = $1
             ORDER BY v.updated_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Rsvp>> {
        sqlx::query_as::<_, Rsvp>(&format!("SELECT {RSVP_COLUMNS} FROM rsvps WHERE id = $1"))
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn delete(db: &PgPool, id: Uuid, user_id: Uuid) -> sqlx::Result<bool> {
        let done = sqlx::query("DELETE FROM rsvps WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    /// `going` RSVPs per day; days without any are absent.
    pub async fn going_by_day(db: &PgPool, restaurant_id: Uuid) -> sqlx::Result<Vec<(RsvpDay, i64)>> {
        sqlx::query_as::<_, (RsvpDay, i64)>(
            r#"
            SELECT day, COUNT(*)
              FROM rsvps
             WHERE restaurant_id = $1 AND status = 'going'
             GROUP BY day
            "#,
        )
        .bind(restaurant_id)
        .fetch_all(db)
        .await
    }
}
