use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{WishlistEntry, WishlistItem};

impl WishlistItem {
    /// Plain insert: a second add for the same restaurant hits the unique
    /// constraint and surfaces as a duplicate.
    pub async fn add(
        db: &PgPool,
        user_id: Uuid,
        restaurant_id: Uuid,
        notes: Option<&str>,
    ) -> sqlx::Result<WishlistItem> {
        sqlx::query_as::<_, WishlistItem>(
            r#"
            INSERT INTO wishlists (user_id, restaurant_id, notes)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, restaurant_id, notes, added_at
            "#,
        )
        .bind(user_id)
        .bind(restaurant_id)
        .bind(notes)
        .fetch_one(db)
        .await
    }

    pub async fn list_for_user(db: &PgPool, user_id: Uuid) -> sqlx::Result<Vec<WishlistEntry>> {
        sqlx::query_as::<_, WishlistEntry>(
            r#"
            SELECT w.id, w.user_id, w.restaurant_id, w.notes, w.added_at,
                   r.name AS restaurant_name, r.cuisine, r.price, r.area, r.rating
              FROM wishlists w
              JOIN restaurants r ON r.id = w.restaurant_id
             WHERE w.user_id = $1
             ORDER BY w.added_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await
    }

    pub async fn remove(db: &PgPool, user_id: Uuid, restaurant_id: Uuid) -> sqlx::Result<bool> {
        let done = sqlx::query("DELETE FROM wishlists WHERE user_id = $1 AND restaurant_id = $2")
            .bind(user_id)
            .bind(restaurant_id)
            .execute(db)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    pub async fn find(
        db: &PgPool,
        user_id: Uuid,
        restaurant_id: Uuid,
    ) -> sqlx::Result<Option<WishlistItem>> {
        sqlx::query_as::<_, WishlistItem>(
            r#"
            SELECT id, user_id, restaurant_id, notes, added_at
              FROM wishlists
             WHERE user_id = $1 AND restaurant_id = $2
            "#,
        )
        .bind(user_id)
        .bind(restaurant_id)
        .fetch_optional(db)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::testing::{pool, seed_restaurant, seed_user},
        error::AppError,
    };
    use axum::http::StatusCode;

    #[tokio::test]
    #[ignore = "needs postgres"]
    async fn second_add_is_a_duplicate() {
        let db = pool().await;
        let (user, restaurant) = (seed_user(&db).await, seed_restaurant(&db).await);

        WishlistItem::add(&db, user, restaurant, Some("brisket")).await.unwrap();
        let err = WishlistItem::add(&db, user, restaurant, None).await.unwrap_err();
        assert_eq!(AppError::from(err).status(), StatusCode::CONFLICT);

        assert!(WishlistItem::remove(&db, user, restaurant).await.unwrap());
        assert!(!WishlistItem::remove(&db, user, restaurant).await.unwrap());
    }
}
