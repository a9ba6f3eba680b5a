use sqlx::{PgConnection, PgExecutor, PgPool};
use time::Date;
use uuid::Uuid;

use super::repo_types::{FeaturedHistoryEntry, FeaturedWeek};
use crate::restaurants::{repo::RESTAURANT_COLUMNS, Restaurant};

const WEEK_COLUMNS: &str =
    "id, city_id, restaurant_id, week_start, description, is_custom, created_at, archived_at";

impl FeaturedWeek {
    pub async fn find_for_week<'e, E: PgExecutor<'e>>(
        ex: E,
        city_id: Uuid,
        week_start: Date,
    ) -> sqlx::Result<Option<FeaturedWeek>> {
        sqlx::query_as::<_, FeaturedWeek>(&format!(
            r#"
            SELECT {WEEK_COLUMNS}
              FROM featured_weeks
             WHERE city_id = $1 AND week_start = $2 AND archived_at IS NULL
            "#
        ))
        .bind(city_id)
        .bind(week_start)
        .fetch_optional(ex)
        .await
    }

    /// Writes the pick for `(city_id, week_start)`. With `replace == false`
    /// a live pick wins and `None` is returned; an archived one is revived
    /// with the new restaurant.
    pub async fn insert(
        conn: &mut PgConnection,
        city_id: Uuid,
        restaurant_id: Uuid,
        week_start: Date,
        description: Option<&str>,
        is_custom: bool,
        replace: bool,
    ) -> sqlx::Result<Option<FeaturedWeek>> {
        const OVERWRITE: &str = "DO UPDATE SET restaurant_id = EXCLUDED.restaurant_id, \
                                 description = EXCLUDED.description, \
                                 is_custom = EXCLUDED.is_custom, \
                                 created_at = now(), \
                                 archived_at = NULL";
        let on_conflict = if replace {
            OVERWRITE.to_string()
        } else {
            format!("{OVERWRITE} WHERE featured_weeks.archived_at IS NOT NULL")
        };
        sqlx::query_as::<_, FeaturedWeek>(&format!(
            r#"
            INSERT INTO featured_weeks (city_id, restaurant_id, week_start, description, is_custom)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (city_id, week_start) {on_conflict}
            RETURNING {WEEK_COLUMNS}
            "#
        ))
        .bind(city_id)
        .bind(restaurant_id)
        .bind(week_start)
        .bind(description)
        .bind(is_custom)
        .fetch_optional(&mut *conn)
        .await
    }

    /// Yelp ids featured in the city on or after `since`.
    pub async fn recent_yelp_ids<'e, E: PgExecutor<'e>>(
        ex: E,
        city_id: Uuid,
        since: Date,
    ) -> sqlx::Result<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT r.yelp_id
              FROM featured_weeks fw
              JOIN restaurants r ON r.id = fw.restaurant_id
             WHERE fw.city_id = $1 AND fw.week_start >= $2 AND r.yelp_id IS NOT NULL
            "#,
        )
        .bind(city_id)
        .bind(since)
        .fetch_all(ex)
        .await
    }

    pub async fn history(
        db: &PgPool,
        city_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> sqlx::Result<Vec<FeaturedHistoryEntry>> {
        sqlx::query_as::<_, FeaturedHistoryEntry>(
            r#"
            SELECT fw.id, fw.restaurant_id, r.name AS restaurant_name, fw.week_start,
                   fw.description, fw.is_custom, fw.created_at, fw.archived_at
              FROM featured_weeks fw
              JOIN restaurants r ON r.id = fw.restaurant_id
             WHERE fw.city_id = $1
             ORDER BY fw.week_start DESC
             LIMIT $2 OFFSET $3
            "#,
        )
        .bind(city_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
    }

    pub async fn count_for_city(db: &PgPool, city_id: Uuid) -> sqlx::Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM featured_weeks WHERE city_id = $1")
            .bind(city_id)
            .fetch_one(db)
            .await
    }

    pub async fn archive_before(db: &PgPool, cutoff: Date) -> sqlx::Result<u64> {
        let done = sqlx::query(
            r#"
            UPDATE featured_weeks
               SET archived_at = now()
             WHERE week_start < $1 AND archived_at IS NULL
            "#,
        )
        .bind(cutoff)
        .execute(db)
        .await?;
        Ok(done.rows_affected())
    }
}

/// Flags `restaurant_id` as the city's featured restaurant and clears the rest.
pub async fn mark_featured(
    conn: &mut PgConnection,
    city_id: Uuid,
    restaurant_id: Uuid,
    week_start: Date,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE restaurants
           SET is_featured = (id = $2),
               week_of = CASE WHEN id = $2 THEN $3 ELSE week_of END,
               updated_at = now()
         WHERE city_id = $1 AND (is_featured OR id = $2)
        "#,
    )
    .bind(city_id)
    .bind(restaurant_id)
    .bind(week_start)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// The city's restaurant whose last feature is oldest (never featured first).
pub async fn least_recently_featured(
    conn: &mut PgConnection,
    city_id: Uuid,
    exclude: Option<Uuid>,
) -> sqlx::Result<Option<Restaurant>> {
    sqlx::query_as::<_, Restaurant>(&format!(
        r#"
        SELECT {RESTAURANT_COLUMNS}
          FROM restaurants r
          LEFT JOIN LATERAL (
                SELECT MAX(fw.week_start) AS last_week
                  FROM featured_weeks fw
                 WHERE fw.restaurant_id = r.id
          ) f ON TRUE
         WHERE r.city_id = $1
           AND ($2::uuid IS NULL OR r.id <> $2)
         ORDER BY f.last_week ASC NULLS FIRST, r.rating DESC NULLS LAST
         LIMIT 1
        "#
    ))
    .bind(city_id)
    .bind(exclude)
    .fetch_optional(&mut *conn)
    .await
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::testing;
    use time::macros::date;

    /// A throwaway city with `n` restaurants, so week rows never collide
    /// with seeded data or other runs.
    pub(crate) async fn seed_city(db: &PgPool, n: usize) -> (Uuid, Vec<Uuid>) {
        let slug = format!("test-{}", Uuid::new_v4().simple());
        let city_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO cities (slug, name, display_name, state)
            VALUES ($1, 'Testville', 'Testville Food Club', 'TX')
            RETURNING id
            "#,
        )
        .bind(&slug)
        .fetch_one(db)
        .await
        .unwrap();
        let mut restaurants = Vec::with_capacity(n);
        for i in 0..n {
            let id = sqlx::query_scalar::<_, Uuid>(
                "INSERT INTO restaurants (name, cuisine, city_id, rating) VALUES ($1, 'Tacos', $2, $3) RETURNING id",
            )
            .bind(format!("Spot {i}"))
            .bind(city_id)
            .bind(4.0 + i as f64 / 10.0)
            .fetch_one(db)
            .await
            .unwrap();
            restaurants.push(id);
        }
        (city_id, restaurants)
    }

    /// Archives one city's weeks; `archive_before` is global and would race
    /// with other tests.
    pub(crate) async fn archive_city(db: &PgPool, city_id: Uuid) {
        sqlx::query("UPDATE featured_weeks SET archived_at = now() WHERE city_id = $1")
            .bind(city_id)
            .execute(db)
            .await
            .unwrap();
    }

    #[tokio::test]
    #[ignore = "needs postgres"]
    async fn existing_pick_wins_unless_replaced() {
        let db = testing::pool().await;
        let (city, r) = seed_city(&db, 2).await;
        let week = date!(2031 - 03 - 03);
        let mut conn = db.acquire().await.unwrap();

        let first = FeaturedWeek::insert(&mut conn, city, r[0], week, None, false, false)
            .await
            .unwrap()
            .unwrap();
        let lost = FeaturedWeek::insert(&mut conn, city, r[1], week, None, false, false)
            .await
            .unwrap();
        assert!(lost.is_none());

        let forced = FeaturedWeek::insert(&mut conn, city, r[1], week, Some("Admin pick"), true, true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(forced.id, first.id);
        assert_eq!(forced.restaurant_id, r[1]);
        assert!(forced.is_custom);
        assert_eq!(FeaturedWeek::count_for_city(&db, city).await.unwrap(), 1);
    }

    #[tokio::test]
    #[ignore = "needs postgres"]
    async fn concurrent_inserts_leave_one_row() {
        let db = testing::pool().await;
        let (city, r) = seed_city(&db, 2).await;
        let week = date!(2031 - 03 - 10);
        let mut a = db.acquire().await.unwrap();
        let mut b = db.acquire().await.unwrap();

        let (x, y) = tokio::join!(
            FeaturedWeek::insert(&mut a, city, r[0], week, None, false, false),
            FeaturedWeek::insert(&mut b, city, r[1], week, None, false, false),
        );
        let winners = [x.unwrap(), y.unwrap()].into_iter().flatten().count();
        assert_eq!(winners, 1);
        assert_eq!(FeaturedWeek::count_for_city(&db, city).await.unwrap(), 1);
    }

    #[tokio::test]
    #[ignore = "needs postgres"]
    async fn archived_week_is_revived_by_a_plain_insert() {
        let db = testing::pool().await;
        let (city, r) = seed_city(&db, 2).await;
        let week = date!(2031 - 06 - 02);
        let mut conn = db.acquire().await.unwrap();

        FeaturedWeek::insert(&mut conn, city, r[0], week, None, false, false)
            .await
            .unwrap()
            .unwrap();
        archive_city(&db, city).await;
        assert!(FeaturedWeek::find_for_week(&db, city, week).await.unwrap().is_none());

        let revived = FeaturedWeek::insert(&mut conn, city, r[1], week, None, false, false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(revived.restaurant_id, r[1]);
        assert!(revived.archived_at.is_none());
        let live = FeaturedWeek::find_for_week(&db, city, week).await.unwrap().unwrap();
        assert_eq!(live.id, revived.id);
    }

    #[tokio::test]
    #[ignore = "needs postgres"]
    async fn archive_leaves_current_weeks_alone() {
        let db = testing::pool().await;
        let (city, r) = seed_city(&db, 2).await;
        let old = date!(2019 - 06 - 03);
        let current = date!(2032 - 06 - 07);
        let mut conn = db.acquire().await.unwrap();
        FeaturedWeek::insert(&mut conn, city, r[0], old, None, false, false).await.unwrap();
        FeaturedWeek::insert(&mut conn, city, r[1], current, None, false, false).await.unwrap();

        FeaturedWeek::archive_before(&db, date!(2019 - 06 - 10)).await.unwrap();
        assert!(FeaturedWeek::find_for_week(&db, city, old).await.unwrap().is_none());
        assert!(FeaturedWeek::find_for_week(&db, city, current).await.unwrap().is_some());
        let history = FeaturedWeek::history(&db, city, 10, 0).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[1].archived_at.is_some());
    }

    #[tokio::test]
    #[ignore = "needs postgres"]
    async fn mark_featured_keeps_a_single_flag_per_city() {
        let db = testing::pool().await;
        let (city, r) = seed_city(&db, 3).await;
        let mut conn = db.acquire().await.unwrap();

        mark_featured(&mut conn, city, r[0], date!(2031 - 04 - 07)).await.unwrap();
        mark_featured(&mut conn, city, r[2], date!(2031 - 04 - 14)).await.unwrap();

        let flagged = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM restaurants WHERE city_id = $1 AND is_featured",
        )
        .bind(city)
        .fetch_all(&db)
        .await
        .unwrap();
        assert_eq!(flagged, vec![r[2]]);
    }

    #[tokio::test]
    #[ignore = "needs postgres"]
    async fn least_recently_featured_prefers_never_featured() {
        let db = testing::pool().await;
        let (city, r) = seed_city(&db, 3).await;
        let mut conn = db.acquire().await.unwrap();
        FeaturedWeek::insert(&mut conn, city, r[2], date!(2031 - 05 - 05), None, false, false)
            .await
            .unwrap();
        FeaturedWeek::insert(&mut conn, city, r[0], date!(2031 - 05 - 12), None, false, false)
            .await
            .unwrap();

        let pick = least_recently_featured(&mut conn, city, None).await.unwrap().unwrap();
        assert_eq!(pick.id, r[1]);

        let pick = least_recently_featured(&mut conn, city, Some(r[1])).await.unwrap().unwrap();
        assert_eq!(pick.id, r[2]);
    }
}
