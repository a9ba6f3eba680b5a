use sqlx::{types::Json, PgExecutor, PgPool};
use uuid::Uuid;

use super::{repo_types::Restaurant, services::RestaurantFields};

pub(crate) const RESTAURANT_COLUMNS: &str = "r.id, r.yelp_id, r.name, r.cuisine, r.price, r.area, \
    r.description, r.address, r.latitude, r.longitude, r.hours, r.photos, r.categories, r.rating, \
    r.review_count, r.phone, r.url, r.is_featured, r.week_of, r.city_id, r.created_at, r.updated_at";

impl Restaurant {
    pub async fn list_by_city(
        db: &PgPool,
        city_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> sqlx::Result<Vec<Restaurant>> {
        sqlx::query_as::<_, Restaurant>(&format!(
            r#"
            SELECT {RESTAURANT_COLUMNS}
              FROM restaurants r
             WHERE r.city_id = $1
             ORDER BY r.created_at DESC
             LIMIT $2 OFFSET $3
            "#
        ))
        .bind(city_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
    }

    pub async fn count_by_city(db: &PgPool, city_id: Uuid) -> sqlx::Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM restaurants WHERE city_id = $1")
            .bind(city_id)
            .fetch_one(db)
            .await
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        ex: E,
        id: Uuid,
    ) -> sqlx::Result<Option<Restaurant>> {
        sqlx::query_as::<_, Restaurant>(&format!(
            "SELECT {RESTAURANT_COLUMNS} FROM restaurants r WHERE r.id = $1"
        ))
        .bind(id)
        .fetch_optional(ex)
        .await
    }

    pub async fn find_by_yelp_id(db: &PgPool, yelp_id: &str) -> sqlx::Result<Option<Restaurant>> {
        sqlx::query_as::<_, Restaurant>(&format!(
            "SELECT {RESTAURANT_COLUMNS} FROM restaurants r WHERE r.yelp_id = $1"
        ))
        .bind(yelp_id)
        .fetch_optional(db)
        .await
    }

    /// Restaurants of a city matching `term` on name or cuisine, best rated first.
    pub async fn search_in_city(
        db: &PgPool,
        city_slug: &str,
        term: Option<&str>,
        limit: i64,
    ) -> sqlx::Result<Vec<Restaurant>> {
        sqlx::query_as::<_, Restaurant>(&format!(
            r#"
            SELECT {RESTAURANT_COLUMNS}
              FROM restaurants r
              JOIN cities c ON c.id = r.city_id
             WHERE c.slug = $1
               AND ($2::text IS NULL
                    OR r.name ILIKE $2 ESCAPE '\'
                    OR r.cuisine ILIKE $2 ESCAPE '\')
             ORDER BY r.rating DESC NULLS LAST, r.review_count DESC
             LIMIT $3
            "#
        ))
        .bind(city_slug)
        .bind(term.map(contains_pattern))
        .bind(limit)
        .fetch_all(db)
        .await
    }

    /// Inserts or refreshes the row for a Yelp business. The curated
    /// description is never overwritten.
    pub async fn upsert_from_yelp<'e, E: PgExecutor<'e>>(
        ex: E,
        city_id: Uuid,
        fields: &RestaurantFields,
    ) -> sqlx::Result<Restaurant> {
        sqlx::query_as::<_, Restaurant>(&format!(
            r#"
            WITH r AS (
                INSERT INTO restaurants (yelp_id, name, cuisine, price, area, address, latitude,
                                         longitude, hours, photos, categories, rating, review_count,
                                         phone, url, city_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
                ON CONFLICT (yelp_id) DO UPDATE
                   SET name = EXCLUDED.name,
                       cuisine = EXCLUDED.cuisine,
                       price = EXCLUDED.price,
                       area = EXCLUDED.area,
                       address = EXCLUDED.address,
                       latitude = EXCLUDED.latitude,
                       longitude = EXCLUDED.longitude,
                       hours = EXCLUDED.hours,
                       photos = EXCLUDED.photos,
                       categories = EXCLUDED.categories,
                       rating = EXCLUDED.rating,
                       review_count = EXCLUDED.review_count,
                       phone = EXCLUDED.phone,
                       url = EXCLUDED.url,
                       updated_at = now()
                RETURNING *
            )
            SELECT {RESTAURANT_COLUMNS} FROM r
            "#
        ))
        .bind(&fields.yelp_id)
        .bind(&fields.name)
        .bind(&fields.cuisine)
        .bind(&fields.price)
        .bind(&fields.area)
        .bind(&fields.address)
        .bind(fields.latitude)
        .bind(fields.longitude)
        .bind(Json(fields.hours.clone()))
        .bind(Json(fields.photos.clone()))
        .bind(Json(fields.categories.clone()))
        .bind(fields.rating)
        .bind(fields.review_count)
        .bind(&fields.phone)
        .bind(&fields.url)
        .bind(city_id)
        .fetch_one(ex)
        .await
    }
}

/// `%term%` with the term's own LIKE metacharacters escaped.
fn contains_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing;

    #[test]
    fn wildcards_in_terms_match_literally() {
        assert_eq!(contains_pattern("tacos"), "%tacos%");
        assert_eq!(contains_pattern("100%"), "%100\\%%");
        assert_eq!(contains_pattern("a_b"), "%a\\_b%");
        assert_eq!(contains_pattern(r"c:\d"), r"%c:\\d%");
    }

    #[tokio::test]
    #[ignore = "needs postgres"]
    async fn percent_in_search_term_is_not_a_wildcard() {
        let db = testing::pool().await;
        let tag = Uuid::new_v4().simple().to_string();
        for name in [format!("{tag}%Grill"), format!("{tag}9Grill"), format!("{tag}_Grill")] {
            sqlx::query(
                "INSERT INTO restaurants (name, city_id) SELECT $1, id FROM cities WHERE slug = 'austin'",
            )
            .bind(&name)
            .execute(&db)
            .await
            .unwrap();
        }

        let hits = Restaurant::search_in_city(&db, "austin", Some(&format!("{tag}%")), 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, format!("{tag}%Grill"));

        let hits = Restaurant::search_in_city(&db, "austin", Some(&format!("{tag}_")), 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, format!("{tag}_Grill"));

        let all = Restaurant::search_in_city(&db, "austin", Some(&tag), 10).await.unwrap();
        assert_eq!(all.len(), 3);
    }
}
