use std::time::Duration;

use tracing::info;
use uuid::Uuid;

use super::repo_types::Restaurant;
use crate::{
    error::AppResult,
    state::AppState,
    yelp::dto::{Business, Category, Coordinates, Hours, Location},
};

const STATIC_MAP_BASE: &str = "https://maps.googleapis.com/maps/api/staticmap";

/// Column values derived from a Yelp business.
#[derive(Debug, Clone, PartialEq)]
pub struct RestaurantFields {
    pub yelp_id: String,
    pub name: String,
    pub cuisine: Option<String>,
    pub price: Option<String>,
    pub area: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub hours: Vec<Hours>,
    pub photos: Vec<String>,
    pub categories: Vec<Category>,
    pub rating: Option<f64>,
    pub review_count: i32,
    pub phone: Option<String>,
    pub url: Option<String>,
}

impl From<&Business> for RestaurantFields {
    fn from(b: &Business) -> Self {
        let address = if b.location.display_address.is_empty() {
            b.location.address1.clone()
        } else {
            Some(b.location.display_address.join(", "))
        };
        let mut photos = b.photos.clone();
        if photos.is_empty() {
            photos.extend(b.image_url.clone());
        }
        Self {
            yelp_id: b.id.clone(),
            name: b.name.clone(),
            cuisine: b.categories.first().map(|c| c.title.clone()),
            price: b.price.clone(),
            area: b.location.city.clone(),
            address,
            latitude: b.coordinates.as_ref().and_then(|c| c.latitude),
            longitude: b.coordinates.as_ref().and_then(|c| c.longitude),
            hours: b.hours.clone(),
            photos,
            categories: b.categories.clone(),
            rating: b.rating,
            review_count: b.review_count.unwrap_or(0),
            phone: b.display_phone.clone(),
            url: b.url.clone(),
        }
    }
}

/// Yelp-shaped view of a stored row, served while Yelp is down.
pub fn to_business(r: &Restaurant) -> Business {
    let coordinates = match (r.latitude, r.longitude) {
        (None, None) => None,
        (latitude, longitude) => Some(Coordinates {
            latitude,
            longitude,
        }),
    };
    Business {
        id: r.yelp_id.clone().unwrap_or_else(|| r.id.to_string()),
        name: r.name.clone(),
        alias: None,
        image_url: r.photos.0.first().cloned(),
        url: r.url.clone(),
        review_count: Some(r.review_count),
        categories: r.categories.0.clone(),
        rating: r.rating,
        coordinates,
        price: r.price.clone(),
        location: Location {
            address1: r.address.clone(),
            city: r.area.clone(),
            state: None,
            zip_code: None,
            display_address: r.address.iter().cloned().collect(),
        },
        display_phone: r.phone.clone(),
        photos: r.photos.0.clone(),
        hours: r.hours.0.clone(),
        is_closed: None,
    }
}

/// Google Static Maps image centred on the restaurant.
pub fn static_map_url(lat: f64, lng: f64, key: &str) -> String {
    format!(
        "{STATIC_MAP_BASE}?center={lat:.6},{lng:.6}&zoom=15&size=600x300&scale=2\
         &markers=color:red%7C{lat:.6},{lng:.6}&key={key}"
    )
}

pub fn map_url_for(r: &Restaurant, key: Option<&str>) -> Option<String> {
    match (r.latitude, r.longitude, key) {
        (Some(lat), Some(lng), Some(key)) => Some(static_map_url(lat, lng, key)),
        _ => None,
    }
}

/// Fetches a business from Yelp (through cache and limiter) and stores it.
pub async fn sync_from_yelp(st: &AppState, city_id: Uuid, yelp_id: &str) -> AppResult<Restaurant> {
    let business = st
        .yelp
        .details_queued(yelp_id, Duration::from_secs(30))
        .await?
        .value;
    let restaurant =
        Restaurant::upsert_from_yelp(&st.db, city_id, &RestaurantFields::from(&business)).await?;
    info!(restaurant_id = %restaurant.id, %yelp_id, "restaurant synced from yelp");
    Ok(restaurant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::yelp::testing::FakeYelp;
    use sqlx::types::Json;
    use time::OffsetDateTime;

    fn stored() -> Restaurant {
        let now = OffsetDateTime::now_utc();
        Restaurant {
            id: Uuid::new_v4(),
            yelp_id: Some("franklin-bbq".into()),
            name: "Franklin Barbecue".into(),
            cuisine: Some("Barbeque".into()),
            price: Some("$$".into()),
            area: Some("Austin".into()),
            description: None,
            address: Some("900 E 11th St, Austin, TX 78702".into()),
            latitude: Some(30.2701),
            longitude: Some(-97.7313),
            hours: Json(vec![]),
            photos: Json(vec!["https://img.example/f.jpg".into()]),
            categories: Json(vec![Category {
                alias: "bbq".into(),
                title: "Barbeque".into(),
            }]),
            rating: Some(4.5),
            review_count: 9000,
            phone: None,
            url: None,
            is_featured: false,
            week_of: None,
            city_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn fields_from_business_pick_first_category_and_join_address() {
        let f = RestaurantFields::from(&FakeYelp::business("abc"));
        assert_eq!(f.yelp_id, "abc");
        assert_eq!(f.cuisine.as_deref(), Some("Tacos"));
        assert_eq!(f.address.as_deref(), Some("1 Congress Ave, Austin, TX"));
        assert_eq!(f.area.as_deref(), Some("Austin"));
        assert_eq!(f.photos, vec!["https://img.example/abc.jpg".to_string()]);
        assert_eq!(f.review_count, 120);
    }

    #[test]
    fn stored_row_maps_back_to_business() {
        let b = to_business(&stored());
        assert_eq!(b.id, "franklin-bbq");
        assert_eq!(b.image_url.as_deref(), Some("https://img.example/f.jpg"));
        assert_eq!(b.coordinates.and_then(|c| c.latitude), Some(30.2701));
        assert_eq!(b.location.display_address.len(), 1);
    }

    #[test]
    fn map_url_needs_coordinates_and_key() {
        let r = stored();
        let url = map_url_for(&r, Some("k")).unwrap();
        assert!(url.starts_with(STATIC_MAP_BASE));
        assert!(url.contains("center=30.270100,-97.731300"));
        assert!(url.ends_with("&key=k"));
        assert!(map_url_for(&r, None).is_none());

        let mut no_coords = stored();
        no_coords.latitude = None;
        assert!(map_url_for(&no_coords, Some("k")).is_none());
    }
}
