//! Yelp Fusion integration: HTTP client plus the cache, rate limiter, queue
//! and fallback that sit in front of it.

pub mod cache;
pub mod client;
pub mod dto;
pub mod fallback;
pub mod queue;
pub mod rate_limit;
pub mod services;

pub use client::{RestaurantSource, YelpClient, YelpError};
pub use services::YelpService;

#[cfg(test)]
pub mod testing {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::dto::{
        Business, Category, Coordinates, Location, Review, ReviewUser, ReviewsResponse,
        SearchParams, SearchResponse,
    };
    use super::{RestaurantSource, YelpError};

    /// Upstream stand-in that counts calls and can simulate an outage.
    #[derive(Default)]
    pub struct FakeYelp {
        calls: AtomicUsize,
        failing: AtomicBool,
    }

    impl FakeYelp {
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub fn business(id: &str) -> Business {
            Business {
                id: id.to_string(),
                name: format!("Restaurant {id}"),
                alias: None,
                image_url: Some(format!("https://img.example/{id}.jpg")),
                url: None,
                review_count: Some(120),
                categories: vec![Category {
                    alias: "tacos".into(),
                    title: "Tacos".into(),
                }],
                rating: Some(4.5),
                coordinates: Some(Coordinates {
                    latitude: Some(30.2672),
                    longitude: Some(-97.7431),
                }),
                price: Some("$$".into()),
                location: Location {
                    address1: Some("1 Congress Ave".into()),
                    city: Some("Austin".into()),
                    state: Some("TX".into()),
                    zip_code: None,
                    display_address: vec!["1 Congress Ave".into(), "Austin, TX".into()],
                },
                display_phone: None,
                photos: vec![],
                hours: vec![],
                is_closed: Some(false),
            }
        }

        fn tick(&self) -> Result<(), YelpError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(YelpError::Unavailable("simulated outage".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RestaurantSource for FakeYelp {
        async fn search(&self, params: &SearchParams) -> Result<SearchResponse, YelpError> {
            self.tick()?;
            let term = params.term.clone().unwrap_or_else(|| "any".into());
            Ok(SearchResponse {
                businesses: vec![Self::business(&format!("{term}-1")), Self::business(&format!("{term}-2"))],
                total: 2,
            })
        }

        async fn business(&self, id: &str) -> Result<Business, YelpError> {
            self.tick()?;
            Ok(Self::business(id))
        }

        async fn reviews(&self, id: &str) -> Result<ReviewsResponse, YelpError> {
            self.tick()?;
            Ok(ReviewsResponse {
                reviews: vec![Review {
                    id: format!("{id}-r1"),
                    rating: 5,
                    text: "Great brisket".into(),
                    time_created: None,
                    user: ReviewUser {
                        name: "Sam".into(),
                        image_url: None,
                    },
                }],
                total: 1,
            })
        }
    }
}
