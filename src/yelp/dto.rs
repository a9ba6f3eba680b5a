use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SearchParams {
    #[serde(default)]
    pub term: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub categories: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub radius: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

impl SearchParams {
    /// Query pairs in a fixed order with normalised values. Used both for the
    /// outbound request and for the cache key, so identical searches collide.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        let mut push = |k: &'static str, v: Option<String>| {
            if let Some(v) = v.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty()) {
                out.push((k, v));
            }
        };
        push("categories", self.categories.clone());
        push("latitude", self.latitude.map(|v| format!("{v:.4}")));
        push("limit", Some(self.limit.unwrap_or(20).min(50).to_string()));
        push("location", self.location.clone());
        push("longitude", self.longitude.map(|v| format!("{v:.4}")));
        push("offset", self.offset.map(|v| v.to_string()));
        push("price", self.price.clone());
        push("radius", self.radius.map(|v| v.min(40_000).to_string()));
        push("sort_by", self.sort_by.clone());
        push("term", self.term.clone());
        out
    }

    pub fn has_location(&self) -> bool {
        self.location.as_deref().is_some_and(|l| !l.trim().is_empty())
            || (self.latitude.is_some() && self.longitude.is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Category {
    pub alias: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Coordinates {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Location {
    #[serde(default)]
    pub address1: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub display_address: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OpenSlot {
    pub day: u8,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub is_overnight: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Hours {
    #[serde(default)]
    pub open: Vec<OpenSlot>,
    #[serde(default)]
    pub hours_type: Option<String>,
    #[serde(default)]
    pub is_open_now: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Business {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub review_count: Option<i32>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub display_phone: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub hours: Vec<Hours>,
    #[serde(default)]
    pub is_closed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub businesses: Vec<Business>,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReviewUser {
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Review {
    pub id: String,
    pub rating: u8,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub time_created: Option<String>,
    pub user: ReviewUser,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReviewsResponse {
    #[serde(default)]
    pub reviews: Vec<Review>,
    #[serde(default)]
    pub total: u64,
}

/// Where a Yelp-shaped answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Yelp,
    Cache,
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct Sourced<T> {
    #[serde(flatten)]
    pub value: T,
    pub source: Source,
}

impl<T> Sourced<T> {
    pub fn new(value: T, source: Source) -> Self {
        Self { value, source }
    }
}
