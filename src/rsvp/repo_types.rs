use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "rsvp_day", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RsvpDay {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl RsvpDay {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "monday" | "mon" => Some(RsvpDay::Monday),
            "tuesday" | "tue" => Some(RsvpDay::Tuesday),
            "wednesday" | "wed" => Some(RsvpDay::Wednesday),
            "thursday" | "thu" => Some(RsvpDay::Thursday),
            "friday" | "fri" => Some(RsvpDay::Friday),
            "saturday" | "sat" => Some(RsvpDay::Saturday),
            "sunday" | "sun" => Some(RsvpDay::Sunday),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "rsvp_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RsvpStatus {
    Going,
    Maybe,
    NotGoing,
}

impl RsvpStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace('-', "_").as_str() {
            "going" => Some(RsvpStatus::Going),
            "maybe" => Some(RsvpStatus::Maybe),
            "not_going" => Some(RsvpStatus::NotGoing),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Rsvp {
    pub id: Uuid,
    pub user_id: Uuid,
    pub restaurant_id: Uuid,
    pub day: RsvpDay,
    pub status: RsvpStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// An RSVP with the restaurant name, for the caller's own list.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RsvpWithRestaurant {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub rsvp: Rsvp,
    pub restaurant_name: String,
}
