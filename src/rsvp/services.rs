use uuid::Uuid;

use super::{
    dto::{CreateRsvpRequest, DayCounts},
    repo_types::{RsvpDay, RsvpStatus},
};
use crate::{
    cities::services::resolve_city,
    error::{AppError, AppResult},
    response::FieldError,
    restaurants::Restaurant,
    rotation::services::current_featured,
    state::AppState,
};

/// Parses day and status, collecting a message per bad field. A missing
/// status means `going`.
pub fn validate(req: &CreateRsvpRequest) -> Result<(RsvpDay, RsvpStatus), AppError> {
    let mut errors = Vec::new();
    let day = match req.day.as_deref() {
        None => {
            errors.push(FieldError::new("day", "Day is required"));
            None
        }
        Some(raw) => {
            let parsed = RsvpDay::parse(raw);
            if parsed.is_none() {
                errors.push(FieldError::new(
                    "day",
                    "Day must be one of monday, tuesday, wednesday, thursday, friday, saturday, sunday",
                ));
            }
            parsed
        }
    };
    let status = match req.status.as_deref() {
        None => Some(RsvpStatus::Going),
        Some(raw) => {
            let parsed = RsvpStatus::parse(raw);
            if parsed.is_none() {
                errors.push(FieldError::new(
                    "status",
                    "Status must be one of going, maybe, not_going",
                ));
            }
            parsed
        }
    };
    match (day, status) {
        (Some(day), Some(status)) if errors.is_empty() => Ok((day, status)),
        _ => Err(AppError::Validation(errors)),
    }
}

/// All seven days, zero where no row was returned.
pub fn zero_fill(rows: &[(RsvpDay, i64)]) -> DayCounts {
    let mut counts = DayCounts::default();
    for (day, n) in rows {
        let slot = match day {
            RsvpDay::Monday => &mut counts.monday,
            RsvpDay::Tuesday => &mut counts.tuesday,
            RsvpDay::Wednesday => &mut counts.wednesday,
            RsvpDay::Thursday => &mut counts.thursday,
            RsvpDay::Friday => &mut counts.friday,
            RsvpDay::Saturday => &mut counts.saturday,
            RsvpDay::Sunday => &mut counts.sunday,
        };
        *slot += n;
    }
    counts
}

/// The explicit restaurant, or this week's featured one for the default city.
pub async fn target_restaurant(st: &AppState, requested: Option<Uuid>) -> AppResult<Uuid> {
    if let Some(id) = requested {
        return Restaurant::find_by_id(&st.db, id)
            .await?
            .map(|r| r.id)
            .ok_or_else(|| AppError::not_found("Restaurant not found"));
    }
    let city = resolve_city(&st.db, None, &st.config.default_city).await?;
    current_featured(&st.db, city.id)
        .await?
        .map(|f| f.restaurant.id)
        .ok_or_else(|| AppError::not_found("No current restaurant found"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(day: Option<&str>, status: Option<&str>) -> CreateRsvpRequest {
        CreateRsvpRequest {
            restaurant_id: None,
            day: day.map(str::to_string),
            status: status.map(str::to_string),
        }
    }

    #[test]
    fn accepts_known_values_case_insensitively() {
        let (day, status) = validate(&req(Some("Friday"), Some("not-going"))).unwrap();
        assert_eq!(day, RsvpDay::Friday);
        assert_eq!(status, RsvpStatus::NotGoing);
    }

    #[test]
    fn status_defaults_to_going() {
        let (_, status) = validate(&req(Some("sat"), None)).unwrap();
        assert_eq!(status, RsvpStatus::Going);
    }

    #[test]
    fn reports_every_bad_field() {
        match validate(&req(Some("funday"), Some("perhaps"))) {
            Err(AppError::Validation(fields)) => {
                let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
                assert_eq!(names, vec!["day", "status"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        match validate(&req(None, None)) {
            Err(AppError::Validation(fields)) => assert_eq!(fields[0].message, "Day is required"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn counts_cover_all_days() {
        let counts = zero_fill(&[(RsvpDay::Friday, 3), (RsvpDay::Sunday, 1)]);
        assert_eq!(counts.friday, 3);
        assert_eq!(counts.sunday, 1);
        assert_eq!(counts.monday, 0);

        let json = serde_json::to_value(&counts).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 7);
        for day in ["monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday"] {
            assert!(obj.contains_key(day), "missing {day}");
        }
    }
}
