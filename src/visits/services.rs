use serde::Serialize;
use time::{macros::format_description, Date, OffsetDateTime};
use tracing::{error, info};
use uuid::Uuid;

use super::{
    dto::{CreateVisitRequest, VisitView},
    photo::{self, decode_photo, Photo},
    repo::NewVisit,
    repo_types::{VerifiedVisit, VisitRow, VisitStats},
};
use crate::{
    error::{AppError, AppResult},
    response::FieldError,
    restaurants::Restaurant,
    state::AppState,
};

pub const BASE_POINTS: i64 = 10;
pub const REVIEW_BONUS: i64 = 5;
pub const FIRST_VISIT_BONUS: i64 = 5;
pub const LONG_REVIEW_CHARS: usize = 20;
const MAX_REVIEW_CHARS: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    FirstVisit,
    Regular,
    Connoisseur,
    CuisineExplorer,
    Critic,
}

impl Badge {
    fn earned(self, stats: &VisitStats) -> bool {
        match self {
            Badge::FirstVisit => stats.visits >= 1,
            Badge::Regular => stats.visits >= 5,
            Badge::Connoisseur => stats.visits >= 10,
            Badge::CuisineExplorer => stats.cuisines >= 5,
            Badge::Critic => stats.reviews >= 10,
        }
    }

    const ALL: [Badge; 5] = [
        Badge::FirstVisit,
        Badge::Regular,
        Badge::Connoisseur,
        Badge::CuisineExplorer,
        Badge::Critic,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rewards {
    pub points: i64,
    pub total_points: i64,
    pub new_badges: Vec<Badge>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserVisitSummary {
    #[serde(flatten)]
    pub stats: VisitStats,
    pub total_points: i64,
    pub badges: Vec<Badge>,
}

fn is_long_review(review: Option<&str>) -> bool {
    review.is_some_and(|r| r.trim().chars().count() >= LONG_REVIEW_CHARS)
}

/// Points for a single visit.
pub fn visit_points(review: Option<&str>, first_visit: bool) -> i64 {
    let mut points = BASE_POINTS;
    if is_long_review(review) {
        points += REVIEW_BONUS;
    }
    if first_visit {
        points += FIRST_VISIT_BONUS;
    }
    points
}

/// Lifetime points; each distinct restaurant counted one first-visit bonus.
pub fn total_points(stats: &VisitStats) -> i64 {
    stats.visits * BASE_POINTS + stats.long_reviews * REVIEW_BONUS + stats.restaurants * FIRST_VISIT_BONUS
}

pub fn badges(stats: &VisitStats) -> Vec<Badge> {
    Badge::ALL.into_iter().filter(|b| b.earned(stats)).collect()
}

pub fn rewards(before: &VisitStats, after: &VisitStats, review: Option<&str>, first_visit: bool) -> Rewards {
    let had = badges(before);
    Rewards {
        points: visit_points(review, first_visit),
        total_points: total_points(after),
        new_badges: badges(after).into_iter().filter(|b| !had.contains(b)).collect(),
    }
}

pub fn summary(stats: VisitStats) -> UserVisitSummary {
    UserVisitSummary {
        total_points: total_points(&stats),
        badges: badges(&stats),
        stats,
    }
}

/// Validated create request.
pub struct ValidVisit {
    pub restaurant_id: Uuid,
    pub photo: Photo,
    pub rating: i16,
    pub review: Option<String>,
    pub visit_date: Date,
}

pub fn validate(req: CreateVisitRequest, today: Date) -> Result<ValidVisit, AppError> {
    let mut errors = Vec::new();

    if req.restaurant_id.is_none() {
        errors.push(FieldError::new("restaurantId", "Restaurant is required"));
    }
    let rating = match req.rating {
        Some(r) if (1..=5).contains(&r) => Some(r as i16),
        Some(_) => {
            errors.push(FieldError::new("rating", "Rating must be between 1 and 5"));
            None
        }
        None => {
            errors.push(FieldError::new("rating", "Rating is required"));
            None
        }
    };
    let review = req
        .review
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    if review.as_ref().is_some_and(|r| r.chars().count() > MAX_REVIEW_CHARS) {
        errors.push(FieldError::new(
            "review",
            format!("Review must be at most {MAX_REVIEW_CHARS} characters"),
        ));
    }
    let visit_date = match req.visit_date.as_deref() {
        None => Some(today),
        Some(raw) => match Date::parse(raw.trim(), format_description!("[year]-[month]-[day]")) {
            Ok(d) if d > today => {
                errors.push(FieldError::new("visitDate", "Visit date cannot be in the future"));
                None
            }
            Ok(d) => Some(d),
            Err(_) => {
                errors.push(FieldError::new("visitDate", "Visit date must be YYYY-MM-DD"));
                None
            }
        },
    };
    let photo = match req.photo.as_deref() {
        None => {
            errors.push(FieldError::new("photo", "Photo is required"));
            None
        }
        Some(raw) => match decode_photo(raw) {
            Ok(p) => Some(p),
            Err(AppError::Validation(mut fields)) => {
                errors.append(&mut fields);
                None
            }
            Err(other) => return Err(other),
        },
    };

    match (req.restaurant_id, rating, visit_date, photo) {
        (Some(restaurant_id), Some(rating), Some(visit_date), Some(photo)) if errors.is_empty() => {
            Ok(ValidVisit {
                restaurant_id,
                photo,
                rating,
                review,
                visit_date,
            })
        }
        _ => Err(AppError::Validation(errors)),
    }
}

/// Uploads the photo, stores the visit and computes rewards in one transaction.
pub async fn record_visit(
    st: &AppState,
    user_id: Uuid,
    visit: ValidVisit,
) -> AppResult<(VerifiedVisit, Rewards)> {
    if Restaurant::find_by_id(&st.db, visit.restaurant_id).await?.is_none() {
        return Err(AppError::not_found("Restaurant not found"));
    }

    let visit_id = Uuid::new_v4();
    let key = photo::photo_key(user_id, visit_id, visit.photo.content_type);
    photo::upload(st, &key, visit.photo).await?;

    let stored = async {
        let mut tx = st.db.begin().await?;
        let before = VisitStats::for_user(&mut *tx, user_id).await?;
        let prior = VerifiedVisit::count_for_user_at(&mut tx, user_id, visit.restaurant_id).await?;
        let row = VerifiedVisit::insert_tx(
            &mut tx,
            &NewVisit {
                id: visit_id,
                user_id,
                restaurant_id: visit.restaurant_id,
                photo_key: &key,
                rating: visit.rating,
                review: visit.review.as_deref(),
                visit_date: visit.visit_date,
            },
        )
        .await?;
        let after = VisitStats::for_user(&mut *tx, user_id).await?;
        tx.commit().await?;
        Ok::<_, sqlx::Error>((row, before, after, prior == 0))
    }
    .await;

    match stored {
        Ok((row, before, after, first_visit)) => {
            let rewards = rewards(&before, &after, row.review.as_deref(), first_visit);
            info!(visit_id = %row.id, points = rewards.points, "verified visit recorded");
            Ok((row, rewards))
        }
        Err(e) => {
            error!(error = %e, %key, "visit insert failed, removing uploaded photo");
            photo::remove(st, &key).await;
            Err(e.into())
        }
    }
}

pub async fn with_photo_urls(st: &AppState, rows: Vec<VisitRow>) -> Vec<VisitView> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let photo_url = photo::presign(st, &row.visit.photo_key).await;
        out.push(VisitView { row, photo_url });
    }
    out
}

pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use time::macros::date;

    fn stats(visits: i64, restaurants: i64, cuisines: i64, reviews: i64, long_reviews: i64) -> VisitStats {
        VisitStats {
            visits,
            restaurants,
            cuisines,
            reviews,
            long_reviews,
            average_rating: None,
        }
    }

    #[test]
    fn points_per_visit() {
        assert_eq!(visit_points(None, false), 10);
        assert_eq!(visit_points(Some("short"), false), 10);
        assert_eq!(visit_points(Some("The brisket was outstanding"), false), 15);
        assert_eq!(visit_points(Some("The brisket was outstanding"), true), 20);
        assert_eq!(visit_points(Some("                       x"), true), 15);
    }

    #[test]
    fn first_visit_awards_first_badge() {
        let r = rewards(&VisitStats::default(), &stats(1, 1, 1, 0, 0), None, true);
        assert_eq!(r.points, 15);
        assert_eq!(r.total_points, 15);
        assert_eq!(r.new_badges, vec![Badge::FirstVisit]);
    }

    #[test]
    fn thresholds_award_only_new_badges() {
        let before = stats(4, 4, 4, 9, 0);
        let after = stats(5, 5, 5, 10, 1);
        let r = rewards(&before, &after, Some("Crispy tacos and great salsa"), true);
        assert_eq!(r.new_badges, vec![Badge::Regular, Badge::CuisineExplorer, Badge::Critic]);
        assert_eq!(r.total_points, 5 * 10 + 5 + 5 * 5);
    }

    #[test]
    fn summary_lists_all_earned_badges() {
        let s = summary(stats(10, 3, 2, 1, 1));
        assert_eq!(s.badges, vec![Badge::FirstVisit, Badge::Regular, Badge::Connoisseur]);
        assert_eq!(s.total_points, 100 + 5 + 15);
    }

    fn request() -> CreateVisitRequest {
        CreateVisitRequest {
            restaurant_id: Some(Uuid::new_v4()),
            photo: Some(format!("data:image/jpeg;base64,{}", STANDARD.encode([0xFF, 0xD8, 0xFF]))),
            rating: Some(4),
            review: Some("  Great  ".into()),
            visit_date: Some("2025-09-01".into()),
        }
    }

    #[test]
    fn valid_request_passes() {
        let v = validate(request(), date!(2025 - 09 - 02)).ok().unwrap();
        assert_eq!(v.rating, 4);
        assert_eq!(v.review.as_deref(), Some("Great"));
        assert_eq!(v.visit_date, date!(2025 - 09 - 01));
        assert_eq!(v.photo.content_type, "image/jpeg");
    }

    #[test]
    fn future_date_and_bad_rating_are_field_errors() {
        let mut req = request();
        req.rating = Some(6);
        req.visit_date = Some("2025-09-03".into());
        match validate(req, date!(2025 - 09 - 02)) {
            Err(AppError::Validation(fields)) => {
                let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
                assert_eq!(names, vec!["rating", "visitDate"]);
            }
            Err(e) => panic!("unexpected {e:?}"),
            Ok(_) => panic!("expected validation error"),
        }
    }

    #[test]
    fn missing_photo_is_reported() {
        let mut req = request();
        req.photo = None;
        match validate(req, date!(2025 - 09 - 02)) {
            Err(AppError::Validation(fields)) => assert_eq!(fields[0].field, "photo"),
            Err(e) => panic!("unexpected {e:?}"),
            Ok(_) => panic!("expected validation error"),
        }
    }
}
