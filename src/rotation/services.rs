use std::{collections::HashSet, time::Duration};

use serde::Serialize;
use sqlx::PgPool;
use time::{Date, Month, OffsetDateTime};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::repo::{least_recently_featured, mark_featured};
use super::repo_types::FeaturedWeek;
use crate::{
    cities::City,
    error::{AppError, AppResult},
    restaurants::{services::RestaurantFields, Restaurant},
    state::AppState,
    yelp::dto::{Business, SearchParams, Source},
};

/// A restaurant featured in the last this-many weeks is not picked again.
pub const REPEAT_WINDOW_WEEKS: i64 = 8;
const CANDIDATE_WAIT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default)]
pub struct SelectOptions {
    pub custom_restaurant_id: Option<Uuid>,
    pub custom_description: Option<String>,
    pub force_new: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Selection {
    Existing,
    Custom,
    Yelp,
    Database,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturedRecord {
    pub restaurant: Restaurant,
    pub week_start: Date,
    pub description: Option<String>,
    pub is_custom: bool,
    pub selection: Selection,
}

/// Monday of the week containing `date`.
pub fn week_start(date: Date) -> Date {
    date - time::Duration::days(i64::from(date.weekday().number_days_from_monday()))
}

pub fn current_week_start() -> Date {
    week_start(OffsetDateTime::now_utc().date())
}

/// `date` moved back by `months` calendar months, clamped to month end.
pub fn months_before(date: Date, months: i32) -> Date {
    let total = date.year() * 12 + i32::from(u8::from(date.month())) - 1 - months;
    let year = total.div_euclid(12);
    let month = Month::try_from((total.rem_euclid(12) + 1) as u8).unwrap_or(Month::January);
    let day = date.day().min(time::util::days_in_year_month(year, month));
    Date::from_calendar_date(year, month, day).unwrap_or(date)
}

/// Best-rated open business not featured recently.
pub fn pick_candidate<'a>(businesses: &'a [Business], recent: &HashSet<String>) -> Option<&'a Business> {
    businesses
        .iter()
        .filter(|b| !recent.contains(&b.id))
        .filter(|b| b.is_closed != Some(true))
        .max_by(|a, b| {
            let ra = a.rating.unwrap_or(0.0);
            let rb = b.rating.unwrap_or(0.0);
            ra.total_cmp(&rb)
                .then(a.review_count.unwrap_or(0).cmp(&b.review_count.unwrap_or(0)))
        })
}

fn candidate_search(city: &City) -> SearchParams {
    SearchParams {
        location: Some(format!("{}, {}", city.name, city.state)),
        categories: Some("restaurants".into()),
        sort_by: Some("rating".into()),
        limit: Some(50),
        ..Default::default()
    }
}

async fn load_record(
    db: &PgPool,
    week: FeaturedWeek,
    selection: Selection,
) -> AppResult<FeaturedRecord> {
    let restaurant = Restaurant::find_by_id(db, week.restaurant_id)
        .await?
        .ok_or_else(|| AppError::not_found("Featured restaurant no longer exists"))?;
    Ok(FeaturedRecord {
        restaurant,
        week_start: week.week_start,
        description: week.description,
        is_custom: week.is_custom,
        selection,
    })
}

/// This week's pick for `city_id`, if one was made.
pub async fn current_featured(db: &PgPool, city_id: Uuid) -> AppResult<Option<FeaturedRecord>> {
    match FeaturedWeek::find_for_week(db, city_id, current_week_start()).await? {
        Some(week) => Ok(Some(load_record(db, week, Selection::Existing).await?)),
        None => Ok(None),
    }
}

/// Yelp businesses worth featuring, or empty when Yelp can't answer freshly.
async fn yelp_candidates(st: &AppState, city: &City) -> Vec<Business> {
    match st.yelp.search_queued(&candidate_search(city), CANDIDATE_WAIT).await {
        Ok(found) if found.source != Source::Fallback => found.value.businesses,
        Ok(_) => {
            info!(city = %city.slug, "yelp in fallback mode; choosing from stored restaurants");
            Vec::new()
        }
        Err(e) => {
            warn!(error = %e, city = %city.slug, "yelp candidate search failed");
            Vec::new()
        }
    }
}

/// Chooses and persists the featured restaurant for `city` and `week`.
///
/// Order: the existing pick (unless `force_new`), a custom restaurant, a
/// Yelp candidate not featured in the last eight weeks, the city's least
/// recently featured stored restaurant. All writes share one transaction;
/// concurrent callers for the same city and week collapse onto one pick.
#[instrument(skip(st, city, opts), fields(city = %city.slug))]
pub async fn select_featured_restaurant(
    st: &AppState,
    city: &City,
    week: Date,
    opts: SelectOptions,
) -> AppResult<FeaturedRecord> {
    let week = week_start(week);
    let existing = FeaturedWeek::find_for_week(&st.db, city.id, week).await?;
    if let (Some(current), false) = (&existing, opts.force_new) {
        if opts.custom_restaurant_id.is_none() {
            return load_record(&st.db, current.clone(), Selection::Existing).await;
        }
    }
    let replace = opts.force_new || opts.custom_restaurant_id.is_some();
    let exclude = existing.as_ref().map(|w| w.restaurant_id);

    // Network I/O stays outside the transaction.
    let candidates = if opts.custom_restaurant_id.is_none() {
        yelp_candidates(st, city).await
    } else {
        Vec::new()
    };

    let mut tx = st.db.begin().await?;
    let (restaurant, selection) = if let Some(id) = opts.custom_restaurant_id {
        let r = Restaurant::find_by_id(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::not_found("Restaurant not found"))?;
        if r.city_id != city.id {
            return Err(AppError::validation(
                "restaurantId",
                "Restaurant belongs to a different city",
            ));
        }
        (r, Selection::Custom)
    } else {
        let since = week - time::Duration::weeks(REPEAT_WINDOW_WEEKS);
        let mut recent: HashSet<String> = FeaturedWeek::recent_yelp_ids(&mut *tx, city.id, since)
            .await?
            .into_iter()
            .collect();
        if let Some(id) = exclude {
            if let Some(r) = Restaurant::find_by_id(&mut *tx, id).await? {
                recent.extend(r.yelp_id);
            }
        }
        match pick_candidate(&candidates, &recent) {
            Some(b) => {
                let r = Restaurant::upsert_from_yelp(&mut *tx, city.id, &RestaurantFields::from(b))
                    .await?;
                (r, Selection::Yelp)
            }
            None => match least_recently_featured(&mut tx, city.id, exclude).await? {
                Some(r) => (r, Selection::Database),
                None => {
                    return Err(AppError::not_found(
                        "No restaurant data available for featured selection",
                    ))
                }
            },
        }
    };

    let description = opts
        .custom_description
        .as_deref()
        .or(restaurant.description.as_deref())
        .map(str::to_string);
    let inserted = FeaturedWeek::insert(
        &mut tx,
        city.id,
        restaurant.id,
        week,
        description.as_deref(),
        selection == Selection::Custom,
        replace,
    )
    .await?;

    let Some(week_row) = inserted else {
        // Lost the race to a concurrent rotation; serve its pick.
        tx.rollback().await?;
        let winner = FeaturedWeek::find_for_week(&st.db, city.id, week)
            .await?
            .ok_or_else(|| AppError::not_found("No current restaurant found"))?;
        return load_record(&st.db, winner, Selection::Existing).await;
    };

    mark_featured(&mut tx, city.id, restaurant.id, week).await?;
    tx.commit().await?;

    info!(
        restaurant_id = %restaurant.id,
        week_start = %week,
        selection = ?selection,
        "featured restaurant selected"
    );
    let restaurant = Restaurant::find_by_id(&st.db, restaurant.id)
        .await?
        .unwrap_or(restaurant);
    Ok(FeaturedRecord {
        restaurant,
        week_start: week_row.week_start,
        description: week_row.description,
        is_custom: week_row.is_custom,
        selection,
    })
}

pub async fn set_custom_featured(
    st: &AppState,
    city: &City,
    restaurant_id: Uuid,
    week: Date,
    description: Option<String>,
) -> AppResult<FeaturedRecord> {
    select_featured_restaurant(
        st,
        city,
        week,
        SelectOptions {
            custom_restaurant_id: Some(restaurant_id),
            custom_description: description,
            force_new: true,
        },
    )
    .await
}

/// Archives picks older than `months_to_keep` months. Returns how many.
pub async fn archive_old_featured(db: &PgPool, months_to_keep: i32) -> AppResult<u64> {
    let cutoff = months_before(OffsetDateTime::now_utc().date(), months_to_keep.max(1));
    let archived = FeaturedWeek::archive_before(db, cutoff).await?;
    info!(archived, cutoff = %cutoff, "old featured records archived");
    Ok(archived)
}
