use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{CityQuery, RestaurantDetails},
    repo_types::Restaurant,
    services::{map_url_for, sync_from_yelp},
};
use crate::{
    auth::AdminUser,
    cities::services::resolve_city,
    error::{AppError, AppResult},
    extract::{Path, Query},
    response::{ApiResponse, CityPageQuery, Pagination},
    rotation::services::{
        current_featured, current_week_start, select_featured_restaurant, FeaturedRecord,
        SelectOptions,
    },
    state::AppState,
    yelp::dto::{Business, ReviewsResponse, SearchParams, SearchResponse, Sourced},
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/restaurants", get(list_restaurants))
        .route("/restaurants/current", get(current_restaurant))
        .route("/restaurants/featured", get(featured_restaurant))
        .route("/restaurants/search", get(search_yelp))
        .route("/restaurants/yelp/:yelp_id", get(yelp_details))
        .route("/restaurants/yelp/:yelp_id/reviews", get(yelp_reviews))
        .route("/restaurants/:id", get(get_restaurant))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/restaurants/sync/:yelp_id", post(sync_restaurant))
}

#[instrument(skip(state))]
pub async fn list_restaurants(
    State(state): State<AppState>,
    Query(q): Query<CityPageQuery>,
) -> AppResult<ApiResponse<Vec<Restaurant>>> {
    let city = resolve_city(&state.db, q.city.as_deref(), &state.config.default_city).await?;
    let paging = q.paging();
    let (page, limit) = paging.clamped();
    let rows = Restaurant::list_by_city(&state.db, city.id, limit, paging.offset()).await?;
    let total = Restaurant::count_by_city(&state.db, city.id).await?;
    Ok(ApiResponse::paginated(
        "Restaurants retrieved",
        rows,
        Pagination::new(page, limit, total),
    ))
}

#[instrument(skip(state))]
pub async fn current_restaurant(
    State(state): State<AppState>,
    Query(q): Query<CityQuery>,
) -> AppResult<ApiResponse<FeaturedRecord>> {
    let city = resolve_city(&state.db, q.city.as_deref(), &state.config.default_city).await?;
    let record = current_featured(&state.db, city.id)
        .await?
        .ok_or_else(|| AppError::not_found("No current restaurant found"))?;
    Ok(ApiResponse::ok("Current restaurant retrieved", record))
}

/// Like `current`, but runs the selection policy when the week has no pick.
#[instrument(skip(state))]
pub async fn featured_restaurant(
    State(state): State<AppState>,
    Query(q): Query<CityQuery>,
) -> AppResult<ApiResponse<FeaturedRecord>> {
    let city = resolve_city(&state.db, q.city.as_deref(), &state.config.default_city).await?;
    let record = match current_featured(&state.db, city.id).await? {
        Some(record) => record,
        None => {
            info!(city = %city.slug, "no pick this week, selecting on demand");
            select_featured_restaurant(&state, &city, current_week_start(), SelectOptions::default())
                .await?
        }
    };
    Ok(ApiResponse::ok("Featured restaurant retrieved", record))
}

#[instrument(skip(state))]
pub async fn get_restaurant(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<ApiResponse<RestaurantDetails>> {
    let restaurant = Restaurant::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Restaurant not found"))?;
    let map_url = map_url_for(&restaurant, state.config.google_maps_key.as_deref());
    Ok(ApiResponse::ok(
        "Restaurant retrieved",
        RestaurantDetails {
            restaurant,
            map_url,
        },
    ))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn sync_restaurant(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(yelp_id): Path<String>,
    Query(q): Query<CityQuery>,
) -> AppResult<ApiResponse<Restaurant>> {
    let city = resolve_city(&state.db, q.city.as_deref(), &state.config.default_city).await?;
    let restaurant = sync_from_yelp(&state, city.id, &yelp_id).await?;
    Ok(ApiResponse::ok("Restaurant synced", restaurant))
}

#[instrument(skip(state))]
pub async fn search_yelp(
    State(state): State<AppState>,
    Query(mut params): Query<SearchParams>,
) -> AppResult<ApiResponse<Sourced<SearchResponse>>> {
    if !params.has_location() {
        params.location = Some("Austin, TX".into());
    }
    let found = state.yelp.search(&params).await?;
    Ok(ApiResponse::ok("Search results retrieved", found))
}

#[instrument(skip(state))]
pub async fn yelp_details(
    State(state): State<AppState>,
    Path(yelp_id): Path<String>,
) -> AppResult<ApiResponse<Sourced<Business>>> {
    let business = state.yelp.details(&yelp_id).await?;
    Ok(ApiResponse::ok("Business retrieved", business))
}

#[instrument(skip(state))]
pub async fn yelp_reviews(
    State(state): State<AppState>,
    Path(yelp_id): Path<String>,
) -> AppResult<ApiResponse<Sourced<ReviewsResponse>>> {
    let reviews = state.yelp.reviews(&yelp_id).await?;
    Ok(ApiResponse::ok("Reviews retrieved", reviews))
}
