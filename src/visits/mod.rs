//! Verified visits: photo-backed check-ins with server-side points and badges.

pub mod dto;
mod handlers;
pub mod photo;
pub mod repo;
pub mod repo_types;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::read_routes())
        .merge(handlers::write_routes())
}
