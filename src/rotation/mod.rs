//! Weekly featured restaurant: selection policy, admin controls and the
//! background scheduler.

mod dto;
mod handlers;
mod repo;
pub mod repo_types;
pub mod scheduler;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::admin_routes()
}
