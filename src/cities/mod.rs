mod handlers;
mod repo;
pub mod repo_types;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub use repo_types::City;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
