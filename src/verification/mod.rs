//! Phone sign-in with one-time SMS codes.

mod dto;
mod handlers;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
