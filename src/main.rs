use std::time::Duration;

mod app;
mod auth;
mod cities;
mod config;
mod db;
mod error;
mod extract;
mod monitoring;
mod response;
mod restaurants;
mod rotation;
mod rsvp;
mod sms;
mod social;
mod state;
mod storage;
mod store;
mod verification;
mod visits;
mod wishlist;
mod yelp;

use crate::{config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "austin_food_club=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    let queue_tick = Duration::from_millis(config.yelp.queue_tick_ms);
    let rotation_enabled = config.rotation.enabled;

    let state = AppState::init(config).await?;
    db::migrate(&state.db).await?;

    let _queue = state.yelp.clone().spawn_queue_processor(queue_tick);
    let _rotation = if rotation_enabled {
        Some(rotation::scheduler::spawn(state.clone()))
    } else {
        tracing::warn!("weekly rotation scheduler disabled");
        None
    };

    app::serve(app::build_app(state)).await
}
