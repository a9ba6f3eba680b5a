use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::{
    repo_types::FeaturedWeek,
    services::{archive_old_featured, current_week_start, select_featured_restaurant, SelectOptions},
};
use crate::{cities::City, state::AppState};

/// Background rotation: every `check_secs`, picks a restaurant for each
/// active city whose current week has none, then archives old picks.
pub fn spawn(state: AppState) -> JoinHandle<()> {
    let every = Duration::from_secs(state.config.rotation.check_secs.max(60));
    info!(every_secs = every.as_secs(), "featured rotation scheduler started");
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            if let Err(e) = run_once(&state).await {
                error!(error = %e, "featured rotation pass failed");
            }
        }
    })
}

pub async fn run_once(state: &AppState) -> anyhow::Result<()> {
    let week = current_week_start();
    for city in City::list_active(&state.db).await? {
        if FeaturedWeek::find_for_week(&state.db, city.id, week).await?.is_some() {
            debug!(city = %city.slug, "week already has a pick");
            continue;
        }
        match select_featured_restaurant(state, &city, week, SelectOptions::default()).await {
            Ok(record) => info!(
                city = %city.slug,
                restaurant_id = %record.restaurant.id,
                "weekly rotation done"
            ),
            Err(e) => error!(city = %city.slug, error = %e, "weekly rotation failed"),
        }
    }
    archive_old_featured(&state.db, state.config.rotation.months_to_keep).await?;
    Ok(())
}
