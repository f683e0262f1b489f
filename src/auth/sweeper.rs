use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};

use super::store::RefreshTokenStore;

/// Periodically deletes expired refresh tokens until `shutdown` flips to
/// `true` or its sender is dropped.
pub fn spawn_refresh_token_sweeper(
    store: Arc<dyn RefreshTokenStore>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(interval_secs = interval.as_secs(), "refresh token sweeper started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match store.delete_expired(Utc::now()).await {
                        Ok(0) => {}
                        Ok(removed) => tracing::info!(removed, "swept expired refresh tokens"),
                        Err(err) => tracing::error!(error = %err, "refresh token sweep failed"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("refresh token sweeper stopped");
    })
}
