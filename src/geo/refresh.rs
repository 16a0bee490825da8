//! Background location refresh.

use super::{IpGeolocator, LocationCell};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Consult IP geolocation once if the cell has no fresh GPS fix.
///
/// Returns `true` when the cell was updated.
pub async fn refresh_once(cell: &LocationCell, locator: &IpGeolocator) -> bool {
    if !cell.needs_ip_refresh_at(Utc::now()) {
        debug!("GPS fix is fresh, skipping IP lookup");
        return false;
    }

    match locator.locate().await {
        Ok(found) => {
            info!(
                "IP location: {}, {} ({:.6}, {:.6})",
                found.city, found.country, found.point.latitude, found.point.longitude
            );
            cell.update_ip(found.point, Some(found.city), Some(found.country));
            true
        }
        Err(e) => {
            warn!("Could not get automatic location: {e}");
            false
        }
    }
}

/// Refresh the cell immediately, then every `period`, until `shutdown` flips
/// to `true` or its sender is dropped.
pub async fn run_refresh_loop(
    cell: Arc<LocationCell>,
    locator: IpGeolocator,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                refresh_once(&cell, &locator).await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    debug!("Location refresh loop stopping");
                    break;
                }
            }
        }
    }
}
