use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use wisp_api::auth::AppState;
use wisp_db::models::format_ts;

/// Background task that prunes expired messages.
///
/// Runs on an interval and deletes rows past their `expires_at` timestamp.
/// Read paths already treat those rows as gone, so timing here is loose.
pub async fn run_purge_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let db = state.clone();
        let purged =
            tokio::task::spawn_blocking(move || db.db.purge_expired(&format_ts(Utc::now())))
                .await;

        match purged {
            Ok(Ok(count)) if count > 0 => info!("Purge: dropped {} expired messages", count),
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("Purge error: {}", e),
            Err(e) => warn!("Purge join error: {}", e),
        }
    }
}
