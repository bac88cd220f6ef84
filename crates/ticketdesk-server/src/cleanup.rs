use std::time::Duration;

use tracing::debug;

use ticketdesk_api::session::PageSessionStore;

/// Background task that drops page sessions whose idle expiry has passed.
pub async fn run_session_purge_loop(sessions: PageSessionStore, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let count = sessions.purge_expired().await;
        if count > 0 {
            debug!("Cleanup: purged {} expired sessions", count);
        }
    }
}
