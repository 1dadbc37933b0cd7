// carelink-core/src/tasks/calendar_sync.rs

use std::sync::Arc;

use tokio::time::{interval, Duration};
use tracing::{error, info};

use carelink_common::traits::repository_traits::CalendarCredentialsRepository;

use crate::services::calendar_service::CalendarSyncService;
use crate::Error;

/// Runs one sync pass for every user with a connected calendar.
///
/// Returns Ok(()) even if some users fail to sync (logs errors); a
/// single revoked credential must not starve everyone else's reminders.
pub async fn sync_all_connected_users(
    sync_service: &CalendarSyncService,
    credentials_repo: &Arc<dyn CalendarCredentialsRepository>,
) -> Result<(), Error> {
    let user_ids = credentials_repo.list_user_ids().await?;
    if user_ids.is_empty() {
        info!("No connected calendar accounts; nothing to sync.");
        return Ok(());
    }

    info!("Syncing calendars for {} connected user(s)...", user_ids.len());
    for user_id in user_ids {
        match sync_service.sync_events(user_id).await {
            Ok(count) => {
                info!("Synced {} events for user_id={}", count, user_id);
            }
            Err(e) => {
                error!("Calendar sync failed for user_id={}: {:?}", user_id, e);
            }
        }
    }

    Ok(())
}

/// Spawns the periodic calendar sync loop.
pub fn spawn_calendar_sync_task(
    sync_service: Arc<CalendarSyncService>,
    credentials_repo: Arc<dyn CalendarCredentialsRepository>,
    interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        // Sync immediately at startup, then on the interval.
        if let Err(e) = sync_all_connected_users(&sync_service, &credentials_repo).await {
            error!("Initial calendar sync pass failed: {:?}", e);
        }

        let mut ticker = interval(Duration::from_secs(interval_secs));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = sync_all_connected_users(&sync_service, &credentials_repo).await {
                error!("Periodic calendar sync pass failed: {:?}", e);
            }
        }
    })
}
