// carelink-core/src/services/presence_service.rs

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use carelink_common::models::presence::PRESENCE_STALE_AFTER_SECS;
use carelink_common::traits::repository_traits::PresenceRepository;

use crate::Error;

/// Liveness heartbeats with a 30-second staleness window.
pub struct PresenceService {
    presence: Arc<dyn PresenceRepository>,
}

impl PresenceService {
    pub fn new(presence: Arc<dyn PresenceRepository>) -> Self {
        Self { presence }
    }

    pub async fn heartbeat(&self, user_id: Uuid) -> Result<(), Error> {
        self.presence.touch(user_id, Utc::now()).await
    }

    /// A user with no heartbeat inside the window is offline no matter
    /// what the stored flag says.
    pub async fn is_online(&self, user_id: Uuid) -> Result<bool, Error> {
        let Some(p) = self.presence.get(user_id).await? else {
            return Ok(false);
        };
        let fresh = Utc::now() - p.last_seen_at <= Duration::seconds(PRESENCE_STALE_AFTER_SECS);
        Ok(p.is_online && fresh)
    }
}
