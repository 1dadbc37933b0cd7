// carelink-common/src/models/presence.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Liveness heartbeat row. A heartbeat older than the staleness window
/// counts as offline regardless of the stored flag.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Presence {
    pub user_id: Uuid,
    pub last_seen_at: DateTime<Utc>,
    pub is_online: bool,
}

/// Heartbeats older than this are treated as offline.
pub const PRESENCE_STALE_AFTER_SECS: i64 = 30;
