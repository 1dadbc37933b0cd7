// carelink-common/src/models/provider.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A messaging-gateway account we accept webhooks from. The auth token
/// doubles as the webhook signing secret; it is stored encrypted and
/// only decrypted inside the repository.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderAccount {
    pub account_sid: String,
    pub auth_token: String,
    pub created_at: DateTime<Utc>,
}

/// Maps a provider phone number (the webhook `To` field) to the clinic
/// user that owns it. Inbound routing resolves through this table.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderNumber {
    /// E.164.
    pub phone_number: String,
    pub user_id: Uuid,
    pub account_sid: String,
}
