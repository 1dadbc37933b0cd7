// carelink-common/src/models/credential.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Decrypted OAuth credential for the calendar provider, one per user.
///
/// Only the token manager ever holds this in plaintext; the repository
/// encrypts both tokens (AES-256-GCM, per-call nonce) before anything
/// touches durable storage.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CalendarCredential {
    pub user_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub scope: String,
    pub token_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
