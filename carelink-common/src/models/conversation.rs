// carelink-common/src/models/conversation.rs

use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Add sqlx::Type so that SQLx knows how to decode this enum.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Hash, sqlx::Type)]
#[sqlx(type_name = "TEXT")]
#[sqlx(rename_all = "lowercase")]
pub enum Channel {
    Whatsapp,
    Sms,
    Inapp,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Whatsapp => write!(f, "whatsapp"),
            Channel::Sms => write!(f, "sms"),
            Channel::Inapp => write!(f, "inapp"),
        }
    }
}

impl FromStr for Channel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "whatsapp" => Ok(Channel::Whatsapp),
            "sms" => Ok(Channel::Sms),
            "inapp" => Ok(Channel::Inapp),
            _ => Err(format!("Unknown channel: {}", s)),
        }
    }
}

/// One durable conversation per `(owner_user_id, channel, contact_phone)`.
/// Created on the first inbound message or an explicit start-chat action;
/// never hard-deleted.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Conversation {
    pub conversation_id: Uuid,
    pub owner_user_id: Uuid,
    pub channel: Channel,
    /// Strict E.164: `+` followed by digits only.
    pub contact_phone: String,
    pub contact_display_name: Option<String>,
    /// The provider number messages for this conversation arrive on.
    pub assigned_provider_number: Option<String>,
    pub unread_count: i32,
    pub last_message_preview: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
