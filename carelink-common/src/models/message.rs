// carelink-common/src/models/message.rs

use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the client sees in place of a soft-deleted message.
pub const DELETED_PLACEHOLDER: &str = "This message was deleted";

/// Hard limits on message attachments. Validation rejects, never truncates.
pub const MAX_ATTACHMENTS_PER_MESSAGE: usize = 5;
pub const MAX_ATTACHMENT_BYTES: i64 = 16 * 1024 * 1024;
pub const MAX_TOTAL_ATTACHMENT_BYTES: i64 = 40 * 1024 * 1024;

/// Content types we accept when the provider reports one. An unknown
/// (absent) content type is allowed; a reported one must be on this list.
pub const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/gif",
    "audio/ogg",
    "audio/mpeg",
    "audio/amr",
    "audio/mp4",
    "video/mp4",
    "video/3gpp",
    "application/pdf",
    "text/vcard",
];

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq, sqlx::Type)]
#[sqlx(type_name = "TEXT")]
#[sqlx(rename_all = "lowercase")]
pub enum MessageDirection {
    In,
    Out,
}

impl fmt::Display for MessageDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageDirection::In => write!(f, "in"),
            MessageDirection::Out => write!(f, "out"),
        }
    }
}

impl FromStr for MessageDirection {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in" => Ok(MessageDirection::In),
            "out" => Ok(MessageDirection::Out),
            _ => Err(format!("Unknown message direction: {}", s)),
        }
    }
}

/// Delivery states form a lattice: `queued -> sent -> delivered -> read`,
/// with `failed` as an absorbing side state. Transitions only ever move
/// forward in rank; `failed` is terminal.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq, sqlx::Type)]
#[sqlx(type_name = "TEXT")]
#[sqlx(rename_all = "lowercase")]
pub enum MessageStatus {
    Queued,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl MessageStatus {
    /// Position in the forward lattice. `Failed` ranks above everything so
    /// that the single `rank`-based comparison covers absorption too.
    pub fn rank(&self) -> u8 {
        match self {
            MessageStatus::Queued => 0,
            MessageStatus::Sent => 1,
            MessageStatus::Delivered => 2,
            MessageStatus::Read => 3,
            MessageStatus::Failed => 4,
        }
    }

    /// Whether a stored `self` may move to `next`. Out-of-order or
    /// duplicated callbacks are ignored rather than applied backward,
    /// and nothing leaves `Failed`.
    pub fn can_transition_to(&self, next: MessageStatus) -> bool {
        if *self == MessageStatus::Failed {
            return false;
        }
        if next == MessageStatus::Failed {
            return true;
        }
        next.rank() > self.rank()
    }

    /// Maps a provider callback status string onto the lattice.
    /// `undelivered` collapses into `Failed`; unrecognized strings fall
    /// back to `Sent` (the provider treats these as in-flight states).
    pub fn from_provider_status(s: &str) -> MessageStatus {
        match s.to_lowercase().as_str() {
            "queued" | "accepted" | "sending" => MessageStatus::Queued,
            "sent" => MessageStatus::Sent,
            "delivered" => MessageStatus::Delivered,
            "read" => MessageStatus::Read,
            "failed" | "undelivered" => MessageStatus::Failed,
            _ => MessageStatus::Sent,
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageStatus::Queued => write!(f, "queued"),
            MessageStatus::Sent => write!(f, "sent"),
            MessageStatus::Delivered => write!(f, "delivered"),
            MessageStatus::Read => write!(f, "read"),
            MessageStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for MessageStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queued" => Ok(MessageStatus::Queued),
            "sent" => Ok(MessageStatus::Sent),
            "delivered" => Ok(MessageStatus::Delivered),
            "read" => Ok(MessageStatus::Read),
            "failed" => Ok(MessageStatus::Failed),
            _ => Err(format!("Unknown message status: {}", s)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Audio,
    Video,
    File,
}

impl AttachmentKind {
    pub fn from_content_type(content_type: &str) -> AttachmentKind {
        if content_type.starts_with("image/") {
            AttachmentKind::Image
        } else if content_type.starts_with("audio/") {
            AttachmentKind::Audio
        } else if content_type.starts_with("video/") {
            AttachmentKind::Video
        } else {
            AttachmentKind::File
        }
    }
}

/// Embedded in the message row (JSON column), not a standalone entity.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub url: Option<String>,
    pub content_type: Option<String>,
    pub size_bytes: i64,
    pub duration_seconds: Option<i32>,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

/// Tombstone pattern: a deleted message keeps its row and timestamp but
/// the payload is gone for good.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum MessageBody {
    Active {
        text: Option<String>,
        attachments: Vec<Attachment>,
    },
    Deleted {
        deleted_at: DateTime<Utc>,
    },
}

impl MessageBody {
    pub fn is_deleted(&self) -> bool {
        matches!(self, MessageBody::Deleted { .. })
    }

    /// Client-visible text: the content for active messages, the fixed
    /// placeholder for deleted ones.
    pub fn display_text(&self) -> &str {
        match self {
            MessageBody::Active { text, .. } => text.as_deref().unwrap_or(""),
            MessageBody::Deleted { .. } => DELETED_PLACEHOLDER,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Message {
    pub message_id: Uuid,
    pub conversation_id: Uuid,
    /// Globally unique when present; the idempotency key for inbound and
    /// echo deduplication. Backfilled on outbound once the provider acks.
    pub provider_message_id: Option<String>,
    pub direction: MessageDirection,
    /// Internal user id for outbound, external phone for inbound.
    pub sender_ref: String,
    pub body: MessageBody,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
}
