// carelink-common/src/models/mod.rs

pub mod calendar;
pub mod conversation;
pub mod credential;
pub mod message;
pub mod presence;
pub mod provider;

pub use calendar::{CalendarEvent, EventStatus, ReminderHorizon};
pub use conversation::{Channel, Conversation};
pub use credential::CalendarCredential;
pub use message::{
    Attachment, AttachmentKind, Message, MessageBody, MessageDirection, MessageStatus,
};
pub use presence::Presence;
pub use provider::{ProviderAccount, ProviderNumber};
