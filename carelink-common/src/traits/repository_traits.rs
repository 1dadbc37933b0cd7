// carelink-common/src/traits/repository_traits.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Error;
use crate::models::calendar::{CalendarEvent, EventStatus};
use crate::models::conversation::{Channel, Conversation};
use crate::models::credential::CalendarCredential;
use crate::models::message::{Message, MessageStatus};
use crate::models::presence::Presence;
use crate::models::provider::{ProviderAccount, ProviderNumber};

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Idempotent upsert keyed on `(owner_user_id, channel, contact_phone)`.
    /// An existing row gets its mutable fields (display name, assigned
    /// number) patched; a new row starts with `unread_count = 0`. The
    /// phone must already be normalized E.164.
    async fn upsert(
        &self,
        owner_user_id: Uuid,
        channel: Channel,
        contact_phone: &str,
        contact_display_name: Option<&str>,
        assigned_provider_number: Option<&str>,
    ) -> Result<Conversation, Error>;

    async fn get(&self, conversation_id: Uuid) -> Result<Option<Conversation>, Error>;

    /// Atomic `unread_count + 1` plus preview refresh. Must not
    /// read-modify-write the counter from a stale snapshot.
    async fn record_inbound(
        &self,
        conversation_id: Uuid,
        preview: &str,
        at: DateTime<Utc>,
    ) -> Result<(), Error>;

    /// Preview refresh with `unread_count` reset to zero.
    async fn record_outbound(
        &self,
        conversation_id: Uuid,
        preview: &str,
        at: DateTime<Utc>,
    ) -> Result<(), Error>;

    async fn mark_read(&self, conversation_id: Uuid, at: DateTime<Utc>) -> Result<(), Error>;

    async fn list_for_owner(&self, owner_user_id: Uuid) -> Result<Vec<Conversation>, Error>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn insert(&self, message: &Message) -> Result<(), Error>;

    async fn get(&self, message_id: Uuid) -> Result<Option<Message>, Error>;

    async fn get_by_provider_id(
        &self,
        provider_message_id: &str,
    ) -> Result<Option<Message>, Error>;

    /// Records the provider id once the provider acks an outbound send.
    async fn backfill_provider_id(
        &self,
        message_id: Uuid,
        provider_message_id: &str,
    ) -> Result<(), Error>;

    /// Applies `next` only if the stored status may legally move there
    /// (forward in rank, or into `failed` from any non-failed state).
    /// Returns whether a row actually changed. Must be atomic so that
    /// concurrent out-of-order callbacks cannot corrupt state.
    async fn apply_status_forward(
        &self,
        message_id: Uuid,
        next: MessageStatus,
    ) -> Result<bool, Error>;

    /// Tombstones the message: payload cleared, row and timestamp kept.
    async fn soft_delete(&self, message_id: Uuid, deleted_at: DateTime<Utc>) -> Result<(), Error>;

    /// Newest-first page for one conversation.
    async fn list_for_conversation(
        &self,
        conversation_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Message>, Error>;
}

#[async_trait]
pub trait CalendarCredentialsRepository: Send + Sync {
    /// Insert-or-replace for the user's single credential record.
    async fn store(&self, cred: &CalendarCredential) -> Result<(), Error>;
    async fn get(&self, user_id: Uuid) -> Result<Option<CalendarCredential>, Error>;
    async fn delete(&self, user_id: Uuid) -> Result<(), Error>;

    /// Every user with a stored credential; drives the periodic sync.
    async fn list_user_ids(&self) -> Result<Vec<Uuid>, Error>;
}

#[async_trait]
pub trait ProviderAccountRepository: Send + Sync {
    async fn store(&self, account: &ProviderAccount) -> Result<(), Error>;

    /// Decrypted signing secret for the account, if one is on file.
    async fn get_auth_token(&self, account_sid: &str) -> Result<Option<String>, Error>;
}

#[async_trait]
pub trait ProviderNumberRepository: Send + Sync {
    async fn assign(&self, number: &ProviderNumber) -> Result<(), Error>;
    async fn find_by_number(&self, phone_number: &str) -> Result<Option<ProviderNumber>, Error>;
}

#[async_trait]
pub trait CalendarEventRepository: Send + Sync {
    /// Upsert keyed on `(user_id, provider_event_id)`. An update patches
    /// title/description/times/status but preserves the reminder flag and
    /// job refs; the returned row carries the stored `event_id`.
    async fn upsert(&self, event: &CalendarEvent) -> Result<CalendarEvent, Error>;

    async fn get(&self, event_id: Uuid) -> Result<Option<CalendarEvent>, Error>;

    async fn get_by_provider_event_id(
        &self,
        user_id: Uuid,
        provider_event_id: &str,
    ) -> Result<Option<CalendarEvent>, Error>;

    async fn set_reminder_jobs(
        &self,
        event_id: Uuid,
        job_24h: Option<Uuid>,
        job_2h: Option<Uuid>,
    ) -> Result<(), Error>;

    /// Idempotent; re-marking an already-sent reminder is harmless.
    async fn mark_reminder_sent_24h(&self, event_id: Uuid) -> Result<(), Error>;

    async fn set_status(&self, event_id: Uuid, status: EventStatus) -> Result<(), Error>;

    async fn delete(&self, event_id: Uuid) -> Result<(), Error>;

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<CalendarEvent>, Error>;

    /// Non-cancelled events starting after `after`, across all users;
    /// used to re-arm reminder jobs at startup.
    async fn list_upcoming(&self, after: DateTime<Utc>) -> Result<Vec<CalendarEvent>, Error>;
}

#[async_trait]
pub trait PresenceRepository: Send + Sync {
    async fn touch(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<(), Error>;
    async fn get(&self, user_id: Uuid) -> Result<Option<Presence>, Error>;
}
