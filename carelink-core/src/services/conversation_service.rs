// carelink-core/src/services/conversation_service.rs

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use carelink_common::models::conversation::{Channel, Conversation};
use carelink_common::traits::repository_traits::ConversationRepository;

use crate::utils::phone::normalize_e164;
use crate::Error;

/// Maps a channel + external contact identity to its durable
/// conversation record, scoped to the owning user. Both inbound
/// ingestion and outbound send resolve through here.
pub struct ConversationService {
    conversations: Arc<dyn ConversationRepository>,
}

impl ConversationService {
    pub fn new(conversations: Arc<dyn ConversationRepository>) -> Self {
        Self { conversations }
    }

    /// Idempotent: repeated calls with identical inputs patch the same
    /// row, never create a duplicate. The raw phone may be loosely
    /// formatted or `whatsapp:`-prefixed; anything that cannot be
    /// normalized to E.164 is rejected before it can become a key.
    pub async fn upsert_conversation(
        &self,
        owner_user_id: Uuid,
        channel: Channel,
        contact_phone_raw: &str,
        contact_display_name: Option<&str>,
        assigned_provider_number: Option<&str>,
    ) -> Result<Conversation, Error> {
        let phone = normalize_e164(contact_phone_raw)?;
        debug!(
            "Upserting conversation owner={} channel={} phone={}",
            owner_user_id, channel, phone
        );
        self.conversations
            .upsert(
                owner_user_id,
                channel,
                &phone,
                contact_display_name,
                assigned_provider_number,
            )
            .await
    }

    pub async fn get(&self, conversation_id: Uuid) -> Result<Option<Conversation>, Error> {
        self.conversations.get(conversation_id).await
    }

    /// Clears the unread counter and stamps `last_read_at`.
    pub async fn mark_read(&self, conversation_id: Uuid) -> Result<(), Error> {
        self.conversations
            .mark_read(conversation_id, Utc::now())
            .await
    }

    pub async fn list_for_owner(&self, owner_user_id: Uuid) -> Result<Vec<Conversation>, Error> {
        self.conversations.list_for_owner(owner_user_id).await
    }
}
