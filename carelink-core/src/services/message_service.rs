// carelink-core/src/services/message_service.rs

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use carelink_common::models::message::{
    Attachment, Message, MessageBody, MessageDirection, MessageStatus,
    ALLOWED_CONTENT_TYPES, MAX_ATTACHMENTS_PER_MESSAGE, MAX_ATTACHMENT_BYTES,
    MAX_TOTAL_ATTACHMENT_BYTES,
};
use carelink_common::traits::repository_traits::{ConversationRepository, MessageRepository};

use crate::platforms::whatsapp::WhatsAppClient;
use crate::Error;

/// Preview text stored on the conversation row.
const PREVIEW_MAX_CHARS: usize = 120;
const ATTACHMENT_PREVIEW: &str = "\u{1F4CE} Attachment";

/// Rejects an attachment set that breaks any of the hard limits. The
/// message is refused outright; nothing is truncated to fit.
pub fn assert_attachments_valid(attachments: &[Attachment]) -> Result<(), Error> {
    if attachments.len() > MAX_ATTACHMENTS_PER_MESSAGE {
        return Err(Error::Validation(format!(
            "too many attachments: {} (max {})",
            attachments.len(),
            MAX_ATTACHMENTS_PER_MESSAGE
        )));
    }

    let mut total: i64 = 0;
    for att in attachments {
        if att.size_bytes > MAX_ATTACHMENT_BYTES {
            return Err(Error::Validation(format!(
                "attachment of {} bytes exceeds the per-item cap",
                att.size_bytes
            )));
        }
        total += att.size_bytes;
        if let Some(ct) = &att.content_type {
            if !ALLOWED_CONTENT_TYPES.contains(&ct.as_str()) {
                return Err(Error::Validation(format!(
                    "content type not allowed: {}",
                    ct
                )));
            }
        }
    }
    if total > MAX_TOTAL_ATTACHMENT_BYTES {
        return Err(Error::Validation(format!(
            "attachments total {} bytes exceeds the cumulative cap",
            total
        )));
    }
    Ok(())
}

fn preview_of(text: Option<&str>, attachments: &[Attachment]) -> String {
    match text {
        Some(t) if !t.is_empty() => t.chars().take(PREVIEW_MAX_CHARS).collect(),
        _ if !attachments.is_empty() => ATTACHMENT_PREVIEW.to_string(),
        _ => String::new(),
    }
}

/// The message ledger: append-only (with soft delete) message store per
/// conversation, plus the delivery-status state machine.
pub struct MessageService {
    messages: Arc<dyn MessageRepository>,
    conversations: Arc<dyn ConversationRepository>,
    whatsapp: Arc<dyn WhatsAppClient>,
}

impl MessageService {
    pub fn new(
        messages: Arc<dyn MessageRepository>,
        conversations: Arc<dyn ConversationRepository>,
        whatsapp: Arc<dyn WhatsAppClient>,
    ) -> Self {
        Self {
            messages,
            conversations,
            whatsapp,
        }
    }

    /// Stores an inbound message, idempotently on the provider message
    /// id: redelivery of the same webhook returns the existing row's id
    /// without a duplicate insert or a second unread increment. When the
    /// provider supplied no id, a generated one takes its place so later
    /// status callbacks still have something to match.
    pub async fn insert_inbound(
        &self,
        conversation_id: Uuid,
        provider_message_id: Option<&str>,
        sender_phone: &str,
        text: Option<String>,
        attachments: Vec<Attachment>,
    ) -> Result<Uuid, Error> {
        assert_attachments_valid(&attachments)?;

        let provider_id = match provider_message_id {
            Some(pid) if !pid.is_empty() => pid.to_string(),
            _ => format!("carelink-{}", Uuid::new_v4()),
        };

        if let Some(existing) = self.messages.get_by_provider_id(&provider_id).await? {
            debug!(
                "Duplicate inbound delivery for provider id {}; returning existing message",
                provider_id
            );
            return Ok(existing.message_id);
        }

        let now = Utc::now();
        let preview = preview_of(text.as_deref(), &attachments);
        let message = Message {
            message_id: Uuid::new_v4(),
            conversation_id,
            provider_message_id: Some(provider_id.clone()),
            direction: MessageDirection::In,
            sender_ref: sender_phone.to_string(),
            body: MessageBody::Active { text, attachments },
            status: MessageStatus::Delivered,
            created_at: now,
        };

        if let Err(e) = self.messages.insert(&message).await {
            // Two concurrent redeliveries can both pass the existence
            // check; the unique index on provider_message_id breaks the
            // tie and the loser resolves to the winner's row.
            if let Some(existing) = self.messages.get_by_provider_id(&provider_id).await? {
                debug!(
                    "Lost idempotency race for provider id {}; returning existing message",
                    provider_id
                );
                return Ok(existing.message_id);
            }
            return Err(e);
        }

        self.conversations
            .record_inbound(conversation_id, &preview, now)
            .await?;

        Ok(message.message_id)
    }

    /// Sends an outbound message through the gateway. The row is written
    /// `queued` first, then moved to `sent` (with the provider id
    /// backfilled) or `failed` depending on the provider's answer.
    pub async fn send_outbound(
        &self,
        conversation_id: Uuid,
        sender_user_id: Uuid,
        text: Option<String>,
        attachments: Vec<Attachment>,
    ) -> Result<Uuid, Error> {
        if text.as_deref().map_or(true, |t| t.trim().is_empty()) && attachments.is_empty() {
            return Err(Error::Validation("empty message".to_string()));
        }
        assert_attachments_valid(&attachments)?;

        let conversation = self
            .conversations
            .get(conversation_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("conversation {}", conversation_id)))?;
        let from = conversation.assigned_provider_number.ok_or_else(|| {
            Error::Validation("conversation has no assigned provider number".to_string())
        })?;

        let now = Utc::now();
        let preview = preview_of(text.as_deref(), &attachments);
        let media_urls: Vec<String> = attachments.iter().filter_map(|a| a.url.clone()).collect();
        let body_text = text.clone().unwrap_or_default();

        let message = Message {
            message_id: Uuid::new_v4(),
            conversation_id,
            provider_message_id: None,
            direction: MessageDirection::Out,
            sender_ref: sender_user_id.to_string(),
            body: MessageBody::Active { text, attachments },
            status: MessageStatus::Queued,
            created_at: now,
        };
        self.messages.insert(&message).await?;

        // Sending resets the owner's unread counter.
        self.conversations
            .record_outbound(conversation_id, &preview, now)
            .await?;

        match self
            .whatsapp
            .send_message(&from, &conversation.contact_phone, &body_text, &media_urls)
            .await
        {
            Ok(ack) => {
                self.messages
                    .backfill_provider_id(message.message_id, &ack.message_sid)
                    .await?;
                self.messages
                    .apply_status_forward(message.message_id, MessageStatus::Sent)
                    .await?;
                info!(
                    "Outbound message {} accepted by gateway as {}",
                    message.message_id, ack.message_sid
                );
                Ok(message.message_id)
            }
            Err(e) => {
                self.messages
                    .apply_status_forward(message.message_id, MessageStatus::Failed)
                    .await?;
                warn!("Outbound message {} rejected: {:?}", message.message_id, e);
                Err(e)
            }
        }
    }

    /// Applies a delivery-status callback. Unknown provider ids are a
    /// no-op (the callback may race the provider-id backfill), and the
    /// rank check silently drops out-of-order or duplicate callbacks.
    pub async fn apply_provider_status(
        &self,
        provider_message_id: &str,
        provider_status: &str,
    ) -> Result<(), Error> {
        let Some(message) = self.messages.get_by_provider_id(provider_message_id).await? else {
            debug!(
                "Status callback for unknown provider id {}; ignoring",
                provider_message_id
            );
            return Ok(());
        };

        let next = MessageStatus::from_provider_status(provider_status);
        let applied = self
            .messages
            .apply_status_forward(message.message_id, next)
            .await?;
        if applied {
            debug!(
                "Message {} status -> {} (provider said {:?})",
                message.message_id, next, provider_status
            );
        } else {
            debug!(
                "Ignored non-forward status {:?} for message {} (currently {})",
                provider_status, message.message_id, message.status
            );
        }
        Ok(())
    }

    /// Tombstones the message: content and attachments are gone, the row
    /// and its timestamp stay for history. Clients see the fixed
    /// placeholder. Deleting twice is a no-op.
    pub async fn soft_delete(&self, message_id: Uuid) -> Result<(), Error> {
        let message = self
            .messages
            .get(message_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("message {}", message_id)))?;
        if message.body.is_deleted() {
            return Ok(());
        }
        self.messages.soft_delete(message_id, Utc::now()).await
    }

    pub async fn list_messages(
        &self,
        conversation_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Message>, Error> {
        self.messages
            .list_for_conversation(conversation_id, limit)
            .await
    }
}
