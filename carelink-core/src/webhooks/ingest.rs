// carelink-core/src/webhooks/ingest.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use carelink_common::models::conversation::Channel;
use carelink_common::models::message::{Attachment, AttachmentKind};
use carelink_common::traits::repository_traits::{
    ProviderAccountRepository, ProviderNumberRepository,
};

use crate::services::conversation_service::ConversationService;
use crate::services::message_service::MessageService;
use crate::utils::phone::normalize_e164;
use crate::webhooks::signature::verify_signature;
use crate::Error;

pub const INBOUND_PATH: &str = "/webhook/whatsapp/inbound";
pub const STATUS_PATH: &str = "/webhook/whatsapp/status";

/// Ingests the gateway's inbound-message and status callbacks.
///
/// Both entry points verify the request signature before touching any
/// state, and both tolerate at-least-once redelivery: deduplication
/// comes from the conversation/message idempotency keys, not from any
/// endpoint-level bookkeeping.
pub struct WebhookIngestionService {
    accounts: Arc<dyn ProviderAccountRepository>,
    numbers: Arc<dyn ProviderNumberRepository>,
    conversations: Arc<ConversationService>,
    messages: Arc<MessageService>,
    /// Statically configured fallback `(account_sid, auth_token)` for
    /// installations that never stored a per-account secret.
    default_account: Option<(String, String)>,
    /// Public base URL the gateway signs requests against.
    public_base_url: String,
}

impl WebhookIngestionService {
    pub fn new(
        accounts: Arc<dyn ProviderAccountRepository>,
        numbers: Arc<dyn ProviderNumberRepository>,
        conversations: Arc<ConversationService>,
        messages: Arc<MessageService>,
        default_account: Option<(String, String)>,
        public_base_url: String,
    ) -> Self {
        Self {
            accounts,
            numbers,
            conversations,
            messages,
            default_account,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Inbound-message callback. Errors map onto the HTTP contract:
    /// `Unauthorized` -> 403, `NotFound` -> 404, `Validation` -> 400.
    pub async fn handle_inbound(
        &self,
        params: &BTreeMap<String, String>,
        signature: Option<&str>,
    ) -> Result<(), Error> {
        self.verify_request(INBOUND_PATH, params, signature).await?;

        let to_raw = params
            .get("To")
            .ok_or_else(|| Error::Validation("missing To".to_string()))?;
        let assigned_number = normalize_e164(to_raw)?;
        let owner = self
            .numbers
            .find_by_number(&assigned_number)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!("no user owns provider number {}", assigned_number))
            })?;

        let from_raw = params
            .get("From")
            .ok_or_else(|| Error::Validation("missing From".to_string()))?;
        let sender_phone = normalize_e164(from_raw)?;
        let profile_name = params.get("ProfileName").map(|s| s.as_str());

        let conversation = self
            .conversations
            .upsert_conversation(
                owner.user_id,
                Channel::Whatsapp,
                from_raw,
                profile_name,
                Some(assigned_number.as_str()),
            )
            .await?;

        let attachments = collect_media(params);
        let text = params
            .get("Body")
            .filter(|b| !b.is_empty())
            .cloned();
        let provider_message_id = params.get("MessageSid").map(|s| s.as_str());

        self.messages
            .insert_inbound(
                conversation.conversation_id,
                provider_message_id,
                &sender_phone,
                text,
                attachments,
            )
            .await?;

        Ok(())
    }

    /// Status callback. Missing sid or status is 400; an unknown sid is
    /// deliberately a success (it may race the provider-id backfill).
    pub async fn handle_status(
        &self,
        params: &BTreeMap<String, String>,
        signature: Option<&str>,
    ) -> Result<(), Error> {
        self.verify_request(STATUS_PATH, params, signature).await?;

        let message_sid = params
            .get("MessageSid")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Validation("missing MessageSid".to_string()))?;
        let status = params
            .get("MessageStatus")
            .or_else(|| params.get("SmsStatus"))
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Validation("missing MessageStatus".to_string()))?;

        self.messages
            .apply_provider_status(message_sid, status)
            .await
    }

    async fn verify_request(
        &self,
        path: &str,
        params: &BTreeMap<String, String>,
        signature: Option<&str>,
    ) -> Result<(), Error> {
        let signature =
            signature.ok_or_else(|| Error::Unauthorized("missing signature header".to_string()))?;
        let account_sid = params
            .get("AccountSid")
            .ok_or_else(|| Error::Unauthorized("missing AccountSid".to_string()))?;

        let secret = self
            .resolve_secret(account_sid)
            .await?
            .ok_or_else(|| Error::Unauthorized(format!("unknown account {}", account_sid)))?;

        let url = format!("{}{}", self.public_base_url, path);
        if !verify_signature(&secret, &url, params, signature) {
            return Err(Error::Unauthorized("signature mismatch".to_string()));
        }
        debug!("Webhook signature verified for account {}", account_sid);
        Ok(())
    }

    /// Per-account stored secret first, static default second. A crypto
    /// failure on the stored secret propagates; it must not fall through
    /// to the default pair.
    async fn resolve_secret(&self, account_sid: &str) -> Result<Option<String>, Error> {
        if let Some(token) = self.accounts.get_auth_token(account_sid).await? {
            return Ok(Some(token));
        }
        if let Some((default_sid, default_token)) = &self.default_account {
            if default_sid == account_sid {
                return Ok(Some(default_token.clone()));
            }
        }
        Ok(None)
    }
}

/// Builds attachments from the indexed `MediaUrlN` / `MediaContentTypeN`
/// form fields. Kind is inferred from the content-type prefix; anything
/// unrecognized is a plain file.
fn collect_media(params: &BTreeMap<String, String>) -> Vec<Attachment> {
    let count = params
        .get("NumMedia")
        .and_then(|n| n.parse::<usize>().ok())
        .unwrap_or(0);

    let mut attachments = Vec::new();
    for i in 0..count {
        let Some(url) = params.get(&format!("MediaUrl{}", i)) else {
            continue;
        };
        let content_type = params.get(&format!("MediaContentType{}", i)).cloned();
        let kind = content_type
            .as_deref()
            .map(AttachmentKind::from_content_type)
            .unwrap_or(AttachmentKind::File);
        attachments.push(Attachment {
            kind,
            url: Some(url.clone()),
            content_type,
            // The webhook reports no byte size; the caps apply to
            // outbound uploads where the size is known.
            size_bytes: 0,
            duration_seconds: None,
            width: None,
            height: None,
        });
    }
    attachments
}
