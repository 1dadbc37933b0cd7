// carelink-core/tests/test_utils/mod.rs
//
// In-memory repository implementations used by the unit tests. They
// mirror the Postgres repositories' contracts (atomic counters, rank
// checks, unique provider ids) closely enough to drive the services.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use carelink_common::models::calendar::{CalendarEvent, EventStatus};
use carelink_common::models::conversation::{Channel, Conversation};
use carelink_common::models::message::{Message, MessageBody, MessageStatus};
use carelink_common::models::provider::{ProviderAccount, ProviderNumber};
use carelink_common::traits::repository_traits::{
    CalendarEventRepository, ConversationRepository, MessageRepository,
    ProviderAccountRepository, ProviderNumberRepository,
};
use carelink_common::Error;
use carelink_core::platforms::whatsapp::{ProviderSendAck, WhatsAppClient};

#[derive(Default)]
pub struct InMemoryConversationRepo {
    pub storage: Mutex<HashMap<Uuid, Conversation>>,
}

#[async_trait]
impl ConversationRepository for InMemoryConversationRepo {
    async fn upsert(
        &self,
        owner_user_id: Uuid,
        channel: Channel,
        contact_phone: &str,
        contact_display_name: Option<&str>,
        assigned_provider_number: Option<&str>,
    ) -> Result<Conversation, Error> {
        let mut map = self.storage.lock().unwrap();
        let now = Utc::now();

        if let Some(existing) = map.values_mut().find(|c| {
            c.owner_user_id == owner_user_id
                && c.channel == channel
                && c.contact_phone == contact_phone
        }) {
            if let Some(name) = contact_display_name {
                existing.contact_display_name = Some(name.to_string());
            }
            if let Some(number) = assigned_provider_number {
                existing.assigned_provider_number = Some(number.to_string());
            }
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let conversation = Conversation {
            conversation_id: Uuid::new_v4(),
            owner_user_id,
            channel,
            contact_phone: contact_phone.to_string(),
            contact_display_name: contact_display_name.map(|s| s.to_string()),
            assigned_provider_number: assigned_provider_number.map(|s| s.to_string()),
            unread_count: 0,
            last_message_preview: None,
            last_message_at: None,
            last_read_at: None,
            created_at: now,
            updated_at: now,
        };
        map.insert(conversation.conversation_id, conversation.clone());
        Ok(conversation)
    }

    async fn get(&self, conversation_id: Uuid) -> Result<Option<Conversation>, Error> {
        Ok(self.storage.lock().unwrap().get(&conversation_id).cloned())
    }

    async fn record_inbound(
        &self,
        conversation_id: Uuid,
        preview: &str,
        at: DateTime<Utc>,
    ) -> Result<(), Error> {
        let mut map = self.storage.lock().unwrap();
        if let Some(c) = map.get_mut(&conversation_id) {
            c.unread_count += 1;
            c.last_message_preview = Some(preview.to_string());
            c.last_message_at = Some(at);
            c.updated_at = at;
        }
        Ok(())
    }

    async fn record_outbound(
        &self,
        conversation_id: Uuid,
        preview: &str,
        at: DateTime<Utc>,
    ) -> Result<(), Error> {
        let mut map = self.storage.lock().unwrap();
        if let Some(c) = map.get_mut(&conversation_id) {
            c.unread_count = 0;
            c.last_message_preview = Some(preview.to_string());
            c.last_message_at = Some(at);
            c.updated_at = at;
        }
        Ok(())
    }

    async fn mark_read(&self, conversation_id: Uuid, at: DateTime<Utc>) -> Result<(), Error> {
        let mut map = self.storage.lock().unwrap();
        if let Some(c) = map.get_mut(&conversation_id) {
            c.unread_count = 0;
            c.last_read_at = Some(at);
            c.updated_at = at;
        }
        Ok(())
    }

    async fn list_for_owner(&self, owner_user_id: Uuid) -> Result<Vec<Conversation>, Error> {
        Ok(self
            .storage
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.owner_user_id == owner_user_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryMessageRepo {
    pub storage: Mutex<HashMap<Uuid, Message>>,
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepo {
    async fn insert(&self, message: &Message) -> Result<(), Error> {
        let mut map = self.storage.lock().unwrap();
        if let Some(pid) = &message.provider_message_id {
            if map
                .values()
                .any(|m| m.provider_message_id.as_deref() == Some(pid.as_str()))
            {
                return Err(Error::Parse(format!(
                    "unique violation on provider_message_id {}",
                    pid
                )));
            }
        }
        map.insert(message.message_id, message.clone());
        Ok(())
    }

    async fn get(&self, message_id: Uuid) -> Result<Option<Message>, Error> {
        Ok(self.storage.lock().unwrap().get(&message_id).cloned())
    }

    async fn get_by_provider_id(
        &self,
        provider_message_id: &str,
    ) -> Result<Option<Message>, Error> {
        Ok(self
            .storage
            .lock()
            .unwrap()
            .values()
            .find(|m| m.provider_message_id.as_deref() == Some(provider_message_id))
            .cloned())
    }

    async fn backfill_provider_id(
        &self,
        message_id: Uuid,
        provider_message_id: &str,
    ) -> Result<(), Error> {
        let mut map = self.storage.lock().unwrap();
        if let Some(m) = map.get_mut(&message_id) {
            m.provider_message_id = Some(provider_message_id.to_string());
        }
        Ok(())
    }

    async fn apply_status_forward(
        &self,
        message_id: Uuid,
        next: MessageStatus,
    ) -> Result<bool, Error> {
        let mut map = self.storage.lock().unwrap();
        if let Some(m) = map.get_mut(&message_id) {
            if m.status.can_transition_to(next) {
                m.status = next;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn soft_delete(&self, message_id: Uuid, deleted_at: DateTime<Utc>) -> Result<(), Error> {
        let mut map = self.storage.lock().unwrap();
        if let Some(m) = map.get_mut(&message_id) {
            if !m.body.is_deleted() {
                m.body = MessageBody::Deleted { deleted_at };
            }
        }
        Ok(())
    }

    async fn list_for_conversation(
        &self,
        conversation_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Message>, Error> {
        let map = self.storage.lock().unwrap();
        let mut messages: Vec<Message> = map
            .values()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        messages.truncate(limit as usize);
        Ok(messages)
    }
}

#[derive(Default)]
pub struct InMemoryEventRepo {
    pub storage: Mutex<HashMap<Uuid, CalendarEvent>>,
}

#[async_trait]
impl CalendarEventRepository for InMemoryEventRepo {
    async fn upsert(&self, event: &CalendarEvent) -> Result<CalendarEvent, Error> {
        let mut map = self.storage.lock().unwrap();
        if let Some(existing) = map.values_mut().find(|e| {
            e.user_id == event.user_id && e.provider_event_id == event.provider_event_id
        }) {
            existing.title = event.title.clone();
            existing.description = event.description.clone();
            existing.start_time = event.start_time;
            existing.end_time = event.end_time;
            existing.status = event.status;
            existing.patient_ref = event.patient_ref;
            existing.updated_at = Utc::now();
            return Ok(existing.clone());
        }
        map.insert(event.event_id, event.clone());
        Ok(event.clone())
    }

    async fn get(&self, event_id: Uuid) -> Result<Option<CalendarEvent>, Error> {
        Ok(self.storage.lock().unwrap().get(&event_id).cloned())
    }

    async fn get_by_provider_event_id(
        &self,
        user_id: Uuid,
        provider_event_id: &str,
    ) -> Result<Option<CalendarEvent>, Error> {
        Ok(self
            .storage
            .lock()
            .unwrap()
            .values()
            .find(|e| e.user_id == user_id && e.provider_event_id == provider_event_id)
            .cloned())
    }

    async fn set_reminder_jobs(
        &self,
        event_id: Uuid,
        job_24h: Option<Uuid>,
        job_2h: Option<Uuid>,
    ) -> Result<(), Error> {
        let mut map = self.storage.lock().unwrap();
        if let Some(e) = map.get_mut(&event_id) {
            e.reminder_24h_job = job_24h;
            e.reminder_2h_job = job_2h;
        }
        Ok(())
    }

    async fn mark_reminder_sent_24h(&self, event_id: Uuid) -> Result<(), Error> {
        let mut map = self.storage.lock().unwrap();
        if let Some(e) = map.get_mut(&event_id) {
            e.reminder_sent_24h = true;
        }
        Ok(())
    }

    async fn set_status(&self, event_id: Uuid, status: EventStatus) -> Result<(), Error> {
        let mut map = self.storage.lock().unwrap();
        if let Some(e) = map.get_mut(&event_id) {
            e.status = status;
        }
        Ok(())
    }

    async fn delete(&self, event_id: Uuid) -> Result<(), Error> {
        self.storage.lock().unwrap().remove(&event_id);
        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<CalendarEvent>, Error> {
        Ok(self
            .storage
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_upcoming(&self, after: DateTime<Utc>) -> Result<Vec<CalendarEvent>, Error> {
        Ok(self
            .storage
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.start_time > after && e.status != EventStatus::Cancelled)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryAccountRepo {
    pub secrets: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl ProviderAccountRepository for InMemoryAccountRepo {
    async fn store(&self, account: &ProviderAccount) -> Result<(), Error> {
        self.secrets
            .lock()
            .unwrap()
            .insert(account.account_sid.clone(), account.auth_token.clone());
        Ok(())
    }

    async fn get_auth_token(&self, account_sid: &str) -> Result<Option<String>, Error> {
        Ok(self.secrets.lock().unwrap().get(account_sid).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryNumberRepo {
    pub numbers: Mutex<HashMap<String, ProviderNumber>>,
}

#[async_trait]
impl ProviderNumberRepository for InMemoryNumberRepo {
    async fn assign(&self, number: &ProviderNumber) -> Result<(), Error> {
        self.numbers
            .lock()
            .unwrap()
            .insert(number.phone_number.clone(), number.clone());
        Ok(())
    }

    async fn find_by_number(&self, phone_number: &str) -> Result<Option<ProviderNumber>, Error> {
        Ok(self.numbers.lock().unwrap().get(phone_number).cloned())
    }
}

/// Scripted gateway client: records every send, answers with either an
/// ack or a rejection.
pub struct StubWhatsAppClient {
    pub fail: bool,
    pub sends: Mutex<Vec<(String, String, String)>>,
}

impl StubWhatsAppClient {
    pub fn accepting() -> Self {
        Self {
            fail: false,
            sends: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            fail: true,
            sends: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl WhatsAppClient for StubWhatsAppClient {
    async fn send_message(
        &self,
        from: &str,
        to: &str,
        body: &str,
        _media_urls: &[String],
    ) -> Result<ProviderSendAck, Error> {
        self.sends
            .lock()
            .unwrap()
            .push((from.to_string(), to.to_string(), body.to_string()));
        if self.fail {
            return Err(Error::Provider {
                status: 400,
                body: "invalid destination".to_string(),
            });
        }
        Ok(ProviderSendAck {
            message_sid: format!("SM{}", Uuid::new_v4().simple()),
            status: Some("queued".to_string()),
        })
    }
}
