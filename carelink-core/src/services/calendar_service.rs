// carelink-core/src/services/calendar_service.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Client as ReqwestClient;
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use carelink_common::models::calendar::{CalendarEvent, EventStatus};
use carelink_common::traits::repository_traits::CalendarEventRepository;

use crate::auth::token_manager::TokenManager;
use crate::tasks::reminder_scheduler::ReminderScheduler;
use crate::Error;

const DEFAULT_EVENTS_URL: &str =
    "https://www.googleapis.com/calendar/v3/calendars/primary/events";

/// Matches the provider's event-list JSON.
#[derive(Deserialize)]
struct ProviderEventList {
    #[serde(default)]
    items: Vec<ProviderEvent>,
}

#[derive(Deserialize)]
struct ProviderEvent {
    id: String,
    status: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    start: Option<ProviderEventTime>,
    end: Option<ProviderEventTime>,
}

#[derive(Deserialize)]
struct ProviderEventTime {
    #[serde(rename = "dateTime")]
    date_time: Option<DateTime<Utc>>,
}

/// Pulls the user's provider calendar into the local mirror and keeps
/// the reminder jobs in step with it: new events get reminders, moved
/// events get their stale jobs canceled and replaced, cancelled events
/// lose theirs.
pub struct CalendarSyncService {
    token_manager: Arc<TokenManager>,
    events: Arc<dyn CalendarEventRepository>,
    scheduler: ReminderScheduler,
    http: ReqwestClient,
    events_url: String,
}

impl CalendarSyncService {
    pub fn new(
        token_manager: Arc<TokenManager>,
        events: Arc<dyn CalendarEventRepository>,
        scheduler: ReminderScheduler,
    ) -> Self {
        Self {
            token_manager,
            events,
            scheduler,
            http: ReqwestClient::new(),
            events_url: DEFAULT_EVENTS_URL.to_string(),
        }
    }

    /// Override the provider endpoint (local stub servers).
    pub fn with_events_url(mut self, events_url: String) -> Self {
        self.events_url = events_url;
        self
    }

    /// One sync pass. Returns how many upcoming events were mirrored.
    pub async fn sync_events(&self, user_id: Uuid) -> Result<usize, Error> {
        let token = self.token_manager.get_valid_access_token(user_id).await?;

        let resp = self
            .http
            .get(&self.events_url)
            .bearer_auth(token)
            .query(&[
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
                ("timeMin", &Utc::now().to_rfc3339()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let list = resp
            .json::<ProviderEventList>()
            .await
            .map_err(|e| Error::Parse(format!("event list JSON: {e}")))?;

        let mut synced = 0usize;
        for item in list.items {
            if let Err(e) = self.apply_provider_event(user_id, item).await {
                warn!("Failed to apply provider event for user {}: {:?}", user_id, e);
                continue;
            }
            synced += 1;
        }

        info!("Calendar sync for user {} mirrored {} events", user_id, synced);
        Ok(synced)
    }

    async fn apply_provider_event(&self, user_id: Uuid, item: ProviderEvent) -> Result<(), Error> {
        if item.status.as_deref() == Some("cancelled") {
            if let Some(existing) = self
                .events
                .get_by_provider_event_id(user_id, &item.id)
                .await?
            {
                self.scheduler.cancel_reminders(existing.event_id).await?;
                self.events
                    .set_status(existing.event_id, EventStatus::Cancelled)
                    .await?;
                debug!("Provider cancelled event {}; reminders dropped", item.id);
            }
            return Ok(());
        }

        let (Some(start), Some(end)) = (
            item.start.as_ref().and_then(|t| t.date_time),
            item.end.as_ref().and_then(|t| t.date_time),
        ) else {
            // All-day events carry no dateTime; reminders keyed to a
            // start instant make no sense for them.
            debug!("Skipping event {} without concrete start/end times", item.id);
            return Ok(());
        };

        let status = item
            .status
            .as_deref()
            .and_then(|s| s.parse::<EventStatus>().ok())
            .unwrap_or(EventStatus::Confirmed);

        let prior = self
            .events
            .get_by_provider_event_id(user_id, &item.id)
            .await?;

        let now = Utc::now();
        let stored = self
            .events
            .upsert(&CalendarEvent {
                event_id: Uuid::new_v4(),
                user_id,
                provider_event_id: item.id.clone(),
                title: item.summary.unwrap_or_else(|| "(untitled)".to_string()),
                description: item.description,
                start_time: start,
                end_time: end,
                status,
                patient_ref: None,
                reminder_sent_24h: false,
                reminder_24h_job: None,
                reminder_2h_job: None,
                created_at: now,
                updated_at: now,
            })
            .await?;

        let start_changed = prior
            .map(|p| p.start_time != stored.start_time)
            .unwrap_or(true);
        if start_changed {
            self.scheduler
                .schedule_reminders(stored.event_id, stored.start_time, &stored.title)
                .await?;
        }

        Ok(())
    }

    /// Removes the local mirror row and cancels its reminders; used when
    /// the appointment is deleted on our side.
    pub async fn delete_event(&self, event_id: Uuid) -> Result<(), Error> {
        self.scheduler.cancel_reminders(event_id).await?;
        self.events.delete(event_id).await?;
        Ok(())
    }
}
