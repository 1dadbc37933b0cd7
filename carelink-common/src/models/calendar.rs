// carelink-common/src/models/calendar.rs

use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq, sqlx::Type)]
#[sqlx(type_name = "TEXT")]
#[sqlx(rename_all = "lowercase")]
pub enum EventStatus {
    Confirmed,
    Tentative,
    Cancelled,
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventStatus::Confirmed => write!(f, "confirmed"),
            EventStatus::Tentative => write!(f, "tentative"),
            EventStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for EventStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "confirmed" => Ok(EventStatus::Confirmed),
            "tentative" => Ok(EventStatus::Tentative),
            "cancelled" => Ok(EventStatus::Cancelled),
            _ => Err(format!("Unknown event status: {}", s)),
        }
    }
}

/// The two reminder lead times fired ahead of an appointment.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ReminderHorizon {
    TwentyFourHours,
    TwoHours,
}

impl ReminderHorizon {
    pub fn lead(&self) -> chrono::Duration {
        match self {
            ReminderHorizon::TwentyFourHours => chrono::Duration::hours(24),
            ReminderHorizon::TwoHours => chrono::Duration::hours(2),
        }
    }
}

impl fmt::Display for ReminderHorizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReminderHorizon::TwentyFourHours => write!(f, "24h"),
            ReminderHorizon::TwoHours => write!(f, "2h"),
        }
    }
}

/// Local mirror of a provider calendar event, kept in sync by the
/// calendar sync service. Reminder job refs are cleared and replaced
/// whenever the start time changes.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CalendarEvent {
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub provider_event_id: String,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: EventStatus,
    pub patient_ref: Option<Uuid>,
    pub reminder_sent_24h: bool,
    pub reminder_24h_job: Option<Uuid>,
    pub reminder_2h_job: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
