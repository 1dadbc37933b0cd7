// carelink-core/src/tasks/reminder_scheduler.rs

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use carelink_common::models::calendar::ReminderHorizon;
use carelink_common::traits::repository_traits::CalendarEventRepository;

use crate::Error;

struct ReminderJob {
    job_id: Uuid,
    handle: JoinHandle<()>,
}

/// Schedules, reschedules, and cancels the one-shot reminder jobs fired
/// ahead of an appointment's start time.
///
/// Each pending job is a spawned timer task keyed by `(event, horizon)`;
/// its job ref is also persisted on the event row so the UI can tell
/// whether a reminder is pending. Cancellation aborts the task; a cancel
/// that races the firing is a harmless no-op, and the fired handler is
/// idempotent, so at-least-once timer semantics are safe.
///
/// Cloning is cheap and shares the job table.
#[derive(Clone)]
pub struct ReminderScheduler {
    events: Arc<dyn CalendarEventRepository>,
    jobs: Arc<DashMap<(Uuid, ReminderHorizon), ReminderJob>>,
}

impl ReminderScheduler {
    pub fn new(events: Arc<dyn CalendarEventRepository>) -> Self {
        Self {
            events,
            jobs: Arc::new(DashMap::new()),
        }
    }

    /// Cancels whatever is pending for the event, then schedules a job
    /// for each horizon still in the future. A horizon already in the
    /// past is skipped outright; missed reminders are not fired late.
    pub async fn schedule_reminders(
        &self,
        event_id: Uuid,
        start_time: DateTime<Utc>,
        title: &str,
    ) -> Result<(), Error> {
        self.abort_pending(event_id);

        let mut job_24h = None;
        let mut job_2h = None;

        for horizon in [ReminderHorizon::TwentyFourHours, ReminderHorizon::TwoHours] {
            let fire_at = start_time - horizon.lead();
            let delay = fire_at - Utc::now();
            if delay <= Duration::zero() {
                debug!(
                    "Skipping {} reminder for event {}: horizon already passed",
                    horizon, event_id
                );
                continue;
            }
            let Ok(delay_std) = delay.to_std() else {
                continue;
            };

            let job_id = Uuid::new_v4();
            let handle = self.spawn_job(event_id, horizon, delay_std, title.to_string());
            self.jobs
                .insert((event_id, horizon), ReminderJob { job_id, handle });
            match horizon {
                ReminderHorizon::TwentyFourHours => job_24h = Some(job_id),
                ReminderHorizon::TwoHours => job_2h = Some(job_id),
            }
            debug!(
                "Scheduled {} reminder for event {} at {}",
                horizon, event_id, fire_at
            );
        }

        self.events
            .set_reminder_jobs(event_id, job_24h, job_2h)
            .await?;
        Ok(())
    }

    /// Re-arms jobs for every stored upcoming event. Timer tasks do not
    /// survive a restart; this runs once at startup to rebuild them from
    /// the event rows.
    pub async fn rearm_from_store(&self) -> Result<usize, Error> {
        let upcoming = self.events.list_upcoming(Utc::now()).await?;
        let count = upcoming.len();
        for event in upcoming {
            self.schedule_reminders(event.event_id, event.start_time, &event.title)
                .await?;
        }
        if count > 0 {
            info!("Re-armed reminder jobs for {} upcoming events", count);
        }
        Ok(count)
    }

    /// Cancels both pending jobs (if any) and clears the stored refs.
    /// Called when the underlying appointment is deleted.
    pub async fn cancel_reminders(&self, event_id: Uuid) -> Result<(), Error> {
        self.abort_pending(event_id);
        self.events.set_reminder_jobs(event_id, None, None).await?;
        Ok(())
    }

    /// Fired by the timer task. Failures are logged, never propagated:
    /// one broken reminder must not take the scheduler down, and the
    /// design records it as failed-but-not-retried.
    pub async fn on_reminder_fired(&self, event_id: Uuid, horizon: ReminderHorizon, title: &str) {
        self.jobs.remove(&(event_id, horizon));

        info!(
            "Appointment reminder ({}) fired for event {} ({})",
            horizon, event_id, title
        );

        if horizon == ReminderHorizon::TwentyFourHours {
            if let Err(e) = self.events.mark_reminder_sent_24h(event_id).await {
                error!(
                    "Failed to record 24h reminder for event {}: {:?}",
                    event_id, e
                );
            }
        }
    }

    /// Whether a timer task is currently pending for this horizon.
    pub fn has_pending_job(&self, event_id: Uuid, horizon: ReminderHorizon) -> bool {
        self.jobs.contains_key(&(event_id, horizon))
    }

    /// Aborts every pending job; used on shutdown.
    pub fn shutdown(&self) {
        self.jobs.retain(|_, job| {
            job.handle.abort();
            false
        });
    }

    fn abort_pending(&self, event_id: Uuid) {
        for horizon in [ReminderHorizon::TwentyFourHours, ReminderHorizon::TwoHours] {
            if let Some((_, job)) = self.jobs.remove(&(event_id, horizon)) {
                job.handle.abort();
                debug!(
                    "Canceled pending {} reminder job {} for event {}",
                    horizon, job.job_id, event_id
                );
            }
        }
    }

    fn spawn_job(
        &self,
        event_id: Uuid,
        horizon: ReminderHorizon,
        delay: std::time::Duration,
        title: String,
    ) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            scheduler.on_reminder_fired(event_id, horizon, &title).await;
        })
    }
}
