// carelink-core/src/repositories/postgres/calendar_events.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use carelink_common::models::calendar::{CalendarEvent, EventStatus};
use carelink_common::traits::repository_traits::CalendarEventRepository;

use crate::Error;

#[derive(Clone)]
pub struct PostgresCalendarEventRepository {
    pool: Pool<Postgres>,
}

impl PostgresCalendarEventRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn map_row(r: &PgRow) -> Result<CalendarEvent, Error> {
    Ok(CalendarEvent {
        event_id: r.try_get("event_id")?,
        user_id: r.try_get("user_id")?,
        provider_event_id: r.try_get("provider_event_id")?,
        title: r.try_get("title")?,
        description: r.try_get("description")?,
        start_time: r.try_get::<DateTime<Utc>, _>("start_time")?,
        end_time: r.try_get::<DateTime<Utc>, _>("end_time")?,
        status: r.try_get::<String, _>("status")?.parse()?,
        patient_ref: r.try_get("patient_ref")?,
        reminder_sent_24h: r.try_get("reminder_sent_24h")?,
        reminder_24h_job: r.try_get("reminder_24h_job")?,
        reminder_2h_job: r.try_get("reminder_2h_job")?,
        created_at: r.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: r.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

#[async_trait]
impl CalendarEventRepository for PostgresCalendarEventRepository {
    async fn upsert(&self, event: &CalendarEvent) -> Result<CalendarEvent, Error> {
        // An update deliberately leaves reminder_sent_24h and the job refs
        // alone; the scheduler owns those columns.
        let row = sqlx::query(
            r#"
            INSERT INTO calendar_events (
                event_id,
                user_id,
                provider_event_id,
                title,
                description,
                start_time,
                end_time,
                status,
                patient_ref,
                reminder_sent_24h,
                reminder_24h_job,
                reminder_2h_job,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, FALSE, NULL, NULL, $10, $10)
            ON CONFLICT (user_id, provider_event_id) DO UPDATE
               SET title       = EXCLUDED.title,
                   description = EXCLUDED.description,
                   start_time  = EXCLUDED.start_time,
                   end_time    = EXCLUDED.end_time,
                   status      = EXCLUDED.status,
                   patient_ref = EXCLUDED.patient_ref,
                   updated_at  = EXCLUDED.updated_at
            RETURNING *
            "#,
        )
        .bind(event.event_id)
        .bind(event.user_id)
        .bind(&event.provider_event_id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(event.status.to_string())
        .bind(event.patient_ref)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        map_row(&row)
    }

    async fn get(&self, event_id: Uuid) -> Result<Option<CalendarEvent>, Error> {
        let row = sqlx::query(
            r#"
            SELECT * FROM calendar_events
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row).transpose()
    }

    async fn get_by_provider_event_id(
        &self,
        user_id: Uuid,
        provider_event_id: &str,
    ) -> Result<Option<CalendarEvent>, Error> {
        let row = sqlx::query(
            r#"
            SELECT * FROM calendar_events
            WHERE user_id = $1
              AND provider_event_id = $2
            "#,
        )
        .bind(user_id)
        .bind(provider_event_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row).transpose()
    }

    async fn set_reminder_jobs(
        &self,
        event_id: Uuid,
        job_24h: Option<Uuid>,
        job_2h: Option<Uuid>,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE calendar_events
            SET reminder_24h_job = $2,
                reminder_2h_job  = $3,
                updated_at       = $4
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .bind(job_24h)
        .bind(job_2h)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_reminder_sent_24h(&self, event_id: Uuid) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE calendar_events
            SET reminder_sent_24h = TRUE,
                updated_at        = $2
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_status(&self, event_id: Uuid, status: EventStatus) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE calendar_events
            SET status = $2,
                updated_at = $3
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .bind(status.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, event_id: Uuid) -> Result<(), Error> {
        sqlx::query(
            r#"
            DELETE FROM calendar_events
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<CalendarEvent>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM calendar_events
            WHERE user_id = $1
            ORDER BY start_time ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row).collect()
    }

    async fn list_upcoming(&self, after: DateTime<Utc>) -> Result<Vec<CalendarEvent>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM calendar_events
            WHERE start_time > $1
              AND status <> 'cancelled'
            ORDER BY start_time ASC
            "#,
        )
        .bind(after)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row).collect()
    }
}
