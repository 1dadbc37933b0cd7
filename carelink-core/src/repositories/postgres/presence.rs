// carelink-core/src/repositories/postgres/presence.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use carelink_common::models::presence::Presence;
use carelink_common::traits::repository_traits::PresenceRepository;

use crate::Error;

#[derive(Clone)]
pub struct PostgresPresenceRepository {
    pool: Pool<Postgres>,
}

impl PostgresPresenceRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PresenceRepository for PostgresPresenceRepository {
    async fn touch(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO presence (user_id, last_seen_at, is_online)
            VALUES ($1, $2, TRUE)
            ON CONFLICT (user_id) DO UPDATE
               SET last_seen_at = EXCLUDED.last_seen_at,
                   is_online    = TRUE
            "#,
        )
        .bind(user_id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, user_id: Uuid) -> Result<Option<Presence>, Error> {
        let row = sqlx::query(
            r#"
            SELECT user_id, last_seen_at, is_online
            FROM presence
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(r) = row {
            Ok(Some(Presence {
                user_id: r.try_get("user_id")?,
                last_seen_at: r.try_get::<DateTime<Utc>, _>("last_seen_at")?,
                is_online: r.try_get("is_online")?,
            }))
        } else {
            Ok(None)
        }
    }
}
