// carelink-core/src/repositories/postgres/conversations.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use carelink_common::models::conversation::{Channel, Conversation};
use carelink_common::traits::repository_traits::ConversationRepository;

use crate::Error;

#[derive(Clone)]
pub struct PostgresConversationRepository {
    pool: Pool<Postgres>,
}

impl PostgresConversationRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn map_row(r: &PgRow) -> Result<Conversation, Error> {
    Ok(Conversation {
        conversation_id: r.try_get("conversation_id")?,
        owner_user_id: r.try_get("owner_user_id")?,
        channel: r.try_get::<String, _>("channel")?.parse()?,
        contact_phone: r.try_get("contact_phone")?,
        contact_display_name: r.try_get("contact_display_name")?,
        assigned_provider_number: r.try_get("assigned_provider_number")?,
        unread_count: r.try_get("unread_count")?,
        last_message_preview: r.try_get("last_message_preview")?,
        last_message_at: r.try_get::<Option<DateTime<Utc>>, _>("last_message_at")?,
        last_read_at: r.try_get::<Option<DateTime<Utc>>, _>("last_read_at")?,
        created_at: r.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: r.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

#[async_trait]
impl ConversationRepository for PostgresConversationRepository {
    async fn upsert(
        &self,
        owner_user_id: Uuid,
        channel: Channel,
        contact_phone: &str,
        contact_display_name: Option<&str>,
        assigned_provider_number: Option<&str>,
    ) -> Result<Conversation, Error> {
        let now = Utc::now();

        // COALESCE keeps the existing display name / assigned number when
        // the caller has nothing newer, so repeated identical upserts are
        // true no-ops apart from updated_at.
        let row = sqlx::query(
            r#"
            INSERT INTO conversations (
                conversation_id,
                owner_user_id,
                channel,
                contact_phone,
                contact_display_name,
                assigned_provider_number,
                unread_count,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, 0, $7, $7)
            ON CONFLICT (owner_user_id, channel, contact_phone) DO UPDATE
               SET contact_display_name =
                       COALESCE(EXCLUDED.contact_display_name, conversations.contact_display_name),
                   assigned_provider_number =
                       COALESCE(EXCLUDED.assigned_provider_number, conversations.assigned_provider_number),
                   updated_at = EXCLUDED.updated_at
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner_user_id)
        .bind(channel.to_string())
        .bind(contact_phone)
        .bind(contact_display_name)
        .bind(assigned_provider_number)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        map_row(&row)
    }

    async fn get(&self, conversation_id: Uuid) -> Result<Option<Conversation>, Error> {
        let row = sqlx::query(
            r#"
            SELECT * FROM conversations
            WHERE conversation_id = $1
            "#,
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row).transpose()
    }

    async fn record_inbound(
        &self,
        conversation_id: Uuid,
        preview: &str,
        at: DateTime<Utc>,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE conversations
            SET unread_count = unread_count + 1,
                last_message_preview = $2,
                last_message_at = $3,
                updated_at = $3
            WHERE conversation_id = $1
            "#,
        )
        .bind(conversation_id)
        .bind(preview)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_outbound(
        &self,
        conversation_id: Uuid,
        preview: &str,
        at: DateTime<Utc>,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE conversations
            SET unread_count = 0,
                last_message_preview = $2,
                last_message_at = $3,
                updated_at = $3
            WHERE conversation_id = $1
            "#,
        )
        .bind(conversation_id)
        .bind(preview)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_read(&self, conversation_id: Uuid, at: DateTime<Utc>) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE conversations
            SET unread_count = 0,
                last_read_at = $2,
                updated_at = $2
            WHERE conversation_id = $1
            "#,
        )
        .bind(conversation_id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_for_owner(&self, owner_user_id: Uuid) -> Result<Vec<Conversation>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM conversations
            WHERE owner_user_id = $1
            ORDER BY last_message_at DESC NULLS LAST
            "#,
        )
        .bind(owner_user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row).collect()
    }
}
