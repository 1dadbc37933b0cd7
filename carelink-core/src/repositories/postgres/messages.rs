// carelink-core/src/repositories/postgres/messages.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use carelink_common::models::message::{Attachment, Message, MessageBody, MessageStatus};
use carelink_common::traits::repository_traits::MessageRepository;

use crate::Error;

#[derive(Clone)]
pub struct PostgresMessageRepository {
    pool: Pool<Postgres>,
}

impl PostgresMessageRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn map_row(r: &PgRow) -> Result<Message, Error> {
    let is_deleted: bool = r.try_get("is_deleted")?;
    let body = if is_deleted {
        MessageBody::Deleted {
            deleted_at: r.try_get::<DateTime<Utc>, _>("deleted_at")?,
        }
    } else {
        let attachments: Vec<Attachment> =
            serde_json::from_value(r.try_get::<serde_json::Value, _>("attachments")?)?;
        MessageBody::Active {
            text: r.try_get("content")?,
            attachments,
        }
    };

    Ok(Message {
        message_id: r.try_get("message_id")?,
        conversation_id: r.try_get("conversation_id")?,
        provider_message_id: r.try_get("provider_message_id")?,
        direction: r.try_get::<String, _>("direction")?.parse()?,
        sender_ref: r.try_get("sender_ref")?,
        body,
        status: r.try_get::<String, _>("status")?.parse()?,
        created_at: r.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

#[async_trait]
impl MessageRepository for PostgresMessageRepository {
    async fn insert(&self, message: &Message) -> Result<(), Error> {
        let (content, attachments, is_deleted, deleted_at) = match &message.body {
            MessageBody::Active { text, attachments } => (
                text.clone(),
                serde_json::to_value(attachments)?,
                false,
                None,
            ),
            MessageBody::Deleted { deleted_at } => (
                None,
                serde_json::Value::Array(Vec::new()),
                true,
                Some(*deleted_at),
            ),
        };

        sqlx::query(
            r#"
            INSERT INTO messages (
                message_id,
                conversation_id,
                provider_message_id,
                direction,
                sender_ref,
                content,
                attachments,
                status,
                is_deleted,
                deleted_at,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(message.message_id)
        .bind(message.conversation_id)
        .bind(&message.provider_message_id)
        .bind(message.direction.to_string())
        .bind(&message.sender_ref)
        .bind(content)
        .bind(attachments)
        .bind(message.status.to_string())
        .bind(is_deleted)
        .bind(deleted_at)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, message_id: Uuid) -> Result<Option<Message>, Error> {
        let row = sqlx::query(
            r#"
            SELECT * FROM messages
            WHERE message_id = $1
            "#,
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row).transpose()
    }

    async fn get_by_provider_id(
        &self,
        provider_message_id: &str,
    ) -> Result<Option<Message>, Error> {
        let row = sqlx::query(
            r#"
            SELECT * FROM messages
            WHERE provider_message_id = $1
            "#,
        )
        .bind(provider_message_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row).transpose()
    }

    async fn backfill_provider_id(
        &self,
        message_id: Uuid,
        provider_message_id: &str,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE messages
            SET provider_message_id = $2
            WHERE message_id = $1
            "#,
        )
        .bind(message_id)
        .bind(provider_message_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn apply_status_forward(
        &self,
        message_id: Uuid,
        next: MessageStatus,
    ) -> Result<bool, Error> {
        // The rank comparison runs inside the UPDATE so concurrent
        // out-of-order callbacks cannot interleave a backward move.
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET status = $2
            WHERE message_id = $1
              AND status <> 'failed'
              AND (
                    $2 = 'failed'
                    OR CASE status
                           WHEN 'queued' THEN 0
                           WHEN 'sent' THEN 1
                           WHEN 'delivered' THEN 2
                           WHEN 'read' THEN 3
                       END
                     < CASE $2
                           WHEN 'queued' THEN 0
                           WHEN 'sent' THEN 1
                           WHEN 'delivered' THEN 2
                           WHEN 'read' THEN 3
                       END
                  )
            "#,
        )
        .bind(message_id)
        .bind(next.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn soft_delete(&self, message_id: Uuid, deleted_at: DateTime<Utc>) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE messages
            SET content = NULL,
                attachments = '[]'::jsonb,
                is_deleted = TRUE,
                deleted_at = $2
            WHERE message_id = $1
              AND is_deleted = FALSE
            "#,
        )
        .bind(message_id)
        .bind(deleted_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_for_conversation(
        &self,
        conversation_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Message>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM messages
            WHERE conversation_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(conversation_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row).collect()
    }
}
