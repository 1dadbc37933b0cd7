// carelink-core/src/repositories/postgres/credentials.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use carelink_common::models::credential::CalendarCredential;
use carelink_common::traits::repository_traits::CalendarCredentialsRepository;

use crate::crypto::{EncryptedSecret, Encryptor};
use crate::Error;

/// Credential storage with the encrypt-at-rest boundary: tokens go in as
/// (ciphertext, iv) column pairs and come back out decrypted. Nothing
/// above this layer sees ciphertext; nothing below it sees plaintext.
#[derive(Clone)]
pub struct PostgresCalendarCredentialsRepository {
    pool: Pool<Postgres>,
    encryptor: Encryptor,
}

impl PostgresCalendarCredentialsRepository {
    pub fn new(pool: Pool<Postgres>, encryptor: Encryptor) -> Self {
        Self { pool, encryptor }
    }
}

#[async_trait]
impl CalendarCredentialsRepository for PostgresCalendarCredentialsRepository {
    async fn store(&self, cred: &CalendarCredential) -> Result<(), Error> {
        let access = self.encryptor.encrypt(&cred.access_token)?;
        let refresh = self.encryptor.encrypt(&cred.refresh_token)?;

        sqlx::query(
            r#"
            INSERT INTO calendar_credentials (
                user_id,
                access_token_cipher,
                access_token_iv,
                refresh_token_cipher,
                refresh_token_iv,
                expires_at,
                scope,
                token_type,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (user_id) DO UPDATE
               SET access_token_cipher  = EXCLUDED.access_token_cipher,
                   access_token_iv      = EXCLUDED.access_token_iv,
                   refresh_token_cipher = EXCLUDED.refresh_token_cipher,
                   refresh_token_iv     = EXCLUDED.refresh_token_iv,
                   expires_at           = EXCLUDED.expires_at,
                   scope                = EXCLUDED.scope,
                   token_type           = EXCLUDED.token_type,
                   updated_at           = EXCLUDED.updated_at
            "#,
        )
        .bind(cred.user_id)
        .bind(&access.ciphertext)
        .bind(&access.iv)
        .bind(&refresh.ciphertext)
        .bind(&refresh.iv)
        .bind(cred.expires_at)
        .bind(&cred.scope)
        .bind(&cred.token_type)
        .bind(cred.created_at)
        .bind(cred.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, user_id: Uuid) -> Result<Option<CalendarCredential>, Error> {
        let row = sqlx::query(
            r#"
            SELECT
                user_id,
                access_token_cipher,
                access_token_iv,
                refresh_token_cipher,
                refresh_token_iv,
                expires_at,
                scope,
                token_type,
                created_at,
                updated_at
            FROM calendar_credentials
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(r) = row {
            let access_token = self.encryptor.decrypt(&EncryptedSecret {
                ciphertext: r.try_get("access_token_cipher")?,
                iv: r.try_get("access_token_iv")?,
            })?;
            let refresh_token = self.encryptor.decrypt(&EncryptedSecret {
                ciphertext: r.try_get("refresh_token_cipher")?,
                iv: r.try_get("refresh_token_iv")?,
            })?;

            Ok(Some(CalendarCredential {
                user_id: r.try_get("user_id")?,
                access_token,
                refresh_token,
                expires_at: r.try_get::<DateTime<Utc>, _>("expires_at")?,
                scope: r.try_get("scope")?,
                token_type: r.try_get("token_type")?,
                created_at: r.try_get::<DateTime<Utc>, _>("created_at")?,
                updated_at: r.try_get::<DateTime<Utc>, _>("updated_at")?,
            }))
        } else {
            Ok(None)
        }
    }

    async fn delete(&self, user_id: Uuid) -> Result<(), Error> {
        sqlx::query(
            r#"
            DELETE FROM calendar_credentials
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_user_ids(&self) -> Result<Vec<Uuid>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT user_id FROM calendar_credentials
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| r.try_get("user_id").map_err(Error::from))
            .collect()
    }
}
