// carelink-core/src/repositories/postgres/provider_accounts.rs

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};

use carelink_common::models::provider::{ProviderAccount, ProviderNumber};
use carelink_common::traits::repository_traits::{
    ProviderAccountRepository, ProviderNumberRepository,
};

use crate::crypto::{EncryptedSecret, Encryptor};
use crate::Error;

/// Messaging-gateway accounts; the auth token (webhook signing secret)
/// is sealed by the vault before it reaches the table.
#[derive(Clone)]
pub struct PostgresProviderAccountRepository {
    pool: Pool<Postgres>,
    encryptor: Encryptor,
}

impl PostgresProviderAccountRepository {
    pub fn new(pool: Pool<Postgres>, encryptor: Encryptor) -> Self {
        Self { pool, encryptor }
    }
}

#[async_trait]
impl ProviderAccountRepository for PostgresProviderAccountRepository {
    async fn store(&self, account: &ProviderAccount) -> Result<(), Error> {
        let sealed = self.encryptor.encrypt(&account.auth_token)?;

        sqlx::query(
            r#"
            INSERT INTO provider_accounts (
                account_sid,
                auth_token_cipher,
                auth_token_iv,
                created_at
            )
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (account_sid) DO UPDATE
               SET auth_token_cipher = EXCLUDED.auth_token_cipher,
                   auth_token_iv     = EXCLUDED.auth_token_iv
            "#,
        )
        .bind(&account.account_sid)
        .bind(&sealed.ciphertext)
        .bind(&sealed.iv)
        .bind(account.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_auth_token(&self, account_sid: &str) -> Result<Option<String>, Error> {
        let row = sqlx::query(
            r#"
            SELECT auth_token_cipher, auth_token_iv
            FROM provider_accounts
            WHERE account_sid = $1
            "#,
        )
        .bind(account_sid)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(r) = row {
            let token = self.encryptor.decrypt(&EncryptedSecret {
                ciphertext: r.try_get("auth_token_cipher")?,
                iv: r.try_get("auth_token_iv")?,
            })?;
            Ok(Some(token))
        } else {
            Ok(None)
        }
    }
}

#[derive(Clone)]
pub struct PostgresProviderNumberRepository {
    pool: Pool<Postgres>,
}

impl PostgresProviderNumberRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProviderNumberRepository for PostgresProviderNumberRepository {
    async fn assign(&self, number: &ProviderNumber) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO provider_numbers (
                phone_number,
                user_id,
                account_sid
            )
            VALUES ($1, $2, $3)
            ON CONFLICT (phone_number) DO UPDATE
               SET user_id     = EXCLUDED.user_id,
                   account_sid = EXCLUDED.account_sid
            "#,
        )
        .bind(&number.phone_number)
        .bind(number.user_id)
        .bind(&number.account_sid)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_number(&self, phone_number: &str) -> Result<Option<ProviderNumber>, Error> {
        let row = sqlx::query(
            r#"
            SELECT phone_number, user_id, account_sid
            FROM provider_numbers
            WHERE phone_number = $1
            "#,
        )
        .bind(phone_number)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(r) = row {
            Ok(Some(ProviderNumber {
                phone_number: r.try_get("phone_number")?,
                user_id: r.try_get("user_id")?,
                account_sid: r.try_get("account_sid")?,
            }))
        } else {
            Ok(None)
        }
    }
}
