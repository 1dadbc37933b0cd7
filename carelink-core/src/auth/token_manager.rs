// carelink-core/src/auth/token_manager.rs

use std::sync::Arc;

use chrono::{Duration, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use carelink_common::models::credential::CalendarCredential;
use carelink_common::traits::repository_traits::CalendarCredentialsRepository;

use crate::auth::google::TokenExchanger;
use crate::Error;

/// Refresh ahead of expiry by this much so an access token never goes
/// stale mid-request.
const REFRESH_MARGIN_MINUTES: i64 = 5;

/// Hands out currently-valid access tokens, transparently running the
/// refresh grant when a token is inside the expiry margin.
///
/// Two near-simultaneous calls for the same user serialize on a per-user
/// lock; the loser of the race re-reads the stored credential and skips
/// its own refresh, which keeps us under the provider's refresh-token
/// rotation limits.
pub struct TokenManager {
    credentials_repo: Arc<dyn CalendarCredentialsRepository>,
    exchanger: Arc<dyn TokenExchanger>,
    refresh_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl TokenManager {
    pub fn new(
        credentials_repo: Arc<dyn CalendarCredentialsRepository>,
        exchanger: Arc<dyn TokenExchanger>,
    ) -> Self {
        Self {
            credentials_repo,
            exchanger,
            refresh_locks: DashMap::new(),
        }
    }

    /// Provider authorization URL for the connect flow.
    pub fn authorize_url(&self, state: &str) -> String {
        self.exchanger.authorize_url(state)
    }

    /// Completes the initial OAuth connection: exchanges the code and
    /// persists the credential. A missing refresh token is a hard error
    /// here — without one the connection dies at first expiry.
    pub async fn connect_user(&self, user_id: Uuid, code: &str) -> Result<(), Error> {
        let resp = self.exchanger.exchange_code(code).await?;
        let refresh_token = resp.refresh_token.ok_or_else(|| {
            Error::Auth(
                "provider returned no refresh token on initial connect; \
                 the consent screen must be re-run"
                    .to_string(),
            )
        })?;

        let now = Utc::now();
        let cred = CalendarCredential {
            user_id,
            access_token: resp.access_token,
            refresh_token,
            expires_at: now + Duration::seconds(resp.expires_in as i64),
            scope: resp.scope.unwrap_or_default(),
            token_type: resp.token_type,
            created_at: now,
            updated_at: now,
        };
        self.credentials_repo.store(&cred).await?;
        info!("Calendar connected for user_id={}", user_id);
        Ok(())
    }

    /// Returns a valid plaintext access token for the user, refreshing
    /// first when `expires_at` is within the safety margin. The token is
    /// never logged and never persisted in plaintext.
    pub async fn get_valid_access_token(&self, user_id: Uuid) -> Result<String, Error> {
        let cred = self
            .credentials_repo
            .get(user_id)
            .await?
            .ok_or(Error::NotConnected)?;

        if !needs_refresh(&cred) {
            return Ok(cred.access_token);
        }

        let lock = {
            let entry = self
                .refresh_locks
                .entry(user_id)
                .or_insert_with(|| Arc::new(Mutex::new(())));
            entry.value().clone()
        };
        let _guard = lock.lock().await;

        // Another task may have finished the refresh while we waited.
        let cred = self
            .credentials_repo
            .get(user_id)
            .await?
            .ok_or(Error::NotConnected)?;
        if !needs_refresh(&cred) {
            debug!("Refresh already done by a concurrent caller for user_id={}", user_id);
            return Ok(cred.access_token);
        }

        let resp = self.exchanger.refresh(&cred.refresh_token).await?;
        let now = Utc::now();
        let updated = CalendarCredential {
            user_id,
            access_token: resp.access_token,
            // The provider only returns a new refresh token on rotation;
            // otherwise the existing one stays valid.
            refresh_token: resp.refresh_token.unwrap_or(cred.refresh_token),
            expires_at: now + Duration::seconds(resp.expires_in as i64),
            scope: resp.scope.unwrap_or(cred.scope),
            token_type: resp.token_type,
            created_at: cred.created_at,
            updated_at: now,
        };
        self.credentials_repo.store(&updated).await?;
        info!("Refreshed calendar access token for user_id={}", user_id);
        Ok(updated.access_token)
    }

    /// Drops the stored credential; the next call fails `NotConnected`
    /// until the user re-runs the connect flow.
    pub async fn disconnect(&self, user_id: Uuid) -> Result<(), Error> {
        self.credentials_repo.delete(user_id).await?;
        self.refresh_locks.remove(&user_id);
        Ok(())
    }
}

fn needs_refresh(cred: &CalendarCredential) -> bool {
    cred.expires_at - Utc::now() <= Duration::minutes(REFRESH_MARGIN_MINUTES)
}
