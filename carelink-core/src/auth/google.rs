// carelink-core/src/auth/google.rs

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::Deserialize;

use crate::Error;

const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";

/// Matches the provider's JSON from the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Present on the initial consent exchange; usually absent on refresh.
    pub refresh_token: Option<String>,
    pub expires_in: u64,
    pub scope: Option<String>,
    pub token_type: String,
}

/// The OAuth grant operations the token manager needs. Behind a trait so
/// the refresh lifecycle is testable without the network.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    fn authorize_url(&self, state: &str) -> String;
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, Error>;
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, Error>;
}

/// Authorization-code flow with client_secret against the calendar
/// provider's OAuth endpoints.
pub struct GoogleAuthenticator {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    auth_url: String,
    token_url: String,
    http: ReqwestClient,
}

impl GoogleAuthenticator {
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            auth_url: DEFAULT_AUTH_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            http: ReqwestClient::new(),
        }
    }

    /// Override the provider endpoints (local stub servers).
    pub fn with_endpoints(mut self, auth_url: String, token_url: String) -> Self {
        self.auth_url = auth_url;
        self.token_url = token_url;
        self
    }

    async fn post_token_request(
        &self,
        params: &[(&str, String)],
    ) -> Result<reqwest::Response, Error> {
        let resp = self.http.post(&self.token_url).form(params).send().await?;
        Ok(resp)
    }
}

#[async_trait]
impl TokenExchanger for GoogleAuthenticator {
    fn authorize_url(&self, state: &str) -> String {
        format!(
            "{base}?response_type=code&client_id={cid}&redirect_uri={redir}\
             &scope={scope}&access_type=offline&prompt=consent&state={st}",
            base = self.auth_url,
            cid = urlencoding::encode(&self.client_id),
            redir = urlencoding::encode(&self.redirect_uri),
            scope = urlencoding::encode(CALENDAR_SCOPE),
            st = urlencoding::encode(state),
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, Error> {
        let params = [
            ("client_id", self.client_id.clone()),
            ("client_secret", self.client_secret.clone()),
            ("code", code.to_string()),
            ("grant_type", "authorization_code".to_string()),
            ("redirect_uri", self.redirect_uri.clone()),
        ];

        let resp = self.post_token_request(&params).await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Provider {
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<TokenResponse>()
            .await
            .map_err(|e| Error::Auth(format!("Parse error on token JSON: {e}")))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, Error> {
        let params = [
            ("client_id", self.client_id.clone()),
            ("client_secret", self.client_secret.clone()),
            ("refresh_token", refresh_token.to_string()),
            ("grant_type", "refresh_token".to_string()),
        ];

        let resp = self.post_token_request(&params).await?;
        let status = resp.status();
        // A 4xx here means the grant itself was rejected (revoked consent,
        // rotated-out refresh token). The caller must prompt re-auth, not
        // retry, so it gets its own error variant.
        if status.is_client_error() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::ReconnectRequired(format!(
                "refresh grant rejected ({status}): {body}"
            )));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Provider {
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<TokenResponse>()
            .await
            .map_err(|e| Error::Auth(format!("Parse error on refresh JSON: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorize_url_carries_offline_consent() {
        let auth = GoogleAuthenticator::new(
            "client-123".to_string(),
            "shh".to_string(),
            "https://clinic.example/oauth/callback".to_string(),
        );
        let url = auth.authorize_url("xyzzy");
        assert!(url.contains("response_type=code"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("state=xyzzy"));
    }
}
