// carelink-core/src/platforms/whatsapp.rs

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::Deserialize;
use tracing::debug;

use crate::Error;

/// What the gateway returns when it accepts an outbound message.
#[derive(Debug, Clone)]
pub struct ProviderSendAck {
    pub message_sid: String,
    pub status: Option<String>,
}

/// Outbound side of the messaging gateway. Behind a trait so the ledger
/// can be driven in tests without the network.
#[async_trait]
pub trait WhatsAppClient: Send + Sync {
    async fn send_message(
        &self,
        from: &str,
        to: &str,
        body: &str,
        media_urls: &[String],
    ) -> Result<ProviderSendAck, Error>;
}

/// Matches the gateway's JSON for an accepted message.
#[derive(Deserialize)]
struct SendMessageResponse {
    sid: String,
    status: Option<String>,
}

/// Twilio-style Messages API client: form-encoded POST, HTTP basic auth
/// with the account SID and auth token, `whatsapp:`-prefixed addresses.
pub struct TwilioWhatsAppClient {
    base_url: String,
    account_sid: String,
    auth_token: String,
    http: ReqwestClient,
}

impl TwilioWhatsAppClient {
    pub fn new(base_url: String, account_sid: String, auth_token: String) -> Self {
        Self {
            base_url,
            account_sid,
            auth_token,
            http: ReqwestClient::new(),
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url.trim_end_matches('/'),
            self.account_sid
        )
    }
}

#[async_trait]
impl WhatsAppClient for TwilioWhatsAppClient {
    async fn send_message(
        &self,
        from: &str,
        to: &str,
        body: &str,
        media_urls: &[String],
    ) -> Result<ProviderSendAck, Error> {
        let mut params: Vec<(&str, String)> = vec![
            ("From", format!("whatsapp:{}", from)),
            ("To", format!("whatsapp:{}", to)),
            ("Body", body.to_string()),
        ];
        for url in media_urls {
            params.push(("MediaUrl", url.clone()));
        }

        let resp = self
            .http
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let parsed = resp
            .json::<SendMessageResponse>()
            .await
            .map_err(|e| Error::Parse(format!("send response JSON: {e}")))?;

        debug!("Gateway accepted message sid={}", parsed.sid);
        Ok(ProviderSendAck {
            message_sid: parsed.sid,
            status: parsed.status,
        })
    }
}
