//! SendPulse API provider.
//!
//! For reference: [SendPulse SMTP API docs](https://sendpulse.com/integrations/api/smtp)
//!
//! SendPulse authenticates with an OAuth2 client-credentials grant rather
//! than a static API key. The mailer exchanges its client id/secret for a
//! bearer token at `/oauth/access_token` and caches it for the token's
//! lifetime minus a 60-second safety margin, so a burst of deliveries costs
//! one token round trip, not one per email.
//!
//! # Example
//!
//! ```rust,ignore
//! use qrpost::providers::SendPulseMailer;
//!
//! let mailer = SendPulseMailer::new("client-id", "client-secret");
//! ```

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::email::Email;
use crate::error::{DeliveryPhase, MailError};
use crate::mailer::Mailer;

const SENDPULSE_BASE_URL: &str = "https://api.sendpulse.com";
const PROVIDER: &str = "sendpulse";

/// Per-request timeout covering connect, write, and read.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Refresh the token this long before its actual expiry.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// A bearer token with its absolute refresh deadline.
#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// SendPulse API email provider.
pub struct SendPulseMailer {
    client_id: String,
    client_secret: String,
    base_url: String,
    timeout: Duration,
    client: Client,
    // Held across the token fetch so concurrent deliveries with a stale
    // cache serialize on a single network round trip.
    token: Mutex<Option<CachedToken>>,
}

impl SendPulseMailer {
    /// Create a new SendPulse mailer with the given client credentials.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            base_url: SENDPULSE_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            client: Client::new(),
            token: Mutex::new(None),
        }
    }

    /// Create with a custom reqwest client.
    pub fn with_client(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        client: Client,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            base_url: SENDPULSE_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            client,
            token: Mutex::new(None),
        }
    }

    /// Set a custom base URL (for testing).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the per-request timeout (default: 30 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get a bearer token, fetching a new one if the cache is empty or stale.
    ///
    /// The cache lock is held across the fetch: with N concurrent callers
    /// and no fresh token, exactly one token request reaches the network
    /// and the rest reuse its result.
    async fn access_token(&self) -> Result<String, MailError> {
        let mut cache = self.token.lock().await;

        if let Some(token) = cache.as_ref() {
            if token.is_fresh() {
                return Ok(token.value.clone());
            }
        }

        let url = format!("{}/oauth/access_token", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .form(&TokenRequest {
                grant_type: "client_credentials",
                client_id: &self.client_id,
                client_secret: &self.client_secret,
            })
            .send()
            .await
            .map_err(|e| MailError::delivery(PROVIDER, DeliveryPhase::Token, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::delivery_with_status(
                PROVIDER,
                DeliveryPhase::Token,
                body,
                status.as_u16(),
            ));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| MailError::delivery(PROVIDER, DeliveryPhase::Token, e.to_string()))?;

        let ttl = Duration::from_secs(token.expires_in)
            .saturating_sub(TOKEN_EXPIRY_MARGIN);
        let cached = CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + ttl,
        };
        let value = cached.value.clone();
        *cache = Some(cached);

        tracing::debug!(expires_in = token.expires_in, "SendPulse access token obtained");
        Ok(value)
    }

    fn build_request(&self, email: &Email) -> Result<SendPulseRequest, MailError> {
        let from = email.from.as_ref().ok_or(MailError::MissingField("from"))?;

        if email.to.is_empty() {
            return Err(MailError::MissingField("to"));
        }

        let mut request = SendPulseEmail {
            subject: email.subject.clone(),
            from: SendPulseSender {
                name: from.name.clone().unwrap_or_default(),
                email: from.email.clone(),
            },
            to: email
                .to
                .iter()
                .map(|a| SendPulseRecipient {
                    email: a.email.clone(),
                    name: a.name.clone(),
                })
                .collect(),
            html: email.html_body.clone(),
            text: email.text_body.clone(),
            attachments_binary: None,
        };

        if !email.attachments.is_empty() {
            request.attachments_binary = Some(
                email
                    .attachments
                    .iter()
                    .map(|a| (a.filename.clone(), a.base64_data()))
                    .collect(),
            );
        }

        Ok(SendPulseRequest { email: request })
    }
}

#[async_trait]
impl Mailer for SendPulseMailer {
    async fn deliver(&self, email: &Email) -> Result<(), MailError> {
        let request = self.build_request(email)?;
        let token = self.access_token().await?;

        let url = format!("{}/smtp/emails", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .bearer_auth(token)
            .header("Content-Type", "application/json")
            .header("User-Agent", format!("qrpost/{}", crate::VERSION))
            .json(&request)
            .send()
            .await
            .map_err(|e| MailError::delivery(PROVIDER, DeliveryPhase::Request, e.to_string()))?;

        let status = response.status();

        if status.is_success() {
            // The id is ancillary: a success without a parseable body is
            // still a success.
            if let Ok(body) = response.json::<SendPulseResponse>().await {
                tracing::info!(message_id = ?body.id, "Email accepted by SendPulse");
            }
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(MailError::delivery_with_status(
                PROVIDER,
                DeliveryPhase::Response,
                body,
                status.as_u16(),
            ))
        }
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    fn validate_config(&self) -> Result<(), MailError> {
        if self.client_id.is_empty() {
            return Err(MailError::Configuration(
                "SendPulse client id is empty".into(),
            ));
        }
        if self.client_secret.is_empty() {
            return Err(MailError::Configuration(
                "SendPulse client secret is empty".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SendPulse API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Serialize)]
struct SendPulseRequest {
    email: SendPulseEmail,
}

#[derive(Debug, Serialize)]
struct SendPulseEmail {
    subject: String,
    from: SendPulseSender,
    to: Vec<SendPulseRecipient>,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    /// Filename -> base64 content. BTreeMap keeps the serialized order stable.
    #[serde(skip_serializing_if = "Option::is_none")]
    attachments_binary: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Serialize)]
struct SendPulseSender {
    name: String,
    email: String,
}

#[derive(Debug, Serialize)]
struct SendPulseRecipient {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendPulseResponse {
    #[serde(default)]
    id: Option<String>,
}
