//! Resend API provider.
//!
//! For reference: [Resend API docs](https://resend.com/docs/api-reference/emails/send-email)
//!
//! Authenticates with a static API key sent as a bearer token.
//!
//! # Example
//!
//! ```rust,ignore
//! use qrpost::providers::ResendMailer;
//!
//! let mailer = ResendMailer::new("re_xxxxx");
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::email::Email;
use crate::error::{DeliveryPhase, MailError};
use crate::mailer::Mailer;

const RESEND_API_URL: &str = "https://api.resend.com";
const PROVIDER: &str = "resend";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Resend API email provider.
pub struct ResendMailer {
    api_key: String,
    base_url: String,
    timeout: Duration,
    client: Client,
}

impl ResendMailer {
    /// Create a new Resend mailer with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: RESEND_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            client: Client::new(),
        }
    }

    /// Create with a custom reqwest client.
    pub fn with_client(api_key: impl Into<String>, client: Client) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: RESEND_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            client,
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

    fn build_request(&self, email: &Email) -> Result<ResendRequest, MailError> {
        let from = email.from.as_ref().ok_or(MailError::MissingField("from"))?;

        if email.to.is_empty() {
            return Err(MailError::MissingField("to"));
        }

        let mut request = ResendRequest {
            from: from.formatted(),
            to: email.to.iter().map(|a| a.formatted()).collect(),
            subject: email.subject.clone(),
            html: email.html_body.clone(),
            text: email.text_body.clone(),
            attachments: None,
        };

        if !email.attachments.is_empty() {
            request.attachments = Some(
                email
                    .attachments
                    .iter()
                    .map(|a| ResendAttachment {
                        filename: a.filename.clone(),
                        content: a.base64_data(),
                        content_type: Some(a.content_type.clone()),
                    })
                    .collect(),
            );
        }

        Ok(request)
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn deliver(&self, email: &Email) -> Result<(), MailError> {
        let request = self.build_request(email)?;
        let url = format!("{}/emails", self.base_url);

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("User-Agent", format!("qrpost/{}", crate::VERSION))
            .json(&request)
            .send()
            .await
            .map_err(|e| MailError::delivery(PROVIDER, DeliveryPhase::Request, e.to_string()))?;

        let status = response.status();

        if status.is_success() {
            if let Ok(body) = response.json::<ResendResponse>().await {
                tracing::info!(message_id = %body.id, "Email accepted by Resend");
            }
            Ok(())
        } else {
            let error: ResendError = response.json().await.unwrap_or(ResendError {
                message: "Unknown error".to_string(),
                name: None,
            });
            Err(MailError::delivery_with_status(
                PROVIDER,
                DeliveryPhase::Response,
                error.message,
                status.as_u16(),
            ))
        }
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    fn validate_config(&self) -> Result<(), MailError> {
        if self.api_key.is_empty() {
            return Err(MailError::Configuration("Resend API key is empty".into()));
        }
        Ok(())
    }
}

// ============================================================================
// Resend API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ResendRequest {
    from: String,
    to: Vec<String>,
    subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachments: Option<Vec<ResendAttachment>>,
}

#[derive(Debug, Serialize)]
struct ResendAttachment {
    filename: String,
    content: String, // Base64 encoded
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResendResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ResendError {
    message: String,
    #[serde(default)]
    #[allow(dead_code)]
    name: Option<String>,
}
