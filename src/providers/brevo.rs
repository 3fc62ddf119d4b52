//! Brevo API provider (formerly Sendinblue).
//!
//! For reference: [Brevo API docs](https://developers.brevo.com/reference/sendtransacemail)
//!
//! Authenticates with a static API key sent in the `api-key` header.
//!
//! # Example
//!
//! ```rust,ignore
//! use qrpost::providers::BrevoMailer;
//!
//! let mailer = BrevoMailer::new("xkeysib-...");
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::email::Email;
use crate::error::{DeliveryPhase, MailError};
use crate::mailer::Mailer;

const BREVO_BASE_URL: &str = "https://api.brevo.com/v3";
const BREVO_API_ENDPOINT: &str = "/smtp/email";
const PROVIDER: &str = "brevo";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Brevo API email provider.
pub struct BrevoMailer {
    api_key: String,
    base_url: String,
    timeout: Duration,
    client: Client,
}

impl BrevoMailer {
    /// Create a new Brevo mailer with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: BREVO_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            client: Client::new(),
        }
    }

    /// Create with a custom reqwest client.
    pub fn with_client(api_key: impl Into<String>, client: Client) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: BREVO_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            client,
        }
    }

    /// Set a custom base URL (for testing or regional endpoints).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the per-request timeout (default: 30 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_request(&self, email: &Email) -> Result<BrevoRequest, MailError> {
        let from = email.from.as_ref().ok_or(MailError::MissingField("from"))?;

        if email.to.is_empty() {
            return Err(MailError::MissingField("to"));
        }

        let mut request = BrevoRequest {
            sender: BrevoSender {
                email: from.email.clone(),
                name: from.name.clone(),
            },
            to: email
                .to
                .iter()
                .map(|a| BrevoRecipient {
                    email: a.email.clone(),
                    name: a.name.clone(),
                })
                .collect(),
            subject: email.subject.clone(),
            html_content: email.html_body.clone(),
            text_content: email.text_body.clone(),
            attachment: None,
        };

        if !email.attachments.is_empty() {
            request.attachment = Some(
                email
                    .attachments
                    .iter()
                    .map(|a| BrevoAttachment {
                        name: a.filename.clone(),
                        content: a.base64_data(),
                    })
                    .collect(),
            );
        }

        Ok(request)
    }
}

#[async_trait]
impl Mailer for BrevoMailer {
    async fn deliver(&self, email: &Email) -> Result<(), MailError> {
        let request = self.build_request(email)?;
        let url = format!("{}{}", self.base_url, BREVO_API_ENDPOINT);

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .header("User-Agent", format!("qrpost/{}", crate::VERSION))
            .header("api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| MailError::delivery(PROVIDER, DeliveryPhase::Request, e.to_string()))?;

        let status = response.status();

        if status.is_success() {
            if let Ok(body) = response.json::<BrevoResponse>().await {
                tracing::info!(message_id = %body.message_id, "Email accepted by Brevo");
            }
            Ok(())
        } else {
            let error: BrevoError = response.json().await.unwrap_or(BrevoError {
                code: "unknown".to_string(),
                message: "Unknown error".to_string(),
            });
            Err(MailError::delivery_with_status(
                PROVIDER,
                DeliveryPhase::Response,
                format!("[{}] {}", error.code, error.message),
                status.as_u16(),
            ))
        }
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    fn validate_config(&self) -> Result<(), MailError> {
        if self.api_key.is_empty() {
            return Err(MailError::Configuration("Brevo API key is empty".into()));
        }
        Ok(())
    }
}

// ============================================================================
// Brevo API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct BrevoSender {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
struct BrevoRecipient {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BrevoRequest {
    sender: BrevoSender,
    to: Vec<BrevoRecipient>,
    subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    html_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachment: Option<Vec<BrevoAttachment>>,
}

#[derive(Debug, Serialize)]
struct BrevoAttachment {
    name: String,
    content: String, // Base64 encoded
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BrevoResponse {
    message_id: String,
}

#[derive(Debug, Deserialize)]
struct BrevoError {
    code: String,
    message: String,
}
