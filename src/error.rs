//! Error types for qrpost.

use std::fmt;

use thiserror::Error;

/// The point in the send pipeline where a delivery failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPhase {
    /// OAuth token acquisition (SendPulse).
    Token,
    /// Reading or encoding the attachment.
    Attachment,
    /// Sending the HTTP request (connect, write, timeout).
    Request,
    /// Provider returned a non-success response.
    Response,
}

impl fmt::Display for DeliveryPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeliveryPhase::Token => "token",
            DeliveryPhase::Attachment => "attachment",
            DeliveryPhase::Request => "request",
            DeliveryPhase::Response => "response",
        };
        write!(f, "{}", name)
    }
}

/// Errors that can occur when configuring a mailer or sending email.
///
/// Every failure on the send path itself - token acquisition, transport,
/// timeout, non-2xx response - converges to the [`Delivery`](Self::Delivery)
/// variant. Callers are expected to treat any error from a send as
/// "not delivered"; the message carries the failing phase and the
/// provider's diagnostic body for operators.
#[derive(Debug, Clone, Error)]
pub enum MailError {
    /// Email provider is not configured.
    #[error("Email provider not configured")]
    NotConfigured,

    /// Configuration error (missing env var, invalid value, etc.)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Missing required field (e.g., from address).
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Invalid email address format.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Error reading or processing an attachment.
    #[error("Attachment error: {0}")]
    Attachment(String),

    /// Delivery failed at the provider.
    #[error("Delivery failed ({provider}, {phase} phase): {message}")]
    Delivery {
        provider: &'static str,
        phase: DeliveryPhase,
        message: String,
        /// Optional HTTP status code
        status: Option<u16>,
    },
}

impl MailError {
    /// Create a delivery error without an HTTP status.
    pub fn delivery(
        provider: &'static str,
        phase: DeliveryPhase,
        message: impl Into<String>,
    ) -> Self {
        Self::Delivery {
            provider,
            phase,
            message: message.into(),
            status: None,
        }
    }

    /// Create a delivery error with the provider's HTTP status.
    pub fn delivery_with_status(
        provider: &'static str,
        phase: DeliveryPhase,
        message: impl Into<String>,
        status: u16,
    ) -> Self {
        Self::Delivery {
            provider,
            phase,
            message: message.into(),
            status: Some(status),
        }
    }
}
