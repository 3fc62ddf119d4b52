//! Mailer trait.
//!
//! # Architecture: Why `async_trait`?
//!
//! This module uses `#[async_trait]` instead of native async traits because
//! the library requires dynamic dispatch via `Arc<dyn Mailer>`: the active
//! provider is chosen from configuration at runtime, so the same binary can
//! run against SendPulse in one deployment and Brevo in another. The boxed
//! future costs one heap allocation per call; email delivery is dominated by
//! network latency, so the overhead is unmeasurable in practice.
//!
//! Users who want to avoid boxing can call `deliver` directly on a concrete
//! mailer type.

use async_trait::async_trait;

use crate::email::Email;
use crate::error::MailError;

/// Trait for email delivery providers.
///
/// All providers (SendPulse, Brevo, Resend) implement this trait.
///
/// A successful delivery returns `()`: the caller is told only "sent" or
/// "failed". Providers log the provider-assigned message id, where one is
/// returned, at info level.
///
/// # Example
///
/// ```ignore
/// use qrpost::{Email, Mailer};
/// use qrpost::providers::BrevoMailer;
///
/// let mailer = BrevoMailer::new("xkeysib-...");
///
/// let email = Email::new()
///     .from("sender@example.com")
///     .to("recipient@example.com")
///     .subject("Hello")
///     .html_body("<p>World</p>");
///
/// mailer.deliver(&email).await?;
/// ```
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send a single email. Fire-once: no retries, no backoff.
    async fn deliver(&self, email: &Email) -> Result<(), MailError>;

    /// Get the provider name (for logging/debugging).
    fn provider_name(&self) -> &'static str {
        "unknown"
    }

    /// Validate configuration.
    ///
    /// Called at startup to verify required configuration is present.
    /// Override in providers that require specific config (API keys, etc.).
    fn validate_config(&self) -> Result<(), MailError> {
        Ok(())
    }
}
