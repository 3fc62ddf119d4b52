//! # qrpost
//!
//! Send an email with a QR-code image attached, via SendPulse, Brevo, or
//! Resend. One provider is active per deployment, selected by configuration.
//!
//! ## Quick Start
//!
//! Set environment variables:
//! ```bash
//! EMAIL_PROVIDER=sendpulse
//! SENDPULSE_CLIENT_ID=xxxxx
//! SENDPULSE_CLIENT_SECRET=xxxxx
//! EMAIL_FROM=noreply@example.com
//! EMAIL_FROM_NAME=Attendance System
//! ```
//!
//! Send a QR email from anywhere:
//! ```rust,ignore
//! qrpost::send_qr_mail(
//!     "attendee@example.com",
//!     "Your QR Code",
//!     "Here is your attendance QR code.",
//!     "/tmp/qr-83421.png",
//! ).await?;
//! ```
//!
//! The caller learns only "sent" or "failed"; there are no retries and no
//! delivery tracking. Any failure - token acquisition, unreadable file,
//! transport error, non-2xx response - surfaces as a [`MailError`].
//!
//! ## Environment Variables
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `EMAIL_PROVIDER` | `sendpulse`, `brevo`, or `resend` |
//! | `EMAIL_FROM` | Sender email (required - never silently defaulted) |
//! | `EMAIL_FROM_NAME` | Sender display name (optional) |
//! | `SENDPULSE_CLIENT_ID` | SendPulse OAuth client id |
//! | `SENDPULSE_CLIENT_SECRET` | SendPulse OAuth client secret |
//! | `BREVO_API_KEY` | Brevo API key |
//! | `RESEND_API_KEY` | Resend API key |
//!
//! ## Feature Flags
//!
//! - `sendpulse` - SendPulse API provider (OAuth2 client credentials)
//! - `brevo` - Brevo API provider (formerly Sendinblue)
//! - `resend` - Resend API provider
//!
//! All three are enabled by default.

/// The version of the qrpost crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod address;
mod attachment;
mod email;
mod error;
mod mailer;

pub mod providers;

use parking_lot::RwLock;
use std::env;
use std::path::Path;
use std::sync::Arc;

// Re-exports
pub use address::{Address, ToAddress};
pub use attachment::Attachment;
pub use email::Email;
pub use error::{DeliveryPhase, MailError};
pub use mailer::Mailer;

/// Filename the QR attachment is delivered under, regardless of the source file.
const QR_ATTACHMENT_NAME: &str = "qr-code.png";

// ============================================================================
// Global Mailer Configuration
// ============================================================================

/// Global mailer - swappable for testing
static MAILER: RwLock<Option<Arc<dyn Mailer>>> = RwLock::new(None);

/// Get the default from address from environment.
pub fn default_from() -> Option<Address> {
    let email = env::var("EMAIL_FROM").ok()?;
    match env::var("EMAIL_FROM_NAME").ok() {
        Some(name) => Some(Address::with_name(name, email)),
        None => Some(Address::new(email)),
    }
}

/// Auto-detect provider based on enabled features and available credentials.
fn detect_provider() -> Option<&'static str> {
    #[cfg(feature = "sendpulse")]
    if env::var("SENDPULSE_CLIENT_ID").is_ok() && env::var("SENDPULSE_CLIENT_SECRET").is_ok() {
        return Some("sendpulse");
    }
    #[cfg(feature = "brevo")]
    if env::var("BREVO_API_KEY").is_ok() {
        return Some("brevo");
    }
    #[cfg(feature = "resend")]
    if env::var("RESEND_API_KEY").is_ok() {
        return Some("resend");
    }
    None
}

/// Create mailer from environment variables.
fn create_mailer_from_env() -> Result<Arc<dyn Mailer>, MailError> {
    // A sender address is mandatory configuration. Guessing one at send
    // time hides a deployment mistake, so refuse to start without it.
    if env::var("EMAIL_FROM").is_err() {
        return Err(MailError::Configuration(
            "EMAIL_FROM not set. A sender address is required and is never defaulted.".into(),
        ));
    }

    let provider = match env::var("EMAIL_PROVIDER") {
        Ok(p) => p.to_lowercase(),
        Err(_) => match detect_provider() {
            Some(p) => {
                tracing::debug!(provider = p, "Auto-detected email provider");
                p.to_string()
            }
            None => {
                return Err(MailError::Configuration(
                    "EMAIL_PROVIDER not set and could not auto-detect. \
                    Set EMAIL_PROVIDER or ensure provider credentials are configured."
                        .into(),
                ));
            }
        },
    };

    let mailer: Arc<dyn Mailer> = match provider.as_str() {
        #[cfg(feature = "sendpulse")]
        "sendpulse" => {
            let client_id = env::var("SENDPULSE_CLIENT_ID")
                .map_err(|_| MailError::Configuration("SENDPULSE_CLIENT_ID not set".into()))?;
            let client_secret = env::var("SENDPULSE_CLIENT_SECRET")
                .map_err(|_| MailError::Configuration("SENDPULSE_CLIENT_SECRET not set".into()))?;
            Arc::new(providers::SendPulseMailer::new(client_id, client_secret))
        }
        #[cfg(not(feature = "sendpulse"))]
        "sendpulse" => {
            return Err(MailError::Configuration(
                "EMAIL_PROVIDER=sendpulse but 'sendpulse' feature is not enabled. \
                Add `features = [\"sendpulse\"]` to Cargo.toml"
                    .into(),
            ))
        }

        #[cfg(feature = "brevo")]
        "brevo" => {
            let key = env::var("BREVO_API_KEY")
                .map_err(|_| MailError::Configuration("BREVO_API_KEY not set".into()))?;
            Arc::new(providers::BrevoMailer::new(key))
        }
        #[cfg(not(feature = "brevo"))]
        "brevo" => {
            return Err(MailError::Configuration(
                "EMAIL_PROVIDER=brevo but 'brevo' feature is not enabled. \
                Add `features = [\"brevo\"]` to Cargo.toml"
                    .into(),
            ))
        }

        #[cfg(feature = "resend")]
        "resend" => {
            let key = env::var("RESEND_API_KEY")
                .map_err(|_| MailError::Configuration("RESEND_API_KEY not set".into()))?;
            Arc::new(providers::ResendMailer::new(key))
        }
        #[cfg(not(feature = "resend"))]
        "resend" => {
            return Err(MailError::Configuration(
                "EMAIL_PROVIDER=resend but 'resend' feature is not enabled. \
                Add `features = [\"resend\"]` to Cargo.toml"
                    .into(),
            ))
        }

        _ => {
            return Err(MailError::Configuration(format!(
                "Unknown EMAIL_PROVIDER: {}. Valid providers are: sendpulse, brevo, resend",
                provider
            )))
        }
    };

    mailer.validate_config()?;
    Ok(mailer)
}

/// Get or initialize the global mailer.
fn get_mailer() -> Result<Arc<dyn Mailer>, MailError> {
    // Fast path: already configured
    {
        let guard = MAILER.read();
        if let Some(ref mailer) = *guard {
            return Ok(Arc::clone(mailer));
        }
    }

    // Slow path: need to configure
    let mailer = create_mailer_from_env()?;
    let mut guard = MAILER.write();

    // Double-check after acquiring write lock
    if guard.is_none() {
        *guard = Some(Arc::clone(&mailer));
    }

    Ok(guard.as_ref().map(Arc::clone).unwrap_or(mailer))
}

/// Check if email is configured (env vars are set and feature is enabled).
///
/// Returns `true` only if the required credentials for the provider are
/// present, the corresponding feature flag is enabled, and `EMAIL_FROM`
/// is set.
pub fn is_configured() -> bool {
    if env::var("EMAIL_FROM").is_err() {
        return false;
    }

    let provider = match env::var("EMAIL_PROVIDER") {
        Ok(p) => p,
        Err(_) => match detect_provider() {
            Some(p) => p.to_string(),
            None => return false,
        },
    };
    match provider.to_lowercase().as_str() {
        #[cfg(feature = "sendpulse")]
        "sendpulse" => {
            env::var("SENDPULSE_CLIENT_ID").is_ok() && env::var("SENDPULSE_CLIENT_SECRET").is_ok()
        }
        #[cfg(not(feature = "sendpulse"))]
        "sendpulse" => {
            tracing::warn!(
                "EMAIL_PROVIDER=sendpulse but 'sendpulse' feature is not enabled. \
                Add `features = [\"sendpulse\"]` to Cargo.toml"
            );
            false
        }

        #[cfg(feature = "brevo")]
        "brevo" => env::var("BREVO_API_KEY").is_ok(),
        #[cfg(not(feature = "brevo"))]
        "brevo" => {
            tracing::warn!(
                "EMAIL_PROVIDER=brevo but 'brevo' feature is not enabled. \
                Add `features = [\"brevo\"]` to Cargo.toml"
            );
            false
        }

        #[cfg(feature = "resend")]
        "resend" => env::var("RESEND_API_KEY").is_ok(),
        #[cfg(not(feature = "resend"))]
        "resend" => {
            tracing::warn!(
                "EMAIL_PROVIDER=resend but 'resend' feature is not enabled. \
                Add `features = [\"resend\"]` to Cargo.toml"
            );
            false
        }

        _ => false,
    }
}

/// Initialize the mailer from environment variables.
///
/// Call this at startup to fail fast on bad configuration, including a
/// missing `EMAIL_FROM` sender address.
pub fn init() -> Result<(), MailError> {
    if !is_configured() {
        return Err(MailError::NotConfigured);
    }
    let _ = get_mailer()?;
    Ok(())
}

/// Validate an email has required fields.
fn validate(email: &Email) -> Result<(), MailError> {
    if email.from.is_none() && default_from().is_none() {
        return Err(MailError::MissingField("from"));
    }
    if email.to.is_empty() {
        return Err(MailError::MissingField("to"));
    }
    Ok(())
}

/// Prepare email by adding default from address if needed.
fn prepare_email(email: &Email) -> Email {
    if email.from.is_none() {
        if let Some(from) = default_from() {
            let mut e = email.clone();
            e.from = Some(from);
            return e;
        }
    }
    email.clone()
}

async fn deliver_inner(email: &Email, mailer: &dyn Mailer) -> Result<(), MailError> {
    validate(email)?;

    let provider = mailer.provider_name();
    let email = prepare_email(email);

    let span = tracing::info_span!(
        "qrpost.deliver",
        provider = provider,
        to = ?email.to.iter().map(|a| &a.email).collect::<Vec<_>>(),
        subject = %email.subject,
    );
    let _guard = span.enter();

    tracing::debug!("Delivering email");

    let result = mailer.deliver(&email).await;

    match &result {
        Ok(()) => tracing::info!("Email delivered"),
        Err(e) => tracing::error!(error = %e, "Email delivery failed"),
    }

    result
}

/// Deliver an email using the global mailer.
///
/// Auto-configures from environment variables on first call.
/// Validates required fields (`from`, `to`) before sending.
/// Adds the default `from` address from `EMAIL_FROM` if not set on the email.
pub async fn deliver(email: &Email) -> Result<(), MailError> {
    let mailer = get_mailer()?;
    deliver_inner(email, mailer.as_ref()).await
}

/// Deliver an email using a specific mailer (per-call override).
///
/// Useful for testing or sending via an explicitly constructed provider.
///
/// ```rust,ignore
/// use qrpost::providers::BrevoMailer;
///
/// let mailer = BrevoMailer::new("xkeysib-...");
/// qrpost::deliver_with(&email, &mailer).await?;
/// ```
pub async fn deliver_with<M: Mailer>(email: &Email, mailer: &M) -> Result<(), MailError> {
    deliver_inner(email, mailer).await
}

// ============================================================================
// QR Mail
// ============================================================================

/// Build a QR-code email without sending it.
///
/// Reads `qr_file` fully into memory; the attachment is always delivered as
/// `qr-code.png` with content type `image/png`, whatever the source file is
/// called. The body text is wrapped in a paragraph tag, followed by a line
/// pointing at the attachment. The text is inserted as-is; JSON escaping on
/// the wire is handled by the serializer.
///
/// No sender is set: [`send_qr_mail`] adds the configured one, and callers
/// using [`deliver_with`] set their own via [`Email::from`].
pub fn qr_email(
    to: impl Into<String>,
    subject: impl Into<String>,
    body_text: impl Into<String>,
    qr_file: impl AsRef<Path>,
) -> Result<Email, MailError> {
    let to = to.into();
    if to.trim().is_empty() {
        return Err(MailError::MissingField("to"));
    }

    let attachment = Attachment::from_path(qr_file)?
        .filename(QR_ATTACHMENT_NAME)
        .content_type("image/png");

    let body_text = body_text.into();
    let html = format!(
        "<p>{}</p><p>Please find your QR code attached.</p>",
        body_text
    );

    Ok(Email::new()
        .to(to)
        .subject(subject)
        .html_body(html)
        .attachment(attachment))
}

/// Send an email with a QR-code image attached, via the global mailer.
///
/// This is the one operation the crate exists for: one recipient, one
/// binary attachment, one POST to the configured provider. Success carries
/// no delivery id; any failure - unreadable file, token acquisition,
/// transport error, non-2xx provider response - is a [`MailError`] and
/// nothing is retried.
///
/// ```rust,ignore
/// qrpost::send_qr_mail(
///     "attendee@example.com",
///     "Your QR Code",
///     "See you at check-in!",
///     "/tmp/qr-83421.png",
/// ).await?;
/// ```
pub async fn send_qr_mail(
    to: impl Into<String>,
    subject: impl Into<String>,
    body_text: impl Into<String>,
    qr_file: impl AsRef<Path>,
) -> Result<(), MailError> {
    let email = qr_email(to, subject, body_text, qr_file)?;
    deliver(&email).await
}

// ============================================================================
// Manual Configuration (for testing or custom setups)
// ============================================================================

/// Manually configure the global mailer.
///
/// Sets a single global mailer used by `deliver()` and `send_qr_mail()`.
/// Can be called multiple times - later calls replace the previous mailer.
pub fn configure<M: Mailer + 'static>(mailer: M) {
    let mut guard = MAILER.write();
    *guard = Some(Arc::new(mailer));
}

/// Configure with an Arc'd mailer.
pub fn configure_arc(mailer: Arc<dyn Mailer>) {
    let mut guard = MAILER.write();
    *guard = Some(mailer);
}

/// Reset the global mailer (useful for tests).
///
/// After calling this, the next `deliver()` will re-initialize from env vars.
pub fn reset() {
    let mut guard = MAILER.write();
    *guard = None;
}

/// Get a reference to the configured mailer (if initialized).
pub fn mailer() -> Option<Arc<dyn Mailer>> {
    let guard = MAILER.read();
    guard.as_ref().cloned()
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::Address;
    pub use crate::Attachment;
    pub use crate::Email;
    pub use crate::MailError;
    pub use crate::Mailer;
    pub use crate::ToAddress;
    pub use crate::{default_from, deliver, deliver_with, is_configured, qr_email, send_qr_mail};
}
