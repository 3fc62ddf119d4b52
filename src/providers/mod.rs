//! Email provider implementations.
//!
//! Each provider implements the [`Mailer`](crate::Mailer) trait. Exactly one
//! provider is active per deployment, selected by configuration.
//!
//! ## Available Providers
//!
//! | Provider | Feature Flag | Auth |
//! |----------|-------------|------|
//! | [`SendPulseMailer`] | `sendpulse` | OAuth2 client-credentials bearer token |
//! | [`BrevoMailer`] | `brevo` | Static `api-key` header |
//! | [`ResendMailer`] | `resend` | Static bearer key |

#[cfg(feature = "sendpulse")]
mod sendpulse;
#[cfg(feature = "sendpulse")]
pub use sendpulse::SendPulseMailer;

#[cfg(feature = "brevo")]
mod brevo;
#[cfg(feature = "brevo")]
pub use brevo::BrevoMailer;

#[cfg(feature = "resend")]
mod resend;
#[cfg(feature = "resend")]
pub use resend::ResendMailer;
