//! Binary email attachments, sent inline as base64 within the provider JSON body.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::MailError;

/// An email attachment.
///
/// Attachments are held fully in memory: creating one from a path reads the
/// file immediately, so an unreadable file fails before anything is sent.
///
/// # Examples
///
/// ```
/// use qrpost::Attachment;
///
/// let attachment = Attachment::from_bytes("report.pdf", b"PDF content".to_vec())
///     .content_type("application/pdf");
/// ```
///
/// ```rust,ignore
/// let qr = Attachment::from_path("/tmp/ticket-qr.png")?.filename("qr-code.png");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// Filename for the attachment
    pub filename: String,
    /// MIME content type (e.g., "application/pdf", "image/png")
    pub content_type: String,
    /// Raw attachment data
    pub data: Vec<u8>,
}

impl Attachment {
    /// Create a new attachment from raw bytes.
    ///
    /// Content type is guessed from the filename extension.
    pub fn from_bytes(filename: impl Into<String>, data: Vec<u8>) -> Self {
        let filename = filename.into();
        let content_type = mime_guess::from_path(&filename)
            .first_or_octet_stream()
            .to_string();

        Self {
            filename,
            content_type,
            data,
        }
    }

    /// Create a new attachment from a file path.
    ///
    /// Reads the file fully into memory and guesses the content type from
    /// the extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, MailError> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("attachment")
            .to_string();

        let data = std::fs::read(path)
            .map_err(|e| MailError::Attachment(format!("{}: {}", path.display(), e)))?;

        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string();

        Ok(Self {
            filename,
            content_type,
            data,
        })
    }

    /// Override the filename sent to the provider.
    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    /// Set the content type explicitly.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Get the attachment data as a base64-encoded string.
    pub fn base64_data(&self) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }

    /// Get the size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}
