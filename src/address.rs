//! Email address type with optional display name.

use email_address::EmailAddress;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::MailError;

/// An email address with an optional display name.
///
/// # Examples
///
/// ```
/// use qrpost::Address;
///
/// // From email string
/// let addr: Address = "user@example.com".into();
/// assert_eq!(addr.email, "user@example.com");
/// assert_eq!(addr.name, None);
///
/// // From tuple (name, email)
/// let addr: Address = ("Alice", "alice@example.com").into();
/// assert_eq!(addr.email, "alice@example.com");
/// assert_eq!(addr.name, Some("Alice".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Optional display name (e.g., "Alice Smith")
    pub name: Option<String>,
    /// Email address (e.g., "alice@example.com")
    pub email: String,
}

impl Address {
    /// Create a new address with just an email.
    ///
    /// This performs a basic sanity check (non-empty, contains @) and logs
    /// a warning if the email looks invalid. For strict validation, use
    /// [`Address::parse`] instead.
    pub fn new(email: impl Into<String>) -> Self {
        let email = email.into();

        if !Self::basic_sanity_check(&email) {
            tracing::warn!(
                email = %email,
                "Creating address with potentially invalid email. Use Address::parse() for strict validation."
            );
        }

        Self { name: None, email }
    }

    /// Create a new address with a name and email.
    pub fn with_name(name: impl Into<String>, email: impl Into<String>) -> Self {
        let email = email.into();

        if !Self::basic_sanity_check(&email) {
            tracing::warn!(
                email = %email,
                "Creating address with potentially invalid email. Use Address::parse() for strict validation."
            );
        }

        Self {
            name: Some(name.into()),
            email,
        }
    }

    /// Perform basic sanity check on an email address.
    ///
    /// Returns true if the email passes basic checks (non-empty, contains @).
    /// This is NOT a full validation - use `Address::parse()` for that.
    fn basic_sanity_check(email: &str) -> bool {
        !email.is_empty() && email.contains('@')
    }

    /// Parse and validate an email address.
    ///
    /// Uses RFC 5321/5322 compliant validation. Returns an error if the
    /// email address is invalid.
    ///
    /// # Examples
    ///
    /// ```
    /// use qrpost::Address;
    ///
    /// let addr = Address::parse("user@example.com").unwrap();
    /// assert_eq!(addr.email, "user@example.com");
    ///
    /// assert!(Address::parse("not-an-email").is_err());
    /// assert!(Address::parse("").is_err());
    /// ```
    pub fn parse(email: &str) -> Result<Self, MailError> {
        if !EmailAddress::is_valid(email) {
            return Err(MailError::InvalidAddress(format!(
                "'{}' is not a valid email address",
                email
            )));
        }

        Ok(Self {
            name: None,
            email: email.to_string(),
        })
    }

    /// Format as "Name <email>" or just "email" if no name.
    pub fn formatted(&self) -> String {
        match &self.name {
            Some(name) if name.is_empty() => self.email.clone(),
            Some(name) => format!("{} <{}>", name, self.email),
            None => self.email.clone(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formatted())
    }
}

// From &str - just email
impl From<&str> for Address {
    fn from(email: &str) -> Self {
        Self::new(email)
    }
}

// From String - just email
impl From<String> for Address {
    fn from(email: String) -> Self {
        Self::new(email)
    }
}

// From tuple (&str, &str) - (name, email)
impl From<(&str, &str)> for Address {
    fn from((name, email): (&str, &str)) -> Self {
        Self::with_name(name, email)
    }
}

// From tuple (String, String) - (name, email)
impl From<(String, String)> for Address {
    fn from((name, email): (String, String)) -> Self {
        Self::with_name(name, email)
    }
}

/// Trait for types that can be converted to an email address.
///
/// Implement this trait for your custom types to use them directly
/// in email builder methods.
///
/// # Example
///
/// ```rust
/// use qrpost::{Address, ToAddress};
///
/// struct Attendee {
///     name: String,
///     email: String,
/// }
///
/// impl ToAddress for Attendee {
///     fn to_address(&self) -> Address {
///         Address::with_name(&self.name, &self.email)
///     }
/// }
/// ```
pub trait ToAddress {
    fn to_address(&self) -> Address;
}

// Blanket implementation for references to types that implement ToAddress
impl<T: ToAddress + ?Sized> ToAddress for &T {
    fn to_address(&self) -> Address {
        (*self).to_address()
    }
}

impl ToAddress for Address {
    fn to_address(&self) -> Address {
        self.clone()
    }
}

impl ToAddress for str {
    fn to_address(&self) -> Address {
        Address::new(self)
    }
}

impl ToAddress for String {
    fn to_address(&self) -> Address {
        Address::new(self)
    }
}

// Implement for tuples (name, email)
impl<N: AsRef<str>, E: AsRef<str>> ToAddress for (N, E) {
    fn to_address(&self) -> Address {
        Address::with_name(self.0.as_ref(), self.1.as_ref())
    }
}
