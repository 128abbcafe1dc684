//! Envelope address type.

use crate::error::{Error, Result};

/// Bare mailbox token (`local@domain`) used in the SMTP envelope.
///
/// Carries no angle brackets and no whitespace. The only syntactic
/// requirement is the presence of an `@`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates a new address from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is empty, has no `@`, or contains
    /// whitespace.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        Self::validate(&addr)?;
        Ok(Self(addr))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(addr: &str) -> Result<()> {
        if addr.is_empty() {
            return Err(Error::InvalidAddress("Address cannot be empty".into()));
        }

        if !addr.contains('@') {
            return Err(Error::InvalidAddress(format!("{addr}: missing @")));
        }

        if addr.chars().any(char::is_whitespace) {
            return Err(Error::InvalidAddress(format!(
                "{addr:?}: contains whitespace"
            )));
        }

        Ok(())
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}
