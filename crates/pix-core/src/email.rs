//! Email Address Validation
//!
//! The accepted shape is `local@domain.tld`: no whitespace anywhere, exactly
//! one `@`, a non-empty local part, and a domain containing a dot that has at
//! least one character on each side. The same rule runs in the browser and
//! on the server.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Check an email against the accepted shape
pub fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.contains('@') {
        return false;
    }

    // Some dot must have a character on both sides
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

/// A validated payer email
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Trim and validate
    pub fn parse(raw: &str) -> Result<Self> {
        let email = raw.trim();

        if email.is_empty() {
            return Err(CoreError::MissingEmail);
        }

        if !is_valid_email(email) {
            return Err(CoreError::InvalidEmail(email.to_string()));
        }

        Ok(Self(email.to_string()))
    }

    /// Validate an email together with its confirmation field
    pub fn parse_confirmed(raw: &str, confirmation: &str) -> Result<Self> {
        let email = Self::parse(raw)?;
        if email.as_str() != confirmation.trim() {
            return Err(CoreError::EmailMismatch);
        }
        Ok(email)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<EmailAddress> for String {
    fn from(email: EmailAddress) -> Self {
        email.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_common_shapes() {
        for email in ["a@b.com", "first.last@example.co.uk", "x+tag@sub.domain.io", "a@b..c"] {
            assert!(is_valid_email(email), "{email} should be accepted");
        }
    }

    #[test]
    fn test_rejects_malformed() {
        for email in [
            "",
            "plain",
            "@b.com",
            "a@",
            "a@b",
            "a@.com",
            "a@com.",
            "a@@b.com",
            "a@b@c.com",
            "a b@c.com",
            "a@b .com",
        ] {
            assert!(!is_valid_email(email), "{email:?} should be rejected");
        }
    }

    #[test]
    fn test_parse_trims_and_reports() {
        let email = EmailAddress::parse("  a@b.com ").unwrap();
        assert_eq!(email.as_str(), "a@b.com");

        assert_eq!(EmailAddress::parse("   "), Err(CoreError::MissingEmail));
        assert!(matches!(
            EmailAddress::parse("nope"),
            Err(CoreError::InvalidEmail(_))
        ));
    }

    #[test]
    fn test_confirmation_must_match() {
        assert!(EmailAddress::parse_confirmed("a@b.com", " a@b.com").is_ok());
        assert_eq!(
            EmailAddress::parse_confirmed("a@b.com", "a@c.com"),
            Err(CoreError::EmailMismatch)
        );
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: std::result::Result<EmailAddress, _> = serde_json::from_str("\"a@b.com\"");
        assert!(ok.is_ok());

        let bad: std::result::Result<EmailAddress, _> = serde_json::from_str("\"a@b\"");
        assert!(bad.is_err());
    }
}
