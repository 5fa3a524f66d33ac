//! Checkout Form Validation

use pix_core::{CoreError, EmailAddress};

/// Per-field messages for the checkout form
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormErrors {
    pub email: Option<String>,
    pub confirmation: Option<String>,
}

impl FormErrors {
    pub const fn is_empty(&self) -> bool {
        self.email.is_none() && self.confirmation.is_none()
    }
}

/// Validate the email and its confirmation
pub fn validate_checkout_form(
    email: &str,
    confirmation: &str,
) -> Result<EmailAddress, FormErrors> {
    let mut errors = FormErrors::default();

    let parsed = match EmailAddress::parse(email) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            errors.email = Some(e.user_message().into());
            None
        }
    };

    if confirmation.trim().is_empty() {
        errors.confirmation = Some("Please confirm your email.".into());
    } else if parsed.is_some() && email.trim() != confirmation.trim() {
        errors.confirmation = Some(CoreError::EmailMismatch.user_message().into());
    }

    match parsed {
        Some(email) if errors.is_empty() => Ok(email),
        _ => Err(errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_form() {
        let email = validate_checkout_form(" a@b.com ", "a@b.com").unwrap();
        assert_eq!(email.as_str(), "a@b.com");
    }

    #[test]
    fn test_mismatch_reported_on_confirmation() {
        let errors = validate_checkout_form("a@b.com", "a@c.com").unwrap_err();
        assert!(errors.email.is_none());
        assert!(errors.confirmation.is_some());
    }

    #[test]
    fn test_both_fields_reported() {
        let errors = validate_checkout_form("nope", "").unwrap_err();
        assert!(errors.email.is_some());
        assert!(errors.confirmation.is_some());
    }
}
