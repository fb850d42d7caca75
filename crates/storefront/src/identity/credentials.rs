//! Credential login form and exchange seam.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

use techland_core::UserSession;

use super::error::AuthFailure;

/// Shortest secret the login form accepts.
pub const MIN_SECRET_LENGTH: usize = 6;

/// Identifier and secret as typed by the user.
pub struct CredentialForm {
    identifier: String,
    secret: SecretString,
}

impl fmt::Debug for CredentialForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialForm")
            .field("identifier", &self.identifier)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl CredentialForm {
    /// Capture a form submission.
    #[must_use]
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: SecretString::from(secret.into()),
        }
    }

    /// The identifier with surrounding whitespace removed.
    #[must_use]
    pub fn identifier(&self) -> &str {
        self.identifier.trim()
    }

    /// The secret.
    #[must_use]
    pub const fn secret(&self) -> &SecretString {
        &self.secret
    }

    /// Check the form before it is sent anywhere.
    ///
    /// # Errors
    ///
    /// - `AuthFailure::MissingFields` if the identifier is blank or the secret empty
    /// - `AuthFailure::WeakSecret` if the secret is shorter than [`MIN_SECRET_LENGTH`]
    pub fn validate(&self) -> Result<(), AuthFailure> {
        let secret = self.secret.expose_secret();
        if self.identifier().is_empty() || secret.is_empty() {
            return Err(AuthFailure::MissingFields);
        }
        if secret.chars().count() < MIN_SECRET_LENGTH {
            return Err(AuthFailure::WeakSecret {
                min: MIN_SECRET_LENGTH,
            });
        }
        Ok(())
    }
}

/// Service that trades credentials for a session.
pub trait CredentialExchange {
    /// Submit credentials.
    ///
    /// # Errors
    ///
    /// Returns the `AuthFailure` reported by the service, or
    /// `AuthFailure::Unavailable` if it could not be reached.
    async fn submit_credentials(
        &self,
        identifier: &str,
        secret: &SecretString,
    ) -> Result<UserSession, AuthFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_trimmed_identifier() {
        let form = CredentialForm::new("  ana  ", "secret1");
        assert_eq!(form.validate(), Ok(()));
        assert_eq!(form.identifier(), "ana");
    }

    #[test]
    fn test_validate_missing_fields() {
        assert_eq!(
            CredentialForm::new("   ", "secret1").validate(),
            Err(AuthFailure::MissingFields)
        );
        assert_eq!(
            CredentialForm::new("ana", "").validate(),
            Err(AuthFailure::MissingFields)
        );
    }

    #[test]
    fn test_validate_short_secret() {
        assert_eq!(
            CredentialForm::new("ana", "12345").validate(),
            Err(AuthFailure::WeakSecret { min: 6 })
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", CredentialForm::new("ana", "hunter22"));
        assert!(rendered.contains("ana"));
        assert!(!rendered.contains("hunter22"));
    }
}
