//! Unified error handling with Sentry integration.
//!
//! Each concern has its own error type; [`ClientError`] wraps them for
//! callers that drive several at once (the CLI). Nothing here is fatal to a
//! tab: store and record failures are logged and degraded where they happen,
//! so only configuration and identity errors normally reach a caller.

use thiserror::Error;

use crate::config::ConfigError;
use crate::identity::{AuthFailure, IdentityError};
use crate::store::{RecordError, StoreError};

/// Top-level error type for the client state layer.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// The persisted store refused an operation.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A stored record could not be used.
    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    /// Login, logout, or an access check failed.
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),
}

impl ClientError {
    /// Message suitable for showing to the user.
    ///
    /// Internal details are not exposed; the error itself is reported to
    /// Sentry when it is not the user's fault.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(_) | Self::Record(_) => {
                let event_id = sentry::capture_error(self);
                tracing::error!(error = %self, sentry_event_id = %event_id, "Client error");
                "Something went wrong. Please try again.".to_string()
            }
            Self::Store(_) => "Your changes could not be saved on this device.".to_string(),
            Self::Identity(err) => match err {
                IdentityError::Auth(AuthFailure::MissingFields) => {
                    "Username and password are required".to_string()
                }
                IdentityError::Auth(AuthFailure::WeakSecret { min }) => {
                    format!("Password must be at least {min} characters")
                }
                IdentityError::Auth(AuthFailure::InvalidCredentials) => {
                    "Invalid username or password".to_string()
                }
                IdentityError::Auth(AuthFailure::AccountInactive) => {
                    "Account is inactive. Contact support.".to_string()
                }
                IdentityError::Auth(AuthFailure::Unavailable(_)) => {
                    "Login is unavailable right now".to_string()
                }
                IdentityError::ProviderSignOutFailed(_) => {
                    "Could not log out. Please try again.".to_string()
                }
                IdentityError::LogoutInProgress => "Logging out...".to_string(),
                IdentityError::NotAuthenticated => "Please log in".to_string(),
                IdentityError::Forbidden => "Administrator access required".to_string(),
            },
        }
    }
}

/// Set the Sentry user context from a user ID.
///
/// Called whenever the current user changes so errors are associated with them.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("product_id", "p1")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_display() {
        let err = ClientError::from(ConfigError::MissingEnvVar("TECHLAND_CART_KEY".to_string()));
        assert_eq!(
            err.to_string(),
            "Config error: Missing environment variable: TECHLAND_CART_KEY"
        );

        let err = ClientError::from(IdentityError::Forbidden);
        assert_eq!(
            err.to_string(),
            "Identity error: administrator access required"
        );
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(
            ClientError::from(IdentityError::from(AuthFailure::WeakSecret { min: 6 }))
                .user_message(),
            "Password must be at least 6 characters"
        );
        assert_eq!(
            ClientError::from(IdentityError::Auth(AuthFailure::InvalidCredentials)).user_message(),
            "Invalid username or password"
        );
        assert_eq!(
            ClientError::from(StoreError::Disabled).user_message(),
            "Your changes could not be saved on this device."
        );
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = ClientError::from(ConfigError::InvalidEnvVar(
            "TECHLAND_STORAGE_QUOTA_BYTES".to_string(),
            "invalid digit".to_string(),
        ));
        assert!(!err.user_message().contains("invalid digit"));
    }

    #[test]
    fn test_sentry_helpers_without_client() {
        set_sentry_user(&"u1", Some("ana@x.co"));
        add_breadcrumb("cart", "Added item", Some(&[("product_id", "p1")]));
        clear_sentry_user();
    }
}
