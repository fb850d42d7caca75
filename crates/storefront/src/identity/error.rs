//! Identity error types.

use thiserror::Error;

/// Reasons the credential exchange refused a login.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    /// Identifier or secret missing.
    #[error("username and password are required")]
    MissingFields,

    /// Secret shorter than the minimum length.
    #[error("password must be at least {min} characters")]
    WeakSecret {
        /// Minimum accepted length.
        min: usize,
    },

    /// Wrong identifier or secret.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// The account exists but is disabled.
    #[error("account is inactive")]
    AccountInactive,

    /// The exchange could not be reached or failed internally.
    #[error("credential exchange unavailable: {0}")]
    Unavailable(String),
}

/// The provider could not complete a sign-out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("provider error: {0}")]
pub struct ProviderError(pub String);

/// Errors surfaced by the identity resolver.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Provider sign-out failed; the session is unchanged and the caller may retry.
    #[error("provider sign-out failed: {0}")]
    ProviderSignOutFailed(#[source] ProviderError),

    /// A logout is already waiting on the provider.
    #[error("a logout is already in progress")]
    LogoutInProgress,

    /// Credential login was refused.
    #[error("login failed: {0}")]
    Auth(#[from] AuthFailure),

    /// Nobody is logged in.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The current user lacks the required role.
    #[error("administrator access required")]
    Forbidden,
}
