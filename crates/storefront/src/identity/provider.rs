//! OAuth provider session observable.
//!
//! The provider owns its own session (cookies, tokens) and only reports what
//! it currently knows about the user. The resolver watches that report and
//! asks the provider to end its session on logout.

use std::rc::Rc;
use std::sync::Arc;

use tokio::sync::watch;

use techland_core::ProviderIdentity;

use super::error::ProviderError;

/// What the provider currently knows about the user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProviderStatus {
    /// Still resolving its session.
    #[default]
    Loading,
    /// No provider session.
    Unauthenticated,
    /// Signed in.
    Authenticated(ProviderIdentity),
}

impl ProviderStatus {
    /// The signed-in identity, if any.
    #[must_use]
    pub const fn identity(&self) -> Option<&ProviderIdentity> {
        match self {
            Self::Authenticated(identity) => Some(identity),
            Self::Loading | Self::Unauthenticated => None,
        }
    }

    /// Whether the provider is still resolving.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// An OAuth provider as seen by the identity resolver.
pub trait IdentityProvider {
    /// Subscribe to status changes.
    ///
    /// The receiver starts with the current status marked as seen.
    fn status(&self) -> watch::Receiver<ProviderStatus>;

    /// End the provider's own session.
    ///
    /// Retrying after a failure must be safe.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` if the provider could not sign out.
    async fn sign_out(&self) -> Result<(), ProviderError>;
}

impl<P: IdentityProvider> IdentityProvider for Rc<P> {
    fn status(&self) -> watch::Receiver<ProviderStatus> {
        (**self).status()
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        (**self).sign_out().await
    }
}

/// Provider whose status is pushed by the embedding application.
///
/// Cheaply cloneable; clones publish to the same observers.
#[derive(Debug, Clone)]
pub struct WatchProvider {
    tx: Arc<watch::Sender<ProviderStatus>>,
}

impl Default for WatchProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchProvider {
    /// Create a provider that is still resolving its session.
    #[must_use]
    pub fn new() -> Self {
        Self::with_status(ProviderStatus::Loading)
    }

    /// Create a provider that already knows there is no session.
    #[must_use]
    pub fn signed_out() -> Self {
        Self::with_status(ProviderStatus::Unauthenticated)
    }

    fn with_status(status: ProviderStatus) -> Self {
        let (tx, _rx) = watch::channel(status);
        Self { tx: Arc::new(tx) }
    }

    /// Report a signed-in identity.
    pub fn sign_in(&self, identity: ProviderIdentity) {
        self.tx.send_replace(ProviderStatus::Authenticated(identity));
    }

    /// Report that the provider session ended outside of a logout, e.g. expiry.
    pub fn invalidate(&self) {
        self.tx.send_replace(ProviderStatus::Unauthenticated);
    }

    /// The status observers currently see.
    #[must_use]
    pub fn current(&self) -> ProviderStatus {
        self.tx.borrow().clone()
    }
}

impl IdentityProvider for WatchProvider {
    fn status(&self) -> watch::Receiver<ProviderStatus> {
        self.tx.subscribe()
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        tracing::debug!("Provider signing out");
        self.tx.send_replace(ProviderStatus::Unauthenticated);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_helpers() {
        assert!(ProviderStatus::Loading.is_loading());
        assert!(ProviderStatus::Loading.identity().is_none());
        let status = ProviderStatus::Authenticated(ProviderIdentity::new("Ana", "ana@x.co"));
        assert_eq!(status.identity().unwrap().email.as_deref(), Some("ana@x.co"));
    }

    #[test]
    fn test_sign_in_marks_receiver_changed() {
        let provider = WatchProvider::new();
        let mut rx = provider.status();
        assert!(!rx.has_changed().unwrap());

        provider.sign_in(ProviderIdentity::new("Ana", "ana@x.co"));
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().identity().is_some());
    }

    #[tokio::test]
    async fn test_sign_out_is_idempotent() {
        let provider = WatchProvider::new();
        provider.sign_in(ProviderIdentity::new("Ana", "ana@x.co"));

        provider.sign_out().await.unwrap();
        provider.sign_out().await.unwrap();
        assert_eq!(provider.current(), ProviderStatus::Unauthenticated);
    }
}
