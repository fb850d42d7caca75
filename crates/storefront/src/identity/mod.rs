//! Identity resolver.
//!
//! Two sources can authenticate a user: the OAuth provider, which owns its
//! session and is only observed, and the shop's credential exchange, whose
//! session is persisted locally under the session key. The resolver collapses
//! both into one current [`UserSession`]; the provider wins whenever it
//! reports an identity, leaving any local session dormant underneath.
//!
//! # Example
//!
//! ```rust,ignore
//! let identity = IdentityResolver::new(&config.identity, &config.storage.session_key,
//!     store, &notifier, signals, WatchProvider::new());
//!
//! identity.login_with_credentials(&exchange, &CredentialForm::new("ana", "secret1")).await?;
//! assert!(identity.is_authenticated());
//!
//! let redirect = identity.logout().await?;
//! ```

mod credentials;
mod error;
mod exchange;
mod provider;

pub use credentials::{CredentialExchange, CredentialForm, MIN_SECRET_LENGTH};
pub use error::{AuthFailure, IdentityError, ProviderError};
pub use exchange::HttpCredentialExchange;
pub use provider::{IdentityProvider, ProviderStatus, WatchProvider};

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use chrono::Utc;
use tokio::sync::watch;
use tracing::instrument;

use techland_core::{ProviderIdentity, SessionSource, UserSession};

use crate::config::IdentityConfig;
use crate::error::{add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::notify::{CrossTabNotifier, SignalBus, Subscription, Topic};
use crate::store::{PersistedStore, Record};

/// Which source the current user comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// Nobody is logged in.
    Unauthenticated,
    /// The OAuth provider reports an identity.
    Provider,
    /// A locally persisted session and no provider identity.
    Local,
}

/// Resolves the current user of one tab.
pub struct IdentityResolver<P: IdentityProvider> {
    inner: Rc<ResolverInner<P>>,
    _storage_subscription: Subscription,
}

struct ResolverInner<P> {
    key: String,
    provider_name: String,
    login_path: String,
    store: Rc<dyn PersistedStore>,
    signals: SignalBus,
    provider: P,
    provider_rx: RefCell<watch::Receiver<ProviderStatus>>,
    provider_status: RefCell<ProviderStatus>,
    /// Normalized provider session, kept while the provider reports the same identity.
    provider_session: RefCell<Option<(ProviderIdentity, UserSession)>>,
    local: RefCell<Option<UserSession>>,
    logout_pending: Cell<bool>,
}

impl<P: IdentityProvider> fmt::Debug for IdentityResolver<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("key", &self.inner.key)
            .field("state", &self.inner.state())
            .field("provider_status", &self.inner.provider_status.borrow())
            .finish_non_exhaustive()
    }
}

impl<P: IdentityProvider + 'static> IdentityResolver<P> {
    /// Create the resolver.
    ///
    /// Hydrates the local session from `key` (absent or malformed gives none;
    /// a malformed record is also removed), takes the provider's current
    /// status, and follows changes other tabs make to `key`.
    pub fn new(
        config: &IdentityConfig,
        key: impl Into<String>,
        store: Rc<dyn PersistedStore>,
        notifier: &CrossTabNotifier,
        signals: SignalBus,
        provider: P,
    ) -> Self {
        let mut provider_rx = provider.status();
        let initial_status = provider_rx.borrow_and_update().clone();

        let inner = Rc::new(ResolverInner {
            key: key.into(),
            provider_name: config.provider_name.clone(),
            login_path: config.login_path.clone(),
            store,
            signals,
            provider,
            provider_rx: RefCell::new(provider_rx),
            provider_status: RefCell::new(ProviderStatus::Loading),
            provider_session: RefCell::new(None),
            local: RefCell::new(None),
            logout_pending: Cell::new(false),
        });

        let raw = inner.read_raw();
        let (local, malformed) = inner.decode(raw.as_deref());
        if malformed && let Err(e) = inner.store.remove(&inner.key) {
            tracing::warn!(key = %inner.key, error = %e, "Could not purge malformed session record");
        }
        *inner.local.borrow_mut() = local;
        inner.apply_provider_status(initial_status);
        tracing::debug!(key = %inner.key, state = ?inner.state(), "Hydrated identity");

        let weak = Rc::downgrade(&inner);
        let storage_subscription = notifier.subscribe(inner.key.clone(), move |new_value| {
            if let Some(inner) = weak.upgrade() {
                inner.rehydrate(new_value);
            }
        });

        Self {
            inner,
            _storage_subscription: storage_subscription,
        }
    }

    /// The current user: the provider identity if there is one, else the local session.
    #[must_use]
    pub fn current_user(&self) -> Option<UserSession> {
        self.inner.current_user()
    }

    /// Which source the current user comes from.
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.inner.state()
    }

    /// Whether anyone is logged in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state() != AuthState::Unauthenticated
    }

    /// Whether the current user is an administrator.
    ///
    /// Provider identities are always customers, so only a local session can be admin.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.current_user().is_some_and(|user| user.is_admin())
    }

    /// Whether the provider is still resolving its session.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.provider_status.borrow().is_loading()
    }

    /// Whether a provider sign-out is in flight.
    #[must_use]
    pub fn is_logout_pending(&self) -> bool {
        self.inner.logout_pending.get()
    }

    /// The current user if they are an administrator.
    ///
    /// # Errors
    ///
    /// - `IdentityError::NotAuthenticated` if nobody is logged in
    /// - `IdentityError::Forbidden` if the current user is not an administrator
    pub fn require_admin(&self) -> Result<UserSession, IdentityError> {
        let user = self.current_user().ok_or(IdentityError::NotAuthenticated)?;
        if user.is_admin() {
            Ok(user)
        } else {
            Err(IdentityError::Forbidden)
        }
    }

    /// Make `session` the local session.
    ///
    /// Persists it under the session key; if the store refuses, the session
    /// is kept in memory only. A provider identity, if present, still wins.
    #[instrument(skip_all, fields(user_id = %session.id, role = %session.role()))]
    pub fn login(&self, session: UserSession) {
        match session.encode() {
            Ok(raw) => {
                if let Err(e) = self.inner.store.write(&self.inner.key, &raw) {
                    tracing::warn!(error = %e, "Session not persisted, keeping it in memory");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Could not encode session"),
        }

        add_breadcrumb("auth", "Logged in", Some(&[("user_id", session.id.as_str())]));
        tracing::info!("User logged in");
        *self.inner.local.borrow_mut() = Some(session);
        self.inner.changed();
    }

    /// Validate `form`, trade it for a session, and log it in.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Auth` if the form is invalid, the exchange
    /// refuses the credentials, or the account is inactive.
    #[instrument(skip_all, fields(identifier = %form.identifier()))]
    pub async fn login_with_credentials<C: CredentialExchange>(
        &self,
        exchange: &C,
        form: &CredentialForm,
    ) -> Result<UserSession, IdentityError> {
        form.validate()?;

        let session = exchange
            .submit_credentials(form.identifier(), form.secret())
            .await
            .inspect_err(|e| tracing::info!(reason = %e, "Credential login refused"))?;

        if !session.active {
            tracing::info!(user_id = %session.id, "Refusing inactive account");
            return Err(AuthFailure::AccountInactive.into());
        }

        self.login(session.clone());
        Ok(session)
    }

    /// End the current session and return the path to navigate to.
    ///
    /// A provider session is ended by the provider; the local session, if
    /// any, then becomes current. A local session is removed from the store
    /// and memory without involving the provider.
    ///
    /// # Errors
    ///
    /// - `IdentityError::LogoutInProgress` if a provider sign-out is already in flight
    /// - `IdentityError::ProviderSignOutFailed` if the provider refused; nothing changes
    #[instrument(skip_all)]
    pub async fn logout(&self) -> Result<String, IdentityError> {
        if self.inner.logout_pending.get() {
            return Err(IdentityError::LogoutInProgress);
        }

        match self.state() {
            AuthState::Provider => {
                let pending = PendingLogout::arm(&self.inner.logout_pending);
                let result = self.inner.provider.sign_out().await;
                drop(pending);

                if let Err(e) = result {
                    tracing::error!(error = %e, "Provider sign-out failed");
                    return Err(IdentityError::ProviderSignOutFailed(e));
                }

                // The provider may already have reported the sign-out; consume it.
                drop(self.inner.provider_rx.borrow_mut().borrow_and_update());
                add_breadcrumb("auth", "Provider signed out", None);
                tracing::info!("Provider session ended");
                self.inner.apply_provider_status(ProviderStatus::Unauthenticated);
                self.inner.changed();
            }
            AuthState::Local => {
                if let Err(e) = self.inner.store.remove(&self.inner.key) {
                    tracing::warn!(error = %e, "Could not remove stored session");
                }
                add_breadcrumb("auth", "Logged out", None);
                tracing::info!("Local session ended");
                *self.inner.local.borrow_mut() = None;
                self.inner.changed();
            }
            AuthState::Unauthenticated => {
                tracing::debug!("Logout without a session");
            }
        }

        Ok(self.inner.login_path.clone())
    }

    /// Take in a provider status change, if one is waiting.
    ///
    /// Returns whether the status changed.
    pub fn poll_provider(&self) -> bool {
        let status = {
            let mut rx = self.inner.provider_rx.borrow_mut();
            match rx.has_changed() {
                Ok(true) => rx.borrow_and_update().clone(),
                Ok(false) | Err(_) => return false,
            }
        };

        tracing::debug!(?status, "Provider status changed");
        self.inner.apply_provider_status(status);
        self.inner.changed();
        true
    }

    /// Wait for the provider's status to change and take it in.
    ///
    /// Returns `false` once the provider has gone away.
    pub async fn next_provider_change(&self) -> bool {
        let mut rx = self.inner.provider_rx.borrow().clone();
        if rx.changed().await.is_err() {
            return false;
        }
        self.poll_provider();
        true
    }

    /// The store key holding the local session.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.inner.key
    }
}

impl<P> ResolverInner<P> {
    fn current_user(&self) -> Option<UserSession> {
        if let Some((_, session)) = self.provider_session.borrow().as_ref() {
            return Some(session.clone());
        }
        self.local.borrow().clone()
    }

    fn state(&self) -> AuthState {
        if self.provider_session.borrow().is_some() {
            AuthState::Provider
        } else if self.local.borrow().is_some() {
            AuthState::Local
        } else {
            AuthState::Unauthenticated
        }
    }

    /// Record `status`, normalizing a provider identity into a session.
    ///
    /// The normalized session is reused while the identity stays the same so
    /// its issue time is stable.
    fn apply_provider_status(&self, status: ProviderStatus) {
        let session = status.identity().map(|identity| {
            let reused = self
                .provider_session
                .borrow()
                .as_ref()
                .filter(|(seen, _)| seen == identity)
                .map(|(_, session)| session.clone());
            let session = reused.unwrap_or_else(|| {
                SessionSource::Provider(identity.clone()).normalize(&self.provider_name, Utc::now())
            });
            (identity.clone(), session)
        });

        *self.provider_session.borrow_mut() = session;
        *self.provider_status.borrow_mut() = status;
    }

    /// Tell observers the current user may have changed.
    fn changed(&self) {
        match self.current_user() {
            Some(user) => {
                let email = Some(user.email.as_str()).filter(|email| !email.is_empty());
                set_sentry_user(&user.id, email);
            }
            None => clear_sentry_user(),
        }
        self.signals.publish(Topic::SessionChanged);
    }

    fn read_raw(&self) -> Option<String> {
        self.store.read(&self.key).unwrap_or_else(|e| {
            tracing::warn!(key = %self.key, error = %e, "Store unavailable, no stored session");
            None
        })
    }

    /// Decode a stored session; the flag reports a malformed record.
    fn decode(&self, raw: Option<&str>) -> (Option<UserSession>, bool) {
        match raw.map(UserSession::decode) {
            None => (None, false),
            Some(Ok(session)) => (Some(session), false),
            Some(Err(e)) => {
                tracing::warn!(key = %self.key, error = %e, "Ignoring malformed session record");
                (None, true)
            }
        }
    }

    /// Follow a session change made by another tab.
    fn rehydrate(&self, new_value: Option<&str>) {
        let raw = match self.store.read(&self.key) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Store unavailable; using event payload");
                new_value.map(str::to_owned)
            }
        };
        let (local, _) = self.decode(raw.as_deref());
        tracing::debug!(key = %self.key, present = local.is_some(), "Session changed in another tab");
        *self.local.borrow_mut() = local;
        self.changed();
    }
}

/// Marks a provider sign-out as in flight until dropped.
struct PendingLogout<'a>(&'a Cell<bool>);

impl<'a> PendingLogout<'a> {
    fn arm(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for PendingLogout<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}
