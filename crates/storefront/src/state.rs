//! Per-tab client state.
//!
//! A [`StorefrontContext`] is created when a tab starts and owns everything
//! that tab needs: its store handle, cross-tab notifier, in-tab signal bus,
//! cart manager, and identity resolver. Dropping it unsubscribes all of them.

use std::rc::Rc;

use crate::cart::CartManager;
use crate::config::ClientConfig;
use crate::identity::{IdentityProvider, IdentityResolver};
use crate::notify::{CrossTabNotifier, SignalBus, Subscription, Topic};
use crate::store::{BrowserProfile, PersistedStore, Tab, TabId, TabStore};

/// Client state of one tab.
pub struct StorefrontContext<P: IdentityProvider + 'static> {
    tab: TabId,
    store: Rc<TabStore>,
    notifier: CrossTabNotifier,
    signals: SignalBus,
    cart: CartManager,
    identity: IdentityResolver<P>,
}

impl<P: IdentityProvider + 'static> std::fmt::Debug for StorefrontContext<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorefrontContext")
            .field("tab", &self.tab)
            .field("cart", &self.cart)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl<P: IdentityProvider + 'static> StorefrontContext<P> {
    /// Build the context for an already opened tab.
    pub fn new(config: &ClientConfig, tab: Tab, provider: P) -> Self {
        let tab_id = tab.id();
        let (store, inbox) = tab.into_parts();
        let store = Rc::new(store);
        let notifier = CrossTabNotifier::new(inbox);
        let signals = SignalBus::new();

        let cart = CartManager::new(
            config.storage.cart_key.clone(),
            Rc::clone(&store) as Rc<dyn PersistedStore>,
            &notifier,
            signals.clone(),
        );
        let identity = IdentityResolver::new(
            &config.identity,
            config.storage.session_key.clone(),
            Rc::clone(&store) as Rc<dyn PersistedStore>,
            &notifier,
            signals.clone(),
            provider,
        );

        tracing::debug!(tab = %tab_id, "Opened tab");
        Self {
            tab: tab_id,
            store,
            notifier,
            signals,
            cart,
            identity,
        }
    }

    /// Open a new tab on `profile` and build its context.
    pub fn open(profile: &BrowserProfile, config: &ClientConfig, provider: P) -> Self {
        Self::new(config, profile.open_tab(), provider)
    }

    /// This tab's identifier.
    #[must_use]
    pub const fn tab_id(&self) -> TabId {
        self.tab
    }

    /// The cart.
    #[must_use]
    pub const fn cart(&self) -> &CartManager {
        &self.cart
    }

    /// The identity resolver.
    #[must_use]
    pub const fn identity(&self) -> &IdentityResolver<P> {
        &self.identity
    }

    /// The in-tab signal bus.
    #[must_use]
    pub const fn signals(&self) -> &SignalBus {
        &self.signals
    }

    /// The cross-tab notifier.
    #[must_use]
    pub const fn notifier(&self) -> &CrossTabNotifier {
        &self.notifier
    }

    /// This tab's handle on the persisted store.
    #[must_use]
    pub fn store(&self) -> &TabStore {
        &self.store
    }

    /// Run `handler` whenever the cart changes.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn on_cart_changed(&self, handler: impl Fn() + 'static) -> Subscription {
        self.signals.on(Topic::CartChanged, handler)
    }

    /// Run `handler` whenever the current user may have changed.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn on_session_changed(&self, handler: impl Fn() + 'static) -> Subscription {
        self.signals.on(Topic::SessionChanged, handler)
    }

    /// Take in everything that happened outside this tab so far.
    ///
    /// Delivers waiting storage events and any provider status change.
    /// Returns the number of changes applied.
    pub fn pump(&self) -> usize {
        let events = self.notifier.dispatch_pending();
        let provider = usize::from(self.identity.poll_provider());
        events + provider
    }

    /// Wait for the next outside change and apply it.
    ///
    /// Returns `false` if the source that woke the tab has gone away: the
    /// profile for storage events, or the provider.
    pub async fn next_event(&self) -> bool {
        tokio::select! {
            delivered = self.notifier.dispatch_next() => delivered,
            changed = self.identity.next_provider_change() => changed,
        }
    }
}
