//! Cart state manager.
//!
//! Owns the tab's copy of the cart. Every mutation writes the full cart back
//! to the persisted store before returning, so the store is the durable record
//! and the in-memory copy is a cache of it. Changes committed by other tabs
//! arrive through the cross-tab notifier and replace the cache wholesale;
//! concurrent edits from two tabs are not merged, the last committed write
//! wins.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::instrument;

use techland_core::{CartLine, CartState, MAX_QUANTITY, Price, ProductId};

use crate::error::add_breadcrumb;
use crate::notify::{CrossTabNotifier, SignalBus, Subscription, Topic};
use crate::store::{PersistedStore, Record};

/// The cart of one tab.
pub struct CartManager {
    inner: Rc<CartInner>,
    _storage_subscription: Subscription,
}

struct CartInner {
    key: String,
    state: RefCell<CartState>,
    store: Rc<dyn PersistedStore>,
    signals: SignalBus,
}

impl std::fmt::Debug for CartManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartManager")
            .field("key", &self.inner.key)
            .field("state", &self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

impl CartManager {
    /// Create the manager, hydrating from the store.
    ///
    /// An absent record gives an empty cart. A malformed record also gives an
    /// empty cart and is removed from the store. The manager then follows
    /// changes other tabs make to `key`.
    pub fn new(
        key: impl Into<String>,
        store: Rc<dyn PersistedStore>,
        notifier: &CrossTabNotifier,
        signals: SignalBus,
    ) -> Self {
        let inner = Rc::new(CartInner {
            key: key.into(),
            state: RefCell::new(CartState::new()),
            store,
            signals,
        });

        let raw = inner.read_raw();
        let (state, malformed) = inner.decode(raw.as_deref());
        if malformed && let Err(e) = inner.store.remove(&inner.key) {
            tracing::warn!(key = %inner.key, error = %e, "Could not purge malformed cart record");
        }
        tracing::debug!(key = %inner.key, lines = state.lines().len(), "Hydrated cart");
        *inner.state.borrow_mut() = state;

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

    /// Add one unit of a product.
    ///
    /// Increments the existing line or appends a new line with quantity 1.
    #[instrument(skip_all, fields(product_id = %product_id))]
    pub fn add_line(
        &self,
        product_id: ProductId,
        name: impl Into<String>,
        unit_price: Price,
        image_ref: impl Into<String>,
    ) {
        let (name, image_ref) = (name.into(), image_ref.into());
        add_breadcrumb("cart", "Added item", Some(&[("product_id", product_id.as_str())]));
        let id = product_id.clone();
        let mut added = true;
        self.inner.mutate(|cart| added = cart.add_line(product_id, name, unit_price, image_ref));
        if !added {
            tracing::warn!(product_id = %id, max = MAX_QUANTITY, "Line already at maximum quantity");
        }
    }

    /// Remove a product's line; does nothing if it is not in the cart.
    #[instrument(skip_all, fields(product_id = %product_id))]
    pub fn remove_line(&self, product_id: &ProductId) {
        add_breadcrumb("cart", "Removed item", Some(&[("product_id", product_id.as_str())]));
        self.inner.mutate(|cart| {
            cart.remove_line(product_id);
        });
    }

    /// Replace a line's quantity; zero or less removes the line.
    ///
    /// Stock is not consulted here.
    #[instrument(skip_all, fields(product_id = %product_id, quantity = quantity))]
    pub fn set_quantity(&self, product_id: &ProductId, quantity: i64) {
        add_breadcrumb(
            "cart",
            "Set quantity",
            Some(&[
                ("product_id", product_id.as_str()),
                ("quantity", &quantity.to_string()),
            ]),
        );
        if quantity > i64::from(MAX_QUANTITY) {
            tracing::warn!(max = MAX_QUANTITY, "Quantity clamped to maximum");
        }
        self.inner.mutate(|cart| cart.set_quantity(product_id, quantity));
    }

    /// Remove every line.
    #[instrument(skip_all)]
    pub fn clear(&self) {
        add_breadcrumb("cart", "Cleared cart", None);
        self.inner.mutate(CartState::clear);
    }

    /// Sum of all quantities.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.inner.state.borrow().item_count()
    }

    /// Sum of `unit_price * quantity` over all lines.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.inner.state.borrow().subtotal()
    }

    /// Snapshot of the lines in display order.
    #[must_use]
    pub fn lines(&self) -> Vec<CartLine> {
        self.inner.state.borrow().lines().to_vec()
    }

    /// Snapshot of the whole cart.
    #[must_use]
    pub fn snapshot(&self) -> CartState {
        self.inner.state.borrow().clone()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.state.borrow().is_empty()
    }

    /// Store key the cart is persisted under.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.inner.key
    }
}

impl CartInner {
    /// Apply a change, persist the result, then tell same-tab observers.
    fn mutate(&self, change: impl FnOnce(&mut CartState)) {
        let encoded = {
            let mut state = self.state.borrow_mut();
            change(&mut state);
            state.encode()
        };

        match encoded {
            Ok(raw) => {
                if let Err(e) = self.store.write(&self.key, &raw) {
                    tracing::warn!(key = %self.key, error = %e, "Cart not persisted; continuing in memory");
                }
            }
            Err(e) => tracing::error!(key = %self.key, error = %e, "Could not encode cart"),
        }

        self.signals.publish(Topic::CartChanged);
    }

    /// Replace the cache after another tab changed the cart.
    ///
    /// Reads the store again; if it is unavailable, falls back to the value
    /// carried by the event.
    fn rehydrate(&self, new_value: Option<&str>) {
        let raw = match self.store.read(&self.key) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Store unavailable; using event payload");
                new_value.map(str::to_owned)
            }
        };

        let (state, _) = self.decode(raw.as_deref());
        tracing::debug!(key = %self.key, lines = state.lines().len(), "Re-hydrated cart from another tab");
        *self.state.borrow_mut() = state;
        self.signals.publish(Topic::CartChanged);
    }

    fn read_raw(&self) -> Option<String> {
        self.store.read(&self.key).unwrap_or_else(|e| {
            tracing::warn!(key = %self.key, error = %e, "Store unavailable; starting with empty cart");
            None
        })
    }

    /// Decode a raw record; the flag reports whether it was malformed.
    fn decode(&self, raw: Option<&str>) -> (CartState, bool) {
        let Some(raw) = raw else {
            return (CartState::new(), false);
        };

        match CartState::decode(raw) {
            Ok(state) => (state, false),
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Ignoring malformed cart record");
                (CartState::new(), true)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;
    use std::sync::{Arc, Mutex};

    use rust_decimal::Decimal;
    use tracing::field::{Field, Visit};
    use tracing::span::{Attributes, Id};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    use super::*;
    use crate::config::StorageConfig;
    use crate::store::{BrowserProfile, StoreError, TabStore};

    const KEY: &str = "techland_cart";

    struct Harness {
        profile: BrowserProfile,
        store: TabStore,
        notifier: CrossTabNotifier,
        signals: SignalBus,
    }

    fn harness(profile: &BrowserProfile) -> Harness {
        let (store, inbox) = profile.open_tab().into_parts();
        Harness {
            profile: profile.clone(),
            store,
            notifier: CrossTabNotifier::new(inbox),
            signals: SignalBus::new(),
        }
    }

    impl Harness {
        fn manager(&self) -> CartManager {
            CartManager::new(
                KEY,
                Rc::new(self.store.clone()),
                &self.notifier,
                self.signals.clone(),
            )
        }
    }

    fn profile() -> BrowserProfile {
        BrowserProfile::in_memory(&StorageConfig::default())
    }

    /// Collects the fields of every span opened while it is installed.
    struct SpanFields(Arc<Mutex<Vec<(String, String)>>>);

    impl<S: tracing::Subscriber> Layer<S> for SpanFields {
        fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
            let mut fields = self.0.lock().unwrap();
            attrs.record(&mut FieldList(&mut fields));
        }
    }

    struct FieldList<'a>(&'a mut Vec<(String, String)>);

    impl Visit for FieldList<'_> {
        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            self.0.push((field.name().to_string(), format!("{value:?}")));
        }
    }

    fn mouse(cart: &CartManager) {
        cart.add_line(ProductId::new("p1"), "Mouse", Price::from_units(20), "img");
    }

    #[test]
    fn test_example_scenario() {
        let tab = harness(&profile());
        let cart = tab.manager();

        mouse(&cart);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity, 1);
        assert_eq!(cart.subtotal(), Price::from_units(20));

        mouse(&cart);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity, 2);
        assert_eq!(cart.subtotal(), Price::from_units(40));

        cart.set_quantity(&ProductId::new("p1"), 0);
        assert!(cart.is_empty());
        assert_eq!(tab.store.read(KEY).unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_mutations_write_through() {
        let tab = harness(&profile());
        let cart = tab.manager();

        mouse(&cart);
        cart.add_line(
            ProductId::new("p2"),
            "Keyboard",
            Price::new(Decimal::new(4550, 2)).unwrap(),
            "kb.png",
        );

        let stored = CartState::decode(&tab.store.read(KEY).unwrap().unwrap()).unwrap();
        assert_eq!(stored, cart.snapshot());
    }

    #[test]
    fn test_hydrates_from_store() {
        let profile = profile();
        let first = harness(&profile);
        let cart = first.manager();
        mouse(&cart);
        mouse(&cart);
        drop(cart);

        let reloaded = harness(&profile).manager();
        assert_eq!(reloaded.item_count(), 2);
    }

    #[test]
    fn test_malformed_record_gives_empty_cart_and_is_purged() {
        let tab = harness(&profile());
        tab.store.write(KEY, "{oops").unwrap();

        let cart = tab.manager();
        assert!(cart.is_empty());
        assert_eq!(tab.store.read(KEY).unwrap(), None);
    }

    #[test]
    fn test_every_mutation_signals_once() {
        let tab = harness(&profile());
        let cart = tab.manager();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let _sub = tab
            .signals
            .on(Topic::CartChanged, move || counter.set(counter.get() + 1));

        mouse(&cart);
        cart.remove_line(&ProductId::new("missing"));
        cart.set_quantity(&ProductId::new("p1"), 5);
        cart.clear();

        assert_eq!(hits.get(), 4);
    }

    #[test]
    fn test_observer_sees_new_state_during_signal() {
        let tab = harness(&profile());
        let cart = Rc::new(tab.manager());
        let seen = Rc::new(Cell::new(0));

        let (observer_cart, observer_seen) = (Rc::clone(&cart), Rc::clone(&seen));
        let _sub = tab.signals.on(Topic::CartChanged, move || {
            observer_seen.set(observer_cart.item_count());
        });

        mouse(&cart);
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn test_unavailable_store_keeps_working_in_memory() {
        let tab = harness(&profile());
        tab.profile.set_disabled(true);

        let cart = tab.manager();
        mouse(&cart);
        mouse(&cart);
        assert_eq!(cart.item_count(), 2);

        tab.profile.set_disabled(false);
        assert_eq!(tab.store.read(KEY).unwrap(), None);
    }

    #[test]
    fn test_quota_exceeded_keeps_memory_state() {
        let config = StorageConfig {
            quota_bytes: 64,
            ..StorageConfig::default()
        };
        let tab = harness(&BrowserProfile::in_memory(&config));
        let cart = tab.manager();

        cart.add_line(ProductId::new("p1"), "x".repeat(100), Price::ZERO, "img");
        assert_eq!(cart.item_count(), 1);
        assert!(matches!(
            tab.store.write(KEY, &"x".repeat(100)),
            Err(StoreError::QuotaExceeded { .. })
        ));
    }

    #[test]
    fn test_add_at_max_quantity_still_signals_and_keeps_cart() {
        let tab = harness(&profile());
        let cart = tab.manager();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let _sub = tab
            .signals
            .on(Topic::CartChanged, move || counter.set(counter.get() + 1));

        mouse(&cart);
        cart.set_quantity(&ProductId::new("p1"), i64::from(MAX_QUANTITY) + 10);
        mouse(&cart);

        assert_eq!(hits.get(), 3);
        assert_eq!(cart.item_count(), u64::from(MAX_QUANTITY));
        let stored = CartState::decode(&tab.store.read(KEY).unwrap().unwrap()).unwrap();
        assert_eq!(stored, cart.snapshot());
    }

    #[test]
    fn test_set_quantity_span_records_quantity() {
        let fields = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(SpanFields(Arc::clone(&fields)));

        let tab = harness(&profile());
        let cart = tab.manager();
        mouse(&cart);
        tracing::subscriber::with_default(subscriber, || {
            cart.set_quantity(&ProductId::new("p1"), 5);
        });

        let fields = fields.lock().unwrap();
        assert!(fields.contains(&("product_id".to_string(), "p1".to_string())));
        assert!(fields.contains(&("quantity".to_string(), "5".to_string())));
    }

    #[test]
    fn test_set_quantity_leaves_breadcrumb() {
        let tab = harness(&profile());
        let cart = tab.manager();
        mouse(&cart);

        let events = sentry::test::with_captured_events(|| {
            cart.set_quantity(&ProductId::new("p1"), 3);
            sentry::capture_message("checkout", sentry::Level::Info);
        });

        let event = events.first().unwrap();
        let crumb = event
            .breadcrumbs
            .values
            .iter()
            .find(|crumb| crumb.message.as_deref() == Some("Set quantity"))
            .unwrap();
        assert_eq!(crumb.data["quantity"], "3");
        assert_eq!(crumb.data["product_id"], "p1");
    }

    #[test]
    fn test_falls_back_to_event_value_when_store_unreadable() {
        let profile = profile();
        let a = harness(&profile);
        let b = harness(&profile);
        let cart_a = a.manager();
        let cart_b = b.manager();

        mouse(&cart_a);
        mouse(&cart_a);
        profile.set_disabled(true);

        b.notifier.dispatch_pending();
        assert_eq!(cart_b.item_count(), 2);
        assert_eq!(cart_b.snapshot(), cart_a.snapshot());
    }

    #[test]
    fn test_follows_other_tab() {
        let profile = profile();
        let a = harness(&profile);
        let b = harness(&profile);
        let cart_a = a.manager();
        let cart_b = b.manager();

        mouse(&cart_a);
        assert_eq!(cart_b.item_count(), 0);

        b.notifier.dispatch_pending();
        assert_eq!(cart_b.item_count(), 1);
    }

    #[test]
    fn test_other_tab_clearing_key_empties_cart() {
        let profile = profile();
        let a = harness(&profile);
        let b = harness(&profile);
        let cart_b = b.manager();
        mouse(&cart_b);
        a.notifier.dispatch_pending();

        a.store.remove(KEY).unwrap();
        b.notifier.dispatch_pending();
        assert!(cart_b.is_empty());
    }
}
