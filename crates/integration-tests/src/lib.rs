//! Integration tests for Techland client state.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p techland-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `multi_tab` - Tabs sharing one profile: last write wins, cross-tab sync, precedence
//! - `persistence` - File-backed profiles, reloads, unavailable storage
//! - `properties` - Property tests over arbitrary cart operation sequences
//!
//! This crate only holds fixtures shared by the test files.

use chrono::Utc;
use techland_core::{Price, ProductId, Role, UserSession};
use techland_storefront::config::{ClientConfig, StorageConfig};
use techland_storefront::identity::WatchProvider;
use techland_storefront::state::StorefrontContext;
use techland_storefront::store::BrowserProfile;

/// A tab whose provider is pushed by the test.
pub type TestTab = StorefrontContext<WatchProvider>;

/// A product as the catalog would supply it.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: ProductId,
    pub name: &'static str,
    pub price: Price,
    pub image: &'static str,
}

/// The mouse from the storefront's example cart.
#[must_use]
pub fn mouse() -> Product {
    Product {
        id: ProductId::new("p1"),
        name: "Mouse",
        price: Price::from_units(20),
        image: "/img/mouse.png",
    }
}

/// A keyboard.
#[must_use]
pub fn keyboard() -> Product {
    Product {
        id: ProductId::new("p2"),
        name: "Keyboard",
        price: Price::from_units(150),
        image: "/img/keyboard.png",
    }
}

/// Add one unit of `product` to `tab`'s cart.
pub fn add(tab: &TestTab, product: &Product) {
    tab.cart()
        .add_line(product.id.clone(), product.name, product.price, product.image);
}

/// An in-memory profile with default settings.
#[must_use]
pub fn memory_profile() -> BrowserProfile {
    BrowserProfile::in_memory(&StorageConfig::default())
}

/// Open a tab on `profile` with a provider that has no session.
#[must_use]
pub fn open_tab(profile: &BrowserProfile) -> TestTab {
    open_tab_with(profile, WatchProvider::signed_out())
}

/// Open a tab on `profile` observing `provider`.
#[must_use]
pub fn open_tab_with(profile: &BrowserProfile, provider: WatchProvider) -> TestTab {
    StorefrontContext::open(profile, &ClientConfig::default(), provider)
}

/// A local customer session.
#[must_use]
pub fn customer(id: &str) -> UserSession {
    UserSession::new(id, "ana", "Ana", "ana@techland.co", Role::Customer, Utc::now())
}

/// A local administrator session.
#[must_use]
pub fn admin(id: &str) -> UserSession {
    UserSession::new(id, "root", "Root", "root@techland.co", Role::Admin, Utc::now())
}
