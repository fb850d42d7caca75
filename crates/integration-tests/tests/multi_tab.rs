//! Tabs sharing one browser profile.
//!
//! Tabs only learn about each other's writes when they take in storage
//! events (`pump` / `next_event`). Concurrent cart edits are not merged: the
//! last committed write wins and the other tab's delta is lost.

#![allow(clippy::unwrap_used)]

use std::cell::Cell;
use std::rc::Rc;

use techland_core::{Price, ProviderIdentity, provider_user_id};
use techland_integration_tests::{
    add, admin, customer, keyboard, memory_profile, mouse, open_tab, open_tab_with,
};
use techland_storefront::identity::{AuthState, WatchProvider};
use techland_storefront::store::{PersistedStore, Record};

// =============================================================================
// Cart Synchronization
// =============================================================================

#[test]
fn test_other_tab_sees_cart_after_pump() {
    let profile = memory_profile();
    let a = open_tab(&profile);
    let b = open_tab(&profile);

    add(&a, &mouse());
    add(&a, &mouse());
    assert_eq!(b.cart().item_count(), 0);

    b.pump();
    assert_eq!(b.cart().item_count(), 2);
    assert_eq!(b.cart().subtotal(), Price::from_units(40));
    assert_eq!(b.cart().snapshot(), a.cart().snapshot());
}

#[test]
fn test_concurrent_edits_last_write_wins() {
    let profile = memory_profile();
    let a = open_tab(&profile);
    let b = open_tab(&profile);

    // Neither tab has seen the other's write when it commits its own.
    add(&a, &mouse());
    add(&b, &keyboard());

    a.pump();
    b.pump();

    for tab in [&a, &b] {
        let lines = tab.cart().lines();
        assert_eq!(lines.len(), 1, "mouse delta from tab A is lost, not merged");
        assert_eq!(lines.first().unwrap().product_id, keyboard().id);
    }
}

#[test]
fn test_clear_propagates() {
    let profile = memory_profile();
    let a = open_tab(&profile);
    let b = open_tab(&profile);

    add(&a, &mouse());
    b.pump();
    assert!(!b.cart().is_empty());

    a.cart().clear();
    b.pump();
    assert!(b.cart().is_empty());
}

#[test]
fn test_cart_observer_fires_for_other_tab_change() {
    let profile = memory_profile();
    let a = open_tab(&profile);
    let b = open_tab(&profile);

    let hits = Rc::new(Cell::new(0));
    let counter = Rc::clone(&hits);
    let _sub = b.on_cart_changed(move || counter.set(counter.get() + 1));

    add(&a, &mouse());
    assert_eq!(hits.get(), 0);

    b.pump();
    assert_eq!(hits.get(), 1);
    assert_eq!(b.cart().item_count(), 1);
}

#[test]
fn test_newly_opened_tab_hydrates_from_store() {
    let profile = memory_profile();
    let a = open_tab(&profile);
    add(&a, &mouse());
    add(&a, &keyboard());

    let late = open_tab(&profile);
    assert_eq!(late.cart().item_count(), 2);
    assert_eq!(late.pump(), 0);
}

#[tokio::test]
async fn test_next_event_waits_for_other_tab() {
    let profile = memory_profile();
    let a = open_tab(&profile);
    let b = open_tab(&profile);

    add(&a, &keyboard());
    assert!(b.next_event().await);
    assert_eq!(b.cart().subtotal(), Price::from_units(150));
}

// =============================================================================
// Session Synchronization
// =============================================================================

#[tokio::test]
async fn test_login_and_logout_follow_across_tabs() {
    let profile = memory_profile();
    let a = open_tab(&profile);
    let b = open_tab(&profile);

    a.identity().login(customer("u1"));
    b.pump();
    assert_eq!(b.identity().current_user().unwrap().id.as_str(), "u1");

    a.identity().logout().await.unwrap();
    b.pump();
    assert!(b.identity().current_user().is_none());
    assert_eq!(b.identity().state(), AuthState::Unauthenticated);
}

#[test]
fn test_session_observer_fires_for_other_tab_login() {
    let profile = memory_profile();
    let a = open_tab(&profile);
    let b = open_tab(&profile);

    let hits = Rc::new(Cell::new(0));
    let counter = Rc::clone(&hits);
    let _sub = b.on_session_changed(move || counter.set(counter.get() + 1));

    a.identity().login(admin("a1"));
    b.pump();

    assert_eq!(hits.get(), 1);
    assert!(b.identity().is_admin());
}

// =============================================================================
// Precedence
// =============================================================================

#[test]
fn test_login_then_provider_identity_appears() {
    let profile = memory_profile();
    let provider = WatchProvider::new();
    let tab = open_tab_with(&profile, provider.clone());

    tab.identity().login(customer("u1"));
    assert_eq!(tab.identity().current_user().unwrap().id.as_str(), "u1");

    provider.sign_in(ProviderIdentity::new("Gina", "gina@gmail.com"));
    tab.pump();

    assert_eq!(
        tab.identity().current_user().unwrap().id,
        provider_user_id("google")
    );
    // The local session is dormant, still stored.
    let raw = tab.store().read("userSession").unwrap().unwrap();
    assert_eq!(
        techland_core::UserSession::decode(&raw).unwrap().id.as_str(),
        "u1"
    );
}

#[test]
fn test_provider_identity_then_login() {
    let profile = memory_profile();
    let provider = WatchProvider::new();
    provider.sign_in(ProviderIdentity::new("Gina", "gina@gmail.com"));
    let tab = open_tab_with(&profile, provider);

    tab.identity().login(admin("a1"));

    assert_eq!(tab.identity().state(), AuthState::Provider);
    assert_eq!(
        tab.identity().current_user().unwrap().id,
        provider_user_id("google")
    );
    assert!(!tab.identity().is_admin());
}

#[test]
fn test_other_tab_login_stays_dormant_under_provider() {
    let profile = memory_profile();
    let provider = WatchProvider::new();
    provider.sign_in(ProviderIdentity::new("Gina", "gina@gmail.com"));
    let a = open_tab(&profile);
    let b = open_tab_with(&profile, provider.clone());

    a.identity().login(customer("u1"));
    b.pump();
    assert_eq!(b.identity().state(), AuthState::Provider);

    provider.invalidate();
    b.pump();
    assert_eq!(b.identity().current_user().unwrap().id.as_str(), "u1");
}
