//! Techland storefront client state.
//!
//! Keeps a shopper's cart and identity consistent across page reloads and
//! across tabs that share one browser profile. Each tab builds a
//! [`state::StorefrontContext`] over its own handle on the profile's
//! persisted store; the tabs never talk to each other directly, they only
//! see each other's writes through storage events.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod config;
pub mod error;
pub mod identity;
pub mod notify;
pub mod state;
pub mod store;
