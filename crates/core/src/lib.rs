//! Techland Core - Shared domain types.
//!
//! This crate provides the values shared by every Techland client component:
//! - `storefront` - Cart manager, identity resolver and the persisted store they share
//! - `cli` - Command-line shell over a file-backed browser profile
//!
//! # Architecture
//!
//! The core crate contains only types and pure arithmetic - no I/O, no
//! storage, no notification. This keeps it lightweight and allows it to be
//! used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, roles, cart state and user sessions

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
