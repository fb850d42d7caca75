//! Core types for the Techland client state layer.
//!
//! This module provides type-safe wrappers and pure values for the cart and
//! session domains.

pub mod cart;
pub mod id;
pub mod price;
pub mod role;
pub mod session;

pub use cart::{CartLine, CartShapeError, CartState, MAX_QUANTITY};
pub use id::*;
pub use price::{Price, PriceError};
pub use role::Role;
pub use session::{
    DEFAULT_PROVIDER_USERNAME, ProviderIdentity, SessionSource, UserSession, provider_user_id,
};
