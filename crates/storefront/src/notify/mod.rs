//! Change notification.
//!
//! Two channels with different reach:
//! - [`CrossTabNotifier`] carries persisted-store changes made by *other* tabs,
//!   keyed by storage key, with the new raw value as payload.
//! - [`SignalBus`] carries payload-free "something changed" signals to
//!   observers in the *same* tab.

pub mod signals;
pub mod storage;

pub use signals::{SignalBus, Subscription, Topic};
pub use storage::CrossTabNotifier;
