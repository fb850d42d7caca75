//! Persisted store adapter.
//!
//! A synchronous, same-origin key-value medium shared by every tab of one
//! browser profile. Managers read and write whole serialized records through
//! [`PersistedStore`]; any [`StoreError`] means the medium is unavailable and
//! the caller carries on memory-only.

pub mod profile;
pub mod record;

use thiserror::Error;

pub use profile::{BrowserProfile, StorageEvent, Tab, TabId, TabStore};
pub use record::{Record, RecordError};

/// Errors raised by the storage medium.
///
/// Every variant means "storage is unavailable right now": callers log it and
/// continue without persisting.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage is disabled for this profile.
    #[error("storage is disabled")]
    Disabled,

    /// The write would exceed the profile's quota.
    #[error("storage quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded {
        /// Bytes the profile would hold after the write.
        needed: usize,
        /// Configured quota.
        quota: usize,
    },

    /// The backing file could not be written.
    #[error("storage backing file error: {0}")]
    Io(#[from] std::io::Error),

    /// Another tab panicked while holding the medium.
    #[error("storage medium is poisoned")]
    Poisoned,
}

/// Synchronous key-value access to the persisted store.
pub trait PersistedStore {
    /// Read the raw value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the medium is unavailable.
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the medium is unavailable or full.
    fn write(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove `key` if present.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the medium is unavailable.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}
