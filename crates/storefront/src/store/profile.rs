//! The shared storage medium of one browser profile.
//!
//! A [`BrowserProfile`] holds the key-value entries every tab sees and fans
//! out a [`StorageEvent`] to every *other* open tab whenever a write actually
//! changes a value. Events are queued under the same lock that commits the
//! write, so each tab receives changes to a key in commit order.
//!
//! There is no locking across a read-modify-write cycle: two tabs that read,
//! modify and write the same key concurrently both commit, and the later
//! commit replaces the earlier one wholesale.

use std::collections::BTreeMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use uuid::Uuid;

use super::{PersistedStore, StoreError};
use crate::config::StorageConfig;

/// Identifier of one open tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TabId(Uuid);

impl TabId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A change to one key, as seen by the tabs that did not make it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// Key that changed.
    pub key: String,
    /// New raw value, or `None` if the key was removed.
    pub new_value: Option<String>,
    /// Tab that committed the change.
    pub source: TabId,
}

/// Shared storage medium for all tabs of one browser profile.
///
/// Cheaply cloneable; clones refer to the same medium.
#[derive(Debug, Clone)]
pub struct BrowserProfile {
    inner: Arc<ProfileInner>,
}

#[derive(Debug)]
struct ProfileInner {
    medium: Mutex<Medium>,
    quota_bytes: usize,
    disabled: AtomicBool,
    backing: Option<PathBuf>,
}

#[derive(Debug, Default)]
struct Medium {
    entries: BTreeMap<String, String>,
    tabs: Vec<TabInbox>,
}

#[derive(Debug)]
struct TabInbox {
    id: TabId,
    tx: mpsc::UnboundedSender<StorageEvent>,
}

impl Medium {
    fn used_bytes(&self) -> usize {
        self.entries.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

impl BrowserProfile {
    /// Create an empty profile that lives only in memory.
    #[must_use]
    pub fn in_memory(config: &StorageConfig) -> Self {
        Self::with_entries(config, BTreeMap::new(), None)
    }

    /// Open the profile described by `config`.
    ///
    /// With a `profile_path` the entries are loaded from that JSON file and
    /// every commit rewrites it; a missing file starts an empty profile and an
    /// unreadable one is discarded. Without a path this is [`Self::in_memory`].
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the file exists but cannot be read.
    pub fn open(config: &StorageConfig) -> Result<Self, StoreError> {
        let Some(path) = config.profile_path.clone() else {
            return Ok(Self::in_memory(config));
        };

        let entries = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Discarding malformed profile file");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(StoreError::Io(e)),
        };

        tracing::debug!(path = %path.display(), keys = entries.len(), "Opened browser profile");
        Ok(Self::with_entries(config, entries, Some(path)))
    }

    fn with_entries(
        config: &StorageConfig,
        entries: BTreeMap<String, String>,
        backing: Option<PathBuf>,
    ) -> Self {
        Self {
            inner: Arc::new(ProfileInner {
                medium: Mutex::new(Medium {
                    entries,
                    tabs: Vec::new(),
                }),
                quota_bytes: config.quota_bytes,
                disabled: AtomicBool::new(config.disabled),
                backing,
            }),
        }
    }

    /// Open a new tab on this profile.
    ///
    /// The tab starts receiving events for changes committed by other tabs
    /// from this point on.
    #[must_use]
    pub fn open_tab(&self) -> Tab {
        let id = TabId::generate();
        let (tx, inbox) = mpsc::unbounded_channel();

        match self.inner.medium.lock() {
            Ok(mut medium) => medium.tabs.push(TabInbox { id, tx }),
            Err(_) => tracing::warn!(tab = %id, "Storage medium poisoned; tab will not receive events"),
        }

        Tab {
            id,
            store: TabStore {
                tab: id,
                profile: self.clone(),
            },
            inbox,
        }
    }

    /// Enable or disable the medium, as a user disabling site data would.
    pub fn set_disabled(&self, disabled: bool) {
        self.inner.disabled.store(disabled, Ordering::SeqCst);
    }

    /// Whether the medium is currently disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.inner.disabled.load(Ordering::SeqCst)
    }

    /// Path of the backing file, if any.
    #[must_use]
    pub fn backing_path(&self) -> Option<&Path> {
        self.inner.backing.as_deref()
    }

    /// Copy of every entry currently stored.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the medium is disabled or poisoned.
    pub fn snapshot(&self) -> Result<BTreeMap<String, String>, StoreError> {
        self.check_enabled()?;
        Ok(self.lock()?.entries.clone())
    }

    fn check_enabled(&self) -> Result<(), StoreError> {
        if self.is_disabled() {
            return Err(StoreError::Disabled);
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Medium>, StoreError> {
        self.inner.medium.lock().map_err(|_| StoreError::Poisoned)
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check_enabled()?;
        Ok(self.lock()?.entries.get(key).cloned())
    }

    /// Commit a write (`Some`) or removal (`None`) made by `origin`.
    fn commit(&self, origin: TabId, key: &str, value: Option<&str>) -> Result<(), StoreError> {
        self.check_enabled()?;
        let mut medium = self.lock()?;

        let previous = medium.entries.get(key).cloned();
        if previous.as_deref() == value {
            return Ok(());
        }

        match value {
            Some(value) => {
                let freed = previous.as_ref().map_or(0, |p| key.len() + p.len());
                let needed = medium.used_bytes() - freed + key.len() + value.len();
                if needed > self.inner.quota_bytes {
                    return Err(StoreError::QuotaExceeded {
                        needed,
                        quota: self.inner.quota_bytes,
                    });
                }
                medium.entries.insert(key.to_owned(), value.to_owned());
            }
            None => {
                medium.entries.remove(key);
            }
        }

        if let Some(path) = &self.inner.backing
            && let Err(e) = write_backing_file(path, &medium.entries)
        {
            match previous {
                Some(previous) => medium.entries.insert(key.to_owned(), previous),
                None => medium.entries.remove(key),
            };
            return Err(StoreError::Io(e));
        }

        let event = StorageEvent {
            key: key.to_owned(),
            new_value: value.map(str::to_owned),
            source: origin,
        };
        // Deliver to every other tab; drop inboxes whose tab has closed.
        medium
            .tabs
            .retain(|tab| tab.id == origin || tab.tx.send(event.clone()).is_ok());

        Ok(())
    }
}

/// Rewrite the backing file with the full entry map.
fn write_backing_file(path: &Path, entries: &BTreeMap<String, String>) -> std::io::Result<()> {
    let bytes = serde_json::to_vec_pretty(entries).map_err(std::io::Error::other)?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)
}

/// One open tab: its view of the store and its inbox of storage events.
#[derive(Debug)]
pub struct Tab {
    id: TabId,
    store: TabStore,
    inbox: mpsc::UnboundedReceiver<StorageEvent>,
}

impl Tab {
    /// This tab's identifier.
    #[must_use]
    pub const fn id(&self) -> TabId {
        self.id
    }

    /// This tab's handle on the persisted store.
    #[must_use]
    pub const fn store(&self) -> &TabStore {
        &self.store
    }

    /// Split the tab into its store handle and event inbox.
    #[must_use]
    pub fn into_parts(self) -> (TabStore, mpsc::UnboundedReceiver<StorageEvent>) {
        (self.store, self.inbox)
    }
}

/// A tab's handle on the persisted store.
///
/// Writes made through this handle are announced to every other tab.
#[derive(Debug, Clone)]
pub struct TabStore {
    tab: TabId,
    profile: BrowserProfile,
}

impl TabStore {
    /// The tab this handle belongs to.
    #[must_use]
    pub const fn tab(&self) -> TabId {
        self.tab
    }

    /// The profile this handle writes to.
    #[must_use]
    pub const fn profile(&self) -> &BrowserProfile {
        &self.profile
    }
}

impl PersistedStore for TabStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.profile.get(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.profile.commit(self.tab, key, Some(value))
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.profile.commit(self.tab, key, None)
    }
}
