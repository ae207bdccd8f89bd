// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared state store - latest value per key, with change notification.
//!
//! The store is the single coordination point between the receiver thread
//! (sole writer in normal operation), watcher threads (blocked in
//! [`Watch::wait`]), and readers. Per-key atomicity comes from the map's
//! entry lock: readers and watchers always observe a fully committed
//! `VersionedValue`, never a partial write.
//!
//! # Architecture
//!
//! ```text
//! update(key, v) -> entry lock -> replace value, bump version -> unlock
//!                                      v (only if value changed, or
//!                                         notify_unchanged configured)
//!                                 WakeSignal::notify_all
//!                                      v
//!                              Watch::wait re-checks, resumes
//! ```

pub mod wake;
pub mod watch;

use crate::codec::Value;
use crate::config::{RuntimeConfig, StoreConfig};
use dashmap::DashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use wake::WakeSignal;
pub use watch::{Watch, WatchState};

/// Latest committed state of one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedValue {
    /// The value itself.
    pub value: Value,
    /// Monotonic per-key update counter, 1 on first set.
    pub version: u64,
    /// Reception timestamp (nanoseconds since epoch).
    pub timestamp_ns: u64,
}

/// Result of one `update` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Version assigned to this update.
    pub version: u64,
    /// Whether the value differs from the previous one.
    pub changed: bool,
    /// Whether watchers were woken.
    pub notified: bool,
}

/// Per-key slot: latest value plus watcher coordination.
#[derive(Debug, Default)]
struct KeySlot {
    latest: Option<VersionedValue>,
    signal: Arc<WakeSignal>,
    watchers: AtomicUsize,
}

#[derive(Debug)]
pub(crate) struct StoreInner {
    pub(crate) slots: DashMap<String, KeySlot>,
    config: RuntimeConfig,
}

impl StoreInner {
    /// Get or create the slot for `key` (slots also exist for keys that
    /// are watched but never set).
    fn slot(&self, key: &str) -> dashmap::mapref::one::RefMut<'_, String, KeySlot> {
        self.slots.entry(key.to_string()).or_default()
    }
}

/// Shared state store. Cheap to clone (all clones share one state).
///
/// Lives for the process lifetime; created once at hub startup and handed
/// to the receiver and to watchers.
#[derive(Debug, Clone)]
pub struct StateStore {
    inner: Arc<StoreInner>,
}

impl StateStore {
    /// Create an empty store with default options.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create an empty store with explicit options.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                slots: DashMap::new(),
                config: RuntimeConfig::new(config),
            }),
        }
    }

    /// Current store options (lock-free snapshot).
    pub fn config(&self) -> StoreConfig {
        *self.inner.config.store()
    }

    /// Replace the store options at runtime.
    pub fn set_config(&self, config: StoreConfig) {
        self.inner.config.set_store(config);
    }

    /// Set the current value for `key`, replacing any prior value.
    ///
    /// Bumps the per-key version on every call. Watchers are woken only
    /// when the value actually changed (equality on [`Value`]), or always
    /// when `notify_unchanged` is configured.
    pub fn update(&self, key: &str, value: Value) -> UpdateOutcome {
        let timestamp_ns = now_ns();

        let (signal, version, changed) = {
            let mut slot = self.inner.slot(key);
            let changed = match &slot.latest {
                Some(prev) => prev.value != value,
                None => true,
            };
            let version = slot.latest.as_ref().map_or(0, |v| v.version) + 1;
            slot.latest = Some(VersionedValue {
                value,
                version,
                timestamp_ns,
            });
            (Arc::clone(&slot.signal), version, changed)
        };
        // Entry lock released before waking: resumed watchers read the slot
        // immediately and must not contend with the updater.

        let notified = changed || self.config().notify_unchanged;
        if notified {
            signal.notify_all();
        }
        log::debug!(
            "[store] update key={} version={} changed={} notified={}",
            key,
            version,
            changed,
            notified
        );

        UpdateOutcome {
            version,
            changed,
            notified,
        }
    }

    /// Latest committed value for `key`, or `None` if never set.
    pub fn read(&self, key: &str) -> Option<VersionedValue> {
        self.inner
            .slots
            .get(key)
            .and_then(|slot| slot.latest.clone())
    }

    /// Register interest in `key` at its current version.
    ///
    /// Watching a key that has never been set is legal: the watch resolves
    /// on the key's first update.
    pub fn watch(&self, key: &str) -> Watch {
        Watch::register(Arc::clone(&self.inner), key)
    }

    /// Block until the next change of `key`, or until `timeout` elapses.
    ///
    /// Convenience for `watch(key).wait(timeout)`.
    pub fn wait_for_change(&self, key: &str, timeout: Duration) -> crate::Result<VersionedValue> {
        self.watch(key).wait(timeout)
    }

    /// Number of keys that have a committed value.
    pub fn len(&self) -> usize {
        self.inner
            .slots
            .iter()
            .filter(|slot| slot.latest.is_some())
            .count()
    }

    /// True if no key has ever been set.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All keys with a committed value.
    pub fn keys(&self) -> Vec<String> {
        self.inner
            .slots
            .iter()
            .filter(|slot| slot.latest.is_some())
            .map(|slot| slot.key().clone())
            .collect()
    }

    /// Number of pending watchers on `key`.
    pub fn watcher_count(&self, key: &str) -> usize {
        self.inner
            .slots
            .get(key)
            .map_or(0, |slot| slot.watchers.load(std::sync::atomic::Ordering::Relaxed))
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
