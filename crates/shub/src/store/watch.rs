// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Watch handles - blocking wait for key changes.
//!
//! A [`Watch`] is a registration of interest in one key. Its lifecycle is
//! `Pending -> Notified` (exactly once, on the first observed change) or
//! `Pending -> Cancelled` (deadline expiry or explicit cancel). Both
//! resolutions consume the handle, so a watcher can never be notified
//! twice.
//!
//! The watch pins the signal generation observed at registration, not the
//! value version: version bumps from value-preserving updates do not
//! resolve a watch (unless the store is configured to notify on them),
//! and a change landing between `watch()` and `wait()` is still
//! delivered, not lost.

use super::wake::WakeSignal;
use super::{StoreInner, VersionedValue};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Watch lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Registered, not yet resolved.
    Pending,
    /// Resolved with a value change.
    Notified,
    /// Resolved by timeout or explicit cancellation.
    Cancelled,
}

/// A pending registration of interest in one key.
///
/// Created by `StateStore::watch`.
pub struct Watch {
    inner: Arc<StoreInner>,
    key: String,
    signal: Arc<WakeSignal>,
    seen_generation: u64,
    seen_version: u64,
    state: WatchState,
}

impl Watch {
    pub(super) fn register(inner: Arc<StoreInner>, key: &str) -> Self {
        let (signal, seen_generation, seen_version) = {
            let slot = inner.slot(key);
            slot.watchers.fetch_add(1, Ordering::Relaxed);
            (
                Arc::clone(&slot.signal),
                slot.signal.generation(),
                slot.latest.as_ref().map_or(0, |v| v.version),
            )
        };
        log::debug!(
            "[watch] register key={} seen_version={}",
            key,
            seen_version
        );
        Self {
            inner,
            key: key.to_string(),
            signal,
            seen_generation,
            seen_version,
            state: WatchState::Pending,
        }
    }

    /// Watched key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Value version observed when the watch was registered (0 = never set).
    #[must_use]
    pub fn seen_version(&self) -> u64 {
        self.seen_version
    }

    /// Current lifecycle state (always `Pending` while the handle exists).
    #[must_use]
    pub fn state(&self) -> WatchState {
        self.state
    }

    /// Block until the key's next notified update, or until `timeout`
    /// elapses.
    ///
    /// Consumes the handle: `Ok` resolves it as `Notified`,
    /// `Err(Error::TimedOut)` as `Cancelled`. A notification that races
    /// the deadline is still delivered (one final re-check before giving
    /// up).
    pub fn wait(mut self, timeout: Duration) -> crate::Result<VersionedValue> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(current) = self.notified_value() {
                self.state = WatchState::Notified;
                log::debug!(
                    "[watch] notified key={} version={}",
                    self.key,
                    current.version
                );
                return Ok(current);
            }

            if !self.signal.wait_deadline(self.seen_generation, deadline) {
                // Deadline passed; one final check for a wake that raced it
                if let Some(current) = self.notified_value() {
                    self.state = WatchState::Notified;
                    return Ok(current);
                }
                self.state = WatchState::Cancelled;
                log::debug!("[watch] timed out key={}", self.key);
                return Err(crate::Error::TimedOut);
            }
        }
    }

    /// Resolve the watch as `Cancelled` without waiting.
    pub fn cancel(mut self) {
        self.state = WatchState::Cancelled;
        log::debug!("[watch] cancelled key={}", self.key);
    }

    /// Latest value, but only once a notification has fired since
    /// registration. The generation is sampled before the slot read, so a
    /// notify landing in between is caught on the next loop iteration
    /// rather than lost.
    fn notified_value(&self) -> Option<VersionedValue> {
        if self.signal.generation() == self.seen_generation {
            return None;
        }
        self.inner
            .slots
            .get(&self.key)
            .and_then(|slot| slot.latest.clone())
    }
}

impl Drop for Watch {
    fn drop(&mut self) {
        if let Some(slot) = self.inner.slots.get(&self.key) {
            slot.watchers.fetch_sub(1, Ordering::Relaxed);
        }
    }
}

impl std::fmt::Debug for Watch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watch")
            .field("key", &self.key)
            .field("seen_version", &self.seen_version)
            .field("state", &self.state)
            .finish()
    }
}
