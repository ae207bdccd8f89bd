// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-key wake notification with atomic fast-path.
//!
//! # Architecture
//! - Generation counter for lock-free "did anything happen" checks
//! - Condvar fallback for blocked watchers
//!
//! The generation counter closes the classic missed-wakeup window: a
//! watcher samples the generation, checks its predicate, and sleeps only
//! if the generation is still the sampled one once the condvar lock is
//! held. A notification between predicate check and sleep flips the
//! generation and the watcher returns immediately instead of sleeping.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Wake signal shared by all watchers of one key.
///
/// # Example
/// ```ignore
/// let signal = Arc::new(WakeSignal::new());
///
/// // Watcher
/// let gen = signal.generation();
/// if !predicate_holds() {
///     signal.wait_deadline(gen, deadline);
/// }
///
/// // Updater
/// apply_update();
/// signal.notify_all();
/// ```
#[derive(Debug)]
pub struct WakeSignal {
    /// Bumped on every notification (lock-free fast-path)
    generation: AtomicU64,
    /// Mutex for condvar (only held around sleep/notify)
    lock: Mutex<()>,
    /// Condvar waking all blocked watchers of this key
    condvar: Condvar,
}

impl WakeSignal {
    /// Create a new signal at generation 0.
    pub fn new() -> Self {
        Self {
            generation: AtomicU64::new(0),
            lock: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }

    /// Current generation. Sample this *before* checking the predicate.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Wake every watcher currently blocked on this signal.
    pub fn notify_all(&self) {
        self.generation.fetch_add(1, Ordering::Release);
        // Taking the lock orders the bump before any sleeper's re-check
        drop(self.lock.lock());
        self.condvar.notify_all();
    }

    /// Block until notified past `seen_generation` or until `deadline`.
    ///
    /// Returns `true` if a notification happened since `seen_generation`
    /// was sampled, `false` on deadline expiry with no notification.
    pub fn wait_deadline(&self, seen_generation: u64, deadline: Instant) -> bool {
        let mut guard = self.lock.lock();
        loop {
            if self.generation.load(Ordering::Acquire) != seen_generation {
                return true;
            }
            if self.condvar.wait_until(&mut guard, deadline).timed_out() {
                return self.generation.load(Ordering::Acquire) != seen_generation;
            }
        }
    }
}

impl Default for WakeSignal {
    fn default() -> Self {
        Self::new()
    }
}
