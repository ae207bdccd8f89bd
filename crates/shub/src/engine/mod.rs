// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Receiver thread - datagrams in, store updates out.
//!
//! Spawns a dedicated IO thread to receive, decode, and fold datagrams
//! into the shared state store.
//!
//! # Architecture (mio/epoll)
//!
//! ```text
//! mio::poll() -> recv_from(buf) -> codec::decode() -> StateStore::update()
//!                                       v
//!                        WireError: log, count, continue
//! ```
//!
//! Malformed datagrams never terminate the thread: they are logged at
//! debug, counted in [`RxMetrics`], and the loop continues with the next
//! datagram.

pub mod generator;

pub use generator::{GenMode, Generator, GeneratorConfig};

use crate::codec;
use crate::config::{MAX_DATAGRAM_SIZE, RX_POLL_TICK_MS};
use crate::store::StateStore;
use mio::{Events, Interest, Poll, Token};
use std::io;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Receiver metrics for diagnostics
#[derive(Debug)]
pub struct RxMetrics {
    /// Total datagrams received (valid or not)
    pub datagrams_received: AtomicU64,
    /// Total bytes received
    pub bytes_received: AtomicU64,
    /// Malformed datagrams dropped
    pub datagrams_invalid: AtomicU64,
    /// Store updates applied
    pub updates_applied: AtomicU64,
    /// Updates that left the value unchanged
    pub updates_unchanged: AtomicU64,
}

impl RxMetrics {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            datagrams_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            datagrams_invalid: AtomicU64::new(0),
            updates_applied: AtomicU64::new(0),
            updates_unchanged: AtomicU64::new(0),
        })
    }

    /// Get snapshot of metrics: (received, bytes, invalid, applied, unchanged)
    pub fn snapshot(&self) -> (u64, u64, u64, u64, u64) {
        (
            self.datagrams_received.load(Ordering::Relaxed),
            self.bytes_received.load(Ordering::Relaxed),
            self.datagrams_invalid.load(Ordering::Relaxed),
            self.updates_applied.load(Ordering::Relaxed),
            self.updates_unchanged.load(Ordering::Relaxed),
        )
    }
}

/// Receiver task: dedicated IO thread feeding the state store.
///
/// # Shutdown
/// Cooperative: `shutdown()` (or `Drop`) flips the running flag and joins.
/// The poll tick bounds how long the thread can take to notice. The
/// socket binding is released when the thread exits and the last `Arc`
/// drops.
pub struct Receiver {
    /// Thread join handle
    handle: Option<JoinHandle<()>>,
    /// Running flag for graceful shutdown
    running: Arc<AtomicBool>,
    /// Receiver metrics
    pub metrics: Arc<RxMetrics>,
}

impl Receiver {
    /// Spawn the receiver thread on a bound socket.
    ///
    /// # Errors
    /// Returns an IO error if the socket cannot be set non-blocking or the
    /// thread cannot be spawned. Poll setup failures inside the thread are
    /// logged and terminate only that thread (fatal for the task, per the
    /// socket error taxonomy).
    pub fn spawn(socket: Arc<UdpSocket>, store: StateStore) -> io::Result<Self> {
        socket.set_nonblocking(true)?;

        let running = Arc::new(AtomicBool::new(true));
        let running_clone = Arc::clone(&running);

        let metrics = RxMetrics::new();
        let metrics_clone = Arc::clone(&metrics);

        let handle = std::thread::Builder::new()
            .name("shub-rx".to_string())
            .spawn(move || {
                Self::run_loop(socket, store, running_clone, metrics_clone);
            })?;

        Ok(Self {
            handle: Some(handle),
            running,
            metrics,
        })
    }

    /// Main IO loop (runs in dedicated thread).
    fn run_loop(
        socket: Arc<UdpSocket>,
        store: StateStore,
        running: Arc<AtomicBool>,
        metrics: Arc<RxMetrics>,
    ) {
        let local_addr = socket
            .local_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "<unknown>".to_string());
        log::debug!(
            "[shub-rx] started addr={} thread={:?}",
            local_addr,
            std::thread::current().id()
        );

        let mut poll = match Poll::new() {
            Ok(p) => p,
            Err(e) => {
                log::error!("[shub-rx] failed to create mio Poll: {}", e);
                return;
            }
        };
        let mut events = Events::with_capacity(16);

        // Clone the socket for mio registration; Arc<UdpSocket> does not
        // implement Source.
        let socket_clone = match socket.try_clone() {
            Ok(s) => s,
            Err(e) => {
                log::error!("[shub-rx] failed to clone socket: {}", e);
                return;
            }
        };
        let mut mio_socket = mio::net::UdpSocket::from_std(socket_clone);

        const SOCKET_TOKEN: Token = Token(0);
        if let Err(e) = poll
            .registry()
            .register(&mut mio_socket, SOCKET_TOKEN, Interest::READABLE)
        {
            log::error!("[shub-rx] failed to register socket with poll: {}", e);
            return;
        }

        // Reused across iterations
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        while running.load(Ordering::Relaxed) {
            // Short tick so the running flag is honored promptly
            if let Err(e) = poll.poll(&mut events, Some(Duration::from_millis(RX_POLL_TICK_MS))) {
                if e.kind() != io::ErrorKind::Interrupted {
                    log::debug!("[shub-rx] poll error: {:?}", e);
                }
                continue;
            }

            for event in events.iter() {
                if event.token() != SOCKET_TOKEN {
                    continue;
                }

                // Drain all available datagrams (edge-triggered style)
                loop {
                    let (len, src_addr) = match mio_socket.recv_from(&mut buf) {
                        Ok(result) => result,
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                        Err(e) => {
                            log::debug!("[shub-rx] recv_from error: {:?}", e);
                            break;
                        }
                    };

                    metrics.datagrams_received.fetch_add(1, Ordering::Relaxed);
                    metrics
                        .bytes_received
                        .fetch_add(len as u64, Ordering::Relaxed);

                    match codec::decode(&buf[..len]) {
                        Ok(msg) => {
                            let outcome = store.update(&msg.key, msg.value);
                            metrics.updates_applied.fetch_add(1, Ordering::Relaxed);
                            if !outcome.changed {
                                metrics.updates_unchanged.fetch_add(1, Ordering::Relaxed);
                            }
                            log::debug!(
                                "[shub-rx] recv key={} version={} len={} src={}",
                                msg.key,
                                outcome.version,
                                len,
                                src_addr
                            );
                        }
                        Err(err) => {
                            metrics.datagrams_invalid.fetch_add(1, Ordering::Relaxed);
                            log::debug!(
                                "[shub-rx] dropping malformed datagram len={} src={} err={}",
                                len,
                                src_addr,
                                err
                            );
                        }
                    }
                }
            }
        }

        log::debug!("[shub-rx] stopped addr={}", local_addr);
    }

    /// Shutdown receiver gracefully.
    ///
    /// Signals the thread to exit and waits for join.
    pub fn shutdown(mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_vec, Message, Value};
    use crate::transport::UdpEndpoint;
    use std::thread;

    fn wait_until(deadline_ms: u64, mut check: impl FnMut() -> bool) -> bool {
        for _ in 0..deadline_ms / 10 {
            if check() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        check()
    }

    fn loopback_endpoint() -> UdpEndpoint {
        UdpEndpoint::bind("127.0.0.1:0".parse().expect("valid address"))
            .expect("loopback bind should succeed")
    }

    #[test]
    fn test_receiver_applies_valid_datagram() {
        let endpoint = loopback_endpoint();
        let dest = endpoint.local_addr();
        let store = StateStore::new();
        let receiver =
            Receiver::spawn(endpoint.socket(), store.clone()).expect("spawn should succeed");

        let msg = Message::new("temp", Value::Float(21.5));
        let datagram = encode_vec(&msg).expect("encode should succeed");
        let tx = UdpEndpoint::ephemeral().expect("tx bind should succeed");
        tx.send_to(&datagram, dest).expect("send should succeed");

        assert!(
            wait_until(2000, || store.read("temp").is_some()),
            "store should observe the update"
        );
        let latest = store.read("temp").expect("value should be present");
        assert_eq!(latest.value, Value::Float(21.5));
        assert_eq!(latest.version, 1);

        let (received, bytes, invalid, applied, _) = receiver.metrics.snapshot();
        assert!(received >= 1);
        assert!(bytes >= datagram.len() as u64);
        assert_eq!(invalid, 0);
        assert!(applied >= 1);

        receiver.shutdown();
    }

    #[test]
    fn test_receiver_survives_garbage_then_processes_valid() {
        let endpoint = loopback_endpoint();
        let dest = endpoint.local_addr();
        let store = StateStore::new();
        let receiver =
            Receiver::spawn(endpoint.socket(), store.clone()).expect("spawn should succeed");

        let tx = UdpEndpoint::ephemeral().expect("tx bind should succeed");

        // Garbage first: wrong magic, truncated header, random noise
        tx.send_to(b"\xDE\xAD\xBE\xEF garbage", dest)
            .expect("send should succeed");
        tx.send_to(b"SH", dest).expect("send should succeed");

        assert!(
            wait_until(2000, || {
                receiver.metrics.datagrams_invalid.load(Ordering::Relaxed) >= 2
            }),
            "garbage should be counted as invalid"
        );
        assert!(store.read("temp").is_none(), "store must be unchanged");

        // Valid datagram afterwards is still processed (loop survived)
        let datagram =
            encode_vec(&Message::new("temp", Value::Float(19.0))).expect("encode should succeed");
        tx.send_to(&datagram, dest).expect("send should succeed");

        assert!(
            wait_until(2000, || store.read("temp").is_some()),
            "valid datagram after garbage should still apply"
        );

        receiver.shutdown();
    }

    #[test]
    fn test_receiver_shutdown_joins_thread() {
        let endpoint = loopback_endpoint();
        let store = StateStore::new();
        let receiver = Receiver::spawn(endpoint.socket(), store).expect("spawn should succeed");

        // Returns promptly (bounded by the poll tick)
        let start = std::time::Instant::now();
        receiver.shutdown();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_receiver_drop_is_clean() {
        let endpoint = loopback_endpoint();
        let store = StateStore::new();
        let receiver = Receiver::spawn(endpoint.socket(), store).expect("spawn should succeed");
        drop(receiver);
    }
}
