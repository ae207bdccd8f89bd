// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Synthetic message generator - exercises the receive path.
//!
//! Test/demo traffic source: builds messages (fixed, sequence, or random),
//! encodes them, and sends them to a target address, either on a fixed
//! period or on explicit trigger. Shares no mutable state with the
//! receiver; it only owns its send socket.

use crate::codec::{self, Message, Value};
use crate::config::MAX_DATAGRAM_SIZE;
use crate::transport::UdpEndpoint;
use crossbeam::channel::{bounded, RecvTimeoutError, Sender};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// What the generator emits.
#[derive(Debug, Clone)]
pub enum GenMode {
    /// The same message on every emission.
    Fixed(Message),
    /// Round-robin over `keys` with a monotonically increasing integer.
    Sequence { keys: Vec<String> },
    /// Random key choice with a random two-field record payload.
    Random { keys: Vec<String> },
}

/// Generator configuration.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Destination for emitted datagrams.
    pub target: SocketAddr,
    /// Emission period. Triggers fire in between periods as well.
    pub period: Duration,
    /// Payload mode.
    pub mode: GenMode,
}

/// Generator metrics for diagnostics
#[derive(Debug)]
pub struct TxMetrics {
    /// Datagrams sent
    pub sent: AtomicU64,
    /// Send failures (logged, not fatal)
    pub send_errors: AtomicU64,
}

impl TxMetrics {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: AtomicU64::new(0),
            send_errors: AtomicU64::new(0),
        })
    }

    /// Get snapshot of metrics: (sent, send_errors)
    pub fn snapshot(&self) -> (u64, u64) {
        (
            self.sent.load(Ordering::Relaxed),
            self.send_errors.load(Ordering::Relaxed),
        )
    }
}

enum Command {
    Emit,
    Stop,
}

/// Synthetic traffic thread.
///
/// One blocking point (`recv_timeout` on the command channel) serves both
/// the periodic schedule and explicit triggers, so `shutdown()` wakes the
/// thread immediately.
pub struct Generator {
    handle: Option<JoinHandle<()>>,
    commands: Sender<Command>,
    /// Generator metrics
    pub metrics: Arc<TxMetrics>,
}

impl Generator {
    /// Spawn the generator thread with its own ephemeral send socket.
    pub fn spawn(config: GeneratorConfig) -> io::Result<Self> {
        let endpoint = UdpEndpoint::ephemeral()?;
        let (tx, rx) = bounded::<Command>(16);

        let metrics = TxMetrics::new();
        let metrics_clone = Arc::clone(&metrics);

        let handle = std::thread::Builder::new()
            .name("shub-gen".to_string())
            .spawn(move || {
                log::debug!(
                    "[shub-gen] started target={} period={:?}",
                    config.target,
                    config.period
                );
                let mut sequence: u64 = 0;
                let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

                loop {
                    match rx.recv_timeout(config.period) {
                        Ok(Command::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                        Ok(Command::Emit) | Err(RecvTimeoutError::Timeout) => {
                            emit(&endpoint, &config, &mut sequence, &mut buf, &metrics_clone);
                        }
                    }
                }
                log::debug!("[shub-gen] stopped target={}", config.target);
            })?;

        Ok(Self {
            handle: Some(handle),
            commands: tx,
            metrics,
        })
    }

    /// Force an immediate emission between periods.
    ///
    /// Best-effort: if the command queue is full the trigger is dropped
    /// (the generator is already saturated).
    pub fn trigger(&self) {
        if self.commands.try_send(Command::Emit).is_err() {
            log::debug!("[shub-gen] trigger dropped, command queue full");
        }
    }

    /// Shutdown generator gracefully.
    pub fn shutdown(mut self) {
        let _ = self.commands.try_send(Command::Stop);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Generator {
    fn drop(&mut self) {
        let _ = self.commands.try_send(Command::Stop);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn emit(
    endpoint: &UdpEndpoint,
    config: &GeneratorConfig,
    sequence: &mut u64,
    buf: &mut [u8],
    metrics: &TxMetrics,
) {
    let msg = build_message(&config.mode, sequence);

    let len = match codec::encode(&msg, buf) {
        Ok(len) => len,
        Err(err) => {
            // Only reachable with an invariant-violating Fixed message
            metrics.send_errors.fetch_add(1, Ordering::Relaxed);
            log::warn!("[shub-gen] encode failed key={} err={}", msg.key, err);
            return;
        }
    };

    match endpoint.send_to(&buf[..len], config.target) {
        Ok(_) => {
            metrics.sent.fetch_add(1, Ordering::Relaxed);
            log::debug!(
                "[shub-gen] sent key={} kind={} len={}",
                msg.key,
                msg.value.kind(),
                len
            );
        }
        Err(err) => {
            metrics.send_errors.fetch_add(1, Ordering::Relaxed);
            log::debug!("[shub-gen] send failed target={} err={}", config.target, err);
        }
    }
}

fn build_message(mode: &GenMode, sequence: &mut u64) -> Message {
    let n = *sequence;
    *sequence += 1;

    match mode {
        GenMode::Fixed(msg) => msg.clone(),
        GenMode::Sequence { keys } => {
            let key = if keys.is_empty() {
                "seq".to_string()
            } else {
                keys[(n as usize) % keys.len()].clone()
            };
            Message::new(key, Value::Integer(n as i64))
        }
        GenMode::Random { keys } => {
            let key = if keys.is_empty() {
                "rnd".to_string()
            } else {
                keys[fastrand::usize(..keys.len())].clone()
            };
            Message::new(
                key,
                Value::Record(vec![
                    ("1".to_string(), Value::Integer(fastrand::i64(0..100))),
                    ("2".to_string(), Value::Integer(fastrand::i64(0..100))),
                ]),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::UdpSocket;

    fn recv_one(socket: &UdpSocket) -> Message {
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        let (len, _src) = socket.recv_from(&mut buf).expect("recv should succeed");
        codec::decode(&buf[..len]).expect("generator datagrams must decode")
    }

    fn test_sink() -> UdpSocket {
        let socket = UdpSocket::bind("127.0.0.1:0").expect("bind should succeed");
        socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .expect("set timeout should succeed");
        socket
    }

    #[test]
    fn test_fixed_mode_emits_same_message() {
        let sink = test_sink();
        let generator = Generator::spawn(GeneratorConfig {
            target: sink.local_addr().expect("local addr"),
            period: Duration::from_millis(10),
            mode: GenMode::Fixed(Message::new("temp", Value::Float(21.5))),
        })
        .expect("spawn should succeed");

        let first = recv_one(&sink);
        let second = recv_one(&sink);
        assert_eq!(first, Message::new("temp", Value::Float(21.5)));
        assert_eq!(first, second);

        generator.shutdown();
    }

    #[test]
    fn test_sequence_mode_round_robins_keys() {
        let sink = test_sink();
        let generator = Generator::spawn(GeneratorConfig {
            target: sink.local_addr().expect("local addr"),
            period: Duration::from_millis(5),
            mode: GenMode::Sequence {
                keys: vec!["a".to_string(), "b".to_string()],
            },
        })
        .expect("spawn should succeed");

        let first = recv_one(&sink);
        let second = recv_one(&sink);
        assert_eq!(first.key, "a");
        assert_eq!(first.value, Value::Integer(0));
        assert_eq!(second.key, "b");
        assert_eq!(second.value, Value::Integer(1));

        generator.shutdown();
    }

    #[test]
    fn test_random_mode_emits_known_keys_and_records() {
        let sink = test_sink();
        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let generator = Generator::spawn(GeneratorConfig {
            target: sink.local_addr().expect("local addr"),
            period: Duration::from_millis(5),
            mode: GenMode::Random { keys: keys.clone() },
        })
        .expect("spawn should succeed");

        for _ in 0..5 {
            let msg = recv_one(&sink);
            assert!(keys.contains(&msg.key));
            match msg.value {
                Value::Record(fields) => assert_eq!(fields.len(), 2),
                other => panic!("expected record payload, got {:?}", other),
            }
        }

        generator.shutdown();
    }

    #[test]
    fn test_trigger_forces_emission_before_period() {
        let sink = test_sink();
        let generator = Generator::spawn(GeneratorConfig {
            target: sink.local_addr().expect("local addr"),
            // Long period: without triggers nothing arrives within the test
            period: Duration::from_secs(30),
            mode: GenMode::Sequence { keys: vec![] },
        })
        .expect("spawn should succeed");

        generator.trigger();
        let msg = recv_one(&sink);
        assert_eq!(msg.key, "seq");

        let (sent, errors) = generator.metrics.snapshot();
        assert_eq!(sent, 1);
        assert_eq!(errors, 0);

        generator.shutdown();
    }

    #[test]
    fn test_shutdown_wakes_long_period_immediately() {
        let sink = test_sink();
        let generator = Generator::spawn(GeneratorConfig {
            target: sink.local_addr().expect("local addr"),
            period: Duration::from_secs(60),
            mode: GenMode::Sequence { keys: vec![] },
        })
        .expect("spawn should succeed");

        let start = std::time::Instant::now();
        generator.shutdown();
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
