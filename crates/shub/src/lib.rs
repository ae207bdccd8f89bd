// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # SHUB - Shared-state UDP Hub
//!
//! A single-process, in-memory coordination hub: UDP datagrams in, a
//! watchable key/value store out. The receiver thread decodes each
//! datagram into a typed message, folds it into the shared state store,
//! and wakes any watcher blocked on that key when the value changes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use shub::{Hub, Result};
//! use std::time::Duration;
//!
//! fn main() -> Result<()> {
//!     // Bind the hub and start the receiver thread
//!     let hub = Hub::builder("demo").port(7600).build()?;
//!
//!     // Block until someone publishes a new "temp" value
//!     let temp = hub.wait_for_change("temp", Duration::from_secs(5))?;
//!     println!("temp = {} (version {})", temp.value, temp.version);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +------------------------------------------------------------------+
//! |                        Application Layer                         |
//! |        Hub -> read() / watch() / wait_for_change()               |
//! +------------------------------------------------------------------+
//! |                          Store Layer                             |
//! |   StateStore (latest value + version per key) | WakeSignal       |
//! +------------------------------------------------------------------+
//! |                         Engine Layer                             |
//! |   Receiver thread (decode -> update) | Generator (synthetic tx)  |
//! +------------------------------------------------------------------+
//! |                        Transport Layer                           |
//! |              UDP unicast (SHUB wire format v1)                   |
//! +------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Hub`] | Entry point: bound socket + receiver thread + store |
//! | [`StateStore`] | Latest value, version, and timestamp per key |
//! | [`Watch`] | One-shot registration of interest in a key |
//! | [`Message`] | Decoded datagram: key + typed value |
//! | [`Value`] | Tagged payload: int, float, text, or record |
//! | [`Generator`] | Synthetic traffic source for tests and demos |
//!
//! ## Modules Overview
//!
//! - [`hub`] - Hub assembly and builder (start here)
//! - [`store`] - Shared state store and watch coordination
//! - [`codec`] - SHUB wire format v1
//! - [`engine`] - Receiver and generator threads
//! - [`transport`] - UDP socket management
//! - [`config`] - Constants and `SHUB_*` environment toggles

/// SHUB wire format v1 - datagram encoding/decoding.
pub mod codec;
/// Global configuration (wire limits, ports, runtime options).
pub mod config;
/// Receiver and generator threads.
pub mod engine;
/// Hub assembly: endpoint + store + receiver.
pub mod hub;
/// Shared state store with per-key change notification.
pub mod store;
/// UDP socket management.
pub mod transport;

pub use codec::{Message, Value, WireError};
pub use engine::{GenMode, Generator, GeneratorConfig, Receiver, RxMetrics};
pub use hub::{Hub, HubBuilder};
pub use store::{StateStore, UpdateOutcome, VersionedValue, Watch, WatchState};
pub use transport::UdpEndpoint;

/// Errors returned by SHUB operations.
///
/// # Example
///
/// ```rust,no_run
/// use shub::{Error, Hub};
/// use std::time::Duration;
///
/// # fn main() {
/// let hub = Hub::builder("demo").port(7600).build().expect("bind");
/// match hub.wait_for_change("temp", Duration::from_millis(100)) {
///     Ok(latest) => println!("changed: {}", latest.value),
///     Err(Error::TimedOut) => println!("no change, using stale value"),
///     Err(e) => eprintln!("error: {}", e),
/// }
/// # }
/// ```
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Generic configuration error.
    Config(String),
    /// Key violates wire invariants (empty, oversized, interior NUL).
    InvalidKey(String),

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// I/O error with underlying cause.
    IoError(std::io::Error),
    /// Failed to bind the receive socket.
    BindFailed(String),
    /// Send operation failed.
    SendFailed(String),

    // ========================================================================
    // Data Errors
    // ========================================================================
    /// Datagram failed to decode (malformed wire data).
    Decode(codec::WireError),

    // ========================================================================
    // Coordination Errors
    // ========================================================================
    /// `wait` deadline passed with no change. Expected outcome, not a
    /// failure: the caller decides whether to retry or use a stale value.
    TimedOut,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // Configuration
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::InvalidKey(msg) => write!(f, "Invalid key: {}", msg),
            // Transport
            Error::IoError(e) => write!(f, "I/O error: {}", e),
            Error::BindFailed(msg) => write!(f, "Bind failed: {}", msg),
            Error::SendFailed(msg) => write!(f, "Send failed: {}", msg),
            // Data
            Error::Decode(e) => write!(f, "Decode failed: {}", e),
            // Coordination
            Error::TimedOut => write!(f, "Timed out waiting for change"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            Error::Decode(e) => Some(e),
            _ => None,
        }
    }
}

/// Convenient alias for API results using the public `Error` type.
pub type Result<T> = core::result::Result<T, Error>;

/// SHUB version string.
pub const VERSION: &str = "0.3.1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_variants() {
        assert_eq!(Error::TimedOut.to_string(), "Timed out waiting for change");
        assert_eq!(
            Error::BindFailed("0.0.0.0:7600: in use".to_string()).to_string(),
            "Bind failed: 0.0.0.0:7600: in use"
        );
        assert!(Error::InvalidKey("empty key".to_string())
            .to_string()
            .starts_with("Invalid key"));
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error as _;

        let io = Error::IoError(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert!(io.source().is_some());
        assert!(Error::TimedOut.source().is_none());
    }

    #[test]
    fn test_wire_error_converts_to_decode() {
        let wire = codec::WireError::DecodeFailed {
            reason: "bad magic".to_string(),
        };
        let err: Error = wire.into();
        assert!(matches!(err, Error::Decode(_)));
    }
}
