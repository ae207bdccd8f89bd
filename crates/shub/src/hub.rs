// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Hub - process-level assembly of endpoint, store, and receiver.
//!
//! The hub is the entry point: it binds the receive socket, creates the
//! shared state store, spawns the receiver thread, and exposes the read
//! and watch API. One hub per process is typical; several can coexist on
//! distinct ports.

use crate::config::{self, StoreConfig};
use crate::engine::{Receiver, RxMetrics};
use crate::store::{StateStore, VersionedValue, Watch};
use crate::transport::UdpEndpoint;
use crate::{Error, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`Hub`].
///
/// # Example
///
/// ```rust,no_run
/// use shub::Hub;
///
/// # fn main() -> shub::Result<()> {
/// let hub = Hub::builder("demo")
///     .port(7600)
///     .notify_unchanged(false)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct HubBuilder {
    name: String,
    bind: SocketAddr,
    store_config: StoreConfig,
}

impl HubBuilder {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            bind: SocketAddr::new(
                std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
                config::DEFAULT_PORT,
            ),
            store_config: StoreConfig::default(),
        }
    }

    /// Bind to an explicit socket address (port 0 = OS-assigned).
    #[must_use]
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind = addr;
        self
    }

    /// Override the port on the current bind address.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.bind.set_port(port);
        self
    }

    /// Wake watchers on value-preserving updates too.
    #[must_use]
    pub fn notify_unchanged(mut self, enabled: bool) -> Self {
        self.store_config.notify_unchanged = enabled;
        self
    }

    /// Apply `SHUB_BIND` / `SHUB_PORT` / `SHUB_NOTIFY_UNCHANGED`.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        self.bind = config::bind_addr_from_env();
        self.store_config = StoreConfig::from_env();
        self
    }

    /// Bind the socket, create the store, spawn the receiver.
    pub fn build(self) -> Result<Hub> {
        let endpoint = UdpEndpoint::bind(self.bind)
            .map_err(|e| Error::BindFailed(format!("{}: {}", self.bind, e)))?;
        let store = StateStore::with_config(self.store_config);
        let receiver = Receiver::spawn(endpoint.socket(), store.clone()).map_err(Error::IoError)?;
        let metrics = Arc::clone(&receiver.metrics);

        log::info!(
            "[hub] {} listening addr={}",
            self.name,
            endpoint.local_addr()
        );

        Ok(Hub {
            name: self.name,
            endpoint,
            store,
            metrics,
            receiver: Some(receiver),
        })
    }
}

/// A running hub: bound socket, receiver thread, shared state store.
pub struct Hub {
    name: String,
    endpoint: UdpEndpoint,
    store: StateStore,
    metrics: Arc<RxMetrics>,
    receiver: Option<Receiver>,
}

impl Hub {
    /// Start building a hub.
    pub fn builder(name: &str) -> HubBuilder {
        HubBuilder::new(name)
    }

    /// Hub name (for logs).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved receive address.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.endpoint.local_addr()
    }

    /// The shared state store. Clone it to hand to watcher threads.
    #[must_use]
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Latest committed value for `key`, or `None` if never set.
    pub fn read(&self, key: &str) -> Option<VersionedValue> {
        self.store.read(key)
    }

    /// Register interest in `key` at its current version.
    pub fn watch(&self, key: &str) -> Watch {
        self.store.watch(key)
    }

    /// Block until the next change of `key`, or until `timeout` elapses.
    pub fn wait_for_change(&self, key: &str, timeout: Duration) -> Result<VersionedValue> {
        self.store.wait_for_change(key, timeout)
    }

    /// Receiver metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<RxMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Stop the receiver and release the socket binding.
    pub fn shutdown(mut self) {
        if let Some(receiver) = self.receiver.take() {
            receiver.shutdown();
        }
        log::info!("[hub] {} stopped", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback_hub() -> Hub {
        Hub::builder("test")
            .bind("127.0.0.1:0".parse().expect("valid address"))
            .build()
            .expect("hub build should succeed")
    }

    #[test]
    fn test_builder_binds_ephemeral_port() {
        let hub = loopback_hub();
        assert_ne!(hub.local_addr().port(), 0);
        assert_eq!(hub.name(), "test");
        hub.shutdown();
    }

    #[test]
    fn test_two_hubs_coexist_on_distinct_ports() {
        let first = loopback_hub();
        let second = loopback_hub();
        assert_ne!(first.local_addr().port(), second.local_addr().port());
        first.shutdown();
        second.shutdown();
    }

    #[test]
    fn test_read_before_any_datagram() {
        let hub = loopback_hub();
        assert!(hub.read("anything").is_none());
        hub.shutdown();
    }

    #[test]
    fn test_wait_for_change_times_out() {
        let hub = loopback_hub();
        let result = hub.wait_for_change("silent", Duration::from_millis(50));
        assert!(matches!(result, Err(Error::TimedOut)));
        hub.shutdown();
    }
}
