// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP endpoint for hub send/receive.
//!
//! Consolidates socket construction and send operations. One socket per
//! endpoint, shared between the receiver thread and senders via `Arc`.

use crate::config::env_flag;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;

/// UDP endpoint wrapping one bound socket.
///
/// Set `SHUB_REUSEPORT=1` to additionally enable `SO_REUSEPORT` (unix),
/// allowing several hub processes to share a receive port in tests.
pub struct UdpEndpoint {
    /// Shared UDP socket (Arc for multi-thread access)
    socket: Arc<UdpSocket>,
    /// Resolved local address (port filled in after binding port 0)
    local_addr: SocketAddr,
}

impl UdpEndpoint {
    /// Bind a UDP socket at `addr` with `SO_REUSEADDR` set.
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let domain = Domain::for_address(addr);
        let socket2 = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket2.set_reuse_address(true)?;

        #[cfg(unix)]
        if env_flag("SHUB_REUSEPORT") {
            set_reuseport(&socket2)?;
            log::info!("[UDP] SO_REUSEPORT enabled via SHUB_REUSEPORT=1 (multi-process mode)");
        }

        socket2.bind(&addr.into())?;
        let socket: UdpSocket = socket2.into();
        let local_addr = socket.local_addr()?;
        log::debug!("[UDP] endpoint bound addr={}", local_addr);

        Ok(Self {
            socket: Arc::new(socket),
            local_addr,
        })
    }

    /// Bind to an OS-assigned ephemeral port on all interfaces.
    ///
    /// Used by the generator (source port does not matter) and by tests.
    pub fn ephemeral() -> io::Result<Self> {
        Self::bind("0.0.0.0:0".parse().map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "invalid wildcard address")
        })?)
    }

    /// Send one datagram to `dest`.
    pub fn send_to(&self, data: &[u8], dest: SocketAddr) -> io::Result<usize> {
        let sent = match self.socket.send_to(data, dest) {
            Ok(n) => n,
            Err(err) => {
                log::debug!(
                    "[UDP] send error={} dest={} len={} src={}",
                    err,
                    dest,
                    data.len(),
                    self.local_addr
                );
                return Err(err);
            }
        };
        log::debug!("[UDP] send dest={} len={}", dest, sent);
        Ok(sent)
    }

    /// Get shared socket reference for the receiver thread.
    #[must_use]
    pub fn socket(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.socket)
    }

    /// Resolved local address.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// Set `SO_REUSEPORT` on a socket for multi-process port sharing.
///
/// Only available on unix systems.
#[cfg(unix)]
fn set_reuseport(socket: &Socket) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;
    let fd = socket.as_raw_fd();
    let optval: libc::c_int = 1;
    // SAFETY: setsockopt FFI with valid fd, standard socket option, and correctly sized optval pointer
    let ret = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEPORT,
            &optval as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_ephemeral_resolves_port() {
        let endpoint = UdpEndpoint::ephemeral().expect("ephemeral bind should succeed");
        assert_ne!(endpoint.local_addr().port(), 0);
    }

    #[test]
    fn test_socket_sharing() {
        let endpoint = UdpEndpoint::ephemeral().expect("ephemeral bind should succeed");
        let socket1 = endpoint.socket();
        let socket2 = endpoint.socket();
        assert!(Arc::ptr_eq(&socket1, &socket2));
    }

    #[test]
    fn test_send_to_loopback() {
        let tx = UdpEndpoint::ephemeral().expect("tx bind should succeed");
        let rx = UdpEndpoint::bind("127.0.0.1:0".parse().expect("valid address"))
            .expect("rx bind should succeed");

        let sent = tx
            .send_to(b"probe", rx.local_addr())
            .expect("send should succeed");
        assert_eq!(sent, 5);

        let mut buf = [0u8; 16];
        rx.socket()
            .set_read_timeout(Some(std::time::Duration::from_secs(2)))
            .expect("set timeout should succeed");
        let (len, src) = rx
            .socket()
            .recv_from(&mut buf)
            .expect("recv should succeed");
        assert_eq!(&buf[..len], b"probe");
        assert_eq!(src.port(), tx.local_addr().port());
    }

    #[test]
    fn test_bind_distinct_endpoints_get_distinct_ports() {
        let first = UdpEndpoint::ephemeral().expect("first bind should succeed");
        let second = UdpEndpoint::ephemeral().expect("second bind should succeed");
        assert_ne!(first.local_addr().port(), second.local_addr().port());
    }
}
