// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! IPv6 UDP transport for group communication.
//!
//! One receive socket per joined group, bound to the group address itself so
//! the kernel only delivers that group's datagrams to it; the destination of
//! every received datagram is therefore known without packet-info ancillary
//! data. A separate unbound socket sends updates.

use super::GroupTransport;
use socket2::{Domain, Protocol, Socket, Type};
use std::collections::BTreeMap;
use std::io;
use std::net::{Ipv6Addr, SocketAddr, SocketAddrV6, UdpSocket};

/// Hop limit for outbound updates (stay on the local link/site by default).
const DEFAULT_MULTICAST_HOPS: u32 = 1;

/// Multicast group transport over IPv6 UDP sockets.
pub struct UdpGroupTransport {
    port: u16,
    interface: u32,
    send_socket: UdpSocket,
    groups: BTreeMap<Ipv6Addr, UdpSocket>,
}

impl UdpGroupTransport {
    /// Create a transport for `port` on the given interface index (0 = default).
    pub fn new(port: u16, interface: u32) -> io::Result<Self> {
        let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_only_v6(true)?;
        socket.set_multicast_if_v6(interface)?;
        socket.set_multicast_hops_v6(DEFAULT_MULTICAST_HOPS)?;
        socket.set_multicast_loop_v6(true)?;
        let bind_addr = SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, 0, 0, 0);
        socket.bind(&SocketAddr::V6(bind_addr).into())?;

        tracing::debug!("[UDP] send socket ready port={} iface={}", port, interface);

        Ok(Self {
            port,
            interface,
            send_socket: socket.into(),
            groups: BTreeMap::new(),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Groups with an open receive socket.
    pub fn joined(&self) -> impl Iterator<Item = &Ipv6Addr> {
        self.groups.keys()
    }

    /// Receive one pending datagram from any joined group.
    ///
    /// Returns the group address it was sent to and its length, or `None`
    /// when no socket has data.
    pub fn poll_inbound(&mut self, buf: &mut [u8]) -> io::Result<Option<(Ipv6Addr, usize)>> {
        for (group, socket) in &self.groups {
            match socket.recv_from(buf) {
                Ok((len, from)) => {
                    tracing::trace!("[UDP] {} bytes from {} on group {}", len, from, group);
                    return Ok(Some((*group, len)));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    fn open_group_socket(&self, group: &Ipv6Addr) -> io::Result<UdpSocket> {
        let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_only_v6(true)?;
        socket.set_reuse_address(true)?;
        bind_group_socket(&socket, group, self.port, self.interface)?;
        socket.join_multicast_v6(group, self.interface)?;
        socket.set_nonblocking(true)?;
        Ok(socket.into())
    }
}

/// Bind `socket` to the group address itself. Bind failures are returned,
/// never retried on the wildcard address.
fn bind_group_socket(socket: &Socket, group: &Ipv6Addr, port: u16, interface: u32) -> io::Result<()> {
    let group_bind = SocketAddrV6::new(*group, port, 0, interface);
    socket.bind(&SocketAddr::V6(group_bind).into()).map_err(|e| {
        tracing::debug!("[UDP] bind to {} failed: {}", group_bind, e);
        e
    })
}

impl GroupTransport for UdpGroupTransport {
    fn join_group(&mut self, address: &Ipv6Addr) -> io::Result<()> {
        if self.groups.contains_key(address) {
            tracing::debug!("[UDP] already joined {}", address);
            return Ok(());
        }
        let socket = self.open_group_socket(address)?;
        self.groups.insert(*address, socket);
        tracing::debug!(
            "[UDP] join_multicast_v6({}) on interface {}",
            address,
            self.interface
        );
        Ok(())
    }

    fn leave_group(&mut self, address: &Ipv6Addr) -> io::Result<()> {
        match self.groups.remove(address) {
            Some(socket) => {
                socket.leave_multicast_v6(address, self.interface)?;
                tracing::debug!("[UDP] leave_multicast_v6({})", address);
            }
            None => tracing::debug!("[UDP] leave {}: not joined", address),
        }
        Ok(())
    }

    fn send_to_group(&mut self, address: &Ipv6Addr, datagram: &[u8]) -> io::Result<()> {
        let dest = SocketAddrV6::new(*address, self.port, 0, self.interface);
        let sent = self.send_socket.send_to(datagram, dest)?;
        tracing::trace!("[UDP] sent {} bytes to {}", sent, dest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_creation() {
        // IPv6 may be unavailable in sandboxed CI.
        if let Ok(transport) = UdpGroupTransport::new(0, 0) {
            assert_eq!(transport.port(), 0);
            assert_eq!(transport.joined().count(), 0);
        }
    }

    #[test]
    fn test_leave_unknown_group_is_ok() {
        if let Ok(mut transport) = UdpGroupTransport::new(0, 0) {
            let addr = Ipv6Addr::new(0xff15, 0, 0, 0, 0, 0, 0, 99);
            assert!(transport.leave_group(&addr).is_ok());
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_group_bind_failure_is_returned() {
        // Link-local scope on a missing interface cannot be bound.
        let Ok(socket) = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP)) else {
            return;
        };
        let group = Ipv6Addr::new(0xff12, 0, 0, 0, 0, 0, 0, 7);
        assert!(bind_group_socket(&socket, &group, 0, u32::MAX).is_err());
    }

    #[test]
    fn test_poll_without_groups() {
        if let Ok(mut transport) = UdpGroupTransport::new(0, 0) {
            let mut buf = [0u8; 64];
            assert!(matches!(transport.poll_inbound(&mut buf), Ok(None)));
        }
    }
}
