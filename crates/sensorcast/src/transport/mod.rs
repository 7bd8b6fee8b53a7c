// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Network side of group communication.
//!
//! The registry only needs three primitives from the network layer: join a
//! multicast address, leave it, and send a fire-and-forget datagram to it.
//! [`UdpGroupTransport`] provides them over IPv6 UDP; [`RecordingTransport`]
//! records calls in memory for tests and dry runs.

pub mod coap;
pub mod udp;

pub use coap::{decode_payload, encode_group_update, MessageIdCounter, COAP_PORT};
pub use udp::UdpGroupTransport;

use std::io;
use std::net::Ipv6Addr;

/// Multicast membership and send primitives.
pub trait GroupTransport {
    /// Subscribe the node to `address`.
    fn join_group(&mut self, address: &Ipv6Addr) -> io::Result<()>;

    /// Drop the subscription to `address`.
    fn leave_group(&mut self, address: &Ipv6Addr) -> io::Result<()>;

    /// Send one non-confirmable datagram to `address`.
    fn send_to_group(&mut self, address: &Ipv6Addr, datagram: &[u8]) -> io::Result<()>;
}

/// One call made against a [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Joined(Ipv6Addr),
    Left(Ipv6Addr),
    Sent(Ipv6Addr, Vec<u8>),
}

/// In-memory transport that records every call.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    events: Vec<TransportEvent>,
    fail_sends: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `send_to_group` fail.
    pub fn failing_sends(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    /// All recorded calls in order.
    pub fn events(&self) -> &[TransportEvent] {
        &self.events
    }

    /// Datagrams sent so far, with their destinations.
    pub fn sent(&self) -> Vec<(Ipv6Addr, &[u8])> {
        self.events
            .iter()
            .filter_map(|e| match e {
                TransportEvent::Sent(addr, data) => Some((*addr, data.as_slice())),
                _ => None,
            })
            .collect()
    }

    /// Number of `join_group` calls so far.
    pub fn join_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, TransportEvent::Joined(_)))
            .count()
    }

    /// Number of `leave_group` calls so far.
    pub fn leave_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, TransportEvent::Left(_)))
            .count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl GroupTransport for RecordingTransport {
    fn join_group(&mut self, address: &Ipv6Addr) -> io::Result<()> {
        self.events.push(TransportEvent::Joined(*address));
        Ok(())
    }

    fn leave_group(&mut self, address: &Ipv6Addr) -> io::Result<()> {
        self.events.push(TransportEvent::Left(*address));
        Ok(())
    }

    fn send_to_group(&mut self, address: &Ipv6Addr, datagram: &[u8]) -> io::Result<()> {
        if self.fail_sends {
            return Err(io::Error::new(io::ErrorKind::Other, "send disabled"));
        }
        self.events
            .push(TransportEvent::Sent(*address, datagram.to_vec()));
        Ok(())
    }
}
