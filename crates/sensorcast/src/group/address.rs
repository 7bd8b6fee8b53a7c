// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Multicast address parsing and group identifier extraction.
//!
//! Group addresses are transient multicast IPv6 addresses whose low 16 bits
//! carry the group identifier, by convention `FF15::<group_id>`.

use crate::error::{Error, Result};
use std::fmt;
use std::net::Ipv6Addr;
use std::num::NonZeroU16;

/// Scope/flags prefix used for outbound group updates (transient, site-local).
pub const GROUP_PREFIX: u16 = 0xff15;

/// Non-zero 16-bit group identifier.
///
/// Zero is reserved as the free-slot marker of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(NonZeroU16);

impl GroupId {
    /// Wrap a raw identifier, `None` for the reserved value 0.
    pub const fn new(raw: u16) -> Option<Self> {
        match NonZeroU16::new(raw) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }

    pub const fn get(self) -> u16 {
        self.0.get()
    }

    /// Group identifier of a multicast address, `None` if its low bits are 0.
    pub fn of(address: &Ipv6Addr) -> Option<Self> {
        Self::new(group_id(address))
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parse a multicast IPv6 literal received as a request payload.
///
/// Accepts the explicit eight-group notation (`FF12:0000:...:0001`) as well as
/// the compressed form (`FF15::7`). Surrounding whitespace and trailing NUL
/// padding are ignored; anything else must be part of the address.
pub fn parse_group_address(text: &str) -> Result<Ipv6Addr> {
    let trimmed = text.trim_end_matches('\0').trim();
    if trimmed.is_empty() {
        return Err(Error::MalformedAddress("empty address".into()));
    }

    let address: Ipv6Addr = trimmed
        .parse()
        .map_err(|_| Error::MalformedAddress(trimmed.to_string()))?;

    if !address.is_multicast() {
        return Err(Error::MalformedAddress(format!(
            "{} is not a multicast address",
            trimmed
        )));
    }

    Ok(address)
}

/// Parse a multicast literal from raw payload bytes.
pub fn parse_group_address_bytes(payload: &[u8]) -> Result<Ipv6Addr> {
    let text = std::str::from_utf8(payload)
        .map_err(|_| Error::MalformedAddress("payload is not UTF-8".into()))?;
    parse_group_address(text)
}

/// Low 16 bits (bytes 14-15) of the address.
pub fn group_id(address: &Ipv6Addr) -> u16 {
    let octets = address.octets();
    u16::from_be_bytes([octets[14], octets[15]])
}

/// Destination address for group updates: `FF15::<group_id>`.
pub fn group_address(group: GroupId) -> Ipv6Addr {
    Ipv6Addr::new(GROUP_PREFIX, 0, 0, 0, 0, 0, 0, group.get())
}
