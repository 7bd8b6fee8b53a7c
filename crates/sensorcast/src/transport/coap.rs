// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Minimal CoAP framing for group updates (RFC 7252 Sec.3).
//!
//! ## Header Format
//!
//! ```text
//! +--------+--------+--------+--------+
//! |Ver|T|TKL|  Code  |   Message ID    |
//! +--------+--------+--------+--------+
//! | Token (0-8 bytes) ...  | Options ...| 0xFF | Payload ...
//! ```
//!
//! Outbound updates are NON PUT with no token and no options. The decoder
//! accepts any well-formed message and only extracts the payload.

use crate::error::{Error, Result};

/// Default CoAP UDP port.
pub const COAP_PORT: u16 = 5683;

const VERSION: u8 = 1;
const TYPE_NON: u8 = 1;
const CODE_PUT: u8 = 0x03;
const PAYLOAD_MARKER: u8 = 0xff;
const HEADER_SIZE: usize = 4;

/// Wrapping message id source for outbound updates.
#[derive(Debug, Default, Clone)]
pub struct MessageIdCounter {
    next: u16,
}

impl MessageIdCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> u16 {
        let id = self.next;
        self.next = self.next.wrapping_add(1);
        id
    }
}

/// Encode a non-confirmable PUT carrying `payload`.
pub fn encode_group_update(message_id: u16, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + 1 + payload.len());
    buf.push((VERSION << 6) | (TYPE_NON << 4));
    buf.push(CODE_PUT);
    buf.extend_from_slice(&message_id.to_be_bytes());
    if !payload.is_empty() {
        buf.push(PAYLOAD_MARKER);
        buf.extend_from_slice(payload);
    }
    buf
}

/// Extract the payload of a CoAP message, skipping token and options.
pub fn decode_payload(datagram: &[u8]) -> Result<&[u8]> {
    if datagram.len() < HEADER_SIZE {
        return Err(Error::Frame(format!(
            "datagram of {} bytes is shorter than the header",
            datagram.len()
        )));
    }
    let version = datagram[0] >> 6;
    if version != VERSION {
        return Err(Error::Frame(format!("unsupported version {}", version)));
    }
    let token_len = usize::from(datagram[0] & 0x0f);
    if token_len > 8 {
        return Err(Error::Frame(format!("token length {} > 8", token_len)));
    }

    let mut pos = HEADER_SIZE + token_len;
    if pos > datagram.len() {
        return Err(Error::Frame("truncated token".into()));
    }

    while pos < datagram.len() {
        let byte = datagram[pos];
        if byte == PAYLOAD_MARKER {
            let payload = &datagram[pos + 1..];
            if payload.is_empty() {
                return Err(Error::Frame("payload marker without payload".into()));
            }
            return Ok(payload);
        }
        pos += 1;
        let _delta = read_extended(datagram, &mut pos, byte >> 4)?;
        let length = read_extended(datagram, &mut pos, byte & 0x0f)?;
        pos = pos
            .checked_add(length)
            .filter(|&end| end <= datagram.len())
            .ok_or_else(|| Error::Frame("option value runs past datagram".into()))?;
    }

    Ok(&[])
}

fn read_extended(datagram: &[u8], pos: &mut usize, nibble: u8) -> Result<usize> {
    match nibble {
        0..=12 => Ok(usize::from(nibble)),
        13 => {
            let b = *datagram
                .get(*pos)
                .ok_or_else(|| Error::Frame("truncated option header".into()))?;
            *pos += 1;
            Ok(usize::from(b) + 13)
        }
        14 => {
            let bytes = datagram
                .get(*pos..*pos + 2)
                .ok_or_else(|| Error::Frame("truncated option header".into()))?;
            *pos += 2;
            Ok(usize::from(u16::from_be_bytes([bytes[0], bytes[1]])) + 269)
        }
        _ => Err(Error::Frame("reserved option nibble 15".into())),
    }
}
