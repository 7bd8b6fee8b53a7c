// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Block-wise response transfer.
//!
//! A resource renders its representation once into a [`RenderedMessage`];
//! each request/response exchange then pulls the next chunk through
//! [`ChunkEncoder::next_chunk`] until the [`TransferCursor`] is complete.
//!
//! Two limits apply:
//! - `max_chunk_size`: largest chunk served per exchange.
//! - `chunks_total`: hard cap on bytes served for one message. A transfer that
//!   reaches it ends there even if the message is longer.

use crate::error::{Error, Result};
use std::fmt;

/// Default maximum chunk size in bytes.
pub const MAX_CHUNK_SIZE: usize = 256;

/// Default cap on bytes served for one logical message.
pub const CHUNKS_TOTAL: usize = 1024;

/// Transfer position for one logical message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferCursor {
    /// Next chunk starts at `offset`.
    InProgress { offset: usize },
    /// Nothing left to send.
    Complete,
}

impl TransferCursor {
    pub const START: Self = Self::InProgress { offset: 0 };

    /// Map the signed offset convention (negative = done).
    pub fn from_raw(raw: i64) -> Self {
        match usize::try_from(raw) {
            Ok(offset) => Self::InProgress { offset },
            Err(_) => Self::Complete,
        }
    }

    /// Signed offset convention: `-1` once complete.
    pub fn to_raw(self) -> i64 {
        match self {
            // Offsets are bounded by `chunks_total`.
            Self::InProgress { offset } => i64::try_from(offset).unwrap_or(i64::MAX),
            Self::Complete => -1,
        }
    }

    pub fn offset(self) -> Option<usize> {
        match self {
            Self::InProgress { offset } => Some(offset),
            Self::Complete => None,
        }
    }

    pub fn is_complete(self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Representation tag shared by every chunk of one rendering.
///
/// CRC-32 of the complete message, so a peer fetching later chunks can tell
/// the representation changed underneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ETag(pub [u8; 4]);

impl ETag {
    pub fn of(bytes: &[u8]) -> Self {
        Self(crc32fast::hash(bytes).to_be_bytes())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Fully rendered representation with a fixed capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    bytes: Vec<u8>,
    etag: ETag,
}

impl RenderedMessage {
    /// Wrap rendered bytes, rejecting empty output and output above `capacity`.
    pub fn new(bytes: impl Into<Vec<u8>>, capacity: usize) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(Error::RenderFailure("rendering produced no bytes".into()));
        }
        if bytes.len() > capacity {
            return Err(Error::RenderFailure(format!(
                "rendering is {} bytes, buffer holds {}",
                bytes.len(),
                capacity
            )));
        }
        let etag = ETag::of(&bytes);
        Ok(Self { bytes, etag })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn etag(&self) -> ETag {
        self.etag
    }
}

/// One slice of a rendered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub bytes: &'a [u8],
    pub etag: ETag,
    /// Cursor for the following exchange.
    pub cursor: TransferCursor,
}

impl Chunk<'_> {
    /// Whether more chunks follow.
    pub fn more(&self) -> bool {
        !self.cursor.is_complete()
    }
}

/// Transfer limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLimits {
    pub max_chunk_size: usize,
    pub chunks_total: usize,
}

impl Default for BlockLimits {
    fn default() -> Self {
        Self {
            max_chunk_size: MAX_CHUNK_SIZE,
            chunks_total: CHUNKS_TOTAL,
        }
    }
}

/// Computes successive chunks of a rendered message.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkEncoder {
    limits: BlockLimits,
}

impl ChunkEncoder {
    pub fn new(limits: BlockLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> BlockLimits {
        self.limits
    }

    /// Reject requests starting at or beyond the transfer budget.
    ///
    /// Call before [`next_chunk`](Self::next_chunk).
    pub fn check_offset(&self, offset: usize) -> Result<()> {
        if offset >= self.limits.chunks_total {
            return Err(Error::RangeExceeded {
                offset,
                limit: self.limits.chunks_total,
            });
        }
        Ok(())
    }

    /// Chunk size to use for a client preference.
    ///
    /// Values outside `1..=max_chunk_size` fall back to `max_chunk_size`.
    pub fn effective_size(&self, preferred_size: i32) -> usize {
        match usize::try_from(preferred_size) {
            Ok(size) if size > 0 && size <= self.limits.max_chunk_size => size,
            _ => self.limits.max_chunk_size,
        }
    }

    /// Slice the chunk starting at `offset` and compute the next cursor.
    pub fn next_chunk<'a>(
        &self,
        message: &'a RenderedMessage,
        preferred_size: i32,
        offset: usize,
    ) -> Result<Chunk<'a>> {
        let total = message.len();
        if offset >= total {
            return Err(Error::TransferLength {
                offset,
                length: total,
            });
        }
        let remaining = total - offset;
        let size = self.effective_size(preferred_size);

        let (length, cursor) = if remaining > size {
            if offset + size > self.limits.chunks_total {
                let length = self.limits.chunks_total.saturating_sub(offset);
                tracing::debug!(
                    "chunk at {} reaches transfer cap {}, truncating to {} bytes",
                    offset,
                    self.limits.chunks_total,
                    length
                );
                (length, TransferCursor::Complete)
            } else {
                (
                    size,
                    TransferCursor::InProgress {
                        offset: offset + size,
                    },
                )
            }
        } else {
            (remaining, TransferCursor::Complete)
        };

        tracing::debug!(
            "chunk offset={} length={} total={} next={:?}",
            offset,
            length,
            total,
            cursor
        );

        Ok(Chunk {
            bytes: &message.as_bytes()[offset..offset + length],
            etag: message.etag(),
            cursor,
        })
    }
}
