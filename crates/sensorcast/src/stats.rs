// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Server counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Request, transfer and group traffic counters.
#[derive(Debug)]
pub struct ServerStats {
    /// Requests handled, successful or not.
    pub requests: AtomicU64,

    /// Chunks served.
    pub chunks_served: AtomicU64,

    /// Payload bytes served in chunks.
    pub bytes_served: AtomicU64,

    /// Requests rejected for a block offset beyond the transfer budget.
    pub range_rejections: AtomicU64,

    /// Requests whose representation could not be rendered.
    pub render_failures: AtomicU64,

    /// Requests answered with any other error.
    pub request_errors: AtomicU64,

    /// Group update datagrams sent.
    pub updates_sent: AtomicU64,

    /// Group update sends that failed.
    pub send_failures: AtomicU64,

    /// Inbound group datagrams delivered to at least one handler.
    pub datagrams_dispatched: AtomicU64,

    /// Inbound group datagrams dropped (unknown group or bad frame).
    pub datagrams_dropped: AtomicU64,

    /// Server start time.
    pub started: Instant,
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerStats {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            chunks_served: AtomicU64::new(0),
            bytes_served: AtomicU64::new(0),
            range_rejections: AtomicU64::new(0),
            render_failures: AtomicU64::new(0),
            request_errors: AtomicU64::new(0),
            updates_sent: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
            datagrams_dispatched: AtomicU64::new(0),
            datagrams_dropped: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_chunk(&self, bytes: usize) {
        self.chunks_served.fetch_add(1, Ordering::Relaxed);
        self.bytes_served.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Get snapshot of current stats.
    pub fn snapshot(&self) -> ServerStatsSnapshot {
        ServerStatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            chunks_served: self.chunks_served.load(Ordering::Relaxed),
            bytes_served: self.bytes_served.load(Ordering::Relaxed),
            range_rejections: self.range_rejections.load(Ordering::Relaxed),
            render_failures: self.render_failures.load(Ordering::Relaxed),
            request_errors: self.request_errors.load(Ordering::Relaxed),
            updates_sent: self.updates_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            datagrams_dispatched: self.datagrams_dispatched.load(Ordering::Relaxed),
            datagrams_dropped: self.datagrams_dropped.load(Ordering::Relaxed),
            uptime: self.started.elapsed(),
        }
    }
}

/// Point-in-time copy of [`ServerStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerStatsSnapshot {
    pub requests: u64,
    pub chunks_served: u64,
    pub bytes_served: u64,
    pub range_rejections: u64,
    pub render_failures: u64,
    pub request_errors: u64,
    pub updates_sent: u64,
    pub send_failures: u64,
    pub datagrams_dispatched: u64,
    pub datagrams_dropped: u64,
    pub uptime: Duration,
}
