// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Server configuration.
//!
//! Supports both programmatic and file-based configuration.

use crate::block::{BlockLimits, CHUNKS_TOTAL, MAX_CHUNK_SIZE};
use crate::group::parse_group_address;
use crate::resource::ResourceId;
use crate::transport::COAP_PORT;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Smallest chunk a block-wise transfer may use.
pub const MIN_CHUNK_SIZE: usize = 16;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Node name (for identification).
    #[serde(default = "default_name")]
    pub name: String,

    /// UDP port for group traffic.
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,

    /// IPv6 interface index for multicast (0 = system default).
    #[serde(default)]
    pub interface: u32,

    /// Largest chunk served per exchange.
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,

    /// Cap on bytes served for one message.
    #[serde(default = "default_chunks_total")]
    pub chunks_total: usize,

    /// Temperature sampling period (seconds).
    #[serde(default = "default_temperature_period")]
    pub temperature_period_secs: u64,

    /// Minimum spacing between accepted taps (milliseconds).
    #[serde(default = "default_tap_debounce")]
    pub tap_debounce_ms: u64,

    /// Socket poll interval (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Statistics reporting interval (seconds, 0 = off).
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Group memberships established at startup.
    #[serde(default)]
    pub groups: Vec<GroupMembership>,
}

fn default_name() -> String {
    "sensorcast".to_string()
}

fn default_bind_port() -> u16 {
    COAP_PORT
}

fn default_max_chunk_size() -> usize {
    MAX_CHUNK_SIZE
}

fn default_chunks_total() -> usize {
    CHUNKS_TOTAL
}

fn default_temperature_period() -> u64 {
    5
}

fn default_tap_debounce() -> u64 {
    1000
}

fn default_poll_interval() -> u64 {
    50
}

fn default_stats_interval() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            bind_port: default_bind_port(),
            interface: 0,
            max_chunk_size: default_max_chunk_size(),
            chunks_total: default_chunks_total(),
            temperature_period_secs: default_temperature_period(),
            tap_debounce_ms: default_tap_debounce(),
            poll_interval_ms: default_poll_interval(),
            stats_interval_secs: default_stats_interval(),
            log_level: default_log_level(),
            groups: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_chunk_size < MIN_CHUNK_SIZE {
            return Err(ConfigError::Invalid(format!(
                "max_chunk_size {} is below the minimum block size {}",
                self.max_chunk_size, MIN_CHUNK_SIZE
            )));
        }
        if self.chunks_total < self.max_chunk_size {
            return Err(ConfigError::Invalid(format!(
                "chunks_total {} is smaller than max_chunk_size {}",
                self.chunks_total, self.max_chunk_size
            )));
        }
        if self.temperature_period_secs == 0 {
            return Err(ConfigError::Invalid(
                "temperature_period_secs must be positive".into(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be positive".into()));
        }

        for (i, membership) in self.groups.iter().enumerate() {
            let resource = ResourceId::from_path(&membership.resource).ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "Group {} names unknown resource '{}'",
                    i, membership.resource
                ))
            })?;
            if !resource.is_group_capable() {
                return Err(ConfigError::Invalid(format!(
                    "Group {}: resource '{}' does not take part in groups",
                    i, membership.resource
                )));
            }
            if let Err(e) = parse_group_address(&membership.address) {
                return Err(ConfigError::Invalid(format!("Group {}: {}", i, e)));
            }
        }

        Ok(())
    }

    /// Add a startup group membership.
    pub fn add_group(&mut self, membership: GroupMembership) {
        self.groups.push(membership);
    }

    pub fn block_limits(&self) -> BlockLimits {
        BlockLimits {
            max_chunk_size: self.max_chunk_size,
            chunks_total: self.chunks_total,
        }
    }

    pub fn tap_debounce(&self) -> Duration {
        Duration::from_millis(self.tap_debounce_ms)
    }

    pub fn temperature_period(&self) -> Duration {
        Duration::from_secs(self.temperature_period_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// One startup group membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembership {
    /// Resource path, e.g. `leds/red`.
    pub resource: String,

    /// Multicast group address, e.g. `ff15::5`.
    pub address: String,
}

impl GroupMembership {
    pub fn new(resource: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            address: address.into(),
        }
    }

    /// Parse the CLI form `resource=address`.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let (resource, address) = text.split_once('=').ok_or_else(|| {
            ConfigError::Invalid(format!("expected resource=address, got '{}'", text))
        })?;
        Ok(Self::new(resource.trim(), address.trim()))
    }
}
