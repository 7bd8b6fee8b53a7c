// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sensorcast sensor node
//!
//! Serves oBIX sensor and actuator resources with block-wise transfers and
//! IPv6 multicast group communication.
//!
//! # Features
//!
//! - **Group Membership**: resources join and leave `FF15::/16` groups via
//!   `<resource>/joinGroup` and `<resource>/leaveGroup` POSTs
//! - **Group Fan-out**: inbound group datagrams reach every joined handler
//! - **Group Updates**: sensor changes are pushed to every joined group
//! - **Block-wise Transfer**: representations served in bounded chunks
//!
//! # Quick Start
//!
//! ```bash
//! # Serve on the default CoAP port
//! sensorcast
//!
//! # Join the red LED to group ff15::5 at startup
//! sensorcast --join leds/red=ff15::5
//!
//! # Using config file
//! sensorcast --config sensorcast.toml
//! ```
//!
//! # Configuration File
//!
//! ```toml
//! name = "lab-node"
//! max_chunk_size = 64
//!
//! [[groups]]
//! resource = "leds/red"
//! address = "ff15::5"
//! ```
//!
//! # Library use
//!
//! ```
//! use sensorcast::{RecordingTransport, Request, Server, ServerOptions, Status};
//!
//! let mut server = Server::new(RecordingTransport::new(), ServerOptions::default());
//! let response = server.handle_request(&Request::post("leds/red/joinGroup", "ff15::5"));
//! assert_eq!(response.status, Status::Content);
//! assert_eq!(server.registry().len(), 1);
//! ```

pub mod block;
pub mod config;
pub mod device;
pub mod error;
pub mod group;
pub mod resource;
pub mod server;
pub mod stats;
pub mod transport;

pub use block::{BlockLimits, Chunk, ChunkEncoder, ETag, RenderedMessage, TransferCursor};
pub use config::{ConfigError, GroupMembership, ServerConfig};
pub use device::{Acceleration, DeviceState, Led};
pub use error::{Error, Result};
pub use group::{GroupDispatcher, GroupHandler, GroupId, GroupRegistry, HandlerId, JoinOutcome};
pub use resource::{Method, Request, ResourceId, Response, Status};
pub use server::{Server, ServerOptions};
pub use stats::{ServerStats, ServerStatsSnapshot};
pub use transport::{GroupTransport, RecordingTransport, UdpGroupTransport};
