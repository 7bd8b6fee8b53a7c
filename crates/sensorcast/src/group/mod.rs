// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Multicast group communication: address codec, membership table, fan-out.

pub mod address;
pub mod dispatch;
pub mod registry;

pub use address::{
    group_address, group_id, parse_group_address, parse_group_address_bytes, GroupId,
    GROUP_PREFIX,
};
pub use dispatch::{CallbackHandlers, GroupDispatcher, GroupHandler};
pub use registry::{
    GroupRegistry, GroupSlot, HandlerId, JoinOutcome, RegistryStats, RegistryStatsSnapshot,
    MAX_GROUPS, MAX_HANDLERS,
};
