// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed-capacity group membership table.
//!
//! Each slot maps one group identifier to up to `H` handler identities. The
//! table never grows: when it runs out of room the join path overwrites
//! instead of failing.
//!
//! ## Capacity policy
//!
//! - Group known but its handler sub-slots all taken by other handlers:
//!   sub-slot 0 is overwritten (the old handler silently stops receiving that
//!   group).
//! - Group unknown and every slot taken by other groups: slot 0 is repurposed
//!   for the new group, dropping all of its handlers.
//!
//! Both cases are logged at `warn` and counted in [`RegistryStats`], and the
//! [`JoinOutcome`] names what was evicted.

use super::address::{group_id, GroupId};
use crate::transport::GroupTransport;
use std::fmt;
use std::net::Ipv6Addr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default number of group slots.
pub const MAX_GROUPS: usize = 4;

/// Default number of handlers per group.
pub const MAX_HANDLERS: usize = 3;

/// Stable identity of a group handler.
///
/// Handlers are compared by identifier, never by address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(pub u16);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler#{}", self.0)
    }
}

/// One row of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupSlot<const H: usize> {
    group: Option<GroupId>,
    handlers: [Option<HandlerId>; H],
}

impl<const H: usize> GroupSlot<H> {
    const FREE: Self = Self {
        group: None,
        handlers: [None; H],
    };

    pub fn group(&self) -> Option<GroupId> {
        self.group
    }

    /// Raw group identifier, 0 when the slot is free.
    pub fn group_id(&self) -> u16 {
        self.group.map_or(0, GroupId::get)
    }

    pub fn is_free(&self) -> bool {
        self.group.is_none()
    }

    /// Handler sub-slots in index order.
    pub fn handler_slots(&self) -> &[Option<HandlerId>; H] {
        &self.handlers
    }

    /// Occupied handler sub-slots in index order.
    pub fn handlers(&self) -> impl Iterator<Item = HandlerId> + '_ {
        self.handlers.iter().flatten().copied()
    }

    pub fn contains(&self, handler: HandlerId) -> bool {
        self.handlers.contains(&Some(handler))
    }

    fn has_no_handlers(&self) -> bool {
        self.handlers.iter().all(Option::is_none)
    }
}

/// Result of [`GroupRegistry::join`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Handler installed; `new_group` is set when the slot was claimed by this call.
    Joined {
        slot: usize,
        handler_slot: usize,
        new_group: bool,
    },
    /// Handler was already registered for the group.
    AlreadyMember { slot: usize, handler_slot: usize },
    /// Group was full; `evicted` lost its sub-slot 0.
    HandlerEvicted { slot: usize, evicted: HandlerId },
    /// Table was full; slot 0 dropped `evicted_group` and its handlers.
    GroupEvicted {
        evicted_group: GroupId,
        evicted_handlers: Vec<HandlerId>,
    },
    /// Group identifier 0 is the free marker and cannot be joined.
    ReservedGroup,
}

/// Eviction counters.
#[derive(Debug, Default)]
pub struct RegistryStats {
    pub handler_evictions: AtomicU64,
    pub group_evictions: AtomicU64,
}

impl RegistryStats {
    pub fn snapshot(&self) -> RegistryStatsSnapshot {
        RegistryStatsSnapshot {
            handler_evictions: self.handler_evictions.load(Ordering::Relaxed),
            group_evictions: self.group_evictions.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStatsSnapshot {
    pub handler_evictions: u64,
    pub group_evictions: u64,
}

/// Group membership table with `G` slots of `H` handlers each.
#[derive(Debug)]
pub struct GroupRegistry<const G: usize = MAX_GROUPS, const H: usize = MAX_HANDLERS> {
    slots: [GroupSlot<H>; G],
    stats: RegistryStats,
}

impl<const G: usize, const H: usize> Default for GroupRegistry<G, H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const G: usize, const H: usize> GroupRegistry<G, H> {
    /// Create an empty table.
    pub fn new() -> Self {
        assert!(G > 0 && H > 0, "registry needs at least one slot");
        Self {
            slots: [GroupSlot::FREE; G],
            stats: RegistryStats::default(),
        }
    }

    /// Add `handler` to the group of `address`.
    ///
    /// Calls `transport.join_group` whenever a slot is (re)assigned to the
    /// group. A failing join side effect is logged and the table entry kept.
    pub fn join<T: GroupTransport + ?Sized>(
        &mut self,
        address: &Ipv6Addr,
        handler: HandlerId,
        transport: &mut T,
    ) -> JoinOutcome {
        let Some(group) = GroupId::of(address) else {
            tracing::warn!("join {}: group identifier 0 is reserved, ignoring", address);
            return JoinOutcome::ReservedGroup;
        };

        // An existing slot for the group wins over an earlier free one.
        let found = self
            .slots
            .iter()
            .position(|s| s.group == Some(group))
            .or_else(|| self.slots.iter().position(GroupSlot::is_free));

        let Some(slot_idx) = found else {
            return self.evict_first_group(address, group, handler, transport);
        };

        let slot = &mut self.slots[slot_idx];
        let new_group = slot.group.is_none();
        if new_group {
            slot.group = Some(group);
            network_join(transport, address);
            tracing::info!("group {} assigned to slot {}", group, slot_idx);
        }

        let sub = slot
            .handlers
            .iter()
            .position(|h| h.is_none() || *h == Some(handler));

        match sub {
            Some(handler_slot) if slot.handlers[handler_slot] == Some(handler) => {
                tracing::debug!(
                    "{} already joined group {} (slot {}/{})",
                    handler,
                    group,
                    slot_idx,
                    handler_slot
                );
                JoinOutcome::AlreadyMember {
                    slot: slot_idx,
                    handler_slot,
                }
            }
            Some(handler_slot) => {
                slot.handlers[handler_slot] = Some(handler);
                tracing::info!(
                    "{} joined group {} (slot {}/{})",
                    handler,
                    group,
                    slot_idx,
                    handler_slot
                );
                JoinOutcome::Joined {
                    slot: slot_idx,
                    handler_slot,
                    new_group,
                }
            }
            None => {
                // Every sub-slot holds a different handler.
                let evicted = slot.handlers[0].unwrap_or(handler);
                slot.handlers[0] = Some(handler);
                self.stats.handler_evictions.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    "group {} full: {} replaces {} in slot {}/0",
                    group,
                    handler,
                    evicted,
                    slot_idx
                );
                JoinOutcome::HandlerEvicted {
                    slot: slot_idx,
                    evicted,
                }
            }
        }
    }

    fn evict_first_group<T: GroupTransport + ?Sized>(
        &mut self,
        address: &Ipv6Addr,
        group: GroupId,
        handler: HandlerId,
        transport: &mut T,
    ) -> JoinOutcome {
        let slot = &mut self.slots[0];
        let evicted_handlers: Vec<HandlerId> = slot.handlers().collect();
        // Slots past the free check always carry a group.
        let evicted_group = slot.group.unwrap_or(group);

        *slot = GroupSlot::FREE;
        slot.group = Some(group);
        slot.handlers[0] = Some(handler);

        // The evicted group's network membership is not dropped here: only
        // its identifier survives in the table, not the full address.
        network_join(transport, address);

        self.stats.group_evictions.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            "group table full: group {} evicts group {} ({} handlers) from slot 0",
            group,
            evicted_group,
            evicted_handlers.len()
        );

        JoinOutcome::GroupEvicted {
            evicted_group,
            evicted_handlers,
        }
    }

    /// Remove `handler` from the group of `address`.
    ///
    /// A slot left without handlers is freed and `transport.leave_group` is
    /// called. Unknown pairs are ignored.
    pub fn leave<T: GroupTransport + ?Sized>(
        &mut self,
        address: &Ipv6Addr,
        handler: HandlerId,
        transport: &mut T,
    ) {
        let Some(group) = GroupId::of(address) else {
            return;
        };

        for (slot_idx, slot) in self.slots.iter_mut().enumerate() {
            if slot.group != Some(group) {
                continue;
            }

            if let Some(sub) = slot.handlers.iter().position(|h| *h == Some(handler)) {
                slot.handlers[sub] = None;
                tracing::info!(
                    "{} left group {} (slot {}/{})",
                    handler,
                    group,
                    slot_idx,
                    sub
                );
            }

            if slot.has_no_handlers() {
                if let Err(e) = transport.leave_group(address) {
                    tracing::warn!("leave_group({}) failed: {}", address, e);
                }
                slot.group = None;
                tracing::info!("group {} released slot {}", group, slot_idx);
            }
        }
    }

    /// All slots in table order.
    pub fn slots(&self) -> &[GroupSlot<H>; G] {
        &self.slots
    }

    /// Slot index holding `group`.
    pub fn slot_of(&self, group: GroupId) -> Option<usize> {
        self.slots.iter().position(|s| s.group == Some(group))
    }

    /// Slot holding the raw group identifier, if any.
    pub fn find(&self, raw_group_id: u16) -> Option<&GroupSlot<H>> {
        let group = GroupId::new(raw_group_id)?;
        self.slots.iter().find(|s| s.group == Some(group))
    }

    /// Handlers registered for the raw group identifier, in sub-slot order.
    pub fn handlers_for(&self, raw_group_id: u16) -> Vec<HandlerId> {
        self.find(raw_group_id)
            .map(|slot| slot.handlers().collect())
            .unwrap_or_default()
    }

    /// Groups `handler` currently belongs to, in slot order.
    pub fn groups_of(&self, handler: HandlerId) -> Vec<GroupId> {
        self.slots
            .iter()
            .filter(|s| s.contains(handler))
            .filter_map(|s| s.group)
            .collect()
    }

    /// Whether `handler` is registered under `address`'s group.
    pub fn is_member(&self, address: &Ipv6Addr, handler: HandlerId) -> bool {
        self.find(group_id(address))
            .is_some_and(|slot| slot.contains(handler))
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_free()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> RegistryStatsSnapshot {
        self.stats.snapshot()
    }
}

fn network_join<T: GroupTransport + ?Sized>(transport: &mut T, address: &Ipv6Addr) {
    if let Err(e) = transport.join_group(address) {
        tracing::warn!("join_group({}) failed: {}", address, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{RecordingTransport, TransportEvent};

    fn addr(id: u16) -> Ipv6Addr {
        Ipv6Addr::new(0xff15, 0, 0, 0, 0, 0, 0, id)
    }

    const A: HandlerId = HandlerId(1);
    const B: HandlerId = HandlerId(2);
    const C: HandlerId = HandlerId(3);
    const D: HandlerId = HandlerId(4);

    #[test]
    fn test_join_claims_free_slot_and_joins_network() {
        let mut registry: GroupRegistry = GroupRegistry::new();
        let mut transport = RecordingTransport::new();

        let outcome = registry.join(&addr(7), A, &mut transport);
        assert_eq!(
            outcome,
            JoinOutcome::Joined {
                slot: 0,
                handler_slot: 0,
                new_group: true
            }
        );
        assert_eq!(registry.slots()[0].group_id(), 7);
        assert_eq!(transport.events(), &[TransportEvent::Joined(addr(7))]);
    }

    #[test]
    fn test_join_is_idempotent() {
        let mut registry: GroupRegistry = GroupRegistry::new();
        let mut transport = RecordingTransport::new();

        registry.join(&addr(7), A, &mut transport);
        let before = *registry.slots();
        let outcome = registry.join(&addr(7), A, &mut transport);

        assert_eq!(
            outcome,
            JoinOutcome::AlreadyMember {
                slot: 0,
                handler_slot: 0
            }
        );
        assert_eq!(*registry.slots(), before);
        assert_eq!(transport.join_count(), 1);
    }

    #[test]
    fn test_second_handler_shares_slot_without_network_join() {
        let mut registry: GroupRegistry = GroupRegistry::new();
        let mut transport = RecordingTransport::new();

        registry.join(&addr(7), A, &mut transport);
        let outcome = registry.join(&addr(7), B, &mut transport);

        assert_eq!(
            outcome,
            JoinOutcome::Joined {
                slot: 0,
                handler_slot: 1,
                new_group: false
            }
        );
        assert_eq!(transport.join_count(), 1);
        assert_eq!(registry.handlers_for(7), vec![A, B]);
    }

    #[test]
    fn test_fourth_handler_overwrites_sub_slot_zero() {
        let mut registry: GroupRegistry = GroupRegistry::new();
        let mut transport = RecordingTransport::new();

        registry.join(&addr(7), A, &mut transport);
        registry.join(&addr(7), B, &mut transport);
        registry.join(&addr(7), C, &mut transport);
        let outcome = registry.join(&addr(7), D, &mut transport);

        assert_eq!(
            outcome,
            JoinOutcome::HandlerEvicted {
                slot: 0,
                evicted: A
            }
        );
        assert_eq!(registry.handlers_for(7), vec![D, B, C]);
        assert_eq!(registry.stats().handler_evictions, 1);
    }

    #[test]
    fn test_full_table_evicts_slot_zero() {
        let mut registry: GroupRegistry = GroupRegistry::new();
        let mut transport = RecordingTransport::new();

        for id in 1..=4 {
            registry.join(&addr(id), A, &mut transport);
        }
        registry.join(&addr(1), B, &mut transport);

        let outcome = registry.join(&addr(5), C, &mut transport);
        assert_eq!(
            outcome,
            JoinOutcome::GroupEvicted {
                evicted_group: GroupId::new(1).expect("non-zero"),
                evicted_handlers: vec![A, B],
            }
        );
        assert_eq!(registry.slots()[0].group_id(), 5);
        assert_eq!(
            registry.slots()[0].handler_slots(),
            &[Some(C), None, None]
        );
        assert!(registry.find(1).is_none());
        assert_eq!(transport.join_count(), 5);
        assert_eq!(registry.stats().group_evictions, 1);
    }

    #[test]
    fn test_leave_frees_slot_when_last_handler_goes() {
        let mut registry: GroupRegistry = GroupRegistry::new();
        let mut transport = RecordingTransport::new();

        registry.join(&addr(7), A, &mut transport);
        registry.leave(&addr(7), A, &mut transport);

        assert!(registry.slots()[0].is_free());
        assert_eq!(registry.slots()[0].group_id(), 0);
        assert_eq!(transport.leave_count(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_leave_keeps_slot_with_remaining_handlers() {
        let mut registry: GroupRegistry = GroupRegistry::new();
        let mut transport = RecordingTransport::new();

        registry.join(&addr(7), A, &mut transport);
        registry.join(&addr(7), B, &mut transport);
        registry.leave(&addr(7), A, &mut transport);

        assert_eq!(registry.handlers_for(7), vec![B]);
        assert_eq!(transport.leave_count(), 0);
    }

    #[test]
    fn test_leave_unknown_pair_is_noop() {
        let mut registry: GroupRegistry = GroupRegistry::new();
        let mut transport = RecordingTransport::new();

        registry.join(&addr(7), A, &mut transport);
        registry.leave(&addr(7), B, &mut transport);
        registry.leave(&addr(9), A, &mut transport);

        assert_eq!(registry.handlers_for(7), vec![A]);
        assert_eq!(transport.leave_count(), 0);
    }

    #[test]
    fn test_rejoin_after_leave_reuses_slot() {
        let mut registry: GroupRegistry = GroupRegistry::new();
        let mut transport = RecordingTransport::new();

        registry.join(&addr(7), A, &mut transport);
        registry.join(&addr(8), A, &mut transport);
        registry.leave(&addr(7), A, &mut transport);
        let outcome = registry.join(&addr(9), B, &mut transport);

        assert!(matches!(outcome, JoinOutcome::Joined { slot: 0, .. }));
        assert_eq!(registry.groups_of(A), vec![GroupId::new(8).expect("non-zero")]);
    }

    #[test]
    fn test_reserved_group_is_ignored() {
        let mut registry: GroupRegistry = GroupRegistry::new();
        let mut transport = RecordingTransport::new();

        let outcome = registry.join(&addr(0), A, &mut transport);
        assert_eq!(outcome, JoinOutcome::ReservedGroup);
        assert!(registry.is_empty());
        assert!(transport.events().is_empty());
    }

    #[test]
    fn test_custom_capacity() {
        let mut registry: GroupRegistry<1, 1> = GroupRegistry::new();
        let mut transport = RecordingTransport::new();

        registry.join(&addr(1), A, &mut transport);
        assert_eq!(
            registry.join(&addr(1), B, &mut transport),
            JoinOutcome::HandlerEvicted {
                slot: 0,
                evicted: A
            }
        );
        assert!(matches!(
            registry.join(&addr(2), C, &mut transport),
            JoinOutcome::GroupEvicted { .. }
        ));
        assert_eq!(registry.handlers_for(2), vec![C]);
    }

    #[test]
    fn test_is_member() {
        let mut registry: GroupRegistry = GroupRegistry::new();
        let mut transport = RecordingTransport::new();

        registry.join(&addr(7), A, &mut transport);
        assert!(registry.is_member(&addr(7), A));
        assert!(registry.is_member(&Ipv6Addr::new(0xff12, 0, 0, 0, 0, 0, 0, 7), A));
        assert!(!registry.is_member(&addr(7), B));
    }

    #[test]
    fn test_existing_group_slot_wins_over_earlier_free_slot() {
        let mut registry: GroupRegistry = GroupRegistry::new();
        let mut transport = RecordingTransport::new();

        registry.join(&addr(1), A, &mut transport);
        registry.join(&addr(7), B, &mut transport);
        registry.leave(&addr(1), A, &mut transport);
        let outcome = registry.join(&addr(7), C, &mut transport);

        assert_eq!(
            outcome,
            JoinOutcome::Joined {
                slot: 1,
                handler_slot: 1,
                new_group: false
            }
        );
        let ids: Vec<u16> = registry.slots().iter().map(GroupSlot::group_id).collect();
        assert_eq!(ids, vec![0, 7, 0, 0]);
        assert_eq!(transport.join_count(), 2);
        assert_eq!(registry.handlers_for(7), vec![B, C]);

        registry.join(&addr(7), B, &mut transport);
        assert_eq!(registry.groups_of(B), vec![GroupId::new(7).expect("non-zero")]);
    }
}
