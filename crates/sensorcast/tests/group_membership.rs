// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test readability

//! Group membership integration tests.
//!
//! Drives the registry and dispatcher through the public API with a
//! recording transport standing in for the network:
//! - join/leave side effects on the transport
//! - capacity exhaustion (handler and group eviction)
//! - fan-out of inbound payloads to joined handlers

use sensorcast::group::{
    group_address, parse_group_address, CallbackHandlers, GroupDispatcher, GroupId,
    GroupRegistry, HandlerId, JoinOutcome,
};
use sensorcast::transport::{RecordingTransport, TransportEvent};
use std::cell::RefCell;
use std::net::Ipv6Addr;
use std::rc::Rc;

fn addr(text: &str) -> Ipv6Addr {
    parse_group_address(text).expect("valid group address")
}

// ---------------------------------------------------------------------------
// Join / leave
// ---------------------------------------------------------------------------

#[test]
fn test_join_then_leave_round_trip_on_the_network() {
    let mut registry: GroupRegistry = GroupRegistry::new();
    let mut transport = RecordingTransport::new();
    let group = addr("ff15::20");

    let outcome = registry.join(&group, HandlerId(1), &mut transport);
    assert!(matches!(outcome, JoinOutcome::Joined { new_group: true, .. }));
    let outcome = registry.join(&group, HandlerId(2), &mut transport);
    assert!(matches!(outcome, JoinOutcome::Joined { new_group: false, .. }));
    assert_eq!(transport.join_count(), 1);

    registry.leave(&group, HandlerId(1), &mut transport);
    assert_eq!(transport.leave_count(), 0);
    registry.leave(&group, HandlerId(2), &mut transport);
    assert_eq!(
        transport.events(),
        &[TransportEvent::Joined(group), TransportEvent::Left(group)]
    );
    assert!(registry.is_empty());
}

#[test]
fn test_rejoin_is_idempotent() {
    let mut registry: GroupRegistry = GroupRegistry::new();
    let mut transport = RecordingTransport::new();
    let group = addr("ff15::21");

    registry.join(&group, HandlerId(7), &mut transport);
    let outcome = registry.join(&group, HandlerId(7), &mut transport);
    assert!(matches!(outcome, JoinOutcome::AlreadyMember { .. }));
    assert_eq!(registry.handlers_for(0x21), vec![HandlerId(7)]);
}

#[test]
fn test_leave_unknown_pair_is_silent() {
    let mut registry: GroupRegistry = GroupRegistry::new();
    let mut transport = RecordingTransport::new();
    registry.leave(&addr("ff15::99"), HandlerId(1), &mut transport);
    assert!(transport.events().is_empty());
}

#[test]
fn test_prefix_is_ignored_for_identity() {
    let mut registry: GroupRegistry = GroupRegistry::new();
    let mut transport = RecordingTransport::new();

    registry.join(&addr("ff02::30"), HandlerId(1), &mut transport);
    registry.join(&addr("ff15::30"), HandlerId(2), &mut transport);

    assert_eq!(registry.len(), 1);
    assert_eq!(registry.handlers_for(0x30), vec![HandlerId(1), HandlerId(2)]);
}

#[test]
fn test_freed_earlier_slot_does_not_split_a_group() {
    let mut registry: GroupRegistry = GroupRegistry::new();
    let mut transport = RecordingTransport::new();
    let first = addr("ff15::1");
    let shared = addr("ff15::7");

    registry.join(&first, HandlerId(1), &mut transport);
    registry.join(&shared, HandlerId(2), &mut transport);
    registry.leave(&first, HandlerId(1), &mut transport);
    registry.join(&shared, HandlerId(3), &mut transport);

    assert_eq!(registry.len(), 1);
    assert_eq!(transport.join_count(), 2);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut handlers = CallbackHandlers::new();
    for id in [2u16, 3] {
        let seen = Rc::clone(&seen);
        handlers.insert(HandlerId(id), move |_: &[u8]| seen.borrow_mut().push(id));
    }
    assert_eq!(
        GroupDispatcher::dispatch(&registry, &shared, b"on", &mut handlers),
        2
    );
    assert_eq!(*seen.borrow(), vec![2, 3]);
}

// ---------------------------------------------------------------------------
// Capacity exhaustion
// ---------------------------------------------------------------------------

#[test]
fn test_fourth_handler_evicts_the_first() {
    let mut registry: GroupRegistry = GroupRegistry::new();
    let mut transport = RecordingTransport::new();
    let group = addr("ff15::40");

    for id in 1..=3 {
        registry.join(&group, HandlerId(id), &mut transport);
    }
    let outcome = registry.join(&group, HandlerId(4), &mut transport);
    assert_eq!(
        outcome,
        JoinOutcome::HandlerEvicted {
            slot: 0,
            evicted: HandlerId(1)
        }
    );
    assert_eq!(
        registry.handlers_for(0x40),
        vec![HandlerId(4), HandlerId(2), HandlerId(3)]
    );
    assert_eq!(registry.stats().handler_evictions, 1);
}

#[test]
fn test_fifth_group_repurposes_slot_zero() {
    let mut registry: GroupRegistry = GroupRegistry::new();
    let mut transport = RecordingTransport::new();

    for id in 1..=4u16 {
        let group = group_address(GroupId::new(id).expect("non-zero"));
        registry.join(&group, HandlerId(id), &mut transport);
        registry.join(&group, HandlerId(id + 10), &mut transport);
    }
    let fifth = addr("ff15::5");
    let outcome = registry.join(&fifth, HandlerId(50), &mut transport);

    assert_eq!(
        outcome,
        JoinOutcome::GroupEvicted {
            evicted_group: GroupId::new(1).expect("non-zero"),
            evicted_handlers: vec![HandlerId(1), HandlerId(11)],
        }
    );
    assert_eq!(registry.len(), 4);
    assert_eq!(registry.slots()[0].group_id(), 5);
    assert_eq!(registry.handlers_for(5), vec![HandlerId(50)]);
    assert!(registry.handlers_for(1).is_empty());
    assert_eq!(transport.join_count(), 5);
    assert_eq!(registry.stats().group_evictions, 1);
}

#[test]
fn test_group_zero_is_reserved() {
    let mut registry: GroupRegistry = GroupRegistry::new();
    let mut transport = RecordingTransport::new();
    let outcome = registry.join(&addr("ff15::"), HandlerId(1), &mut transport);
    assert_eq!(outcome, JoinOutcome::ReservedGroup);
    assert!(registry.is_empty());
    assert!(transport.events().is_empty());
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[test]
fn test_dispatch_reaches_every_joined_handler_once() {
    let mut registry: GroupRegistry = GroupRegistry::new();
    let mut transport = RecordingTransport::new();
    let group = addr("ff15::60");
    registry.join(&group, HandlerId(1), &mut transport);
    registry.join(&group, HandlerId(2), &mut transport);
    registry.join(&addr("ff15::61"), HandlerId(3), &mut transport);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut handlers = CallbackHandlers::new();
    for id in 1..=3u16 {
        let seen = Rc::clone(&seen);
        handlers.insert(HandlerId(id), move |payload: &[u8]| {
            seen.borrow_mut().push((id, payload.to_vec()));
        });
    }

    let delivered = GroupDispatcher::dispatch(&registry, &group, b"on", &mut handlers);
    assert_eq!(delivered, 2);
    assert_eq!(
        *seen.borrow(),
        vec![(1, b"on".to_vec()), (2, b"on".to_vec())]
    );

    let delivered =
        GroupDispatcher::dispatch(&registry, &addr("ff15::62"), b"x", &mut handlers);
    assert_eq!(delivered, 0);
    assert_eq!(seen.borrow().len(), 2);
}
