// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Inbound group update fan-out.

use super::address::group_id;
use super::registry::{GroupRegistry, HandlerId};
use std::collections::BTreeMap;
use std::net::Ipv6Addr;

/// Receiver of group updates, addressed by handler identity.
///
/// The server implements this over its resources; [`CallbackHandlers`] is a
/// closure-based implementation.
pub trait GroupHandler {
    /// Deliver `payload` to the handler identified by `handler`.
    fn on_group_update(&mut self, handler: HandlerId, payload: &[u8]);
}

/// Routes inbound multicast payloads to the handlers joined to their group.
#[derive(Debug, Default, Clone, Copy)]
pub struct GroupDispatcher;

impl GroupDispatcher {
    /// Deliver `payload` received on `destination` to every handler of its group.
    ///
    /// Handlers fire once each, in sub-slot order. Returns how many were
    /// invoked; 0 means the group is not registered and the payload was dropped.
    pub fn dispatch<S, const G: usize, const H: usize>(
        registry: &GroupRegistry<G, H>,
        destination: &Ipv6Addr,
        payload: &[u8],
        sink: &mut S,
    ) -> usize
    where
        S: GroupHandler + ?Sized,
    {
        let id = group_id(destination);
        let Some(slot) = registry.find(id) else {
            tracing::trace!(
                "dropping {} bytes for unregistered group {} ({})",
                payload.len(),
                id,
                destination
            );
            return 0;
        };

        let mut delivered = 0;
        for handler in slot.handlers() {
            sink.on_group_update(handler, payload);
            delivered += 1;
        }
        tracing::debug!(
            "group {}: {} bytes delivered to {} handlers",
            id,
            payload.len(),
            delivered
        );
        delivered
    }
}

type Callback = Box<dyn FnMut(&[u8])>;

/// Closure arena keyed by [`HandlerId`].
#[derive(Default)]
pub struct CallbackHandlers {
    callbacks: BTreeMap<HandlerId, Callback>,
}

impl CallbackHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` under `id`, replacing any previous one.
    pub fn insert<F>(&mut self, id: HandlerId, callback: F)
    where
        F: FnMut(&[u8]) + 'static,
    {
        self.callbacks.insert(id, Box::new(callback));
    }

    pub fn remove(&mut self, id: HandlerId) -> bool {
        self.callbacks.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl GroupHandler for CallbackHandlers {
    fn on_group_update(&mut self, handler: HandlerId, payload: &[u8]) {
        match self.callbacks.get_mut(&handler) {
            Some(callback) => callback(payload),
            None => tracing::debug!("no callback registered for {}", handler),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RecordingTransport;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn addr(id: u16) -> Ipv6Addr {
        Ipv6Addr::new(0xff15, 0, 0, 0, 0, 0, 0, id)
    }

    #[derive(Default)]
    struct Log(Vec<(HandlerId, Vec<u8>)>);

    impl GroupHandler for Log {
        fn on_group_update(&mut self, handler: HandlerId, payload: &[u8]) {
            self.0.push((handler, payload.to_vec()));
        }
    }

    #[test]
    fn test_dispatch_in_sub_slot_order() {
        let mut registry: GroupRegistry = GroupRegistry::new();
        let mut transport = RecordingTransport::new();
        registry.join(&addr(3), HandlerId(20), &mut transport);
        registry.join(&addr(3), HandlerId(10), &mut transport);
        registry.join(&addr(4), HandlerId(30), &mut transport);

        let mut log = Log::default();
        let n = GroupDispatcher::dispatch(&registry, &addr(3), b"on", &mut log);

        assert_eq!(n, 2);
        assert_eq!(
            log.0,
            vec![(HandlerId(20), b"on".to_vec()), (HandlerId(10), b"on".to_vec())]
        );
    }

    #[test]
    fn test_dispatch_unregistered_group_is_dropped() {
        let registry: GroupRegistry = GroupRegistry::new();
        let mut log = Log::default();
        assert_eq!(GroupDispatcher::dispatch(&registry, &addr(9), b"x", &mut log), 0);
        assert!(log.0.is_empty());
    }

    #[test]
    fn test_dispatch_uses_low_bits_only() {
        let mut registry: GroupRegistry = GroupRegistry::new();
        let mut transport = RecordingTransport::new();
        registry.join(&addr(5), HandlerId(1), &mut transport);

        let mut log = Log::default();
        let other_prefix = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 5);
        assert_eq!(GroupDispatcher::dispatch(&registry, &other_prefix, b"x", &mut log), 1);
    }

    #[test]
    fn test_callback_handlers() {
        let mut registry: GroupRegistry = GroupRegistry::new();
        let mut transport = RecordingTransport::new();
        registry.join(&addr(5), HandlerId(1), &mut transport);
        registry.join(&addr(5), HandlerId(2), &mut transport);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut callbacks = CallbackHandlers::new();
        let seen_clone = Rc::clone(&seen);
        callbacks.insert(HandlerId(1), move |p: &[u8]| seen_clone.borrow_mut().push(p.to_vec()));

        // HandlerId(2) has no callback: counted as invoked, logged only.
        let n = GroupDispatcher::dispatch(&registry, &addr(5), b"true", &mut callbacks);
        assert_eq!(n, 2);
        assert_eq!(*seen.borrow(), vec![b"true".to_vec()]);
        assert!(callbacks.remove(HandlerId(1)));
        assert!(callbacks.is_empty());
    }
}
