// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Resource server.
//!
//! [`Server`] ties the pieces together: requests from the REST layer are
//! routed to resources, group join/leave conventions update the
//! [`GroupRegistry`], representations are served block-wise through the
//! [`ChunkEncoder`], and device events fan out to the joined multicast groups.
//!
//! Everything runs on the caller's thread. The server owns its transport and
//! is driven by the binary's poll loop (or directly by tests).

use crate::block::{BlockLimits, ChunkEncoder, RenderedMessage, TransferCursor};
use crate::config::ServerConfig;
use crate::device::{Acceleration, DeviceState, Led};
use crate::error::{Error, Result};
use crate::group::{
    group_address, parse_group_address_bytes, GroupDispatcher, GroupRegistry,
    RegistryStatsSnapshot,
};
use crate::resource::obix::{self, Form};
use crate::resource::{GroupAction, Method, Request, ResourceId, Response};
use crate::stats::{ServerStats, ServerStatsSnapshot};
use crate::transport::{decode_payload, encode_group_update, GroupTransport, MessageIdCounter};
use std::collections::BTreeMap;
use std::net::Ipv6Addr;
use std::time::{Duration, Instant};

/// Tunables of a [`Server`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerOptions {
    pub limits: BlockLimits,
    pub tap_debounce: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            limits: BlockLimits::default(),
            tap_debounce: Duration::from_secs(1),
        }
    }
}

impl From<&ServerConfig> for ServerOptions {
    fn from(config: &ServerConfig) -> Self {
        Self {
            limits: config.block_limits(),
            tap_debounce: config.tap_debounce(),
        }
    }
}

/// Rendered message kept between the chunks of one transfer.
#[derive(Debug)]
struct TransferSlot {
    message: RenderedMessage,
    cursor: TransferCursor,
}

/// Sensor/actuator resource server.
pub struct Server<T: GroupTransport> {
    registry: GroupRegistry,
    encoder: ChunkEncoder,
    transfers: BTreeMap<ResourceId, TransferSlot>,
    device: DeviceState,
    transport: T,
    message_ids: MessageIdCounter,
    tap_debounce: Duration,
    stats: ServerStats,
}

impl<T: GroupTransport> Server<T> {
    pub fn new(transport: T, options: ServerOptions) -> Self {
        Self {
            registry: GroupRegistry::new(),
            encoder: ChunkEncoder::new(options.limits),
            transfers: BTreeMap::new(),
            device: DeviceState::new(),
            transport,
            message_ids: MessageIdCounter::new(),
            tap_debounce: options.tap_debounce,
            stats: ServerStats::new(),
        }
    }

    /// Handle one request and produce its response. Never fails: errors map
    /// to error responses.
    pub fn handle_request(&mut self, request: &Request) -> Response {
        ServerStats::bump(&self.stats.requests);
        match self.process(request) {
            Ok(response) => response,
            Err(e) => {
                match &e {
                    Error::RangeExceeded { .. } => ServerStats::bump(&self.stats.range_rejections),
                    Error::RenderFailure(_) => ServerStats::bump(&self.stats.render_failures),
                    _ => ServerStats::bump(&self.stats.request_errors),
                }
                tracing::debug!("{} {}: {}", request.method, request.path, e);
                Response::from_error(&e)
            }
        }
    }

    fn process(&mut self, request: &Request) -> Result<Response> {
        let (resource, action) = crate::resource::route(&request.path)
            .ok_or_else(|| Error::NotFound(request.path.clone()))?;

        let allowed = match action {
            Some(_) => request.method == Method::Post && resource.is_group_capable(),
            None => resource.allows(request.method) && request.method != Method::Post,
        };
        if !allowed {
            return Err(Error::MethodNotAllowed {
                method: request.method.to_string(),
                path: request.path.clone(),
            });
        }

        if let Some(action) = action {
            self.apply_group_action(resource, action, &request.payload)?;
        }
        if request.method == Method::Put {
            self.apply_put(resource, &request.payload);
        }

        self.encoder.check_offset(request.block_offset)?;
        self.serve(resource, request.block_offset, request.preferred_size)
    }

    fn apply_group_action(
        &mut self,
        resource: ResourceId,
        action: GroupAction,
        payload: &[u8],
    ) -> Result<()> {
        let address = parse_group_address_bytes(payload)?;
        let handler = resource.handler_id().ok_or_else(|| Error::MethodNotAllowed {
            method: Method::Post.to_string(),
            path: resource.path().to_string(),
        })?;

        match action {
            GroupAction::Join => {
                let outcome = self.registry.join(&address, handler, &mut self.transport);
                tracing::debug!("{} join {}: {:?}", resource, address, outcome);
            }
            GroupAction::Leave => self.registry.leave(&address, handler, &mut self.transport),
        }
        Ok(())
    }

    fn apply_put(&mut self, resource: ResourceId, payload: &[u8]) {
        if let Some(led) = Led::from_resource(resource) {
            self.device.set_led(led, crate::device::parse_bool(payload));
        }
    }

    /// Serve the chunk at `offset`, rendering a fresh representation at the
    /// start of a transfer and reusing it for later chunks.
    fn serve(&mut self, resource: ResourceId, offset: usize, preferred_size: i32) -> Result<Response> {
        let mut transfer = match self.transfers.remove(&resource) {
            Some(transfer) if offset > 0 => transfer,
            _ => TransferSlot {
                message: self.render(resource)?,
                cursor: TransferCursor::START,
            },
        };

        let chunk = self
            .encoder
            .next_chunk(&transfer.message, preferred_size, offset)?;
        let cursor = chunk.cursor;
        let response = Response::chunk(chunk.bytes.to_vec(), chunk.etag, cursor.offset());
        self.stats.record_chunk(response.payload.len());

        if !cursor.is_complete() {
            transfer.cursor = cursor;
            self.transfers.insert(resource, transfer);
        }
        Ok(response)
    }

    fn render(&self, resource: ResourceId) -> Result<RenderedMessage> {
        let xml = obix::render(resource, &self.device)?;
        RenderedMessage::new(xml, resource.capacity())
    }

    /// Send `payload` to every group `resource` has joined. Returns the
    /// number of datagrams handed to the transport.
    pub fn send_group_update(&mut self, resource: ResourceId, payload: &[u8]) -> usize {
        let Some(handler) = resource.handler_id() else {
            return 0;
        };

        let mut sent = 0;
        for group in self.registry.groups_of(handler) {
            let address = group_address(group);
            let datagram = encode_group_update(self.message_ids.next_id(), payload);
            match self.transport.send_to_group(&address, &datagram) {
                Ok(()) => {
                    ServerStats::bump(&self.stats.updates_sent);
                    sent += 1;
                }
                Err(e) => {
                    ServerStats::bump(&self.stats.send_failures);
                    tracing::warn!("{}: update to {} failed: {}", resource, address, e);
                }
            }
        }
        if sent > 0 {
            tracing::debug!("{}: update sent to {} groups", resource, sent);
        }
        sent
    }

    /// Deliver a datagram received on multicast `destination` to the
    /// handlers joined to its group. Returns the number of handlers invoked.
    pub fn handle_group_datagram(&mut self, destination: &Ipv6Addr, datagram: &[u8]) -> usize {
        let payload = match decode_payload(datagram) {
            Ok(payload) => payload,
            Err(e) => {
                ServerStats::bump(&self.stats.datagrams_dropped);
                tracing::debug!("datagram for {} dropped: {}", destination, e);
                return 0;
            }
        };

        let delivered =
            GroupDispatcher::dispatch(&self.registry, destination, payload, &mut self.device);
        if delivered > 0 {
            ServerStats::bump(&self.stats.datagrams_dispatched);
        } else {
            ServerStats::bump(&self.stats.datagrams_dropped);
        }
        delivered
    }

    /// Record a temperature sample; a changed value is pushed to the groups
    /// of `temp/value`. Returns the number of updates sent.
    pub fn on_temperature_sample(&mut self, raw: i16) -> usize {
        let Some(value) = self.device.record_temperature(raw) else {
            tracing::trace!("temperature unchanged");
            return 0;
        };
        let payload = obix::temperature_value(value, Form::Group);
        tracing::debug!("temperature {}", value);
        self.send_group_update(ResourceId::TempValue, payload.as_bytes())
    }

    /// Toggle the virtual button. Returns `None` when the tap falls inside
    /// the debounce window, otherwise the number of updates sent.
    pub fn on_tap(&mut self, now: Instant) -> Option<usize> {
        let pressed = self.device.tap(now, self.tap_debounce)?;
        let payload = obix::button_value(pressed);
        Some(self.send_group_update(ResourceId::ButtonValue, payload.as_bytes()))
    }

    /// Record an activity detector event; a freefall transition is pushed to
    /// the groups of `acc/freefall`.
    pub fn on_acceleration(&mut self, acceleration: Acceleration) -> usize {
        let was_freefall = self.device.acceleration().is_freefall();
        self.device.set_acceleration(acceleration);
        tracing::debug!("acceleration {}", acceleration);

        if acceleration.is_freefall() == was_freefall {
            return 0;
        }
        let payload = obix::acceleration_flag("freefall", acceleration.is_freefall(), Form::Group);
        self.send_group_update(ResourceId::AccFreefall, payload.as_bytes())
    }

    /// Cursor of the transfer in progress for `resource`.
    pub fn transfer_cursor(&self, resource: ResourceId) -> Option<TransferCursor> {
        self.transfers.get(&resource).map(|t| t.cursor)
    }

    pub fn registry(&self) -> &GroupRegistry {
        &self.registry
    }

    pub fn device(&self) -> &DeviceState {
        &self.device
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn stats(&self) -> ServerStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn registry_stats(&self) -> RegistryStatsSnapshot {
        self.registry.stats()
    }
}
