// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end server flows.
//!
//! Two nodes share a group: updates recorded on one node's transport are fed
//! into the other node as inbound datagrams.

use sensorcast::transport::TransportEvent;
use sensorcast::{
    Acceleration, Led, RecordingTransport, Request, ResourceId, Server, ServerOptions, Status,
};
use std::net::Ipv6Addr;
use std::time::Instant;

fn node() -> Server<RecordingTransport> {
    Server::new(RecordingTransport::new(), ServerOptions::default())
}

/// Deliver every datagram `from` has sent to `to`. Returns handlers invoked.
fn relay(from: &mut Server<RecordingTransport>, to: &mut Server<RecordingTransport>) -> usize {
    let sent: Vec<(Ipv6Addr, Vec<u8>)> = from
        .transport()
        .events()
        .iter()
        .filter_map(|e| match e {
            TransportEvent::Sent(addr, bytes) => Some((*addr, bytes.clone())),
            _ => None,
        })
        .collect();
    from.transport_mut().clear();
    sent.iter()
        .map(|(addr, bytes)| to.handle_group_datagram(addr, bytes))
        .sum()
}

#[test]
fn test_button_switches_leds_on_another_node() {
    let mut sensor = node();
    let mut actuator = node();

    let r = sensor.handle_request(&Request::post("button/value/joinGroup", "ff15::42"));
    assert_eq!(r.status, Status::Content);
    for led in ["leds/red", "leds/blue"] {
        let r = actuator.handle_request(&Request::post(format!("{}/joinGroup", led), "ff15::42"));
        assert_eq!(r.status, Status::Content);
    }

    assert_eq!(sensor.on_tap(Instant::now()), Some(1));
    assert_eq!(relay(&mut sensor, &mut actuator), 2);
    assert!(actuator.device().led(Led::Red));
    assert!(actuator.device().led(Led::Blue));
    assert!(!actuator.device().led(Led::Green));

    let r = actuator.handle_request(&Request::get("leds/red"));
    assert_eq!(r.payload, br#"<bool href="red" val="true"/>"#);
}

#[test]
fn test_freefall_alarm_reaches_leds() {
    let mut sensor = node();
    let mut actuator = node();
    sensor.handle_request(&Request::post("acc/freefall/joinGroup", "FF15:0:0:0:0:0:0:9"));
    actuator.handle_request(&Request::post("leds/green/joinGroup", "ff15::9\0\0"));

    sensor.on_acceleration(Acceleration::Freefall);
    assert_eq!(relay(&mut sensor, &mut actuator), 1);
    assert!(actuator.device().led(Led::Green));

    sensor.on_acceleration(Acceleration::Inactivity);
    relay(&mut sensor, &mut actuator);
    assert!(!actuator.device().led(Led::Green));
}

#[test]
fn test_left_group_stops_receiving() {
    let mut sensor = node();
    let mut actuator = node();
    sensor.handle_request(&Request::post("button/value/joinGroup", "ff15::50"));
    actuator.handle_request(&Request::post("leds/red/joinGroup", "ff15::50"));
    actuator.handle_request(&Request::post("leds/red/leaveGroup", "ff15::50"));

    sensor.on_tap(Instant::now());
    assert_eq!(relay(&mut sensor, &mut actuator), 0);
    assert!(!actuator.device().led(Led::Red));
    assert_eq!(actuator.stats().datagrams_dropped, 1);
}

#[test]
fn test_temperature_object_block_transfer() {
    let mut server = node();
    server.on_temperature_sample(0x1580);

    let mut body = Vec::new();
    let mut offset = 0;
    loop {
        let r = server.handle_request(&Request::get("temp").block(offset, 32));
        assert_eq!(r.status, Status::Content);
        body.extend_from_slice(&r.payload);
        match r.next_offset {
            Some(next) => offset = next,
            None => break,
        }
    }
    let xml = String::from_utf8(body).expect("utf8");
    assert!(xml.starts_with(r#"<obj href="temp" is="iot:TemperatureSensor">"#));
    assert!(xml.contains(r#"val="21.5""#));
    assert_eq!(server.transfer_cursor(ResourceId::Temp), None);
}

#[test]
fn test_sensor_without_groups_sends_nothing() {
    let mut server = node();
    assert_eq!(server.on_temperature_sample(0x1580), 0);
    assert!(server.transport().events().is_empty());
}
