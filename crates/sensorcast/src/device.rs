// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Node state behind the resources: last temperature sample, virtual button,
//! activity detector and the three LEDs.

use crate::group::{GroupHandler, HandlerId};
use crate::resource::ResourceId;
use std::fmt;
use std::time::{Duration, Instant};

/// Output of the activity detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Acceleration {
    #[default]
    Inactivity,
    Activity,
    Freefall,
}

impl Acceleration {
    /// Moving at all, freefall included.
    pub fn is_active(self) -> bool {
        !matches!(self, Acceleration::Inactivity)
    }

    pub fn is_freefall(self) -> bool {
        matches!(self, Acceleration::Freefall)
    }
}

impl fmt::Display for Acceleration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Acceleration::Inactivity => write!(f, "inactivity"),
            Acceleration::Activity => write!(f, "activity"),
            Acceleration::Freefall => write!(f, "freefall"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Led {
    Red,
    Green,
    Blue,
}

impl Led {
    pub const ALL: [Led; 3] = [Led::Red, Led::Green, Led::Blue];

    pub fn name(self) -> &'static str {
        match self {
            Led::Red => "red",
            Led::Green => "green",
            Led::Blue => "blue",
        }
    }

    pub fn resource(self) -> ResourceId {
        match self {
            Led::Red => ResourceId::LedRed,
            Led::Green => ResourceId::LedGreen,
            Led::Blue => ResourceId::LedBlue,
        }
    }

    pub fn from_resource(resource: ResourceId) -> Option<Self> {
        match resource {
            ResourceId::LedRed => Some(Led::Red),
            ResourceId::LedGreen => Some(Led::Green),
            ResourceId::LedBlue => Some(Led::Blue),
            _ => None,
        }
    }
}

/// Boolean payload convention: anything containing `true` switches on.
pub fn parse_bool(payload: &[u8]) -> bool {
    payload.windows(4).any(|w| w == b"true")
}

/// Format a raw TMP102 reading as degrees Celsius with one decimal.
///
/// The sensor left-aligns a 12-bit two's complement value in 16 bits, so the
/// high byte holds whole degrees and the next nibble sixteenths.
pub fn format_temperature(raw: i16) -> String {
    let negative = raw < 0;
    let abs = raw.unsigned_abs();
    let whole = abs >> 8;
    let tenths = ((abs >> 4) % 16) * 625 / 1000;
    format!("{}{}.{}", if negative { "-" } else { "" }, whole, tenths)
}

/// Mutable device state.
#[derive(Debug, Clone)]
pub struct DeviceState {
    temperature: Option<String>,
    button: bool,
    acceleration: Acceleration,
    leds: [bool; 3],
    last_tap: Option<Instant>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceState {
    pub fn new() -> Self {
        Self {
            temperature: None,
            button: false,
            acceleration: Acceleration::default(),
            leds: [false; 3],
            last_tap: None,
        }
    }

    /// Last formatted temperature, `None` before the first sample.
    pub fn temperature(&self) -> Option<&str> {
        self.temperature.as_deref()
    }

    /// Store a raw sample. Returns the formatted value when it differs from
    /// the previous one.
    pub fn record_temperature(&mut self, raw: i16) -> Option<&str> {
        let value = format_temperature(raw);
        if self.temperature.as_deref() == Some(value.as_str()) {
            return None;
        }
        self.temperature = Some(value);
        self.temperature.as_deref()
    }

    pub fn button(&self) -> bool {
        self.button
    }

    /// Toggle the virtual button unless the previous tap is younger than
    /// `debounce`. Returns the new state when the tap was accepted.
    pub fn tap(&mut self, now: Instant, debounce: Duration) -> Option<bool> {
        if let Some(last) = self.last_tap {
            if now.saturating_duration_since(last) < debounce {
                return None;
            }
        }
        self.last_tap = Some(now);
        self.button = !self.button;
        Some(self.button)
    }

    pub fn acceleration(&self) -> Acceleration {
        self.acceleration
    }

    pub fn set_acceleration(&mut self, acceleration: Acceleration) {
        self.acceleration = acceleration;
    }

    pub fn led(&self, led: Led) -> bool {
        self.leds[led as usize]
    }

    pub fn set_led(&mut self, led: Led, on: bool) {
        if self.leds[led as usize] != on {
            tracing::info!("led {} -> {}", led.name(), if on { "on" } else { "off" });
        }
        self.leds[led as usize] = on;
    }
}

impl GroupHandler for DeviceState {
    fn on_group_update(&mut self, handler: HandlerId, payload: &[u8]) {
        match ResourceId::from_handler(handler) {
            Some(resource) => match Led::from_resource(resource) {
                Some(led) => self.set_led(led, parse_bool(payload)),
                None => tracing::debug!(
                    "group update for sensor {} ignored ({} bytes)",
                    resource,
                    payload.len()
                ),
            },
            None => tracing::warn!("group update for unknown handler {}", handler),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_temperature() {
        // 25.0625 C
        assert_eq!(format_temperature(0x1910), "25.0");
        // 21.5 C
        assert_eq!(format_temperature(0x1580), "21.5");
        assert_eq!(format_temperature(0), "0.0");
        // -25.0 C
        assert_eq!(format_temperature(-0x1900), "-25.0");
        // -0.5 C keeps its sign
        assert_eq!(format_temperature(-0x0080), "-0.5");
    }

    #[test]
    fn test_record_temperature_reports_changes_only() {
        let mut device = DeviceState::new();
        assert_eq!(device.record_temperature(0x1580), Some("21.5"));
        assert_eq!(device.record_temperature(0x1590), None);
        assert_eq!(device.record_temperature(0x1600), Some("22.0"));
        assert_eq!(device.temperature(), Some("22.0"));
    }

    #[test]
    fn test_tap_debounce() {
        let mut device = DeviceState::new();
        let t0 = Instant::now();
        let debounce = Duration::from_secs(1);

        assert_eq!(device.tap(t0, debounce), Some(true));
        assert_eq!(device.tap(t0 + Duration::from_millis(500), debounce), None);
        assert!(device.button());
        assert_eq!(device.tap(t0 + Duration::from_millis(1500), debounce), Some(false));
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool(b"true"));
        assert!(parse_bool(b"<bool val=\"true\"/>"));
        assert!(!parse_bool(b"false"));
        assert!(!parse_bool(b""));
    }

    #[test]
    fn test_group_update_switches_leds() {
        let mut device = DeviceState::new();
        let green = ResourceId::LedGreen.handler_id().expect("group capable");
        device.on_group_update(green, b"<bool val=\"true\"/>");
        assert!(device.led(Led::Green));
        assert!(!device.led(Led::Red));

        device.on_group_update(green, b"<bool val=\"false\"/>");
        assert!(!device.led(Led::Green));

        let temp = ResourceId::TempValue.handler_id().expect("group capable");
        device.on_group_update(temp, b"<real val=\"1.0\"/>");
        assert_eq!(device.temperature(), None);
    }
}
