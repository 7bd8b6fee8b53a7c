// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! oBIX XML representations.
//!
//! Datapoints come in three forms:
//! - [`Form::Standalone`]: served at the datapoint's own path, relative href.
//! - [`Form::Child`]: embedded in the parent object, href from the node root.
//! - [`Form::Group`]: bare value for multicast group updates.

use super::ResourceId;
use crate::device::{DeviceState, Led};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Form {
    Standalone,
    Child,
    Group,
}

const CELSIUS: &str = "obix:units/celsius";

fn bool_text(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// `<real>` temperature datapoint.
pub fn temperature_value(value: &str, form: Form) -> String {
    match form {
        Form::Standalone => format!(r#"<real href="value" units="{CELSIUS}" val="{value}"/>"#),
        Form::Child => format!(r#"<real href="temp/value" units="{CELSIUS}" val="{value}"/>"#),
        Form::Group => format!(r#"<real val="{value}"/>"#),
    }
}

pub fn temperature_object(value: &str) -> String {
    format!(
        r#"<obj href="temp" is="iot:TemperatureSensor">{}</obj>"#,
        temperature_value(value, Form::Child)
    )
}

/// Virtual button datapoint. Every form is the bare value.
pub fn button_value(pressed: bool) -> String {
    format!(r#"<bool val="{}"/>"#, bool_text(pressed))
}

pub fn button_object(pressed: bool) -> String {
    format!(
        r#"<obj href="button" is="iot:PushButton">{}</obj>"#,
        button_value(pressed)
    )
}

/// Boolean datapoint under `acc`, `name` being `active` or `freefall`.
pub fn acceleration_flag(name: &str, value: bool, form: Form) -> String {
    match form {
        Form::Standalone => format!(r#"<bool href="{name}" val="{}"/>"#, bool_text(value)),
        Form::Child => format!(r#"<bool href="acc/{name}" val="{}"/>"#, bool_text(value)),
        Form::Group => format!(r#"<bool val="{}"/>"#, bool_text(value)),
    }
}

pub fn acceleration_object(active: bool, freefall: bool) -> String {
    format!(
        r#"<obj href="acc" is="iot:ActivitySensor">{}{}</obj>"#,
        acceleration_flag("active", active, Form::Child),
        acceleration_flag("freefall", freefall, Form::Child)
    )
}

pub fn led_value(led: Led, on: bool, form: Form) -> String {
    let name = led.name();
    match form {
        Form::Standalone => format!(r#"<bool href="{name}" val="{}"/>"#, bool_text(on)),
        Form::Child => format!(r#"<bool href="leds/{name}" val="{}"/>"#, bool_text(on)),
        Form::Group => format!(r#"<bool val="{}"/>"#, bool_text(on)),
    }
}

/// LED actuator object. Datapoints keep hrefs relative to the object.
pub fn led_object(red: bool, green: bool, blue: bool) -> String {
    format!(
        r#"<obj href="leds" is="iot:LedsActuator">{}{}{}</obj>"#,
        led_value(Led::Red, red, Form::Standalone),
        led_value(Led::Green, green, Form::Standalone),
        led_value(Led::Blue, blue, Form::Standalone)
    )
}

/// Render the representation served at `resource`'s own path.
pub fn render(resource: ResourceId, device: &DeviceState) -> Result<String> {
    let temperature = || {
        device
            .temperature()
            .ok_or_else(|| Error::RenderFailure("no temperature sample yet".into()))
    };
    let acc = device.acceleration();

    let xml = match resource {
        ResourceId::Temp => temperature_object(temperature()?),
        ResourceId::TempValue => temperature_value(temperature()?, Form::Standalone),
        ResourceId::Button => button_object(device.button()),
        ResourceId::ButtonValue => button_value(device.button()),
        ResourceId::Acc => acceleration_object(acc.is_active(), acc.is_freefall()),
        ResourceId::AccActive => acceleration_flag("active", acc.is_active(), Form::Standalone),
        ResourceId::AccFreefall => {
            acceleration_flag("freefall", acc.is_freefall(), Form::Standalone)
        }
        ResourceId::Leds => led_object(
            device.led(Led::Red),
            device.led(Led::Green),
            device.led(Led::Blue),
        ),
        ResourceId::LedRed | ResourceId::LedGreen | ResourceId::LedBlue => {
            let led = Led::from_resource(resource)
                .ok_or_else(|| Error::RenderFailure(format!("{} is not a led", resource)))?;
            led_value(led, device.led(led), Form::Standalone)
        }
    };
    Ok(xml)
}
