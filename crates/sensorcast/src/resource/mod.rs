// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Resource catalogue and the request/response values exchanged with the host
//! REST layer.

pub mod obix;

use crate::block::ETag;
use crate::error::Error;
use crate::group::HandlerId;
use std::fmt;

/// Path suffix of the group join convention.
pub const JOIN_GROUP: &str = "joinGroup";

/// Path suffix of the group leave convention.
pub const LEAVE_GROUP: &str = "leaveGroup";

/// Rendering capacity of sensor representations.
pub const SENSOR_MSG_MAX_SIZE: usize = 140;

/// Rendering capacity of the LED object (three datapoints).
pub const LED_MSG_MAX_SIZE: usize = 240;

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Put => write!(f, "PUT"),
        }
    }
}

/// Response status, numbered as CoAP response codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Content,
    BadRequest,
    BadOption,
    NotFound,
    MethodNotAllowed,
    InternalServerError,
}

impl Status {
    /// `(class, detail)` code pair.
    pub fn code(self) -> (u8, u8) {
        match self {
            Status::Content => (2, 5),
            Status::BadRequest => (4, 0),
            Status::BadOption => (4, 2),
            Status::NotFound => (4, 4),
            Status::MethodNotAllowed => (4, 5),
            Status::InternalServerError => (5, 0),
        }
    }

    pub fn is_success(self) -> bool {
        self.code().0 == 2
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (class, detail) = self.code();
        write!(f, "{}.{:02}", class, detail)
    }
}

/// Response content format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    ApplicationXml,
    TextPlain,
}

/// Inbound request as handed over by the REST layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub payload: Vec<u8>,
    /// Byte offset requested by the client's block option.
    pub block_offset: usize,
    /// Client-preferred chunk size; out-of-range values mean "server default".
    pub preferred_size: i32,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            payload: Vec::new(),
            block_offset: 0,
            preferred_size: -1,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self::new(Method::Post, path).payload(payload)
    }

    pub fn put(path: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self::new(Method::Put, path).payload(payload)
    }

    pub fn payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Request the block starting at `offset` with the given preferred size.
    pub fn block(mut self, offset: usize, preferred_size: i32) -> Self {
        self.block_offset = offset;
        self.preferred_size = preferred_size;
        self
    }
}

/// Outbound response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub content_type: Option<ContentType>,
    pub payload: Vec<u8>,
    pub etag: Option<ETag>,
    /// Offset of the next block, `None` when this is the last one.
    pub next_offset: Option<usize>,
}

impl Response {
    /// Successful chunk of a representation.
    pub fn chunk(payload: Vec<u8>, etag: ETag, next_offset: Option<usize>) -> Self {
        Self {
            status: Status::Content,
            content_type: Some(ContentType::ApplicationXml),
            payload,
            etag: Some(etag),
            next_offset,
        }
    }

    /// Error response with a short diagnostic payload.
    pub fn error(status: Status, message: &str) -> Self {
        Self {
            status,
            content_type: Some(ContentType::TextPlain),
            payload: message.as_bytes().to_vec(),
            etag: None,
            next_offset: None,
        }
    }

    /// Map a handling error to its protocol response.
    pub fn from_error(err: &Error) -> Self {
        match err {
            // A block error message should not exceed the minimum block size (16).
            Error::RangeExceeded { .. } => Self::error(Status::BadOption, "BlockOutOfScope"),
            Error::MalformedAddress(_) => Self::error(Status::BadRequest, &err.to_string()),
            Error::NotFound(_) => Self::error(Status::NotFound, &err.to_string()),
            Error::MethodNotAllowed { .. } => {
                Self::error(Status::MethodNotAllowed, &err.to_string())
            }
            Error::TransferLength { .. } => Self::error(
                Status::InternalServerError,
                "calculation of message length error",
            ),
            Error::RenderFailure(_) => {
                Self::error(Status::InternalServerError, &err.to_string())
            }
            Error::Frame(_) | Error::Config(_) | Error::Io(_) => {
                Self::error(Status::InternalServerError, &err.to_string())
            }
        }
    }

    pub fn more(&self) -> bool {
        self.next_offset.is_some()
    }
}

/// Group membership action encoded in the request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupAction {
    Join,
    Leave,
}

/// Resources exposed by the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceId {
    Temp,
    TempValue,
    Button,
    ButtonValue,
    Acc,
    AccActive,
    AccFreefall,
    Leds,
    LedRed,
    LedGreen,
    LedBlue,
}

impl ResourceId {
    pub const ALL: [ResourceId; 11] = [
        ResourceId::Temp,
        ResourceId::TempValue,
        ResourceId::Button,
        ResourceId::ButtonValue,
        ResourceId::Acc,
        ResourceId::AccActive,
        ResourceId::AccFreefall,
        ResourceId::Leds,
        ResourceId::LedRed,
        ResourceId::LedGreen,
        ResourceId::LedBlue,
    ];

    pub fn path(self) -> &'static str {
        match self {
            ResourceId::Temp => "temp",
            ResourceId::TempValue => "temp/value",
            ResourceId::Button => "button",
            ResourceId::ButtonValue => "button/value",
            ResourceId::Acc => "acc",
            ResourceId::AccActive => "acc/active",
            ResourceId::AccFreefall => "acc/freefall",
            ResourceId::Leds => "leds",
            ResourceId::LedRed => "leds/red",
            ResourceId::LedGreen => "leds/green",
            ResourceId::LedBlue => "leds/blue",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ResourceId::Temp => "Temperature Sensor",
            ResourceId::TempValue => "Temperature Value",
            ResourceId::Button => "Button Sensor",
            ResourceId::ButtonValue => "VButton Value",
            ResourceId::Acc => "Acceleration Sensor",
            ResourceId::AccActive => "Activity",
            ResourceId::AccFreefall => "Freefall",
            ResourceId::Leds => "Leds Actuator",
            ResourceId::LedRed => "Red led",
            ResourceId::LedGreen => "Green led",
            ResourceId::LedBlue => "Blue led",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.trim_matches('/');
        Self::ALL.into_iter().find(|r| r.path() == path)
    }

    /// Group handler identity, for resources that take part in group communication.
    pub fn handler_id(self) -> Option<HandlerId> {
        let id = match self {
            ResourceId::TempValue => 1,
            ResourceId::ButtonValue => 2,
            ResourceId::AccFreefall => 3,
            ResourceId::LedRed => 4,
            ResourceId::LedGreen => 5,
            ResourceId::LedBlue => 6,
            _ => return None,
        };
        Some(HandlerId(id))
    }

    pub fn from_handler(handler: HandlerId) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.handler_id() == Some(handler))
    }

    pub fn is_group_capable(self) -> bool {
        self.handler_id().is_some()
    }

    /// Whether the resource accepts PUT updates.
    pub fn is_actuator(self) -> bool {
        matches!(
            self,
            ResourceId::LedRed | ResourceId::LedGreen | ResourceId::LedBlue
        )
    }

    pub fn allows(self, method: Method) -> bool {
        match method {
            Method::Get => true,
            Method::Post => self.is_group_capable(),
            Method::Put => self.is_actuator(),
        }
    }

    /// Upper bound on the rendered representation.
    pub fn capacity(self) -> usize {
        match self {
            ResourceId::Leds => LED_MSG_MAX_SIZE,
            _ => SENSOR_MSG_MAX_SIZE,
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Split a request path into its resource and optional group action.
///
/// `leds/red/joinGroup` routes to `(LedRed, Some(Join))`.
pub fn route(path: &str) -> Option<(ResourceId, Option<GroupAction>)> {
    let path = path.trim_matches('/');
    let (base, action) = match path.rsplit_once('/') {
        Some((base, JOIN_GROUP)) => (base, Some(GroupAction::Join)),
        Some((base, LEAVE_GROUP)) => (base, Some(GroupAction::Leave)),
        _ => (path, None),
    };
    ResourceId::from_path(base).map(|r| (r, action))
}
