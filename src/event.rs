//! Event kinds, payloads, and subscription keys.
//!
//! Events are unsolicited, typed notifications pushed by the controller:
//! sensor readings, GPIO edges, and positioning-service lifecycle
//! updates. The set is closed; dispatch switches on the wire
//! discriminant and produces one [`EventPayload`] variant.
//!
//! A subscription is addressed by an [`EventKey`]. GPIO pin events are
//! always filtered by pin number (the pin is part of the key) while
//! every other kind is keyed by kind alone, so "wildcard vs. filtered"
//! overlap cannot be expressed in the first place.

use serde::{Deserialize, Serialize};

use crate::codec::MsgPackCodec;
use crate::error::{BotwireError, Result};

/// Wire discriminants for the closed event set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum EventKind {
    /// Line-follower track sensor bank changed.
    TrackSensor = 0x01,
    /// Ultrasonic distance reading.
    UltraSensor = 0x02,
    /// A watched GPIO pin changed level.
    GpioPin = 0x03,
    /// A camera joined the positioning service.
    PositioningConnect = 0x04,
    /// A camera left the positioning service.
    PositioningDisconnect = 0x05,
    /// Fresh position fix.
    PositioningUpdate = 0x06,
    /// A camera's placement information changed.
    PositioningInfoUpdate = 0x07,
}

impl EventKind {
    /// Raw wire value.
    #[inline]
    pub fn wire(self) -> u16 {
        self as u16
    }

    /// Decode a wire discriminant; `None` for unknown values.
    pub fn from_wire(wire: u16) -> Option<Self> {
        Some(match wire {
            0x01 => Self::TrackSensor,
            0x02 => Self::UltraSensor,
            0x03 => Self::GpioPin,
            0x04 => Self::PositioningConnect,
            0x05 => Self::PositioningDisconnect,
            0x06 => Self::PositioningUpdate,
            0x07 => Self::PositioningInfoUpdate,
            _ => None?,
        })
    }

    /// The subscription key for kinds without a filter argument.
    ///
    /// `None` for `GpioPin`: its key needs the pin number, which lives in
    /// the payload.
    pub fn filterless_key(self) -> Option<EventKey> {
        Some(match self {
            Self::TrackSensor => EventKey::TrackSensor,
            Self::UltraSensor => EventKey::UltraSensor,
            Self::GpioPin => None?,
            Self::PositioningConnect => EventKey::PositioningConnect,
            Self::PositioningDisconnect => EventKey::PositioningDisconnect,
            Self::PositioningUpdate => EventKey::PositioningUpdate,
            Self::PositioningInfoUpdate => EventKey::PositioningInfoUpdate,
        })
    }
}

/// Subscription key: event kind plus its filter argument, if any.
///
/// Registering the same key twice replaces the previous handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKey {
    TrackSensor,
    UltraSensor,
    /// Level changes of one specific pin.
    GpioPin(u8),
    PositioningConnect,
    PositioningDisconnect,
    PositioningUpdate,
    PositioningInfoUpdate,
}

impl EventKey {
    /// The kind this key subscribes to.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::TrackSensor => EventKind::TrackSensor,
            Self::UltraSensor => EventKind::UltraSensor,
            Self::GpioPin(_) => EventKind::GpioPin,
            Self::PositioningConnect => EventKind::PositioningConnect,
            Self::PositioningDisconnect => EventKind::PositioningDisconnect,
            Self::PositioningUpdate => EventKind::PositioningUpdate,
            Self::PositioningInfoUpdate => EventKind::PositioningInfoUpdate,
        }
    }

    /// Encode this key as a subscribe/unsubscribe command payload.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let pin = match self {
            Self::GpioPin(pin) => Some(*pin),
            _ => None,
        };
        MsgPackCodec::encode(&(self.kind().wire(), pin))
    }
}

/// Position fix reported by the camera positioning service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
}

/// Pose of one camera in the positioning rig.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPlacement {
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    /// Horizontal field of view, degrees.
    pub fov: f64,
}

/// Decoded event payload, one variant per event kind.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    /// Track sensor bank state, left to right.
    TrackSensor([bool; 4]),
    /// Measured distance.
    UltraSensor(f64),
    /// Pin number and its new level.
    GpioPin { pin: u8, value: bool },
    /// Camera address and placement.
    PositioningConnect {
        address: String,
        camera: CameraPlacement,
    },
    /// Address of the departed camera.
    PositioningDisconnect { address: String },
    /// Fresh position fix.
    PositioningUpdate(Position),
    /// Camera address and updated placement.
    PositioningInfoUpdate {
        address: String,
        camera: CameraPlacement,
    },
}

impl EventPayload {
    /// The subscription key this payload routes to.
    pub fn key(&self) -> EventKey {
        match self {
            Self::TrackSensor(_) => EventKey::TrackSensor,
            Self::UltraSensor(_) => EventKey::UltraSensor,
            Self::GpioPin { pin, .. } => EventKey::GpioPin(*pin),
            Self::PositioningConnect { .. } => EventKey::PositioningConnect,
            Self::PositioningDisconnect { .. } => EventKey::PositioningDisconnect,
            Self::PositioningUpdate(_) => EventKey::PositioningUpdate,
            Self::PositioningInfoUpdate { .. } => EventKey::PositioningInfoUpdate,
        }
    }
}

/// Decode an event frame payload by its wire discriminant.
///
/// # Errors
///
/// `Protocol` for an unknown discriminant, `Decode` when the payload
/// does not match the kind's shape.
pub fn decode_event(discriminant: u16, payload: &[u8]) -> Result<EventPayload> {
    let kind = EventKind::from_wire(discriminant).ok_or_else(|| {
        BotwireError::Protocol(format!("unknown event discriminant {discriminant:#06x}"))
    })?;

    Ok(match kind {
        EventKind::TrackSensor => EventPayload::TrackSensor(MsgPackCodec::decode(payload)?),
        EventKind::UltraSensor => EventPayload::UltraSensor(MsgPackCodec::decode(payload)?),
        EventKind::GpioPin => {
            let (pin, value): (u8, bool) = MsgPackCodec::decode(payload)?;
            EventPayload::GpioPin { pin, value }
        }
        EventKind::PositioningConnect => {
            let (address, camera): (String, CameraPlacement) = MsgPackCodec::decode(payload)?;
            EventPayload::PositioningConnect { address, camera }
        }
        EventKind::PositioningDisconnect => EventPayload::PositioningDisconnect {
            address: MsgPackCodec::decode(payload)?,
        },
        EventKind::PositioningUpdate => {
            EventPayload::PositioningUpdate(MsgPackCodec::decode(payload)?)
        }
        EventKind::PositioningInfoUpdate => {
            let (address, camera): (String, CameraPlacement) = MsgPackCodec::decode(payload)?;
            EventPayload::PositioningInfoUpdate { address, camera }
        }
    })
}
