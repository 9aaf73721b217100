//! Command opcodes and command-layer types.
//!
//! The command set is closed: every invocation the controller understands
//! is listed here, together with its wire opcode. Argument tuples and
//! reply values are MsgPack-encoded by the caller-facing methods on
//! [`Robot`](crate::Robot); this module only pins down identities.

use serde::{Deserialize, Serialize};

/// Wire opcodes for the closed command set.
///
/// Opcodes are grouped by subsystem: built-ins, drivetrain/body, raw
/// GPIO, positioning, and the subscription control pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    /// No-op, used for liveness and latency probing.
    Nop = 0x01,
    /// Controller uptime.
    Uptime = 0x02,

    /// Differential drive, left/right duty in `[-1, 1]`.
    Drive = 0x10,
    /// Onboard RGB led.
    Led = 0x11,
    /// The body's built-in steering servo.
    OnboardServo = 0x12,
    /// Piezo buzzer pulse width.
    Buzzer = 0x13,
    /// Line-follower track sensor bank.
    TrackSensors = 0x14,
    /// Ultrasonic distance sensor.
    UltraSensor = 0x15,

    /// Read a GPIO pin level.
    ReadPin = 0x20,
    /// Write a GPIO pin level.
    WritePin = 0x21,
    /// Software PWM on a pin.
    Pwm = 0x22,
    /// Servo signal on an arbitrary pin.
    Servo = 0x23,
    /// Configure a pin as input or output.
    PinMode = 0x24,

    /// Last known fix from the positioning service.
    Position = 0x30,

    /// Start pushing an event stream (fire-and-forget).
    Subscribe = 0x40,
    /// Stop pushing an event stream (fire-and-forget).
    Unsubscribe = 0x41,
}

impl Opcode {
    /// Raw wire value.
    #[inline]
    pub fn wire(self) -> u16 {
        self as u16
    }
}

/// GPIO pin direction, as understood by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinMode {
    Input,
    Output,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MsgPackCodec;

    #[test]
    fn opcodes_are_distinct() {
        let all = [
            Opcode::Nop,
            Opcode::Uptime,
            Opcode::Drive,
            Opcode::Led,
            Opcode::OnboardServo,
            Opcode::Buzzer,
            Opcode::TrackSensors,
            Opcode::UltraSensor,
            Opcode::ReadPin,
            Opcode::WritePin,
            Opcode::Pwm,
            Opcode::Servo,
            Opcode::PinMode,
            Opcode::Position,
            Opcode::Subscribe,
            Opcode::Unsubscribe,
        ];
        let mut wires: Vec<u16> = all.iter().map(|o| o.wire()).collect();
        wires.sort_unstable();
        wires.dedup();
        assert_eq!(wires.len(), all.len());
    }

    #[test]
    fn pin_mode_serializes_lowercase() {
        let encoded = MsgPackCodec::encode(&PinMode::Input).unwrap();
        let as_str: String = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(as_str, "input");

        let encoded = MsgPackCodec::encode(&PinMode::Output).unwrap();
        let as_str: String = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(as_str, "output");
    }
}
