//! MsgPack codec using `rmp-serde`.
//!
//! Always `to_vec_named`: the controller firmware decodes structs as maps
//! (field names on the wire), not positional arrays. Command argument
//! tuples are unaffected, but reply structs such as `Position` must stay
//! self-describing so firmware revisions can add fields.

use crate::error::Result;

/// MessagePack codec for frame payloads.
///
/// Uses `rmp_serde::to_vec_named` so struct payloads serialize as maps.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Position;

    #[test]
    fn encode_decode_command_args() {
        // drive args are a plain tuple
        let args = (0.5f64, -0.25f64);
        let encoded = MsgPackCodec::encode(&args).unwrap();
        let decoded: (f64, f64) = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, args);

        // pin commands mix integers and booleans
        let args = (13u8, true);
        let encoded = MsgPackCodec::encode(&args).unwrap();
        let decoded: (u8, bool) = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, args);
    }

    #[test]
    fn encode_decode_sensor_replies() {
        let tracks = [true, false, true, false];
        let encoded = MsgPackCodec::encode(&tracks).unwrap();
        let decoded: [bool; 4] = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, tracks);

        let distance = 36.5f64;
        let encoded = MsgPackCodec::encode(&distance).unwrap();
        let decoded: f64 = MsgPackCodec::decode(&encoded).unwrap();
        assert!((decoded - distance).abs() < f64::EPSILON);
    }

    #[test]
    fn position_serializes_as_map() {
        let pos = Position {
            x: 1.0,
            y: 2.0,
            rotation: 90.0,
        };
        let encoded = MsgPackCodec::encode(&pos).unwrap();

        // fixmap with 3 elements, not fixarray: 0x83 vs 0x93
        assert_eq!(
            encoded[0] & 0xF0,
            0x80,
            "expected map format (0x8X), got {:02X}",
            encoded[0]
        );

        let decoded: Position = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, pos);
    }

    #[test]
    fn option_position_absent_is_nil() {
        let none: Option<Position> = None;
        let encoded = MsgPackCodec::encode(&none).unwrap();
        assert_eq!(encoded, vec![0xc0]);

        let decoded: Option<Position> = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, None);
    }

    #[test]
    fn uptime_duration_roundtrip() {
        let uptime = std::time::Duration::from_millis(12_345);
        let encoded = MsgPackCodec::encode(&uptime).unwrap();
        let decoded: std::time::Duration = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, uptime);
    }

    #[test]
    fn decode_error_on_invalid_data() {
        let invalid = b"not valid msgpack for a position";
        let result: Result<Position> = MsgPackCodec::decode(invalid);
        assert!(result.is_err());
    }
}
