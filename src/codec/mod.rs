//! Codec module - serialization/deserialization for frame payloads.
//!
//! Every payload on the wire is MessagePack, encoded with [`MsgPackCodec`].
//! The codec is a marker struct with static methods rather than a trait
//! object, so codec selection is a compile-time matter.

mod msgpack;

pub use msgpack::MsgPackCodec;
