//! Protocol module - wire format, framing, and frame types.
//!
//! This module implements the binary protocol spoken with the controller:
//! - 11-byte header encoding/decoding
//! - Frame buffer for accumulating partial reads
//! - Frame struct with routing classification

mod frame;
mod frame_buffer;
mod wire_format;

pub use frame::{build_frame, Frame, FrameKind};
pub use frame_buffer::FrameBuffer;
pub use wire_format::{
    flags, Header, DEFAULT_MAX_PAYLOAD_SIZE, EVENT_CORRELATION_ID, HEADER_SIZE,
};
