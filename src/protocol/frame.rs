//! Frame struct with typed accessors.
//!
//! Represents a complete protocol frame with header and payload.
//! Uses `bytes::Bytes` for zero-copy payload sharing.

use bytes::Bytes;

use super::wire_format::{Header, HEADER_SIZE};

/// A complete protocol frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Decoded header.
    pub header: Header,
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

/// Routing classification of an incoming frame.
///
/// Only headers that passed [`Header::validate_incoming`] classify; the
/// two cases are mutually exclusive by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Reply to the command with this correlation id.
    Reply { correlation_id: u32, is_error: bool },
    /// Unsolicited event push; the discriminant is the raw event opcode.
    Event { discriminant: u16 },
}

impl Frame {
    /// Create a new frame from header and payload.
    pub fn new(header: Header, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Classify this frame for routing.
    pub fn kind(&self) -> FrameKind {
        if self.header.is_reply() {
            FrameKind::Reply {
                correlation_id: self.header.correlation_id,
                is_error: self.header.is_error(),
            }
        } else {
            FrameKind::Event {
                discriminant: self.header.opcode,
            }
        }
    }
}

/// Build a complete frame as a single byte vector.
///
/// Encodes header and appends payload into a contiguous buffer.
pub fn build_frame(header: &Header, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    buf
}
