//! Frame buffer for accumulating partial socket reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management and a small
//! state machine for fragmented frames:
//! - `AwaitingHeader`: need at least 11 bytes
//! - `AwaitingPayload`: header parsed, need N more payload bytes
//! - `SkippingPayload`: header was malformed, discard its declared
//!   payload and resync on the next header
//!
//! A malformed header (bad flags, misplaced correlation id) is a one-off
//! anomaly: the frame is skipped by its declared length and decoding
//! continues. Only an implausible payload length is unrecoverable, since
//! frame boundaries can no longer be trusted.

use bytes::{Bytes, BytesMut};

use super::wire_format::{Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};
use super::Frame;
use crate::error::{BotwireError, Result};

#[derive(Debug, Clone)]
enum State {
    AwaitingHeader,
    AwaitingPayload { header: Header },
    SkippingPayload { remaining: usize },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
pub struct FrameBuffer {
    buffer: BytesMut,
    state: State,
    max_payload_size: u32,
}

impl FrameBuffer {
    /// Create a new frame buffer with default settings.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Create a new frame buffer with a custom max payload size.
    pub fn with_max_payload(max_payload_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8 * 1024),
            state: State::AwaitingHeader,
            max_payload_size,
        }
    }

    /// Push data into the buffer and extract all complete, valid frames.
    ///
    /// Malformed frames are skipped and logged; partial data is buffered
    /// for the next push.
    ///
    /// # Errors
    ///
    /// Returns an error only when framing is unrecoverable (declared
    /// payload length exceeds the maximum); the caller should tear the
    /// connection down.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.advance()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Advance the state machine by at most one complete frame.
    ///
    /// Returns `Ok(None)` when more data is needed.
    fn advance(&mut self) -> Result<Option<Frame>> {
        loop {
            match &self.state {
                State::AwaitingHeader => {
                    if self.buffer.len() < HEADER_SIZE {
                        return Ok(None);
                    }

                    let header = Header::decode(&self.buffer[..HEADER_SIZE])
                        .expect("buffer holds a full header");

                    if header.payload_length > self.max_payload_size {
                        return Err(BotwireError::Protocol(format!(
                            "declared payload length {} exceeds maximum {}, framing lost",
                            header.payload_length, self.max_payload_size
                        )));
                    }

                    let _ = self.buffer.split_to(HEADER_SIZE);

                    if let Err(e) = header.validate_incoming() {
                        tracing::warn!("skipping malformed frame: {e}");
                        if header.payload_length == 0 {
                            continue;
                        }
                        self.state = State::SkippingPayload {
                            remaining: header.payload_length as usize,
                        };
                        continue;
                    }

                    if header.payload_length == 0 {
                        return Ok(Some(Frame::new(header, Bytes::new())));
                    }
                    self.state = State::AwaitingPayload { header };
                }

                State::AwaitingPayload { header } => {
                    let needed = header.payload_length as usize;
                    if self.buffer.len() < needed {
                        return Ok(None);
                    }

                    let header = *header;
                    let payload = self.buffer.split_to(needed).freeze();
                    self.state = State::AwaitingHeader;
                    return Ok(Some(Frame::new(header, payload)));
                }

                State::SkippingPayload { remaining } => {
                    let take = (*remaining).min(self.buffer.len());
                    let _ = self.buffer.split_to(take);
                    let left = remaining - take;
                    if left > 0 {
                        self.state = State::SkippingPayload { remaining: left };
                        return Ok(None);
                    }
                    self.state = State::AwaitingHeader;
                }
            }
        }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{build_frame, flags};

    fn reply_bytes(opcode: u16, correlation_id: u32, payload: &[u8]) -> Vec<u8> {
        let header = Header::new(opcode, flags::REPLY, correlation_id, payload.len() as u32);
        build_frame(&header, payload)
    }

    fn event_bytes(discriminant: u16, payload: &[u8]) -> Vec<u8> {
        let header = Header::new(discriminant, flags::EVENT, 0, payload.len() as u32);
        build_frame(&header, payload)
    }

    #[test]
    fn single_complete_frame() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&reply_bytes(0x14, 42, b"hello")).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].header.correlation_id, 42);
        assert_eq!(frames[0].payload(), b"hello");
        assert!(buffer.is_empty());
    }

    #[test]
    fn replies_and_events_interleaved_in_one_push() {
        let mut buffer = FrameBuffer::new();

        let mut combined = reply_bytes(0x20, 1, b"first");
        combined.extend(event_bytes(0x03, b"pin"));
        combined.extend(reply_bytes(0x15, 2, b"second"));

        let frames = buffer.push(&combined).unwrap();

        assert_eq!(frames.len(), 3);
        assert!(frames[0].header.is_reply());
        assert!(frames[1].header.is_event());
        assert!(frames[2].header.is_reply());
        assert!(buffer.is_empty());
    }

    #[test]
    fn fragmented_header() {
        let mut buffer = FrameBuffer::new();
        let bytes = reply_bytes(0x01, 42, b"test");

        let frames = buffer.push(&bytes[..5]).unwrap();
        assert!(frames.is_empty());

        let frames = buffer.push(&bytes[5..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(buffer.is_empty());
    }

    #[test]
    fn fragmented_payload() {
        let mut buffer = FrameBuffer::new();
        let payload = b"a longer payload that arrives in two reads";
        let bytes = reply_bytes(0x14, 42, payload);

        let partial = HEADER_SIZE + 10;
        let frames = buffer.push(&bytes[..partial]).unwrap();
        assert!(frames.is_empty());

        let frames = buffer.push(&bytes[partial..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), payload);
    }

    #[test]
    fn byte_at_a_time() {
        let mut buffer = FrameBuffer::new();
        let bytes = event_bytes(0x06, b"pos");

        let mut all = Vec::new();
        for byte in &bytes {
            all.extend(buffer.push(&[*byte]).unwrap());
        }

        assert_eq!(all.len(), 1);
        assert_eq!(all[0].payload(), b"pos");
    }

    #[test]
    fn empty_payload_frame() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&reply_bytes(0x01, 9, b"")).unwrap();

        assert_eq!(frames.len(), 1);
        assert!(frames[0].payload.is_empty());
    }

    #[test]
    fn malformed_frame_is_skipped_and_decoding_continues() {
        let mut buffer = FrameBuffer::new();

        // flags declare both reply and event: invalid, but the declared
        // length still lets us resync
        let bad = build_frame(&Header::new(0x01, flags::REPLY | flags::EVENT, 1, 4), b"junk");
        let good = reply_bytes(0x02, 5, b"ok");

        let mut combined = bad;
        combined.extend(&good);

        let frames = buffer.push(&combined).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].header.correlation_id, 5);
    }

    #[test]
    fn malformed_frame_skipped_across_fragmented_pushes() {
        let mut buffer = FrameBuffer::new();

        let bad = build_frame(&Header::new(0x01, 0, 1, 8), b"deadbeef");
        let good = reply_bytes(0x02, 6, b"ok");

        // malformed header plus half its payload
        let frames = buffer.push(&bad[..HEADER_SIZE + 4]).unwrap();
        assert!(frames.is_empty());

        let mut rest = bad[HEADER_SIZE + 4..].to_vec();
        rest.extend(&good);
        let frames = buffer.push(&rest).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].header.correlation_id, 6);
    }

    #[test]
    fn oversized_payload_is_unrecoverable() {
        let mut buffer = FrameBuffer::with_max_payload(100);
        let header = Header::new(0x01, flags::REPLY, 1, 1000);

        let result = buffer.push(&header.encode());
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("exceeds maximum"));
    }
}
