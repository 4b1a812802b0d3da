use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::message::Message;

/// Frame header: type (1) + length (1) = 2 bytes.
pub const HEADER_SIZE: usize = 2;

/// Maximum body size representable by the single-byte length field.
pub const MAX_BODY: usize = 255;

/// Width of the sequence-number prefix in a data frame body.
pub const SEQ_WIDTH: usize = 4;

/// Maximum payload size of a data frame (body minus the sequence prefix).
pub const MAX_DATA_PAYLOAD: usize = MAX_BODY - SEQ_WIDTH;

/// A framed message, ready for the wire.
///
/// Only [`encode_message`] constructs frames, so the body is always within
/// the length field's range and the emitted length byte always equals the
/// body length.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    frame_type: u8,
    body: Bytes,
}

impl Frame {
    /// The wire type code.
    pub fn frame_type(&self) -> u8 {
        self.frame_type
    }

    /// The frame body, without the header.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The total wire size of this frame (header + body).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.body.len()
    }

    /// Append the frame's wire bytes to `dst`.
    pub fn encode_into(&self, dst: &mut BytesMut) {
        dst.reserve(self.wire_size());
        dst.put_u8(self.frame_type);
        dst.put_u8(self.body.len() as u8);
        dst.put_slice(&self.body);
    }
}

/// Encode a message into a TLV frame.
///
/// Wire format:
/// ```text
/// ┌───────────┬───────────┬─────────────────┐
/// │ Type (1B) │ Length    │ Body            │
/// │           │ (1B)      │ (Length bytes)  │
/// └───────────┴───────────┴─────────────────┘
/// ```
///
/// Body layout per type: data frames carry a 4-byte little-endian sequence
/// number followed by the payload; channel-map frames carry one byte per
/// channel index in order; sync frames have an empty body.
///
/// There is no checksum and no resynchronization marker. The receiver frames
/// the stream solely by reading `Length` bytes after the header, so an
/// oversized body is rejected here rather than truncated.
pub fn encode_message(msg: &Message) -> Result<Frame> {
    let body_len = msg.body_len();
    if body_len > MAX_BODY {
        return Err(FrameError::BodyTooLarge {
            size: body_len,
            max: MAX_BODY,
        });
    }

    let mut body = BytesMut::with_capacity(body_len);
    match msg {
        Message::Data { seq, payload } => {
            body.put_u32_le(*seq);
            body.put_slice(payload);
        }
        Message::ChannelMap { channels } => {
            body.put_slice(channels);
        }
        Message::Sync { .. } => {}
    }

    Ok(Frame {
        frame_type: msg.frame_type(),
        body: body.freeze(),
    })
}
