//! Message variants and their wire type codes.
//!
//! Type codes match the embedded receiver's dispatch table and must not be
//! renumbered.

use bytes::Bytes;

use crate::codec::{MAX_BODY, SEQ_WIDTH};
use crate::error::{FrameError, Result};

/// Sequenced synthetic test payload.
pub const TYPE_DATA: u8 = 0;

/// Channel-map update.
pub const TYPE_CHANNEL_MAP: u8 = 1;

/// Synchronization marker A.
pub const TYPE_SYNC_A: u8 = 11;

/// Synchronization marker B.
pub const TYPE_SYNC_B: u8 = 12;

/// Returns a human-readable name for a frame type code.
pub fn type_name(frame_type: u8) -> &'static str {
    match frame_type {
        TYPE_DATA => "DATA",
        TYPE_CHANNEL_MAP => "CHANNEL_MAP",
        TYPE_SYNC_A => "SYNC_A",
        TYPE_SYNC_B => "SYNC_B",
        _ => "UNKNOWN",
    }
}

/// Which synchronization marker to transmit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    A,
    B,
}

impl SyncKind {
    /// The wire type code for this marker.
    pub fn frame_type(self) -> u8 {
        match self {
            SyncKind::A => TYPE_SYNC_A,
            SyncKind::B => TYPE_SYNC_B,
        }
    }
}

/// A message bound for a device, prior to framing.
///
/// The set is closed and matched exhaustively by the codec, so an unhandled
/// type cannot exist at encode time.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Synthetic test payload with a monotonically increasing sequence number.
    ///
    /// Body: 4-byte little-endian `seq` followed by the payload bytes.
    Data { seq: u32, payload: Bytes },
    /// Ordered set of channel indices the device should hop across.
    ///
    /// Body: one byte per channel index, order preserved.
    ChannelMap { channels: Vec<u8> },
    /// Marks a synchronization point during a test run. Empty body.
    Sync { kind: SyncKind },
}

impl Message {
    /// The wire type code this message encodes to.
    pub fn frame_type(&self) -> u8 {
        match self {
            Message::Data { .. } => TYPE_DATA,
            Message::ChannelMap { .. } => TYPE_CHANNEL_MAP,
            Message::Sync { kind } => kind.frame_type(),
        }
    }

    /// The encoded body length in bytes, without the 2-byte header.
    pub fn body_len(&self) -> usize {
        match self {
            Message::Data { payload, .. } => SEQ_WIDTH + payload.len(),
            Message::ChannelMap { channels } => channels.len(),
            Message::Sync { .. } => 0,
        }
    }

    /// Check the single-byte length-field precondition without encoding.
    ///
    /// Producers call this before enqueueing so an oversized message fails
    /// at the source rather than inside a session's writer.
    pub fn validate(&self) -> Result<()> {
        let size = self.body_len();
        if size > MAX_BODY {
            return Err(FrameError::BodyTooLarge {
                size,
                max: MAX_BODY,
            });
        }
        Ok(())
    }
}
