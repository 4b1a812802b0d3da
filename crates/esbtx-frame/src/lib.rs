//! Type-length-value message framing for serial test traffic.
//!
//! Every message transmitted to a device is framed with:
//! - A 1-byte message type
//! - A 1-byte body length (0-255)
//! - The body, laid out per message type
//!
//! Encoding is pure and deterministic. There is no decoder here: frames are
//! consumed by the embedded receiver, which frames the stream solely by
//! reading `length` bytes after the 2-byte header.

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{encode_message, Frame, HEADER_SIZE, MAX_BODY, MAX_DATA_PAYLOAD, SEQ_WIDTH};
pub use error::{FrameError, Result};
pub use message::{
    type_name, Message, SyncKind, TYPE_CHANNEL_MAP, TYPE_DATA, TYPE_SYNC_A, TYPE_SYNC_B,
};
