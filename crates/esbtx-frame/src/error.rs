/// Errors that can occur during frame encoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The encoded body would exceed the single-byte length field.
    ///
    /// This is always an error, never a truncation: a short frame would
    /// desynchronize the receiver's framing.
    #[error("frame body too large ({size} bytes, max {max})")]
    BodyTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
