use esbtx_frame::FrameError;
use esbtx_transport::TransportError;

/// Errors from the session and dispatch layer.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// A session is already registered under this port name.
    #[error("port {port} already registered")]
    DuplicatePort { port: String },

    /// The target session has reached its terminal closed state.
    #[error("session for port {port} is closed")]
    SessionClosed { port: String },

    /// The underlying transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A message violated a framing precondition.
    #[error(transparent)]
    Frame(#[from] FrameError),
}

pub type Result<T> = std::result::Result<T, LinkError>;
