/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the named port at startup.
    ///
    /// Non-fatal to the process: the port is skipped and the remaining
    /// configured ports proceed unaffected.
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        source: serialport::Error,
    },

    /// An I/O error occurred on an open transport.
    ///
    /// Fatal to the owning session only.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The serial layer reported an error on an open transport.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The transport was closed by fault injection or teardown.
    #[error("transport closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
