use std::fmt;
use std::io;

use esbtx_frame::FrameError;
use esbtx_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::BodyTooLarge { .. } => CliError::new(DATA_INVALID, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_body_maps_to_data_invalid() {
        let err = frame_error(
            "send failed",
            FrameError::BodyTooLarge { size: 300, max: 255 },
        );
        assert_eq!(err.code, DATA_INVALID);
        assert!(err.message.contains("300"));
    }

    #[test]
    fn unavailable_port_maps_to_transport_error() {
        let err = transport_error(
            "open failed",
            TransportError::Open {
                port: "COM10".to_string(),
                source: serialport::Error::new(serialport::ErrorKind::NoDevice, "gone"),
            },
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
        assert!(err.message.contains("COM10"));
    }

    #[test]
    fn permission_denied_io_keeps_its_code() {
        let err = io_error(
            "open failed",
            io::Error::new(io::ErrorKind::PermissionDenied, "EACCES"),
        );
        assert_eq!(err.code, PERMISSION_DENIED);
    }
}
