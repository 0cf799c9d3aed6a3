use std::fmt;
use std::io;

use comlink_frame::FrameError;
use comlink_port::PortError;
use comlink_transport::TransportError;

// sysexits-style exit codes.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const COMMAND_REJECTED: i32 = 61;
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
        io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Open { source, .. } => match source.kind() {
            io::ErrorKind::PermissionDenied => {
                CliError::new(PERMISSION_DENIED, format!("{context}: {source}"))
            }
            _ => CliError::new(TRANSPORT_ERROR, format!("{context}: {source}")),
        },
        TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::Transport(err) => transport_error(context, err),
        FrameError::PayloadTooLarge { .. }
        | FrameError::InvalidHeader { .. }
        | FrameError::InvalidCodecLength { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        FrameError::Malformed(_)
        | FrameError::MissingStart
        | FrameError::LengthMismatch { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::QueueFull { .. } => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn port_error(context: &str, err: PortError) -> CliError {
    match err {
        PortError::Transport(err) => transport_error(context, err),
        PortError::Frame(err) => frame_error(context, err),
        PortError::Command { .. } => {
            CliError::new(COMMAND_REJECTED, format!("{context}: {err}"))
        }
        PortError::InvalidInterface(_)
        | PortError::InterfaceInUse(_)
        | PortError::InterfaceNotEnabled(_) => CliError::new(USAGE, format!("{context}: {err}")),
        PortError::Memory(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_failures_map_to_transport_code() {
        let err = TransportError::Open {
            path: "/dev/missing".into(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such device"),
        };
        assert_eq!(transport_error("open", err).code, TRANSPORT_ERROR);
    }

    #[test]
    fn oversized_payload_is_usage_error() {
        let err = PortError::Frame(FrameError::PayloadTooLarge { size: 300, max: 251 });
        let cli = port_error("send", err);
        assert_eq!(cli.code, USAGE);
        assert!(cli.message.starts_with("send: "));
    }
}
