use std::fmt;
use std::io;

use expander_device::ExpanderError;
use expander_frame::FrameError;
use expander_registers::RegisterError;
use expander_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;
/// Interrupted by SIGINT.
pub const INTERRUPTED: i32 = 130;

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

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
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
        io::ErrorKind::NotFound | io::ErrorKind::BrokenPipe => TRANSPORT_ERROR,
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
        FrameError::Io(source) => io_error(context, source),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn register_error(context: &str, err: RegisterError) -> CliError {
    match err {
        RegisterError::UnknownRegister(_)
        | RegisterError::UnknownAddress(_)
        | RegisterError::AccessDenied { .. }
        | RegisterError::TypeMismatch { .. } => CliError::usage(format!("{context}: {err}")),
        RegisterError::Protocol(err) => frame_error(context, err),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn device_error(context: &str, err: ExpanderError) -> CliError {
    if err.is_protocol() {
        return CliError::new(DATA_INVALID, format!("{context}: {err}"));
    }
    match err {
        ExpanderError::Transport(err) => transport_error(context, err),
        ExpanderError::Protocol(err) => frame_error(context, err),
        ExpanderError::Register(err) => register_error(context, err),
        ExpanderError::Timeout { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        ExpanderError::Cancelled { .. } => CliError::new(INTERRUPTED, format!("{context}: {err}")),
        ExpanderError::IdentityMismatch { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        ExpanderError::Disconnected => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
        ExpanderError::InvalidParameter { .. } => CliError::usage(format!("{context}: {err}")),
        ExpanderError::Device { .. } => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}
