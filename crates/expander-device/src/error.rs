use std::time::Duration;

/// Errors that can occur while talking to a device.
#[derive(Debug, thiserror::Error)]
pub enum ExpanderError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] expander_transport::TransportError),

    /// Malformed bytes on the wire.
    #[error("protocol error: {0}")]
    Protocol(#[from] expander_frame::FrameError),

    /// Register lookup, access or payload conversion failed.
    #[error(transparent)]
    Register(#[from] expander_registers::RegisterError),

    /// The device answered with the error flag set.
    #[error("device reported an error for address {address} (message type 0x{code:02x})")]
    Device { address: u8, code: u8 },

    /// No matching reply arrived before the deadline.
    #[error("no reply for address {address} within {after:?}")]
    Timeout { address: u8, after: Duration },

    /// The caller's cancellation token fired first.
    #[error("command for address {address} cancelled")]
    Cancelled { address: u8 },

    /// The board on the other end is not an Output Expander.
    #[error("identity mismatch: expected WhoAmI {expected}, device reported {actual}")]
    IdentityMismatch { expected: u16, actual: u16 },

    /// The command channel has shut down.
    #[error("device disconnected")]
    Disconnected,

    /// A configuration argument is out of range.
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

impl ExpanderError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// True for malformed-frame errors at either the frame or payload layer.
    pub fn is_protocol(&self) -> bool {
        use expander_registers::RegisterError;

        match self {
            ExpanderError::Protocol(err) => err.is_protocol(),
            ExpanderError::Register(RegisterError::Protocol(_))
            | ExpanderError::Register(RegisterError::MissingTimestamp(_)) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExpanderError>;
