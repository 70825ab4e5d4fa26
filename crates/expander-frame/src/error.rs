use crate::message::PayloadType;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The message-type byte is not read, write or event.
    #[error("invalid message type 0x{0:02x}")]
    InvalidMessageType(u8),

    /// The payload-type byte does not name a known element type.
    #[error("invalid payload type 0x{0:02x}")]
    InvalidPayloadType(u8),

    /// The frame is shorter than its header requires.
    #[error("frame too short ({len} bytes, min {min})")]
    Undersized { len: usize, min: usize },

    /// Bytes remain after one complete frame.
    #[error("{extra} trailing bytes after frame")]
    TrailingBytes { extra: usize },

    /// The payload length is not a whole number of elements.
    #[error("payload of {len} bytes is not a multiple of the {payload_type} element size")]
    LengthMismatch {
        payload_type: PayloadType,
        len: usize,
    },

    /// The checksum trailer does not match the frame contents.
    #[error("checksum mismatch (expected 0x{expected:02x}, got 0x{actual:02x})")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// The payload does not fit in a single frame.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// True for errors caused by malformed bytes, as opposed to I/O failures.
    pub fn is_protocol(&self) -> bool {
        !matches!(self, FrameError::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
