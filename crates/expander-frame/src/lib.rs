//! Harp binary message framing.
//!
//! Every message on the wire is framed with:
//! - a message-type byte (read, write, event; optional error flag)
//! - a length byte counting everything after it
//! - address, port and payload-type bytes
//! - an optional device timestamp (seconds + 32 µs ticks)
//! - the payload, little-endian
//! - an additive checksum trailer
//!
//! Callers get complete, checksum-verified frames; corrupt input is skipped
//! byte by byte until the stream lines up again.

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{checksum, decode_frame, encode_frame, Frame, Timestamp, MAX_LENGTH, MIN_LENGTH};
#[cfg(feature = "async")]
pub use codec::{Decoded, HarpCodec};
pub use error::{FrameError, Result};
pub use message::{MessageKind, PayloadType, DEFAULT_PORT, ERROR_FLAG};
