use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::message::{MessageKind, PayloadType, DEFAULT_PORT};

/// Smallest legal length byte: address + port + payload type + checksum.
pub const MIN_LENGTH: usize = 4;

/// Largest legal length byte.
pub const MAX_LENGTH: usize = u8::MAX as usize;

const TIMESTAMP_SIZE: usize = 6;

/// Microseconds per timestamp tick.
const MICROS_PER_TICK: f64 = 32.0;

/// Device-clock timestamp carried by replies and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamp {
    /// Whole seconds since the device epoch.
    pub seconds: u32,
    /// Sub-second part in 32 µs ticks.
    pub ticks: u16,
}

impl Timestamp {
    pub fn new(seconds: u32, ticks: u16) -> Self {
        Self { seconds, ticks }
    }

    /// Timestamp in seconds.
    pub fn as_secs_f64(&self) -> f64 {
        f64::from(self.seconds) + f64::from(self.ticks) * MICROS_PER_TICK * 1e-6
    }
}

/// A decoded Harp message.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub kind: MessageKind,
    /// Set on replies reporting a failed command.
    pub error: bool,
    pub address: u8,
    pub port: u8,
    pub payload_type: PayloadType,
    pub timestamp: Option<Timestamp>,
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame addressed to the device port, without timestamp.
    pub fn new(
        kind: MessageKind,
        address: u8,
        payload_type: PayloadType,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            kind,
            error: false,
            address,
            port: DEFAULT_PORT,
            payload_type,
            timestamp: None,
            payload: payload.into(),
        }
    }

    /// Attach a device timestamp.
    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Mark the frame as an error reply.
    pub fn with_error(mut self) -> Self {
        self.error = true;
        self
    }

    /// The value of the length byte for this frame.
    pub fn length(&self) -> usize {
        let timestamp = if self.timestamp.is_some() {
            TIMESTAMP_SIZE
        } else {
            0
        };
        3 + timestamp + self.payload.len() + 1
    }

    /// The total wire size of this frame (type + length + rest).
    pub fn wire_size(&self) -> usize {
        2 + self.length()
    }

    /// Number of payload elements.
    pub fn element_count(&self) -> usize {
        self.payload.len() / self.payload_type.element_size()
    }

    /// Encode into a standalone buffer.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.wire_size());
        encode_frame(self, &mut buf)?;
        Ok(buf.freeze())
    }

    /// Decode exactly one frame from `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut buf = BytesMut::from(bytes);
        match decode_frame(&mut buf)? {
            Some(frame) if buf.is_empty() => Ok(frame),
            Some(_) => Err(FrameError::TrailingBytes { extra: buf.len() }),
            None => Err(FrameError::Undersized {
                len: bytes.len(),
                min: declared_size(bytes),
            }),
        }
    }
}

/// Additive checksum: the sum of all bytes modulo 256.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────┬────────┬─────────┬──────┬─────────┬────────────────┬─────────┬──────────┐
/// │ Type │ Length │ Address │ Port │ Payload │ Timestamp (6B) │ Payload │ Checksum │
/// │ (1B) │ (1B)   │ (1B)    │ (1B) │ type    │ optional       │ (LE)    │ (1B)     │
/// └──────┴────────┴─────────┴──────┴─────────┴────────────────┴─────────┴──────────┘
/// ```
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<()> {
    let length = frame.length();
    if length > MAX_LENGTH {
        return Err(FrameError::PayloadTooLarge {
            size: frame.payload.len(),
            max: frame.payload.len() - (length - MAX_LENGTH),
        });
    }

    let start = dst.len();
    dst.reserve(frame.wire_size());
    dst.put_u8(frame.kind.to_byte(frame.error));
    dst.put_u8(length as u8);
    dst.put_u8(frame.address);
    dst.put_u8(frame.port);
    dst.put_u8(frame.payload_type.to_byte(frame.timestamp.is_some()));
    if let Some(timestamp) = frame.timestamp {
        dst.put_u32_le(timestamp.seconds);
        dst.put_u16_le(timestamp.ticks);
    }
    dst.put_slice(&frame.payload);
    let sum = checksum(&dst[start..]);
    dst.put_u8(sum);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer. On error, consumes
/// the offending bytes so the next call resumes at the following candidate
/// frame start.
pub fn decode_frame(src: &mut BytesMut) -> Result<Option<Frame>> {
    if src.len() < 2 {
        return Ok(None); // Need more data
    }

    let type_byte = src[0];
    let Some((kind, error)) = MessageKind::from_byte(type_byte) else {
        src.advance(1);
        return Err(FrameError::InvalidMessageType(type_byte));
    };

    let length = usize::from(src[1]);
    if length < MIN_LENGTH {
        src.advance(1);
        return Err(FrameError::Undersized {
            len: length + 2,
            min: MIN_LENGTH + 2,
        });
    }

    let total = 2 + length;
    if src.len() < total {
        return Ok(None); // Need more data
    }

    let expected = checksum(&src[..total - 1]);
    let actual = src[total - 1];
    if expected != actual {
        // A corrupt header is indistinguishable from a misaligned stream;
        // slide one byte and try again.
        src.advance(1);
        return Err(FrameError::ChecksumMismatch { expected, actual });
    }

    let mut frame = src.split_to(total);
    frame.advance(2);
    let address = frame.get_u8();
    let port = frame.get_u8();
    let type_tag = frame.get_u8();
    let Some((payload_type, timestamped)) = PayloadType::from_byte(type_tag) else {
        return Err(FrameError::InvalidPayloadType(type_tag));
    };

    // Remaining: [timestamp] payload checksum
    let body = frame.len() - 1;
    let timestamp = if timestamped {
        if body < TIMESTAMP_SIZE {
            return Err(FrameError::Undersized {
                len: total,
                min: 2 + MIN_LENGTH + TIMESTAMP_SIZE,
            });
        }
        let seconds = frame.get_u32_le();
        let ticks = frame.get_u16_le();
        Some(Timestamp { seconds, ticks })
    } else {
        None
    };

    let payload_len = frame.len() - 1;
    if payload_len % payload_type.element_size() != 0 {
        return Err(FrameError::LengthMismatch {
            payload_type,
            len: payload_len,
        });
    }
    let payload = frame.split_to(payload_len).freeze();

    Ok(Some(Frame {
        kind,
        error,
        address,
        port,
        payload_type,
        timestamp,
        payload,
    }))
}

fn declared_size(bytes: &[u8]) -> usize {
    bytes
        .get(1)
        .map(|length| 2 + usize::from(*length))
        .unwrap_or(2 + MIN_LENGTH)
}

#[cfg(feature = "async")]
mod framed {
    use bytes::{Buf, BytesMut};
    use tokio_util::codec::{Decoder, Encoder};
    use tracing::{trace, warn};

    use super::{decode_frame, encode_frame, Frame};
    use crate::error::FrameError;

    /// A decoded item: either a frame or the protocol error that caused
    /// bytes to be skipped.
    pub type Decoded = std::result::Result<Frame, FrameError>;

    /// `tokio_util` codec for Harp frames.
    ///
    /// Protocol errors are yielded as items rather than stream errors so the
    /// stream survives them. One error is reported per run of corrupt bytes;
    /// the rest of the run is skipped quietly until a frame decodes again.
    ///
    /// Once a frame has decoded, the stream is known to sit on a frame
    /// boundary. A checksum failure from that position drops the whole
    /// damaged frame instead of sliding through its body byte by byte, so
    /// the next frame decodes as soon as it arrives.
    #[derive(Debug, Default)]
    pub struct HarpCodec {
        sync: Alignment,
    }

    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    enum Alignment {
        /// Nothing decoded yet.
        #[default]
        Unknown,
        /// The buffer starts on a frame boundary.
        Aligned,
        /// Skipping corrupt input.
        Resyncing,
    }

    impl HarpCodec {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl Decoder for HarpCodec {
        type Item = Decoded;
        type Error = FrameError;

        fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Decoded>, FrameError> {
            loop {
                let declared = src.get(1).map(|length| 2 + usize::from(*length));
                match decode_frame(src) {
                    Ok(Some(frame)) => {
                        self.sync = Alignment::Aligned;
                        return Ok(Some(Ok(frame)));
                    }
                    Ok(None) => return Ok(None),
                    Err(err) if self.sync == Alignment::Resyncing => {
                        trace!(%err, "skipping corrupt input");
                    }
                    Err(err @ FrameError::ChecksumMismatch { .. })
                        if self.sync == Alignment::Aligned =>
                    {
                        // decode_frame already consumed the first byte.
                        let rest = declared.map_or(0, |total| total - 1).min(src.len());
                        src.advance(rest);
                        warn!(%err, "dropping corrupt frame");
                        return Ok(Some(Err(err)));
                    }
                    Err(err) => {
                        warn!(%err, "corrupt frame on the wire, resynchronising");
                        self.sync = Alignment::Resyncing;
                        return Ok(Some(Err(err)));
                    }
                }
            }
        }
    }

    impl Encoder<Frame> for HarpCodec {
        type Error = FrameError;

        fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
            encode_frame(&item, dst)
        }
    }
}

#[cfg(feature = "async")]
pub use framed::{Decoded, HarpCodec};
