//! Message-type and payload-type tags.
//!
//! The message-type byte carries the kind in its low bits and an error flag
//! in bit 3. The payload-type byte encodes the element size in its low
//! nibble, with separate bits for signed, floating-point and "timestamp
//! present".

use std::fmt;

/// Error flag OR-ed into the message-type byte of failed replies.
pub const ERROR_FLAG: u8 = 0x08;

/// Port value addressing the device itself.
pub const DEFAULT_PORT: u8 = 0xFF;

/// Message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Read,
    Write,
    Event,
}

impl MessageKind {
    /// Parse a message-type byte into its kind and error flag.
    pub fn from_byte(byte: u8) -> Option<(Self, bool)> {
        let kind = match byte & !ERROR_FLAG {
            1 => MessageKind::Read,
            2 => MessageKind::Write,
            3 => MessageKind::Event,
            _ => return None,
        };
        Some((kind, byte & ERROR_FLAG != 0))
    }

    /// Encode as a message-type byte.
    pub fn to_byte(self, error: bool) -> u8 {
        let base = match self {
            MessageKind::Read => 1,
            MessageKind::Write => 2,
            MessageKind::Event => 3,
        };
        if error {
            base | ERROR_FLAG
        } else {
            base
        }
    }

    /// Returns a human-readable name for the kind.
    pub fn name(self) -> &'static str {
        match self {
            MessageKind::Read => "READ",
            MessageKind::Write => "WRITE",
            MessageKind::Event => "EVENT",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Payload element type, without the timestamp bit.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PayloadType(u8);

impl PayloadType {
    pub const U8: Self = Self(0x01);
    pub const S8: Self = Self(0x81);
    pub const U16: Self = Self(0x02);
    pub const S16: Self = Self(0x82);
    pub const U32: Self = Self(0x04);
    pub const S32: Self = Self(0x84);
    pub const U64: Self = Self(0x08);
    pub const S64: Self = Self(0x88);
    pub const FLOAT: Self = Self(0x44);

    /// Set on payload-type bytes whose frame carries a timestamp.
    pub const TIMESTAMP_FLAG: u8 = 0x10;

    const ALL: [Self; 9] = [
        Self::U8,
        Self::S8,
        Self::U16,
        Self::S16,
        Self::U32,
        Self::S32,
        Self::U64,
        Self::S64,
        Self::FLOAT,
    ];

    /// Parse a payload-type byte into the element type and timestamp flag.
    pub fn from_byte(byte: u8) -> Option<(Self, bool)> {
        let base = byte & !Self::TIMESTAMP_FLAG;
        Self::ALL
            .iter()
            .copied()
            .find(|candidate| candidate.0 == base)
            .map(|ty| (ty, byte & Self::TIMESTAMP_FLAG != 0))
    }

    /// Encode as a payload-type byte.
    pub fn to_byte(self, timestamped: bool) -> u8 {
        if timestamped {
            self.0 | Self::TIMESTAMP_FLAG
        } else {
            self.0
        }
    }

    /// Raw tag value.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Size of one payload element in bytes.
    pub fn element_size(self) -> usize {
        usize::from(self.0 & 0x0F)
    }

    pub fn is_signed(self) -> bool {
        self.0 & 0x80 != 0
    }

    pub fn is_float(self) -> bool {
        self.0 & 0x40 != 0
    }

    /// Returns a human-readable name for the element type.
    pub fn name(self) -> &'static str {
        match self {
            Self::U8 => "U8",
            Self::S8 => "S8",
            Self::U16 => "U16",
            Self::S16 => "S16",
            Self::U32 => "U32",
            Self::S32 => "S32",
            Self::U64 => "U64",
            Self::S64 => "S64",
            Self::FLOAT => "Float",
            _ => "UNKNOWN",
        }
    }
}

impl fmt::Debug for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PayloadType({})", self.name())
    }
}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_kind_byte_roundtrip_with_error_flag() {
        for kind in [MessageKind::Read, MessageKind::Write, MessageKind::Event] {
            for error in [false, true] {
                assert_eq!(MessageKind::from_byte(kind.to_byte(error)), Some((kind, error)));
            }
        }
        assert_eq!(MessageKind::Write.to_byte(true), 0x0A);
    }

    #[test]
    fn unknown_message_kinds_rejected() {
        assert_eq!(MessageKind::from_byte(0x00), None);
        assert_eq!(MessageKind::from_byte(0x04), None);
        assert_eq!(MessageKind::from_byte(0x0C), None);
    }

    #[test]
    fn payload_type_sizes() {
        assert_eq!(PayloadType::U8.element_size(), 1);
        assert_eq!(PayloadType::S16.element_size(), 2);
        assert_eq!(PayloadType::FLOAT.element_size(), 4);
        assert_eq!(PayloadType::S64.element_size(), 8);
        assert!(PayloadType::FLOAT.is_float());
        assert!(PayloadType::S16.is_signed());
        assert!(!PayloadType::U16.is_signed());
    }

    #[test]
    fn payload_type_timestamp_flag() {
        assert_eq!(PayloadType::from_byte(0x12), Some((PayloadType::U16, true)));
        assert_eq!(PayloadType::from_byte(0x44), Some((PayloadType::FLOAT, false)));
        assert_eq!(PayloadType::U8.to_byte(true), 0x11);
        assert_eq!(PayloadType::from_byte(0x03), None);
    }
}
