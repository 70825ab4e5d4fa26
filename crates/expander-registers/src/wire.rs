use std::fmt;

use expander_frame::PayloadType;

/// Wire type of a register payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    Byte,
    UInt16,
    Int16,
    Single,
    /// Two signed 16-bit elements, `(x, y)`.
    Int16Pair,
}

impl WireType {
    /// Payload-type tag used on the wire.
    pub fn payload_type(self) -> PayloadType {
        match self {
            WireType::Byte => PayloadType::U8,
            WireType::UInt16 => PayloadType::U16,
            WireType::Int16 | WireType::Int16Pair => PayloadType::S16,
            WireType::Single => PayloadType::FLOAT,
        }
    }

    /// Number of payload elements.
    pub fn element_count(self) -> usize {
        match self {
            WireType::Int16Pair => 2,
            _ => 1,
        }
    }

    /// Fixed payload width in bytes.
    pub fn width(self) -> usize {
        self.payload_type().element_size() * self.element_count()
    }

    pub fn name(self) -> &'static str {
        match self {
            WireType::Byte => "Byte",
            WireType::UInt16 => "UInt16",
            WireType::Int16 => "Int16",
            WireType::Single => "Single",
            WireType::Int16Pair => "Int16Pair",
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Register access mode: any combination of read, write and event.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessMode(u8);

impl AccessMode {
    const READ: u8 = 0x1;
    const WRITE: u8 = 0x2;
    const EVENT: u8 = 0x4;

    pub const READ_ONLY: Self = Self(Self::READ);
    pub const WRITE_ONLY: Self = Self(Self::WRITE);
    pub const READ_WRITE: Self = Self(Self::READ | Self::WRITE);
    /// Read-only, and the device emits events for it.
    pub const READ_EVENT: Self = Self(Self::READ | Self::EVENT);
    pub const READ_WRITE_EVENT: Self = Self(Self::READ | Self::WRITE | Self::EVENT);

    pub fn is_readable(self) -> bool {
        self.0 & Self::READ != 0
    }

    pub fn is_writable(self) -> bool {
        self.0 & Self::WRITE != 0
    }

    pub fn is_event(self) -> bool {
        self.0 & Self::EVENT != 0
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::with_capacity(3);
        if self.is_readable() {
            parts.push("R");
        }
        if self.is_writable() {
            parts.push("W");
        }
        if self.is_event() {
            parts.push("E");
        }
        f.write_str(&parts.join("/"))
    }
}

impl fmt::Debug for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessMode({self})")
    }
}
