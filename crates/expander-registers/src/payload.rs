//! Typed payload encoding and decoding.
//!
//! [`RegisterValue`] is the wire-level view: one variant per [`WireType`],
//! packed little-endian. [`RegisterPayload`] maps Rust types onto it and also
//! names the semantic [`ValueKind`] a type carries, so a `DigitalOutputs`
//! value cannot be written into a PWM trigger register by accident.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use expander_frame::{Frame, MessageKind};

use crate::error::{RegisterError, Result};
use crate::map::{RegisterDescriptor, ValueKind};
use crate::wire::WireType;

/// A register value in its wire representation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegisterValue {
    Byte(u8),
    UInt16(u16),
    Int16(i16),
    Single(f32),
    Int16Pair(i16, i16),
}

impl RegisterValue {
    pub fn wire_type(&self) -> WireType {
        match self {
            RegisterValue::Byte(_) => WireType::Byte,
            RegisterValue::UInt16(_) => WireType::UInt16,
            RegisterValue::Int16(_) => WireType::Int16,
            RegisterValue::Single(_) => WireType::Single,
            RegisterValue::Int16Pair(..) => WireType::Int16Pair,
        }
    }

    /// Little-endian payload bytes.
    pub fn to_payload(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_type().width());
        match *self {
            RegisterValue::Byte(v) => buf.put_u8(v),
            RegisterValue::UInt16(v) => buf.put_u16_le(v),
            RegisterValue::Int16(v) => buf.put_i16_le(v),
            RegisterValue::Single(v) => buf.put_f32_le(v),
            RegisterValue::Int16Pair(x, y) => {
                buf.put_i16_le(x);
                buf.put_i16_le(y);
            }
        }
        buf.freeze()
    }

    /// Unpack `payload` as `wire_type`; `None` if the width is wrong.
    pub fn from_payload(wire_type: WireType, payload: &[u8]) -> Option<Self> {
        if payload.len() != wire_type.width() {
            return None;
        }
        let mut buf = payload;
        let value = match wire_type {
            WireType::Byte => RegisterValue::Byte(buf.get_u8()),
            WireType::UInt16 => RegisterValue::UInt16(buf.get_u16_le()),
            WireType::Int16 => RegisterValue::Int16(buf.get_i16_le()),
            WireType::Single => RegisterValue::Single(buf.get_f32_le()),
            WireType::Int16Pair => {
                let x = buf.get_i16_le();
                let y = buf.get_i16_le();
                RegisterValue::Int16Pair(x, y)
            }
        };
        Some(value)
    }

    /// Parse user text as a value of `wire_type`.
    ///
    /// Integers accept decimal or `0x` hex; pairs are written `dx,dy`.
    pub fn parse(wire_type: WireType, text: &str) -> Option<Self> {
        let text = text.trim();
        match wire_type {
            WireType::Byte => parse_unsigned(text)
                .and_then(|v| u8::try_from(v).ok())
                .map(RegisterValue::Byte),
            WireType::UInt16 => parse_unsigned(text)
                .and_then(|v| u16::try_from(v).ok())
                .map(RegisterValue::UInt16),
            WireType::Int16 => text.parse().ok().map(RegisterValue::Int16),
            WireType::Single => text
                .parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .map(RegisterValue::Single),
            WireType::Int16Pair => {
                let (x, y) = text.split_once(',')?;
                Some(RegisterValue::Int16Pair(
                    x.trim().parse().ok()?,
                    y.trim().parse().ok()?,
                ))
            }
        }
    }
}

fn parse_unsigned(text: &str) -> Option<u32> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

impl fmt::Display for RegisterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterValue::Byte(v) => write!(f, "{v}"),
            RegisterValue::UInt16(v) => write!(f, "{v}"),
            RegisterValue::Int16(v) => write!(f, "{v}"),
            RegisterValue::Single(v) => write!(f, "{v}"),
            RegisterValue::Int16Pair(x, y) => write!(f, "({x}, {y})"),
        }
    }
}

/// A Rust type that can travel as a register payload.
pub trait RegisterPayload: Sized {
    const WIRE_TYPE: WireType;
    /// Semantic kind; [`ValueKind::Number`] fits any register of the same wire type.
    const KIND: ValueKind;

    fn into_value(self) -> RegisterValue;

    /// `None` if the value is not representable as `Self`.
    fn from_value(value: RegisterValue) -> Option<Self>;
}

macro_rules! number_payload {
    ($ty:ty => $wire:ident) => {
        impl RegisterPayload for $ty {
            const WIRE_TYPE: WireType = WireType::$wire;
            const KIND: ValueKind = ValueKind::Number;

            fn into_value(self) -> RegisterValue {
                RegisterValue::$wire(self)
            }

            fn from_value(value: RegisterValue) -> Option<Self> {
                match value {
                    RegisterValue::$wire(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

number_payload!(u8 => Byte);
number_payload!(u16 => UInt16);
number_payload!(i16 => Int16);
number_payload!(f32 => Single);

/// A value paired with the device timestamp of its frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timestamped<T> {
    pub value: T,
    /// Device clock, in seconds.
    pub seconds: f64,
}

impl<T> Timestamped<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Timestamped<U> {
        Timestamped {
            value: f(self.value),
            seconds: self.seconds,
        }
    }
}

/// Build a `kind` frame carrying `value` for `descriptor`.
pub fn encode(
    descriptor: &RegisterDescriptor,
    kind: MessageKind,
    value: RegisterValue,
) -> Result<Frame> {
    if value.wire_type() != descriptor.wire_type {
        return Err(RegisterError::TypeMismatch {
            register: descriptor.name,
            expected: descriptor.wire_type.to_string(),
            actual: value.wire_type().to_string(),
        });
    }
    Ok(Frame::new(
        kind,
        descriptor.address,
        descriptor.wire_type.payload_type(),
        value.to_payload(),
    ))
}

/// Unpack the payload of `frame` as a value of `descriptor`.
pub fn decode(descriptor: &RegisterDescriptor, frame: &Frame) -> Result<RegisterValue> {
    if frame.address != descriptor.address {
        return Err(RegisterError::AddressMismatch {
            register: descriptor.name,
            expected: descriptor.address,
            actual: frame.address,
        });
    }
    let expected = descriptor.wire_type.payload_type();
    if frame.payload_type != expected {
        return Err(RegisterError::TypeMismatch {
            register: descriptor.name,
            expected: expected.to_string(),
            actual: frame.payload_type.to_string(),
        });
    }
    RegisterValue::from_payload(descriptor.wire_type, &frame.payload).ok_or(
        RegisterError::InvalidLength {
            address: descriptor.address,
            expected: descriptor.wire_type.width(),
            actual: frame.payload.len(),
        },
    )
}

/// Like [`decode`], and also return the frame timestamp.
pub fn decode_timestamped(
    descriptor: &RegisterDescriptor,
    frame: &Frame,
) -> Result<Timestamped<RegisterValue>> {
    let value = decode(descriptor, frame)?;
    let timestamp = frame
        .timestamp
        .ok_or(RegisterError::MissingTimestamp(descriptor.name))?;
    Ok(Timestamped {
        value,
        seconds: timestamp.as_secs_f64(),
    })
}

/// Parse raw frame bytes, then [`decode`].
pub fn decode_bytes(descriptor: &RegisterDescriptor, bytes: &[u8]) -> Result<RegisterValue> {
    decode(descriptor, &Frame::from_bytes(bytes)?)
}

/// Parse raw frame bytes, then [`decode_timestamped`].
pub fn decode_timestamped_bytes(
    descriptor: &RegisterDescriptor,
    bytes: &[u8],
) -> Result<Timestamped<RegisterValue>> {
    decode_timestamped(descriptor, &Frame::from_bytes(bytes)?)
}

/// Check that `T` may be stored in `descriptor`.
pub fn check_kind<T: RegisterPayload>(descriptor: &RegisterDescriptor) -> Result<()> {
    let kind_ok = T::KIND == ValueKind::Number || T::KIND == descriptor.kind;
    if T::WIRE_TYPE == descriptor.wire_type && kind_ok {
        Ok(())
    } else {
        Err(RegisterError::TypeMismatch {
            register: descriptor.name,
            expected: descriptor.type_label(),
            actual: T::KIND.label(T::WIRE_TYPE),
        })
    }
}

pub fn encode_typed<T: RegisterPayload>(
    descriptor: &RegisterDescriptor,
    kind: MessageKind,
    value: T,
) -> Result<Frame> {
    check_kind::<T>(descriptor)?;
    encode(descriptor, kind, value.into_value())
}

pub fn decode_typed<T: RegisterPayload>(descriptor: &RegisterDescriptor, frame: &Frame) -> Result<T> {
    check_kind::<T>(descriptor)?;
    let value = decode(descriptor, frame)?;
    from_value(descriptor, value)
}

pub fn decode_timestamped_typed<T: RegisterPayload>(
    descriptor: &RegisterDescriptor,
    frame: &Frame,
) -> Result<Timestamped<T>> {
    check_kind::<T>(descriptor)?;
    let stamped = decode_timestamped(descriptor, frame)?;
    Ok(Timestamped {
        value: from_value(descriptor, stamped.value)?,
        seconds: stamped.seconds,
    })
}

fn from_value<T: RegisterPayload>(descriptor: &RegisterDescriptor, value: RegisterValue) -> Result<T> {
    T::from_value(value).ok_or_else(|| RegisterError::InvalidValue {
        register: descriptor.name,
        value: value.to_string(),
    })
}
