//! Named bit sets and enumerations carried by register payloads.
//!
//! Flag sets are [`bitflags`] types: bit *i* is channel *i*, and
//! iteration is always in ascending bit order. Bits without a name are
//! retained so a raw device value survives a decode/encode round trip.
//! Each named bit also carries the device's own label (`Out3`, `Pwm0`),
//! which is what `Display` and [`from_label`](DigitalOutputs::from_label)
//! use.

use std::fmt;

use crate::map::ValueKind;
use crate::payload::{RegisterPayload, RegisterValue};
use crate::wire::WireType;

macro_rules! flag_set {
    (
        $(#[$meta:meta])*
        $name:ident: $repr:ty => $wire:ident, $kind:ident {
            $($(#[$fmeta:meta])* $flag:ident = $bit:literal => $label:literal),+ $(,)?
        }
    ) => {
        bitflags::bitflags! {
            $(#[$meta])*
            #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
            pub struct $name: $repr {
                $(
                    $(#[$fmeta])*
                    const $flag = 1 << $bit;
                )+
            }
        }

        impl $name {
            const LABELS: &'static [(&'static str, u8)] = &[$(($label, $bit)),+];

            /// The set containing only channel `index`, if that channel exists.
            pub fn channel(index: u8) -> Option<Self> {
                Self::LABELS
                    .iter()
                    .find(|(_, bit)| *bit == index)
                    .map(|(_, bit)| Self::from_bits_retain(1 << *bit))
            }

            /// Case-insensitive lookup of one named bit by its device label.
            pub fn from_label(label: &str) -> Option<Self> {
                Self::LABELS
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(label))
                    .map(|(_, bit)| Self::from_bits_retain(1 << *bit))
            }

            /// Indices of set bits, ascending.
            pub fn indices(self) -> impl Iterator<Item = u8> {
                let bits = self.bits();
                (0..<$repr>::BITS as u8).filter(move |i| bits & (1 << *i) != 0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_empty() {
                    return f.write_str("None");
                }
                let mut first = true;
                for index in self.indices() {
                    if !first {
                        f.write_str(" | ")?;
                    }
                    first = false;
                    match Self::LABELS.iter().find(|(_, bit)| *bit == index) {
                        Some((label, _)) => f.write_str(label)?,
                        None => write!(f, "Bit{index}")?,
                    }
                }
                Ok(())
            }
        }

        impl RegisterPayload for $name {
            const WIRE_TYPE: WireType = WireType::$wire;
            const KIND: ValueKind = ValueKind::$kind;

            fn into_value(self) -> RegisterValue {
                RegisterValue::$wire(self.bits())
            }

            fn from_value(value: RegisterValue) -> Option<Self> {
                match value {
                    RegisterValue::$wire(bits) => Some(Self::from_bits_retain(bits)),
                    _ => None,
                }
            }
        }
    };
}

macro_rules! register_enum {
    (
        $(#[$meta:meta])*
        $name:ident => $kind:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum $name {
            $($(#[$vmeta])* $variant = $value),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub fn from_raw(raw: u8) -> Option<Self> {
                match raw {
                    $($value => Some(Self::$variant),)+
                    _ => None,
                }
            }

            pub fn raw(self) -> u8 {
                self as u8
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }

            /// Case-insensitive lookup by display name.
            pub fn from_name(name: &str) -> Option<Self> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|candidate| candidate.name().eq_ignore_ascii_case(name))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl RegisterPayload for $name {
            const WIRE_TYPE: WireType = WireType::Byte;
            const KIND: ValueKind = ValueKind::$kind;

            fn into_value(self) -> RegisterValue {
                RegisterValue::Byte(self.raw())
            }

            fn from_value(value: RegisterValue) -> Option<Self> {
                match value {
                    RegisterValue::Byte(raw) => Self::from_raw(raw),
                    _ => None,
                }
            }
        }
    };
}

flag_set! {
    /// Auxiliary digital inputs.
    AuxiliaryInputs: u8 => Byte, AuxiliaryInputs {
        AUX_IN0 = 0 => "AuxIn0",
        AUX_IN1 = 1 => "AuxIn1",
    }
}

flag_set! {
    /// The ten digital output lines.
    DigitalOutputs: u16 => UInt16, DigitalOutputs {
        OUT0 = 0 => "Out0",
        OUT1 = 1 => "Out1",
        OUT2 = 2 => "Out2",
        OUT3 = 3 => "Out3",
        OUT4 = 4 => "Out4",
        OUT5 = 5 => "Out5",
        OUT6 = 6 => "Out6",
        OUT7 = 7 => "Out7",
        OUT8 = 8 => "Out8",
        OUT9 = 9 => "Out9",
    }
}

flag_set! {
    /// Routing of the PWM generators onto output lines. Bit *i* is output
    /// line *i*; each PWM generator can only drive the lines listed here.
    PwmAndStimMapping: u16 => UInt16, PwmAndStimMapping {
        PWM0_TO_OUT1 = 1 => "Pwm0ToOut1",
        PWM0_TO_OUT2 = 2 => "Pwm0ToOut2",
        PWM0_TO_OUT3 = 3 => "Pwm0ToOut3",
        PWM1_TO_OUT6 = 6 => "Pwm1ToOut6",
        PWM1_TO_OUT7 = 7 => "Pwm1ToOut7",
        PWM1_TO_OUT8 = 8 => "Pwm1ToOut8",
        PWM2_TO_OUT9 = 9 => "Pwm2ToOut9",
    }
}

flag_set! {
    /// PWM generators.
    PwmChannels: u8 => Byte, PwmChannels {
        PWM0 = 0 => "Pwm0",
        PWM1 = 1 => "Pwm1",
        PWM2 = 2 => "Pwm2",
    }
}

flag_set! {
    /// Stimulation generators.
    StimChannels: u8 => Byte, StimChannels {
        STIM0 = 0 => "Stim0",
    }
}

register_enum! {
    /// Finite (counted) or continuous pulse generation.
    AcquisitionMode => AcquisitionMode {
        Continuous = 0 => "Continuous",
        Finite = 1 => "Finite",
    }
}

register_enum! {
    /// What starts a PWM or stimulation train.
    TriggerSource => TriggerSource {
        Software = 0 => "Software",
        Hardware = 1 => "Hardware",
    }
}

register_enum! {
    EnableFlag => EnableFlag {
        Disabled = 0 => "Disabled",
        Enabled = 1 => "Enabled",
    }
}

register_enum! {
    /// Board attached to the expansion connector.
    ExpansionBoardType => ExpansionBoard {
        None = 0 => "None",
        Breakout = 1 => "Breakout",
        MagneticEncoder = 2 => "MagneticEncoder",
        ServoMotor = 3 => "ServoMotor",
        OpticalFlow = 4 => "OpticalFlow",
    }
}

register_enum! {
    /// Magnetic encoder sampling rate.
    EncoderSampleRate => EncoderSampleRate {
        Rate50Hz = 0 => "50Hz",
        Rate100Hz = 1 => "100Hz",
        Rate200Hz = 2 => "200Hz",
        Rate250Hz = 3 => "250Hz",
        Rate500Hz = 4 => "500Hz",
        Rate1000Hz = 5 => "1000Hz",
    }
}

impl EncoderSampleRate {
    pub fn hertz(self) -> u32 {
        match self {
            Self::Rate50Hz => 50,
            Self::Rate100Hz => 100,
            Self::Rate200Hz => 200,
            Self::Rate250Hz => 250,
            Self::Rate500Hz => 500,
            Self::Rate1000Hz => 1000,
        }
    }
}

/// Optical-flow displacement since the previous sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpticalFlowDelta {
    pub dx: i16,
    pub dy: i16,
}

impl RegisterPayload for OpticalFlowDelta {
    const WIRE_TYPE: WireType = WireType::Int16Pair;
    const KIND: ValueKind = ValueKind::OpticalFlow;

    fn into_value(self) -> RegisterValue {
        RegisterValue::Int16Pair(self.dx, self.dy)
    }

    fn from_value(value: RegisterValue) -> Option<Self> {
        match value {
            RegisterValue::Int16Pair(dx, dy) => Some(Self { dx, dy }),
            _ => None,
        }
    }
}
