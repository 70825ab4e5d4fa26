//! Register map, typed payload codec and command builder.
//!
//! The device is described by one data-driven table of
//! [`RegisterDescriptor`]s. Values move between Rust types and wire payloads
//! through [`RegisterValue`] (wire-level) and the [`RegisterPayload`] trait
//! (typed: numbers, named flag sets, enums).

pub mod command;
pub mod error;
pub mod flags;
pub mod map;
pub mod payload;
pub mod wire;

pub use command::CommandBuilder;
pub use error::{RegisterError, Result};
pub use flags::{
    AcquisitionMode, AuxiliaryInputs, DigitalOutputs, EnableFlag, EncoderSampleRate,
    ExpansionBoardType, OpticalFlowDelta, PwmAndStimMapping, PwmChannels, StimChannels, TriggerSource,
};
pub use map::{
    names, RegisterBlock, RegisterDescriptor, RegisterMap, ValueKind, EXPECTED_WHO_AM_I,
    OUTPUT_PULSE_WIDTH, PWM, SERVO_PULSE_WIDTH, STIM,
};
pub use payload::{
    check_kind, decode, decode_bytes, decode_timestamped, decode_timestamped_bytes,
    decode_timestamped_typed, decode_typed, encode, encode_typed, RegisterPayload, RegisterValue,
    Timestamped,
};
pub use wire::{AccessMode, WireType};
