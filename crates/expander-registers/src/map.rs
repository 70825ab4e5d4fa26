//! Register descriptors and the Output Expander address map.
//!
//! The table is data: each [`RegisterDescriptor`] names an address, the wire
//! type of its payload, what access the device allows and which typed value
//! it carries. Per-channel register families (PWM, stimulation, pulse widths,
//! servos) are laid out as [`RegisterBlock`]s and expanded into the table
//! when the map is first built.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::OnceLock;

use crate::error::{RegisterError, Result};
use crate::wire::{AccessMode, WireType};

/// Value reported by `WhoAmI` on an Output Expander.
pub const EXPECTED_WHO_AM_I: u16 = 1108;

/// Typed value carried by a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Plain integer or float.
    Number,
    AuxiliaryInputs,
    DigitalOutputs,
    /// Which output lines each PWM generator may drive.
    PwmAndStimMapping,
    PwmChannels,
    StimChannels,
    AcquisitionMode,
    TriggerSource,
    EnableFlag,
    ExpansionBoard,
    EncoderSampleRate,
    /// `(dx, dy)` displacement pair.
    OpticalFlow,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Number => "Number",
            ValueKind::AuxiliaryInputs => "AuxiliaryInputs",
            ValueKind::DigitalOutputs => "DigitalOutputs",
            ValueKind::PwmAndStimMapping => "PwmAndStimMapping",
            ValueKind::PwmChannels => "PwmChannels",
            ValueKind::StimChannels => "StimChannels",
            ValueKind::AcquisitionMode => "AcquisitionMode",
            ValueKind::TriggerSource => "TriggerSource",
            ValueKind::EnableFlag => "EnableFlag",
            ValueKind::ExpansionBoard => "ExpansionBoard",
            ValueKind::EncoderSampleRate => "EncoderSampleRate",
            ValueKind::OpticalFlow => "OpticalFlow",
        }
    }

    /// Label combining kind and wire type, e.g. `DigitalOutputs (UInt16)`.
    pub fn label(self, wire_type: WireType) -> String {
        match self {
            ValueKind::Number => wire_type.name().to_string(),
            kind => format!("{} ({})", kind.name(), wire_type),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static description of one device register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterDescriptor {
    pub name: &'static str,
    pub address: u8,
    pub wire_type: WireType,
    pub access: AccessMode,
    pub kind: ValueKind,
}

impl RegisterDescriptor {
    pub const fn new(
        name: &'static str,
        address: u8,
        wire_type: WireType,
        access: AccessMode,
        kind: ValueKind,
    ) -> Self {
        Self {
            name,
            address,
            wire_type,
            access,
            kind,
        }
    }

    pub fn type_label(&self) -> String {
        self.kind.label(self.wire_type)
    }

    pub fn ensure_readable(&self) -> Result<()> {
        self.ensure(self.access.is_readable(), "read")
    }

    pub fn ensure_writable(&self) -> Result<()> {
        self.ensure(self.access.is_writable(), "write")
    }

    /// Timestamped reads are limited to event-capable registers.
    pub fn ensure_timestamped(&self) -> Result<()> {
        self.ensure(
            self.access.is_readable() && self.access.is_event(),
            "timestamped read",
        )
    }

    fn ensure(&self, allowed: bool, operation: &'static str) -> Result<()> {
        if allowed {
            Ok(())
        } else {
            Err(RegisterError::AccessDenied {
                register: self.name,
                operation,
                access: self.access,
            })
        }
    }
}

/// A family of registers repeated once per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterBlock {
    /// Name prefix, e.g. `Pwm` for `Pwm0Frequency`.
    pub family: &'static str,
    /// Address of field 0 of channel 0.
    pub base: u8,
    pub stride: u8,
    pub channels: u8,
}

impl RegisterBlock {
    /// Address of `field` in the block of `channel`.
    pub fn address(&self, channel: u8, field: u8) -> Result<u8> {
        if channel >= self.channels || field >= self.stride {
            return Err(RegisterError::UnknownRegister(format!(
                "{}{} (field {})",
                self.family, channel, field
            )));
        }
        Ok(self.base + channel * self.stride + field)
    }

    /// Descriptor of `field` in the block of `channel`, from the built-in map.
    pub fn descriptor(&self, channel: u8, field: u8) -> Result<&'static RegisterDescriptor> {
        RegisterMap::output_expander().by_address(self.address(channel, field)?)
    }
}

/// PWM generators: eight registers per channel.
pub const PWM: RegisterBlock = RegisterBlock {
    family: "Pwm",
    base: 42,
    stride: 8,
    channels: 3,
};

/// Stimulation generators: five registers per channel.
pub const STIM: RegisterBlock = RegisterBlock {
    family: "Stim",
    base: 69,
    stride: 5,
    channels: 1,
};

pub const OUTPUT_PULSE_WIDTH: RegisterBlock = RegisterBlock {
    family: "Out",
    base: 77,
    stride: 1,
    channels: 10,
};

pub const SERVO_PULSE_WIDTH: RegisterBlock = RegisterBlock {
    family: "Servo",
    base: 91,
    stride: 1,
    channels: 3,
};

/// Field offsets inside a [`PWM`](super::PWM) block.
pub mod pwm {
    pub const FREQUENCY: u8 = 0;
    pub const DUTY_CYCLE: u8 = 1;
    pub const PULSE_COUNT: u8 = 2;
    pub const REAL_FREQUENCY: u8 = 3;
    pub const REAL_DUTY_CYCLE: u8 = 4;
    pub const ACQUISITION_MODE: u8 = 5;
    pub const TRIGGER_SOURCE: u8 = 6;
    pub const EVENT_CONFIG: u8 = 7;
}

/// Field offsets inside a [`STIM`](super::STIM) block.
pub mod stim {
    pub const PULSE_ON_TIME: u8 = 0;
    pub const PULSE_OFF_TIME: u8 = 1;
    pub const PULSE_COUNT: u8 = 2;
    pub const ACQUISITION_MODE: u8 = 3;
    pub const TRIGGER_SOURCE: u8 = 4;
}

/// Names of the fixed (non-block) registers.
pub mod names {
    pub const WHO_AM_I: &str = "WhoAmI";
    pub const HARDWARE_VERSION_HIGH: &str = "HardwareVersionHigh";
    pub const HARDWARE_VERSION_LOW: &str = "HardwareVersionLow";
    pub const ASSEMBLY_VERSION: &str = "AssemblyVersion";
    pub const CORE_VERSION_HIGH: &str = "CoreVersionHigh";
    pub const CORE_VERSION_LOW: &str = "CoreVersionLow";
    pub const FIRMWARE_VERSION_HIGH: &str = "FirmwareVersionHigh";
    pub const FIRMWARE_VERSION_LOW: &str = "FirmwareVersionLow";
    pub const AUX_IN_STATE: &str = "AuxInState";
    pub const AUX_IN_RISING_EDGE: &str = "AuxInRisingEdge";
    pub const AUX_IN_FALLING_EDGE: &str = "AuxInFallingEdge";
    pub const OUTPUT_SET: &str = "OutputSet";
    pub const OUTPUT_CLEAR: &str = "OutputClear";
    pub const OUTPUT_TOGGLE: &str = "OutputToggle";
    pub const OUTPUT_STATE: &str = "OutputState";
    pub const PWM_AND_STIM_ENABLE: &str = "PwmAndStimEnable";
    pub const PWM_AND_STIM_DISABLE: &str = "PwmAndStimDisable";
    pub const PWM_AND_STIM_WRITE: &str = "PwmAndStimWrite";
    pub const PWM_START: &str = "PwmStart";
    pub const PWM_STOP: &str = "PwmStop";
    pub const PWM_RISE_EVENT: &str = "PwmRiseEvent";
    pub const STIM_START: &str = "StimStart";
    pub const STIM_STOP: &str = "StimStop";
    pub const OUTPUT_PULSE: &str = "OutputPulse";
    pub const EXPANSION_BOARD: &str = "ExpansionBoard";
    pub const MAGNETIC_ENCODER: &str = "MagneticEncoder";
    pub const MAGNETIC_ENCODER_SAMPLE_RATE: &str = "MagneticEncoderSampleRate";
    pub const SERVO_PERIOD: &str = "ServoPeriod";
    pub const OPTICAL_FLOW: &str = "OpticalFlow";
}

/// Immutable name/address index over a validated descriptor table.
#[derive(Debug)]
pub struct RegisterMap {
    by_address: BTreeMap<u8, RegisterDescriptor>,
    by_name: HashMap<&'static str, u8>,
}

impl RegisterMap {
    /// Build a map, rejecting address collisions and duplicate names.
    pub fn new(descriptors: impl IntoIterator<Item = RegisterDescriptor>) -> Result<Self> {
        let mut by_address: BTreeMap<u8, RegisterDescriptor> = BTreeMap::new();
        let mut by_name = HashMap::new();
        for descriptor in descriptors {
            if let Some(existing) = by_address.get(&descriptor.address) {
                return Err(RegisterError::AddressCollision {
                    address: descriptor.address,
                    first: existing.name,
                    second: descriptor.name,
                });
            }
            if by_name.insert(descriptor.name, descriptor.address).is_some() {
                return Err(RegisterError::DuplicateName(descriptor.name));
            }
            by_address.insert(descriptor.address, descriptor);
        }
        Ok(Self {
            by_address,
            by_name,
        })
    }

    /// The built-in Output Expander map, validated on first use.
    ///
    /// # Panics
    ///
    /// Panics if the built-in table is inconsistent.
    pub fn output_expander() -> &'static RegisterMap {
        static MAP: OnceLock<RegisterMap> = OnceLock::new();
        MAP.get_or_init(|| match RegisterMap::new(output_expander_table()) {
            Ok(map) => map,
            Err(err) => panic!("built-in register table is invalid: {err}"),
        })
    }

    pub fn resolve(&self, name: &str) -> Result<&RegisterDescriptor> {
        self.by_name
            .get(name)
            .and_then(|address| self.by_address.get(address))
            .ok_or_else(|| RegisterError::UnknownRegister(name.to_string()))
    }

    pub fn by_address(&self, address: u8) -> Result<&RegisterDescriptor> {
        self.by_address
            .get(&address)
            .ok_or(RegisterError::UnknownAddress(address))
    }

    /// Descriptors in address order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisterDescriptor> {
        self.by_address.values()
    }

    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }
}

macro_rules! reg {
    ($name:expr, $address:expr, $wire:ident, $access:ident, $kind:ident) => {
        RegisterDescriptor::new(
            $name,
            $address,
            WireType::$wire,
            AccessMode::$access,
            ValueKind::$kind,
        )
    };
}

macro_rules! pwm_block {
    ($ch:literal) => {{
        let base = PWM.base + $ch * PWM.stride;
        [
            reg!(concat!("Pwm", $ch, "Frequency"), base + pwm::FREQUENCY, Single, READ_WRITE, Number),
            reg!(concat!("Pwm", $ch, "DutyCycle"), base + pwm::DUTY_CYCLE, Single, READ_WRITE, Number),
            reg!(concat!("Pwm", $ch, "PulseCount"), base + pwm::PULSE_COUNT, UInt16, READ_WRITE, Number),
            reg!(concat!("Pwm", $ch, "RealFrequency"), base + pwm::REAL_FREQUENCY, Single, READ_ONLY, Number),
            reg!(concat!("Pwm", $ch, "RealDutyCycle"), base + pwm::REAL_DUTY_CYCLE, Single, READ_ONLY, Number),
            reg!(concat!("Pwm", $ch, "AcquisitionMode"), base + pwm::ACQUISITION_MODE, Byte, READ_WRITE, AcquisitionMode),
            reg!(concat!("Pwm", $ch, "TriggerSource"), base + pwm::TRIGGER_SOURCE, Byte, READ_WRITE, TriggerSource),
            reg!(concat!("Pwm", $ch, "EventConfig"), base + pwm::EVENT_CONFIG, Byte, READ_WRITE, EnableFlag),
        ]
    }};
}

macro_rules! stim_block {
    ($ch:literal) => {{
        let base = STIM.base + $ch * STIM.stride;
        [
            reg!(concat!("Stim", $ch, "PulseOnTime"), base + stim::PULSE_ON_TIME, UInt16, READ_WRITE, Number),
            reg!(concat!("Stim", $ch, "PulseOffTime"), base + stim::PULSE_OFF_TIME, UInt16, READ_WRITE, Number),
            reg!(concat!("Stim", $ch, "PulseCount"), base + stim::PULSE_COUNT, UInt16, READ_WRITE, Number),
            reg!(concat!("Stim", $ch, "AcquisitionMode"), base + stim::ACQUISITION_MODE, Byte, READ_WRITE, AcquisitionMode),
            reg!(concat!("Stim", $ch, "TriggerSource"), base + stim::TRIGGER_SOURCE, Byte, READ_WRITE, TriggerSource),
        ]
    }};
}

macro_rules! per_channel {
    ($block:ident, $prefix:literal, $suffix:literal, [$($ch:literal),+]) => {
        [$(reg!(concat!($prefix, $ch, $suffix), $block.base + $ch, UInt16, READ_WRITE, Number)),+]
    };
}

fn output_expander_table() -> Vec<RegisterDescriptor> {
    use names::*;

    let mut table = vec![
        reg!(WHO_AM_I, 0, UInt16, READ_ONLY, Number),
        reg!(HARDWARE_VERSION_HIGH, 1, Byte, READ_ONLY, Number),
        reg!(HARDWARE_VERSION_LOW, 2, Byte, READ_ONLY, Number),
        reg!(ASSEMBLY_VERSION, 3, Byte, READ_ONLY, Number),
        reg!(CORE_VERSION_HIGH, 4, Byte, READ_ONLY, Number),
        reg!(CORE_VERSION_LOW, 5, Byte, READ_ONLY, Number),
        reg!(FIRMWARE_VERSION_HIGH, 6, Byte, READ_ONLY, Number),
        reg!(FIRMWARE_VERSION_LOW, 7, Byte, READ_ONLY, Number),
        reg!(AUX_IN_STATE, 32, Byte, READ_EVENT, AuxiliaryInputs),
        reg!(AUX_IN_RISING_EDGE, 33, Byte, READ_WRITE, AuxiliaryInputs),
        reg!(AUX_IN_FALLING_EDGE, 34, Byte, READ_WRITE, AuxiliaryInputs),
        reg!(OUTPUT_SET, 35, UInt16, READ_WRITE, DigitalOutputs),
        reg!(OUTPUT_CLEAR, 36, UInt16, READ_WRITE, DigitalOutputs),
        reg!(OUTPUT_TOGGLE, 37, UInt16, READ_WRITE, DigitalOutputs),
        reg!(OUTPUT_STATE, 38, UInt16, READ_WRITE_EVENT, DigitalOutputs),
        reg!(PWM_AND_STIM_ENABLE, 39, UInt16, READ_WRITE, PwmAndStimMapping),
        reg!(PWM_AND_STIM_DISABLE, 40, UInt16, READ_WRITE, PwmAndStimMapping),
        reg!(PWM_AND_STIM_WRITE, 41, UInt16, READ_WRITE, PwmAndStimMapping),
        reg!(PWM_START, 66, Byte, READ_WRITE, PwmChannels),
        reg!(PWM_STOP, 67, Byte, READ_WRITE, PwmChannels),
        reg!(PWM_RISE_EVENT, 68, Byte, READ_WRITE_EVENT, PwmChannels),
        reg!(STIM_START, 74, Byte, READ_WRITE, StimChannels),
        reg!(STIM_STOP, 75, Byte, READ_WRITE_EVENT, StimChannels),
        reg!(OUTPUT_PULSE, 76, UInt16, READ_WRITE, DigitalOutputs),
        reg!(EXPANSION_BOARD, 87, Byte, READ_WRITE, ExpansionBoard),
        reg!(MAGNETIC_ENCODER, 88, UInt16, READ_EVENT, Number),
        reg!(MAGNETIC_ENCODER_SAMPLE_RATE, 89, Byte, READ_WRITE, EncoderSampleRate),
        reg!(SERVO_PERIOD, 90, UInt16, READ_WRITE, Number),
        reg!(OPTICAL_FLOW, 94, Int16Pair, READ_EVENT, OpticalFlow),
    ];
    table.extend(pwm_block!(0));
    table.extend(pwm_block!(1));
    table.extend(pwm_block!(2));
    table.extend(stim_block!(0));
    table.extend(per_channel!(
        OUTPUT_PULSE_WIDTH,
        "Out",
        "PulseWidth",
        [0, 1, 2, 3, 4, 5, 6, 7, 8, 9]
    ));
    table.extend(per_channel!(SERVO_PULSE_WIDTH, "Servo", "PulseWidth", [0, 1, 2]));
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> &'static RegisterMap {
        RegisterMap::output_expander()
    }

    #[test]
    fn builtin_table_is_consistent() {
        assert_eq!(map().len(), 8 + 3 + 4 + 3 + 24 + 3 + 5 + 2 + 1 + 10 + 1 + 1 + 1 + 1 + 3 + 1);
        let addresses: Vec<u8> = map().iter().map(|d| d.address).collect();
        let mut sorted = addresses.clone();
        sorted.sort_unstable();
        assert_eq!(addresses, sorted);
    }

    #[test]
    fn resolve_fixed_registers() {
        let who = map().resolve(names::WHO_AM_I).unwrap();
        assert_eq!(who.address, 0);
        assert_eq!(who.wire_type, WireType::UInt16);

        let optical = map().resolve("OpticalFlow").unwrap();
        assert_eq!(optical.address, 94);
        assert_eq!(optical.wire_type, WireType::Int16Pair);
        assert_eq!(optical.kind, ValueKind::OpticalFlow);
    }

    #[test]
    fn resolve_block_registers() {
        assert_eq!(map().resolve("Pwm0Frequency").unwrap().address, 42);
        assert_eq!(map().resolve("Pwm1Frequency").unwrap().address, 50);
        assert_eq!(map().resolve("Pwm2EventConfig").unwrap().address, 65);
        assert_eq!(map().resolve("Stim0TriggerSource").unwrap().address, 73);
        assert_eq!(map().resolve("Out9PulseWidth").unwrap().address, 86);
        assert_eq!(map().resolve("Servo2PulseWidth").unwrap().address, 93);
    }

    #[test]
    fn unknown_register() {
        let err = map().resolve("Pwm3Frequency").unwrap_err();
        assert!(matches!(err, RegisterError::UnknownRegister(ref name) if name == "Pwm3Frequency"));
        assert!(matches!(
            map().by_address(200),
            Err(RegisterError::UnknownAddress(200))
        ));
    }

    #[test]
    fn block_arithmetic() {
        assert_eq!(PWM.address(0, pwm::FREQUENCY).unwrap(), 42);
        assert_eq!(PWM.address(2, pwm::FREQUENCY).unwrap(), 58);
        assert_eq!(PWM.address(1, pwm::TRIGGER_SOURCE).unwrap(), 56);
        assert_eq!(STIM.address(0, stim::PULSE_COUNT).unwrap(), 71);
        assert_eq!(OUTPUT_PULSE_WIDTH.address(3, 0).unwrap(), 80);
        assert!(PWM.address(3, pwm::FREQUENCY).is_err());
        assert!(PWM.address(0, 8).is_err());
        assert!(SERVO_PULSE_WIDTH.address(3, 0).is_err());
    }

    #[test]
    fn block_descriptor_matches_name() {
        let descriptor = PWM.descriptor(1, pwm::DUTY_CYCLE).unwrap();
        assert_eq!(descriptor.name, "Pwm1DutyCycle");
        assert_eq!(descriptor.wire_type, WireType::Single);
    }

    #[test]
    fn collision_is_rejected() {
        let err = RegisterMap::new([
            reg!("A", 10, Byte, READ_ONLY, Number),
            reg!("B", 10, Byte, READ_ONLY, Number),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            RegisterError::AddressCollision {
                address: 10,
                first: "A",
                second: "B"
            }
        ));
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let err = RegisterMap::new([
            reg!("A", 10, Byte, READ_ONLY, Number),
            reg!("A", 11, Byte, READ_ONLY, Number),
        ])
        .unwrap_err();
        assert!(matches!(err, RegisterError::DuplicateName("A")));
    }

    #[test]
    fn access_checks() {
        let who = map().resolve(names::WHO_AM_I).unwrap();
        assert!(who.ensure_readable().is_ok());
        assert!(matches!(
            who.ensure_writable(),
            Err(RegisterError::AccessDenied { operation: "write", .. })
        ));
        assert!(who.ensure_timestamped().is_err());
        assert!(map().resolve("MagneticEncoder").unwrap().ensure_timestamped().is_ok());
    }

    #[test]
    fn kind_labels() {
        let state = map().resolve(names::OUTPUT_STATE).unwrap();
        assert_eq!(state.type_label(), "DigitalOutputs (UInt16)");
        assert_eq!(map().resolve("Pwm0Frequency").unwrap().type_label(), "Single");
        for name in [
            names::PWM_AND_STIM_ENABLE,
            names::PWM_AND_STIM_DISABLE,
            names::PWM_AND_STIM_WRITE,
        ] {
            let routing = map().resolve(name).unwrap();
            assert_eq!(routing.kind, ValueKind::PwmAndStimMapping);
            assert_eq!(routing.type_label(), "PwmAndStimMapping (UInt16)");
        }
    }
}
