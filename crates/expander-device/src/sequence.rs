//! Multi-register configuration sequences.
//!
//! Each function is pure: it validates its arguments and returns a fresh,
//! ordered list of writes. Nothing touches the device until the list is
//! passed to [`Device::apply`](crate::Device::apply).

use expander_registers::map::{pwm, stim};
use expander_registers::{
    check_kind, names, AcquisitionMode, EnableFlag, EncoderSampleRate, ExpansionBoardType,
    PwmChannels, RegisterDescriptor, RegisterMap, RegisterPayload, RegisterValue, StimChannels,
    TriggerSource, PWM, STIM,
};

use crate::error::{ExpanderError, Result};

/// Highest PWM frequency the firmware accepts, in Hz.
pub const MAX_PWM_FREQUENCY: f32 = 1000.0;

/// One register write in a configuration sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegisterWrite {
    pub descriptor: &'static RegisterDescriptor,
    pub value: RegisterValue,
}

impl RegisterWrite {
    /// Typed write, checked against the register's kind.
    pub fn new<T: RegisterPayload>(descriptor: &'static RegisterDescriptor, value: T) -> Result<Self> {
        check_kind::<T>(descriptor)?;
        Ok(Self {
            descriptor,
            value: value.into_value(),
        })
    }

    pub fn named<T: RegisterPayload>(name: &str, value: T) -> Result<Self> {
        Self::new(RegisterMap::output_expander().resolve(name)?, value)
    }
}

/// Parameters for [`configure_pwm`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PwmSettings {
    pub channels: PwmChannels,
    /// Hz, `0 < f <= 1000`.
    pub frequency: f32,
    /// Percent, `0 <= d <= 100`.
    pub duty_cycle: f32,
    /// Pulses to emit; 0 runs continuously.
    pub pulse_count: u16,
}

/// Writes configuring every channel in `settings.channels`, ascending.
///
/// Per channel: frequency, duty cycle, then either pulse count and finite
/// mode or continuous mode, then software trigger and event reporting.
pub fn configure_pwm(settings: &PwmSettings) -> Result<Vec<RegisterWrite>> {
    let PwmSettings {
        channels,
        frequency,
        duty_cycle,
        pulse_count,
    } = *settings;

    if !(frequency > 0.0 && frequency <= MAX_PWM_FREQUENCY) {
        return Err(ExpanderError::invalid(
            "frequency",
            format!("{frequency} Hz is outside (0, {MAX_PWM_FREQUENCY}]"),
        ));
    }
    if !(0.0..=100.0).contains(&duty_cycle) {
        return Err(ExpanderError::invalid(
            "duty_cycle",
            format!("{duty_cycle}% is outside [0, 100]"),
        ));
    }

    let per_channel = if pulse_count > 0 { 6 } else { 5 };
    let mut writes = Vec::with_capacity(channels.bits().count_ones() as usize * per_channel);
    for channel in channels.indices() {
        let field = |offset| PWM.descriptor(channel, offset);

        writes.push(RegisterWrite::new(field(pwm::FREQUENCY)?, frequency)?);
        writes.push(RegisterWrite::new(field(pwm::DUTY_CYCLE)?, duty_cycle)?);
        if pulse_count > 0 {
            writes.push(RegisterWrite::new(field(pwm::PULSE_COUNT)?, pulse_count)?);
            writes.push(RegisterWrite::new(
                field(pwm::ACQUISITION_MODE)?,
                AcquisitionMode::Finite,
            )?);
        } else {
            writes.push(RegisterWrite::new(
                field(pwm::ACQUISITION_MODE)?,
                AcquisitionMode::Continuous,
            )?);
        }
        writes.push(RegisterWrite::new(
            field(pwm::TRIGGER_SOURCE)?,
            TriggerSource::Software,
        )?);
        writes.push(RegisterWrite::new(field(pwm::EVENT_CONFIG)?, EnableFlag::Enabled)?);
    }
    Ok(writes)
}

/// Select the magnetic encoder expansion board and set its sample rate.
pub fn configure_magnetic_encoder(rate: EncoderSampleRate) -> Result<Vec<RegisterWrite>> {
    Ok(vec![
        RegisterWrite::named(names::EXPANSION_BOARD, ExpansionBoardType::MagneticEncoder)?,
        RegisterWrite::named(names::MAGNETIC_ENCODER_SAMPLE_RATE, rate)?,
    ])
}

/// Parameters for [`configure_stim`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StimSettings {
    pub channels: StimChannels,
    /// Milliseconds high per pulse.
    pub on_time: u16,
    /// Milliseconds low per pulse.
    pub off_time: u16,
    /// Pulses to emit; 0 runs continuously.
    pub pulse_count: u16,
}

/// Writes configuring every stimulation channel in `settings.channels`.
pub fn configure_stim(settings: &StimSettings) -> Result<Vec<RegisterWrite>> {
    let mut writes = Vec::new();
    for channel in settings.channels.indices() {
        let field = |offset| STIM.descriptor(channel, offset);

        writes.push(RegisterWrite::new(field(stim::PULSE_ON_TIME)?, settings.on_time)?);
        writes.push(RegisterWrite::new(field(stim::PULSE_OFF_TIME)?, settings.off_time)?);
        if settings.pulse_count > 0 {
            writes.push(RegisterWrite::new(field(stim::PULSE_COUNT)?, settings.pulse_count)?);
            writes.push(RegisterWrite::new(
                field(stim::ACQUISITION_MODE)?,
                AcquisitionMode::Finite,
            )?);
        } else {
            writes.push(RegisterWrite::new(
                field(stim::ACQUISITION_MODE)?,
                AcquisitionMode::Continuous,
            )?);
        }
        writes.push(RegisterWrite::new(
            field(stim::TRIGGER_SOURCE)?,
            TriggerSource::Software,
        )?);
    }
    Ok(writes)
}

#[cfg(test)]
mod tests {
    use expander_registers::RegisterError;

    use super::*;

    fn pwm(channels: PwmChannels, pulse_count: u16) -> PwmSettings {
        PwmSettings {
            channels,
            frequency: 50.0,
            duty_cycle: 25.0,
            pulse_count,
        }
    }

    fn summary(writes: &[RegisterWrite]) -> Vec<(u8, RegisterValue)> {
        writes.iter().map(|w| (w.descriptor.address, w.value)).collect()
    }

    #[test]
    fn two_channels_continuous() {
        let writes = configure_pwm(&pwm(PwmChannels::PWM0 | PwmChannels::PWM2, 0)).unwrap();
        assert_eq!(
            summary(&writes),
            vec![
                (42, RegisterValue::Single(50.0)),
                (43, RegisterValue::Single(25.0)),
                (47, RegisterValue::Byte(0)),
                (48, RegisterValue::Byte(0)),
                (49, RegisterValue::Byte(1)),
                (58, RegisterValue::Single(50.0)),
                (59, RegisterValue::Single(25.0)),
                (63, RegisterValue::Byte(0)),
                (64, RegisterValue::Byte(0)),
                (65, RegisterValue::Byte(1)),
            ]
        );
    }

    #[test]
    fn every_mask_configures_channels_in_ascending_order() {
        for bits in 1..=0b111u8 {
            let channels = PwmChannels::from_bits_retain(bits);
            let writes = configure_pwm(&pwm(channels, 0)).unwrap();
            assert_eq!(writes.len(), 5 * bits.count_ones() as usize);

            let bases: Vec<u8> = writes
                .chunks(5)
                .map(|block| block[0].descriptor.address)
                .collect();
            let expected: Vec<u8> = channels
                .indices()
                .map(|channel| PWM.address(channel, pwm::FREQUENCY).unwrap())
                .collect();
            assert_eq!(bases, expected, "mask {bits:#05b}");
            assert!(bases.windows(2).all(|pair| pair[0] < pair[1]), "mask {bits:#05b}");
        }
    }

    #[test]
    fn finite_adds_pulse_count() {
        let writes = configure_pwm(&pwm(PwmChannels::PWM1, 10)).unwrap();
        let names: Vec<_> = writes.iter().map(|w| w.descriptor.name).collect();
        assert_eq!(
            names,
            vec![
                "Pwm1Frequency",
                "Pwm1DutyCycle",
                "Pwm1PulseCount",
                "Pwm1AcquisitionMode",
                "Pwm1TriggerSource",
                "Pwm1EventConfig",
            ]
        );
        assert_eq!(writes[2].value, RegisterValue::UInt16(10));
        assert_eq!(writes[3].value, RegisterValue::Byte(1));
    }

    #[test]
    fn writes_per_channel() {
        assert_eq!(configure_pwm(&pwm(PwmChannels::all(), 0)).unwrap().len(), 15);
        assert_eq!(configure_pwm(&pwm(PwmChannels::all(), 3)).unwrap().len(), 18);
        assert!(configure_pwm(&pwm(PwmChannels::empty(), 3)).unwrap().is_empty());
    }

    #[test]
    fn each_call_returns_fresh_list() {
        let settings = pwm(PwmChannels::PWM0, 0);
        let mut first = configure_pwm(&settings).unwrap();
        first.clear();
        assert_eq!(configure_pwm(&settings).unwrap().len(), 5);
    }

    #[test]
    fn pwm_parameter_ranges() {
        for frequency in [0.0, -1.0, 1000.5, f32::NAN] {
            let settings = PwmSettings {
                frequency,
                ..pwm(PwmChannels::PWM0, 0)
            };
            assert!(matches!(
                configure_pwm(&settings),
                Err(ExpanderError::InvalidParameter { name: "frequency", .. })
            ));
        }
        for duty_cycle in [-0.1, 100.1] {
            let settings = PwmSettings {
                duty_cycle,
                ..pwm(PwmChannels::PWM0, 0)
            };
            assert!(matches!(
                configure_pwm(&settings),
                Err(ExpanderError::InvalidParameter { name: "duty_cycle", .. })
            ));
        }
        let edge = PwmSettings {
            frequency: 1000.0,
            duty_cycle: 100.0,
            ..pwm(PwmChannels::PWM0, 0)
        };
        assert!(configure_pwm(&edge).is_ok());
    }

    #[test]
    fn unnamed_channel_bit_is_rejected() {
        let settings = pwm(PwmChannels::from_bits_retain(0b1000), 0);
        assert!(matches!(
            configure_pwm(&settings),
            Err(ExpanderError::Register(RegisterError::UnknownRegister(_)))
        ));
    }

    #[test]
    fn magnetic_encoder_sequence() {
        let writes = configure_magnetic_encoder(EncoderSampleRate::Rate500Hz).unwrap();
        assert_eq!(
            summary(&writes),
            vec![(87, RegisterValue::Byte(2)), (89, RegisterValue::Byte(4))]
        );
    }

    #[test]
    fn stim_sequence() {
        let settings = StimSettings {
            channels: StimChannels::STIM0,
            on_time: 5,
            off_time: 15,
            pulse_count: 0,
        };
        let writes = configure_stim(&settings).unwrap();
        assert_eq!(
            summary(&writes),
            vec![
                (69, RegisterValue::UInt16(5)),
                (70, RegisterValue::UInt16(15)),
                (72, RegisterValue::Byte(0)),
                (73, RegisterValue::Byte(0)),
            ]
        );

        let finite = configure_stim(&StimSettings {
            pulse_count: 4,
            ..settings
        })
        .unwrap();
        assert_eq!(finite.len(), 5);
        assert_eq!(finite[2].value, RegisterValue::UInt16(4));
    }
}
