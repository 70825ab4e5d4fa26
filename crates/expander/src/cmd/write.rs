use expander_registers::{
    AcquisitionMode, AuxiliaryInputs, DigitalOutputs, EnableFlag, EncoderSampleRate,
    ExpansionBoardType, PwmAndStimMapping, PwmChannels, RegisterDescriptor, RegisterValue,
    StimChannels, TriggerSource, ValueKind, WireType,
};

use crate::cmd::{resolve, runtime, WriteArgs};
use crate::exit::{device_error, register_error, CliError, CliResult, SUCCESS};
use crate::output::{print_value, OutputFormat};

pub fn run(args: WriteArgs, format: OutputFormat) -> CliResult<i32> {
    let descriptor = resolve(&args.register)?;
    descriptor
        .ensure_writable()
        .map_err(|err| register_error("invalid write", err))?;
    let value = parse_value(descriptor, &args.value)?;

    runtime()?.block_on(async {
        let (device, _) = args.connect.connect().await?;
        let result = device.write_value(descriptor, value, None).await;
        device.close().await;
        result.map_err(|err| device_error("write failed", err))
    })?;

    print_value(descriptor, value, None, format);
    Ok(SUCCESS)
}

/// Parse `text` for `descriptor`: a plain number first, then the
/// register's enum or flag names.
pub fn parse_value(descriptor: &RegisterDescriptor, text: &str) -> CliResult<RegisterValue> {
    if let Some(value) = RegisterValue::parse(descriptor.wire_type, text) {
        return Ok(value);
    }

    let raw = match descriptor.kind {
        ValueKind::AcquisitionMode => AcquisitionMode::from_name(text).map(|v| u16::from(v.raw())),
        ValueKind::TriggerSource => TriggerSource::from_name(text).map(|v| u16::from(v.raw())),
        ValueKind::EnableFlag => EnableFlag::from_name(text).map(|v| u16::from(v.raw())),
        ValueKind::ExpansionBoard => {
            ExpansionBoardType::from_name(text).map(|v| u16::from(v.raw()))
        }
        ValueKind::EncoderSampleRate => {
            EncoderSampleRate::from_name(text).map(|v| u16::from(v.raw()))
        }
        ValueKind::AuxiliaryInputs => parse_flags(text, |label| {
            AuxiliaryInputs::from_label(label).map(|f| u16::from(f.bits()))
        }),
        ValueKind::DigitalOutputs => {
            parse_flags(text, |label| DigitalOutputs::from_label(label).map(|f| f.bits()))
        }
        ValueKind::PwmAndStimMapping => parse_flags(text, |label| {
            PwmAndStimMapping::from_label(label).map(|f| f.bits())
        }),
        ValueKind::PwmChannels => parse_flags(text, |label| {
            PwmChannels::from_label(label).map(|f| u16::from(f.bits()))
        }),
        ValueKind::StimChannels => parse_flags(text, |label| {
            StimChannels::from_label(label).map(|f| u16::from(f.bits()))
        }),
        ValueKind::Number | ValueKind::OpticalFlow => None,
    };

    let value = raw.and_then(|raw| match descriptor.wire_type {
        WireType::Byte => u8::try_from(raw).ok().map(RegisterValue::Byte),
        WireType::UInt16 => Some(RegisterValue::UInt16(raw)),
        _ => None,
    });
    value.ok_or_else(|| {
        CliError::usage(format!(
            "invalid value '{text}' for {} ({})",
            descriptor.name,
            descriptor.type_label()
        ))
    })
}

/// `Out0|Out3`, `Out0,Out3` or `None`; labels are case-insensitive.
fn parse_flags(text: &str, bit: impl Fn(&str) -> Option<u16>) -> Option<u16> {
    if text.trim().eq_ignore_ascii_case("none") {
        return Some(0);
    }
    text.split(['|', ','])
        .map(str::trim)
        .try_fold(0u16, |acc, token| bit(token).map(|bits| acc | bits))
}
