use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use expander_device::{DeviceInfo, RegisterWrite};
use expander_registers::{
    AcquisitionMode, AuxiliaryInputs, DigitalOutputs, EnableFlag, EncoderSampleRate,
    ExpansionBoardType, PwmAndStimMapping, PwmChannels, RegisterDescriptor, RegisterValue,
    StimChannels, TriggerSource, ValueKind,
};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Human rendering of a register value: flag and enum names where the
/// register has them, the plain number otherwise.
pub fn describe(descriptor: &RegisterDescriptor, value: RegisterValue) -> String {
    match (descriptor.kind, value) {
        (ValueKind::AuxiliaryInputs, RegisterValue::Byte(bits)) => {
            AuxiliaryInputs::from_bits_retain(bits).to_string()
        }
        (ValueKind::DigitalOutputs, RegisterValue::UInt16(bits)) => {
            DigitalOutputs::from_bits_retain(bits).to_string()
        }
        (ValueKind::PwmAndStimMapping, RegisterValue::UInt16(bits)) => {
            PwmAndStimMapping::from_bits_retain(bits).to_string()
        }
        (ValueKind::PwmChannels, RegisterValue::Byte(bits)) => {
            PwmChannels::from_bits_retain(bits).to_string()
        }
        (ValueKind::StimChannels, RegisterValue::Byte(bits)) => {
            StimChannels::from_bits_retain(bits).to_string()
        }
        (ValueKind::AcquisitionMode, RegisterValue::Byte(raw)) => {
            enum_name(AcquisitionMode::from_raw(raw).map(AcquisitionMode::name), raw)
        }
        (ValueKind::TriggerSource, RegisterValue::Byte(raw)) => {
            enum_name(TriggerSource::from_raw(raw).map(TriggerSource::name), raw)
        }
        (ValueKind::EnableFlag, RegisterValue::Byte(raw)) => {
            enum_name(EnableFlag::from_raw(raw).map(EnableFlag::name), raw)
        }
        (ValueKind::ExpansionBoard, RegisterValue::Byte(raw)) => {
            enum_name(ExpansionBoardType::from_raw(raw).map(ExpansionBoardType::name), raw)
        }
        (ValueKind::EncoderSampleRate, RegisterValue::Byte(raw)) => {
            enum_name(EncoderSampleRate::from_raw(raw).map(EncoderSampleRate::name), raw)
        }
        (ValueKind::OpticalFlow, RegisterValue::Int16Pair(dx, dy)) => format!("dx={dx} dy={dy}"),
        _ => value.to_string(),
    }
}

fn enum_name(name: Option<&'static str>, raw: u8) -> String {
    match name {
        Some(name) => name.to_string(),
        None => format!("{raw} (unknown)"),
    }
}

fn json_value(value: RegisterValue) -> serde_json::Value {
    match value {
        RegisterValue::Byte(v) => v.into(),
        RegisterValue::UInt16(v) => v.into(),
        RegisterValue::Int16(v) => v.into(),
        RegisterValue::Single(v) => serde_json::Number::from_f64(f64::from(v))
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        RegisterValue::Int16Pair(dx, dy) => serde_json::json!([dx, dy]),
    }
}

fn print_json<T: Serialize>(out: &T) {
    println!(
        "{}",
        serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
    );
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

#[derive(Serialize)]
struct ValueOutput<'a> {
    register: &'a str,
    address: u8,
    #[serde(rename = "type")]
    type_label: String,
    value: serde_json::Value,
    display: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<f64>,
}

impl<'a> ValueOutput<'a> {
    fn new(descriptor: &'a RegisterDescriptor, value: RegisterValue, timestamp: Option<f64>) -> Self {
        Self {
            register: descriptor.name,
            address: descriptor.address,
            type_label: descriptor.type_label(),
            value: json_value(value),
            display: describe(descriptor, value),
            timestamp,
        }
    }
}

pub fn print_value(
    descriptor: &RegisterDescriptor,
    value: RegisterValue,
    timestamp: Option<f64>,
    format: OutputFormat,
) {
    let out = ValueOutput::new(descriptor, value, timestamp);
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut table = new_table(vec!["REGISTER", "ADDRESS", "TYPE", "VALUE", "TIMESTAMP"]);
            table.add_row(vec![
                out.register.to_string(),
                out.address.to_string(),
                out.type_label.clone(),
                out.display.clone(),
                timestamp.map(|s| format!("{s:.6}")).unwrap_or_default(),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => match timestamp {
            Some(seconds) => println!("{} = {} @ {seconds:.6}s", out.register, out.display),
            None => println!("{} = {}", out.register, out.display),
        },
        OutputFormat::Raw => print_raw(&value.to_payload()),
    }
}

#[derive(Serialize)]
struct RegisterRow {
    name: &'static str,
    address: u8,
    #[serde(rename = "type")]
    type_label: String,
    access: String,
}

pub fn print_registers<'a>(
    descriptors: impl IntoIterator<Item = &'a RegisterDescriptor>,
    format: OutputFormat,
) {
    let rows: Vec<RegisterRow> = descriptors
        .into_iter()
        .map(|d| RegisterRow {
            name: d.name,
            address: d.address,
            type_label: d.type_label(),
            access: d.access.to_string(),
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Table => {
            let mut table = new_table(vec!["ADDRESS", "NAME", "TYPE", "ACCESS"]);
            for row in &rows {
                table.add_row(vec![
                    row.address.to_string(),
                    row.name.to_string(),
                    row.type_label.clone(),
                    row.access.clone(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in &rows {
                println!(
                    "{:>3}  {:<28} {:<36} {}",
                    row.address, row.name, row.type_label, row.access
                );
            }
        }
        OutputFormat::Raw => {
            for row in &rows {
                println!("{}", row.name);
            }
        }
    }
}

#[derive(Serialize)]
struct InfoOutput {
    port: String,
    who_am_i: u16,
    hardware_version: String,
    assembly_version: u8,
    core_version: String,
    firmware_version: String,
}

pub fn print_info(port: &str, info: &DeviceInfo, format: OutputFormat) {
    let out = InfoOutput {
        port: port.to_string(),
        who_am_i: info.who_am_i,
        hardware_version: info.hardware_version.to_string(),
        assembly_version: info.assembly_version,
        core_version: info.core_version.to_string(),
        firmware_version: info.firmware_version.to_string(),
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("Device Info:");
            println!("  Port:             {}", out.port);
            println!("  WhoAmI:           {}", out.who_am_i);
            println!("  Hardware:         {}", out.hardware_version);
            println!("  Assembly:         {}", out.assembly_version);
            println!("  Core:             {}", out.core_version);
            println!("  Firmware:         {}", out.firmware_version);
        }
        OutputFormat::Raw => println!("{}", out.who_am_i),
    }
}

#[derive(Serialize)]
struct WritesOutput<'a> {
    applied: bool,
    writes: Vec<ValueOutput<'a>>,
}

/// Report a configuration sequence; `applied` is false for dry runs.
pub fn print_writes(writes: &[RegisterWrite], applied: bool, format: OutputFormat) {
    let out = WritesOutput {
        applied,
        writes: writes
            .iter()
            .map(|w| ValueOutput::new(w.descriptor, w.value, None))
            .collect(),
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut table = new_table(vec!["#", "REGISTER", "ADDRESS", "VALUE"]);
            for (index, write) in out.writes.iter().enumerate() {
                table.add_row(vec![
                    (index + 1).to_string(),
                    write.register.to_string(),
                    write.address.to_string(),
                    write.display.clone(),
                ]);
            }
            println!("{table}");
            if !applied {
                println!("(dry run, nothing written)");
            }
        }
        OutputFormat::Pretty => {
            for write in &out.writes {
                println!("{} <- {}", write.register, write.display);
            }
        }
        OutputFormat::Raw => {
            for write in writes {
                print_raw(&write.value.to_payload());
            }
        }
    }
}

#[derive(Serialize)]
struct EventOutput<'a> {
    register: &'a str,
    address: u8,
    value: serde_json::Value,
    display: String,
    timestamp: Option<f64>,
}

pub fn print_event(
    descriptor: &RegisterDescriptor,
    value: RegisterValue,
    timestamp: Option<f64>,
    format: OutputFormat,
) {
    let display = describe(descriptor, value);
    match format {
        OutputFormat::Json => print_json(&EventOutput {
            register: descriptor.name,
            address: descriptor.address,
            value: json_value(value),
            display,
            timestamp,
        }),
        // Events stream one per line; a table per event would be noise.
        OutputFormat::Table | OutputFormat::Pretty => {
            let stamp = timestamp
                .map(|s| format!("{s:>14.6}"))
                .unwrap_or_else(|| format!("{:>14}", "-"));
            println!("{stamp}  {:<24} {display}", descriptor.name);
        }
        OutputFormat::Raw => print_raw(&value.to_payload()),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}
