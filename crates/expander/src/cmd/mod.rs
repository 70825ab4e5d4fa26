use std::time::Duration;

use clap::{Args, Subcommand};
use expander_device::{Device, DeviceConfig, RegisterWrite};
use expander_registers::{RegisterDescriptor, RegisterMap};
use expander_transport::{FlowControl, SerialConfig, DEFAULT_BAUD_RATE};
use tokio::runtime::Runtime;
use tracing::debug;

use crate::exit::{device_error, io_error, register_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod encoder;
pub mod events;
pub mod info;
pub mod pwm;
pub mod read;
pub mod registers;
pub mod stim;
pub mod version;
pub mod write;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect and print identity and version registers.
    Info(InfoArgs),
    /// List the register map.
    Registers(RegistersArgs),
    /// Read one register.
    Read(ReadArgs),
    /// Write one register.
    Write(WriteArgs),
    /// Configure PWM generators.
    Pwm(PwmArgs),
    /// Configure the stimulation generator.
    Stim(StimArgs),
    /// Configure the magnetic encoder expansion board.
    Encoder(EncoderArgs),
    /// Print device events until interrupted.
    Events(EventsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Info(args) => info::run(args, format),
        Command::Registers(args) => registers::run(args, format),
        Command::Read(args) => read::run(args, format),
        Command::Write(args) => write::run(args, format),
        Command::Pwm(args) => pwm::run(args, format),
        Command::Stim(args) => stim::run(args, format),
        Command::Encoder(args) => encoder::run(args, format),
        Command::Events(args) => events::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Serial connection options shared by every command that talks to a board.
#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
    /// Serial port, e.g. /dev/ttyUSB0 or COM3.
    #[arg(long, short = 'p', env = "EXPANDER_PORT")]
    pub port: Option<String>,
    /// Reply timeout per command (e.g. 1s, 250ms).
    #[arg(long, env = "EXPANDER_TIMEOUT", default_value = "1s")]
    pub timeout: String,
    /// Line rate in baud.
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// Disable RTS/CTS flow control.
    #[arg(long)]
    pub no_flow_control: bool,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug)]
pub struct RegistersArgs {
    /// Only list registers whose name contains this text (case-insensitive).
    #[arg(long)]
    pub filter: Option<String>,
}

#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Register name, e.g. OutputState or Pwm0Frequency.
    pub register: String,
    /// Also print the device timestamp (event-capable registers only).
    #[arg(long)]
    pub timestamped: bool,
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug)]
pub struct WriteArgs {
    /// Register name.
    pub register: String,
    /// Number (decimal or 0x hex), "dx,dy" pair, enum name, or flag names
    /// joined with '|' (e.g. "Out0|Out3").
    pub value: String,
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug)]
pub struct PwmArgs {
    /// Channels to configure (comma-separated, 0-2).
    #[arg(long, value_delimiter = ',', required = true)]
    pub channels: Vec<u8>,
    /// Frequency in Hz.
    #[arg(long)]
    pub frequency: f32,
    /// Duty cycle in percent.
    #[arg(long)]
    pub duty_cycle: f32,
    /// Pulses per train; 0 runs continuously.
    #[arg(long, default_value_t = 0)]
    pub pulse_count: u16,
    /// Start the configured channels after writing.
    #[arg(long, conflicts_with = "dry_run")]
    pub start: bool,
    /// Print the writes without connecting.
    #[arg(long)]
    pub dry_run: bool,
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug)]
pub struct StimArgs {
    /// Channels to configure (comma-separated).
    #[arg(long, value_delimiter = ',', default_value = "0")]
    pub channels: Vec<u8>,
    /// Milliseconds high per pulse.
    #[arg(long)]
    pub on_time: u16,
    /// Milliseconds low per pulse.
    #[arg(long)]
    pub off_time: u16,
    /// Pulses per train; 0 runs continuously.
    #[arg(long, default_value_t = 0)]
    pub pulse_count: u16,
    /// Start stimulation after writing.
    #[arg(long, conflicts_with = "dry_run")]
    pub start: bool,
    /// Print the writes without connecting.
    #[arg(long)]
    pub dry_run: bool,
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug)]
pub struct EncoderArgs {
    /// Sample rate: 50Hz, 100Hz, 200Hz, 250Hz, 500Hz or 1000Hz.
    #[arg(long, default_value = "100Hz")]
    pub rate: String,
    /// Print the writes without connecting.
    #[arg(long)]
    pub dry_run: bool,
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug)]
pub struct EventsArgs {
    /// Only print events from these registers (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub register: Option<Vec<String>>,
    /// Exit after printing N events.
    #[arg(long)]
    pub count: Option<usize>,
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

impl ConnectArgs {
    fn serial_config(&self) -> CliResult<SerialConfig> {
        let port = self.port.as_deref().ok_or_else(|| {
            CliError::usage("no serial port given (use --port or EXPANDER_PORT)")
        })?;
        let mut config = SerialConfig::new(port);
        config.baud_rate = self.baud;
        if self.no_flow_control {
            config.flow_control = FlowControl::None;
        }
        Ok(config)
    }

    fn device_config(&self) -> CliResult<DeviceConfig> {
        let timeout = parse_duration(&self.timeout)?;
        Ok(DeviceConfig::default().with_reply_timeout(timeout))
    }

    /// Open the port and verify the board. Must run inside the runtime.
    pub async fn connect(&self) -> CliResult<(Device, String)> {
        let serial = self.serial_config()?;
        let config = self.device_config()?;
        debug!(port = %serial.path, baud = serial.baud_rate, "connecting");
        let device = Device::open(&serial, config)
            .await
            .map_err(|err| device_error("connect failed", err))?;
        Ok((device, serial.path))
    }
}

/// Single-threaded runtime; the command channel is the only concurrent work.
pub fn runtime() -> CliResult<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("failed to start runtime", err))
}

pub fn resolve(name: &str) -> CliResult<&'static RegisterDescriptor> {
    RegisterMap::output_expander()
        .resolve(name)
        .map_err(|err| register_error("invalid register", err))
}

/// Connect, apply `writes` in order and close.
pub fn apply_writes(
    connect: &ConnectArgs,
    writes: &[RegisterWrite],
    format: OutputFormat,
) -> CliResult<()> {
    runtime()?.block_on(async {
        let (device, _) = connect.connect().await?;
        let result = device.apply(writes, None).await;
        device.close().await;
        result.map_err(|err| device_error("write failed", err))
    })?;
    crate::output::print_writes(writes, true, format);
    Ok(())
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
