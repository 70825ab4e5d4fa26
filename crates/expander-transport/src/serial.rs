use std::time::Duration;

use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// Harp devices talk at 1 Mbaud.
pub const DEFAULT_BAUD_RATE: u32 = 1_000_000;

/// Serial line flow control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowControl {
    None,
    /// RTS/CTS handshaking.
    #[default]
    Hardware,
}

/// Configuration for opening a serial port.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port path, e.g. `/dev/ttyUSB0` or `COM3`.
    pub path: String,
    /// Line rate. Default: 1 Mbaud.
    pub baud_rate: u32,
    /// Flow control. Default: hardware (RTS/CTS).
    pub flow_control: FlowControl,
    /// Timeout applied by the OS driver to blocking operations.
    pub timeout: Duration,
}

impl SerialConfig {
    /// Default configuration for the port at `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            flow_control: FlowControl::default(),
            timeout: Duration::from_millis(500),
        }
    }
}

/// Open a serial port as an async duplex stream (8N1).
///
/// Must be called from within a tokio runtime.
pub fn open_serial(config: &SerialConfig) -> Result<SerialStream> {
    let flow_control = match config.flow_control {
        FlowControl::None => tokio_serial::FlowControl::None,
        FlowControl::Hardware => tokio_serial::FlowControl::Hardware,
    };

    debug!(path = %config.path, baud = config.baud_rate, "opening serial port");
    let stream = tokio_serial::new(&config.path, config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(flow_control)
        .timeout(config.timeout)
        .open_native_async()
        .map_err(|err| TransportError::Open {
            path: config.path.clone(),
            message: err.to_string(),
        })?;

    info!(path = %config.path, "serial port open");
    Ok(stream)
}
