//! Control library for the Harp Output Expander.
//!
//! The board exposes its digital outputs, PWM and stimulation generators,
//! servo channels and expansion sensors as typed registers behind the Harp
//! binary protocol. This crate bundles the layers needed to drive it.
//!
//! # Crate Structure
//!
//! - [`transport`]: duplex byte streams (serial ports behind the `serial` feature)
//! - [`frame`]: Harp message framing and the `tokio_util` codec
//! - [`registers`]: register map, typed payloads and command building
//! - [`device`]: async command channel, device handle and configuration sequences
//!
//! ```no_run
//! # async fn demo() -> expander::device::Result<()> {
//! use expander::device::{configure_pwm, Device, DeviceConfig, PwmSettings};
//! use expander::registers::PwmChannels;
//! use expander::transport::SerialConfig;
//!
//! let device = Device::open(&SerialConfig::new("/dev/ttyUSB0"), DeviceConfig::default()).await?;
//! let writes = configure_pwm(&PwmSettings {
//!     channels: PwmChannels::PWM0 | PwmChannels::PWM2,
//!     frequency: 50.0,
//!     duty_cycle: 25.0,
//!     pulse_count: 0,
//! })?;
//! device.apply(&writes, None).await?;
//! # Ok(())
//! # }
//! ```

/// Re-export transport types.
pub mod transport {
    pub use expander_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use expander_frame::*;
}

/// Re-export register types.
pub mod registers {
    pub use expander_registers::*;
}

/// Re-export device types.
pub mod device {
    pub use expander_device::*;
}
