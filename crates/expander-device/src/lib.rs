//! Async device layer for the Output Expander.
//!
//! [`Device`] is the handle most callers want: it verifies the board
//! identity, then exposes typed register reads and writes by name. Underneath,
//! a [`CommandChannel`] keeps exactly one command on the wire at a time and
//! pairs each reply with the request that caused it. Multi-register setups
//! (PWM, stimulation, the magnetic encoder) are produced as plain write lists
//! by the [`sequence`] functions and applied with [`Device::apply`].

pub mod channel;
pub mod config;
pub mod device;
pub mod error;
pub mod sequence;

pub use channel::CommandChannel;
pub use config::{ChannelConfig, DeviceConfig};
pub use device::{Device, DeviceInfo, Version};
pub use error::{ExpanderError, Result};
pub use sequence::{
    configure_magnetic_encoder, configure_pwm, configure_stim, PwmSettings, RegisterWrite,
    StimSettings, MAX_PWM_FREQUENCY,
};
pub use tokio_util::sync::CancellationToken;
