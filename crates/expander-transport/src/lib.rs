//! Duplex byte-stream transports for expander boards.
//!
//! This is the lowest layer of the workspace. The command channel above it
//! only needs something that implements [`DuplexStream`]; this crate supplies
//! the trait, a boxed stream type, and (behind the default `serial` feature)
//! an opener for the serial ports Harp devices enumerate as.

pub mod error;
pub mod traits;

#[cfg(feature = "serial")]
pub mod serial;

pub use error::{Result, TransportError};
pub use traits::{BoxedStream, DuplexStream};

#[cfg(feature = "serial")]
pub use serial::{open_serial, FlowControl, SerialConfig, DEFAULT_BAUD_RATE};
