use bytes::Bytes;
use expander_frame::{Frame, MessageKind, DEFAULT_PORT};

use crate::error::{RegisterError, Result};
use crate::map::RegisterDescriptor;
use crate::payload::RegisterValue;
use crate::wire::WireType;

/// Assembles request frames for one target port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandBuilder {
    port: u8,
}

impl Default for CommandBuilder {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

impl CommandBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Address a port other than the device itself.
    pub fn with_port(port: u8) -> Self {
        Self { port }
    }

    pub fn port(&self) -> u8 {
        self.port
    }

    /// Read request: payload type from `wire_type`, empty payload.
    pub fn read(&self, address: u8, wire_type: WireType) -> Frame {
        self.frame(MessageKind::Read, address, wire_type, Bytes::new())
    }

    /// Write request. `payload` must be exactly as wide as `wire_type`.
    pub fn write(&self, address: u8, wire_type: WireType, payload: impl Into<Bytes>) -> Result<Frame> {
        self.with_payload(MessageKind::Write, address, wire_type, payload.into())
    }

    /// Event frame, as a device would emit it.
    pub fn event(&self, address: u8, wire_type: WireType, payload: impl Into<Bytes>) -> Result<Frame> {
        self.with_payload(MessageKind::Event, address, wire_type, payload.into())
    }

    /// Read request for `descriptor`, checking read access.
    pub fn read_register(&self, descriptor: &RegisterDescriptor) -> Result<Frame> {
        descriptor.ensure_readable()?;
        Ok(self.read(descriptor.address, descriptor.wire_type))
    }

    /// Write request for `descriptor`, checking write access and wire type.
    pub fn write_register(&self, descriptor: &RegisterDescriptor, value: RegisterValue) -> Result<Frame> {
        descriptor.ensure_writable()?;
        if value.wire_type() != descriptor.wire_type {
            return Err(RegisterError::TypeMismatch {
                register: descriptor.name,
                expected: descriptor.wire_type.to_string(),
                actual: value.wire_type().to_string(),
            });
        }
        self.write(descriptor.address, descriptor.wire_type, value.to_payload())
    }

    fn with_payload(
        &self,
        kind: MessageKind,
        address: u8,
        wire_type: WireType,
        payload: Bytes,
    ) -> Result<Frame> {
        if payload.len() != wire_type.width() {
            return Err(RegisterError::InvalidLength {
                address,
                expected: wire_type.width(),
                actual: payload.len(),
            });
        }
        Ok(self.frame(kind, address, wire_type, payload))
    }

    fn frame(&self, kind: MessageKind, address: u8, wire_type: WireType, payload: Bytes) -> Frame {
        let mut frame = Frame::new(kind, address, wire_type.payload_type(), payload);
        frame.port = self.port;
        frame
    }
}
