use std::fmt;

use expander_frame::Frame;
use expander_registers::{
    check_kind, decode, decode_timestamped, decode_timestamped_typed, decode_typed, names,
    CommandBuilder, RegisterDescriptor, RegisterMap, RegisterPayload, RegisterValue, Timestamped,
};
use expander_transport::DuplexStream;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::channel::CommandChannel;
use crate::config::DeviceConfig;
use crate::error::{ExpanderError, Result};
use crate::sequence::RegisterWrite;

/// Firmware and hardware identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    pub who_am_i: u16,
    pub hardware_version: Version,
    pub assembly_version: u8,
    pub core_version: Version,
    pub firmware_version: Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// A connected, identity-checked Output Expander.
///
/// All methods take `&self`; share the handle with `Arc<Device>` to issue
/// commands from several tasks. Commands are still serviced one at a time,
/// in submission order.
#[derive(Debug)]
pub struct Device {
    channel: CommandChannel,
    builder: CommandBuilder,
    map: &'static RegisterMap,
    who_am_i: u16,
}

impl Device {
    /// Start a command channel over `stream` and verify the board identity.
    ///
    /// No handle is returned if `WhoAmI` differs from
    /// [`DeviceConfig::expected_who_am_i`].
    pub async fn connect<S: DuplexStream>(stream: S, config: DeviceConfig) -> Result<Self> {
        config.validate()?;
        let channel = CommandChannel::spawn(stream, config.channel.clone())?;
        let mut device = Self {
            channel,
            builder: CommandBuilder::with_port(config.port),
            map: RegisterMap::output_expander(),
            who_am_i: 0,
        };

        let who_am_i = match device.read::<u16>(names::WHO_AM_I).await {
            Ok(value) => value,
            Err(err) => {
                device.close().await;
                return Err(err);
            }
        };
        if who_am_i != config.expected_who_am_i {
            device.close().await;
            return Err(ExpanderError::IdentityMismatch {
                expected: config.expected_who_am_i,
                actual: who_am_i,
            });
        }

        device.who_am_i = who_am_i;
        info!(who_am_i, "device connected");
        Ok(device)
    }

    /// Open a serial port and [`connect`](Self::connect) over it.
    #[cfg(feature = "serial")]
    pub async fn open(
        serial: &expander_transport::SerialConfig,
        config: DeviceConfig,
    ) -> Result<Self> {
        let stream = expander_transport::open_serial(serial)?;
        Self::connect(stream, config).await
    }

    pub fn who_am_i(&self) -> u16 {
        self.who_am_i
    }

    pub fn map(&self) -> &'static RegisterMap {
        self.map
    }

    /// Read a register as `T`.
    pub async fn read<T: RegisterPayload>(&self, name: &str) -> Result<T> {
        self.read_register(self.map.resolve(name)?, None).await
    }

    /// Read an event-capable register together with its device timestamp.
    pub async fn read_timestamped<T: RegisterPayload>(&self, name: &str) -> Result<Timestamped<T>> {
        self.read_register_timestamped(self.map.resolve(name)?, None)
            .await
    }

    /// Write `value` to a register; completes on acknowledgement.
    pub async fn write<T: RegisterPayload>(&self, name: &str, value: T) -> Result<()> {
        self.write_register(self.map.resolve(name)?, value, None)
            .await
    }

    pub async fn read_register<T: RegisterPayload>(
        &self,
        descriptor: &RegisterDescriptor,
        cancel: Option<&CancellationToken>,
    ) -> Result<T> {
        check_kind::<T>(descriptor)?;
        let reply = self.exchange_read(descriptor, cancel).await?;
        Ok(decode_typed(descriptor, &reply)?)
    }

    pub async fn read_register_timestamped<T: RegisterPayload>(
        &self,
        descriptor: &RegisterDescriptor,
        cancel: Option<&CancellationToken>,
    ) -> Result<Timestamped<T>> {
        check_kind::<T>(descriptor)?;
        descriptor.ensure_timestamped()?;
        let reply = self.exchange_read(descriptor, cancel).await?;
        Ok(decode_timestamped_typed(descriptor, &reply)?)
    }

    pub async fn write_register<T: RegisterPayload>(
        &self,
        descriptor: &RegisterDescriptor,
        value: T,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        check_kind::<T>(descriptor)?;
        self.write_value(descriptor, value.into_value(), cancel)
            .await
    }

    /// Untyped read, for callers that only know the register at runtime.
    pub async fn read_value(
        &self,
        descriptor: &RegisterDescriptor,
        cancel: Option<&CancellationToken>,
    ) -> Result<RegisterValue> {
        let reply = self.exchange_read(descriptor, cancel).await?;
        Ok(decode(descriptor, &reply)?)
    }

    pub async fn read_value_timestamped(
        &self,
        descriptor: &RegisterDescriptor,
        cancel: Option<&CancellationToken>,
    ) -> Result<Timestamped<RegisterValue>> {
        descriptor.ensure_timestamped()?;
        let reply = self.exchange_read(descriptor, cancel).await?;
        Ok(decode_timestamped(descriptor, &reply)?)
    }

    pub async fn write_value(
        &self,
        descriptor: &RegisterDescriptor,
        value: RegisterValue,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        let request = self.builder.write_register(descriptor, value)?;
        debug!(register = descriptor.name, %value, "write");
        self.channel.send(request, cancel).await?;
        Ok(())
    }

    /// Perform `writes` in order, stopping at the first failure.
    pub async fn apply(&self, writes: &[RegisterWrite], cancel: Option<&CancellationToken>) -> Result<()> {
        for write in writes {
            self.write_value(write.descriptor, write.value, cancel).await?;
        }
        Ok(())
    }

    /// Read the identity and version registers.
    pub async fn info(&self) -> Result<DeviceInfo> {
        Ok(DeviceInfo {
            who_am_i: self.read(names::WHO_AM_I).await?,
            hardware_version: Version {
                major: self.read(names::HARDWARE_VERSION_HIGH).await?,
                minor: self.read(names::HARDWARE_VERSION_LOW).await?,
            },
            assembly_version: self.read(names::ASSEMBLY_VERSION).await?,
            core_version: Version {
                major: self.read(names::CORE_VERSION_HIGH).await?,
                minor: self.read(names::CORE_VERSION_LOW).await?,
            },
            firmware_version: Version {
                major: self.read(names::FIRMWARE_VERSION_HIGH).await?,
                minor: self.read(names::FIRMWARE_VERSION_LOW).await?,
            },
        })
    }

    /// Every event frame the device emits from now on.
    pub fn subscribe_events(&self) -> broadcast::Receiver<Frame> {
        self.channel.subscribe()
    }

    /// Send a raw frame and return the matching reply.
    pub async fn command(&self, frame: Frame, cancel: Option<&CancellationToken>) -> Result<Frame> {
        self.channel.send(frame, cancel).await
    }

    /// Stop the command channel and release the transport.
    pub async fn close(self) {
        self.channel.close().await;
    }

    async fn exchange_read(
        &self,
        descriptor: &RegisterDescriptor,
        cancel: Option<&CancellationToken>,
    ) -> Result<Frame> {
        let request = self.builder.read_register(descriptor)?;
        debug!(register = descriptor.name, "read");
        self.channel.send(request, cancel).await
    }
}
