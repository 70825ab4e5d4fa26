use std::time::Duration;

use expander_frame::DEFAULT_PORT;
use expander_registers::EXPECTED_WHO_AM_I;

use crate::error::{ExpanderError, Result};

/// Command channel tuning.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Deadline for a reply, measured from the moment a command is submitted.
    /// Default: 1s.
    pub reply_timeout: Duration,
    /// How long a late reply to an abandoned command is waited for before
    /// its orphan record is dropped. Default: 2s.
    pub orphan_ttl: Duration,
    /// Commands that may wait behind the one in flight. Default: 32.
    pub queue_depth: usize,
    /// Event frames buffered per subscriber. Default: 256.
    pub event_capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            reply_timeout: Duration::from_secs(1),
            orphan_ttl: Duration::from_secs(2),
            queue_depth: 32,
            event_capacity: 256,
        }
    }
}

impl ChannelConfig {
    pub fn validate(&self) -> Result<()> {
        if self.reply_timeout.is_zero() {
            return Err(ExpanderError::invalid("reply_timeout", "must be non-zero"));
        }
        if self.queue_depth == 0 {
            return Err(ExpanderError::invalid("queue_depth", "must be at least 1"));
        }
        if self.event_capacity == 0 {
            return Err(ExpanderError::invalid("event_capacity", "must be at least 1"));
        }
        Ok(())
    }
}

/// Device handle configuration.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub channel: ChannelConfig,
    /// Identity the board must report in `WhoAmI`.
    pub expected_who_am_i: u16,
    /// Target port for every command. Default: 255 (the device itself).
    pub port: u8,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            channel: ChannelConfig::default(),
            expected_who_am_i: EXPECTED_WHO_AM_I,
            port: DEFAULT_PORT,
        }
    }
}

impl DeviceConfig {
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.channel.reply_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.channel.validate()
    }
}
