//! Configuration for vhdxlog
//!
//! Centralized configuration with sensible defaults.

use crate::error::{LogError, Result};
use crate::format::MIB;

/// Main configuration for a journal instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Open Configuration
    // -------------------------------------------------------------------------
    /// Open the image read-only. A pending log is then reported instead of
    /// replayed.
    pub read_only: bool,

    /// Human-readable image name used in error messages
    pub image_name: String,

    // -------------------------------------------------------------------------
    // Replay Configuration
    // -------------------------------------------------------------------------
    /// When replaying extends the image, the new length is rounded up to
    /// a multiple of this value (in bytes)
    pub allocation_granularity: u64,

    /// Sync strategy for sectors written during replay
    pub replay_sync: ReplaySync,
}

/// Replay sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaySync {
    /// sync after every replayed sector (write-through, slowest)
    EverySector,

    /// sync once, after the whole sequence has been replayed
    EndOfFlush,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            read_only: false,
            image_name: "image.vhdx".to_string(),
            allocation_granularity: MIB, // 1 MB
            replay_sync: ReplaySync::EverySector,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Open the image read-only
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.config.read_only = read_only;
        self
    }

    /// Set the image name reported in errors
    pub fn image_name(mut self, name: impl Into<String>) -> Self {
        self.config.image_name = name.into();
        self
    }

    /// Set the file growth granularity (in bytes, power of two)
    pub fn allocation_granularity(mut self, bytes: u64) -> Self {
        self.config.allocation_granularity = bytes;
        self
    }

    /// Set the replay sync strategy
    pub fn replay_sync(mut self, strategy: ReplaySync) -> Self {
        self.config.replay_sync = strategy;
        self
    }

    pub fn build(self) -> Result<Config> {
        if !self.config.allocation_granularity.is_power_of_two() {
            return Err(LogError::Config(format!(
                "allocation granularity must be a power of two, got {}",
                self.config.allocation_granularity
            )));
        }
        Ok(self.config)
    }
}
