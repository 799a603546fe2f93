//! Configuration for ranging-io
//!
//! Loads configuration from a TOML file. Every field has a default, so a
//! file only needs the values that differ from the stock SPI wiring.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RangingConfig {
    #[serde(default)]
    pub module: ModuleConfig,
    #[serde(default)]
    pub spi: SpiConfig,
    #[serde(default)]
    pub uart: UartConfig,
    #[serde(default)]
    pub handshake: HandshakeConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which channel the module is wired to
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModuleConfig {
    /// Channel name: `"SPI<bus>.<cs>"` or `"UART<n>"`
    ///
    /// Examples:
    /// - `SPI0.0` - spidev bus 0, chip select 0
    /// - `UART1` - `/dev/ttyS1`
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Explicit device node, overriding the one derived from `channel`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_path: Option<String>,
}

fn default_channel() -> String {
    "SPI0.0".to_string()
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            device_path: None,
        }
    }
}

/// SPI bus settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpiConfig {
    /// Clock speed in Hz
    #[serde(default = "default_spi_speed_hz")]
    pub speed_hz: u32,
    /// SPI mode 0-3
    #[serde(default)]
    pub mode: u8,
}

fn default_spi_speed_hz() -> u32 {
    8_000_000
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            speed_hz: default_spi_speed_hz(),
            mode: 0,
        }
    }
}

/// UART settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UartConfig {
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Timeout for a single read call
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

fn default_baud_rate() -> u32 {
    115_200
}
fn default_read_timeout_ms() -> u64 {
    5
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

/// Request/response handshake bounds
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HandshakeConfig {
    /// Delay between SPI length probes
    #[serde(default = "default_probe_interval_us")]
    pub probe_interval_us: u64,
    /// Overall bound on one response
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
}

fn default_probe_interval_us() -> u64 {
    50
}
fn default_response_timeout_ms() -> u64 {
    20
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            probe_interval_us: default_probe_interval_us(),
            response_timeout_ms: default_response_timeout_ms(),
        }
    }
}

/// Poll schedule
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollingConfig {
    /// Period used by `start_default()`
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
    /// Log a statistics line every N ticks (0 disables)
    #[serde(default = "default_stats_log_interval")]
    pub stats_log_interval: u64,
}

fn default_period_ms() -> u64 {
    100
}
fn default_stats_log_interval() -> u64 {
    100
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            period_ms: default_period_ms(),
            stats_log_interval: default_stats_log_interval(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl RangingConfig {
    /// Load configuration from TOML file
    ///
    /// # Example
    /// ```no_run
    /// use ranging_io::config::RangingConfig;
    ///
    /// let config = RangingConfig::from_file("ranging.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: RangingConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents).map_err(|e| {
            Error::Config(format!("Failed to write config {}: {}", path.display(), e))
        })?;
        Ok(())
    }

    /// Same configuration wired to a different channel
    pub fn with_channel(mut self, channel: &str) -> Self {
        self.module.channel = channel.to_string();
        self
    }
}
