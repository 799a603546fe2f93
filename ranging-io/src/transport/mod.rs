//! Transport layer for I/O abstraction
//!
//! The module is wired through exactly one of two buses:
//!
//! - **SPI** (synchronous): every exchange is a fixed-length full-duplex
//!   transfer; bytes are clocked in while bytes are clocked out.
//! - **UART** (asynchronous): a write followed by a separate bounded read.
//!
//! A transport value owns a single handle of a single kind, so the two
//! channel types can never both be open for one module.

use crate::config::RangingConfig;
use crate::error::{Error, Result};

pub mod mock;
#[cfg(target_os = "linux")]
mod spi;
mod uart;

pub use mock::MockTransport;
#[cfg(target_os = "linux")]
pub use spi::SpiTransport;
pub use uart::UartTransport;

/// Physical channel kind selected by the channel name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Clock-synchronous bus
    Spi,
    /// Asynchronous byte stream
    Uart,
}

impl ChannelKind {
    /// Select the channel kind from a name such as `"SPI0.0"` or `"UART0"`
    ///
    /// Case-sensitive substring match; anything else is a configuration error.
    pub fn parse(channel_name: &str) -> Result<Self> {
        if channel_name.contains("SPI") {
            Ok(ChannelKind::Spi)
        } else if channel_name.contains("UART") {
            Ok(ChannelKind::Uart)
        } else {
            Err(Error::Config(format!(
                "channel '{}' is neither an SPI nor a UART channel",
                channel_name
            )))
        }
    }
}

/// Transport trait for module communication
pub trait Transport: Send {
    /// Which bus this transport drives
    fn kind(&self) -> ChannelKind;

    /// Exchange raw bytes
    ///
    /// - SPI: full-duplex transfer of exactly `rx_len` bytes. `tx` is sent
    ///   first, padded with `0xFF` or truncated to `rx_len`.
    /// - UART: writes `tx` (if any), then one read of up to `rx_len` bytes
    ///   bounded by the port timeout. A timeout returns an empty vector.
    fn exchange(&mut self, tx: &[u8], rx_len: usize) -> Result<Vec<u8>>;

    /// Release the underlying handle. Later calls are no-ops.
    ///
    /// Does not interrupt an exchange already in progress on another thread.
    fn close(&mut self) -> Result<()>;

    /// Whether the handle is still held
    fn is_open(&self) -> bool;
}

/// Open the transport named by `channel_name`
///
/// The device path comes from `config.module.device_path` when set, and is
/// derived from the channel name otherwise (`SPI0.1` → `/dev/spidev0.1`,
/// `UART2` → `/dev/ttyS2`).
pub fn open(channel_name: &str, config: &RangingConfig) -> Result<Box<dyn Transport>> {
    let kind = ChannelKind::parse(channel_name)?;
    let path = resolve_device_path(kind, channel_name, config.module.device_path.as_deref())?;
    log::info!("Opening {:?} channel '{}' at {}", kind, channel_name, path);

    match kind {
        ChannelKind::Spi => open_spi(&path, config),
        ChannelKind::Uart => Ok(Box::new(UartTransport::open(&path, &config.uart)?)),
    }
}

#[cfg(target_os = "linux")]
fn open_spi(path: &str, config: &RangingConfig) -> Result<Box<dyn Transport>> {
    Ok(Box::new(SpiTransport::open(path, &config.spi)?))
}

#[cfg(not(target_os = "linux"))]
fn open_spi(path: &str, _config: &RangingConfig) -> Result<Box<dyn Transport>> {
    Err(Error::Config(format!(
        "SPI device {} unavailable: spidev is only supported on Linux",
        path
    )))
}

/// Map a channel name to a device node
pub fn resolve_device_path(
    kind: ChannelKind,
    channel_name: &str,
    explicit: Option<&str>,
) -> Result<String> {
    if let Some(path) = explicit {
        return Ok(path.to_string());
    }

    let (marker, is_valid): (&str, fn(&str) -> bool) = match kind {
        ChannelKind::Spi => ("SPI", is_bus_and_chip_select),
        ChannelKind::Uart => ("UART", is_port_number),
    };

    let suffix = channel_name
        .find(marker)
        .map(|pos| &channel_name[pos + marker.len()..])
        .filter(|s| is_valid(s))
        .ok_or_else(|| {
            Error::Config(format!(
                "cannot derive a device path from channel '{}'; set module.device_path",
                channel_name
            ))
        })?;

    Ok(match kind {
        ChannelKind::Spi => format!("/dev/spidev{}", suffix),
        ChannelKind::Uart => format!("/dev/ttyS{}", suffix),
    })
}

fn is_port_number(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_bus_and_chip_select(s: &str) -> bool {
    match s.split_once('.') {
        Some((bus, cs)) => is_port_number(bus) && is_port_number(cs),
        None => false,
    }
}

/// Outgoing buffer for a full-duplex transfer of `len` bytes
///
/// `tx` occupies the front; the rest is `0xFF` filler.
pub(crate) fn full_duplex_tx(tx: &[u8], len: usize) -> Vec<u8> {
    let mut buf = vec![0xFF; len];
    let n = tx.len().min(len);
    buf[..n].copy_from_slice(&tx[..n]);
    buf
}
