//! SPI transport implementation (Linux spidev)

use super::{full_duplex_tx, ChannelKind, Transport};
use crate::config::SpiConfig;
use crate::error::{Error, Result};
use spidev::{SpiModeFlags, Spidev, SpidevOptions, SpidevTransfer};

/// Clock-synchronous full-duplex transport
pub struct SpiTransport {
    dev: Option<Spidev>,
    path: String,
}

impl SpiTransport {
    /// Open and configure an spidev node
    ///
    /// # Arguments
    /// * `path` - Device node (e.g., "/dev/spidev0.0")
    /// * `config` - Clock speed and SPI mode (0-3)
    pub fn open(path: &str, config: &SpiConfig) -> Result<Self> {
        let mode = match config.mode {
            0 => SpiModeFlags::SPI_MODE_0,
            1 => SpiModeFlags::SPI_MODE_1,
            2 => SpiModeFlags::SPI_MODE_2,
            3 => SpiModeFlags::SPI_MODE_3,
            other => {
                return Err(Error::Config(format!("SPI mode {} is not 0-3", other)));
            }
        };

        let mut dev = Spidev::open(path)
            .map_err(|e| Error::Config(format!("Failed to open SPI device {}: {}", path, e)))?;
        let options = SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(config.speed_hz)
            .mode(mode)
            .build();
        dev.configure(&options)
            .map_err(|e| Error::Config(format!("Failed to configure SPI device {}: {}", path, e)))?;

        log::info!(
            "Opened SPI {} at {} Hz, mode {}",
            path,
            config.speed_hz,
            config.mode
        );

        Ok(SpiTransport {
            dev: Some(dev),
            path: path.to_string(),
        })
    }
}

impl Transport for SpiTransport {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Spi
    }

    fn exchange(&mut self, tx: &[u8], rx_len: usize) -> Result<Vec<u8>> {
        let dev = self
            .dev
            .as_mut()
            .ok_or_else(|| Error::Communication("SPI transport is closed".to_string()))?;

        if rx_len == 0 {
            return Ok(Vec::new());
        }

        let tx_buf = full_duplex_tx(tx, rx_len);
        let mut rx_buf = vec![0u8; rx_len];
        {
            let mut transfer = SpidevTransfer::read_write(&tx_buf, &mut rx_buf);
            dev.transfer(&mut transfer)
                .map_err(|e| Error::Communication(format!("SPI transfer failed: {}", e)))?;
        }
        Ok(rx_buf)
    }

    fn close(&mut self) -> Result<()> {
        if self.dev.take().is_some() {
            log::info!("Closed SPI {}", self.path);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.dev.is_some()
    }
}

impl Drop for SpiTransport {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
