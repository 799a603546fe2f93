//! UART transport implementation

use super::{ChannelKind, Transport};
use crate::config::UartConfig;
use crate::error::{Error, Result};
use crate::protocol::constants::UART_MAX_RESPONSE_LEN;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::time::Duration;

/// Asynchronous byte-stream transport
pub struct UartTransport {
    port: Option<Box<dyn SerialPort>>,
    path: String,
}

impl UartTransport {
    /// Open a serial port
    ///
    /// # Arguments
    /// * `path` - Serial port path (e.g., "/dev/ttyS0")
    /// * `config` - Baud rate and per-read timeout
    pub fn open(path: &str, config: &UartConfig) -> Result<Self> {
        let port = serialport::new(path, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(config.read_timeout_ms))
            .open()
            .map_err(|e| Error::Config(format!("Failed to open UART {}: {}", path, e)))?;

        log::info!("Opened UART {} at {} baud", path, config.baud_rate);

        Ok(UartTransport {
            port: Some(port),
            path: path.to_string(),
        })
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| Error::Communication("UART transport is closed".to_string()))
    }
}

impl Transport for UartTransport {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Uart
    }

    fn exchange(&mut self, tx: &[u8], rx_len: usize) -> Result<Vec<u8>> {
        let port = self.port()?;

        if !tx.is_empty() {
            port.write_all(tx)
                .and_then(|_| port.flush())
                .map_err(|e| Error::Communication(format!("UART write failed: {}", e)))?;
        }

        let want = rx_len.min(UART_MAX_RESPONSE_LEN);
        if want == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; want];
        match port.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => Err(Error::Communication(format!("UART read failed: {}", e))),
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            log::info!("Closed UART {}", self.path);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }
}

impl Drop for UartTransport {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
