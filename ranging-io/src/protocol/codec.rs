//! Request/response handshakes over either bus
//!
//! # SPI
//!
//! ```text
//! host → [tag len value...]            full-duplex, received bytes ignored
//! host → [FF] ← [00]                   length probe, repeated every probe_interval
//! host → [FF] ← [N]                    N != 0 settles the length (0xFF is invalid)
//! host → [FF × N] ← [response × N]     payload read
//! ```
//!
//! # UART
//!
//! The frame is written once, then reads are accumulated until the
//! response's own header says it is complete.
//!
//! Both handshakes are bounded by `response_timeout`. Nothing cancels a
//! transfer already handed to the bus.

use super::constants::*;
use super::position::decode_position_report;
use super::tlv::TlvFrame;
use crate::config::HandshakeConfig;
use crate::core::types::AnchorReading;
use crate::error::{Error, Result};
use crate::transport::{ChannelKind, Transport};
use std::thread;
use std::time::{Duration, Instant};

/// Timing bounds for one request/response handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeTiming {
    /// Sleep between SPI length probes (and between empty UART reads)
    pub probe_interval: Duration,
    /// Overall bound from request sent to response complete
    pub response_timeout: Duration,
}

impl Default for HandshakeTiming {
    fn default() -> Self {
        Self::from(&HandshakeConfig::default())
    }
}

impl From<&HandshakeConfig> for HandshakeTiming {
    fn from(config: &HandshakeConfig) -> Self {
        Self {
            probe_interval: Duration::from_micros(config.probe_interval_us),
            response_timeout: Duration::from_millis(config.response_timeout_ms),
        }
    }
}

/// How a response announces its own total length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFraming {
    /// `[type, len, value × len]`
    Tlv,
    /// `[0x40, count, errcode, record × count]`
    PositionReport,
}

impl ResponseFraming {
    /// Total response length once enough of the header has arrived
    ///
    /// A position report with a non-zero error code carries no records,
    /// whatever its count byte says.
    pub fn expected_len(&self, prefix: &[u8]) -> Option<usize> {
        match self {
            ResponseFraming::Tlv => Some(TLV_HEADER_LEN + *prefix.get(1)? as usize),
            ResponseFraming::PositionReport => {
                let count = *prefix.get(OFFSET_COUNT)? as usize;
                if *prefix.get(OFFSET_ERRCODE)? != 0 {
                    return Some(POSITION_HEADER_LEN);
                }
                Some(POSITION_HEADER_LEN + count * POSITION_RECORD_LEN)
            }
        }
    }
}

/// TLV codec driving one transport
///
/// Owns the transport, so at most one handshake is ever in flight.
pub struct TlvCodec {
    transport: Box<dyn Transport>,
    timing: HandshakeTiming,
}

impl TlvCodec {
    pub fn new(transport: Box<dyn Transport>, timing: HandshakeTiming) -> Self {
        Self { transport, timing }
    }

    pub fn kind(&self) -> ChannelKind {
        self.transport.kind()
    }

    pub fn timing(&self) -> HandshakeTiming {
        self.timing
    }

    /// Send a request and return the raw response bytes
    pub fn transact(&mut self, request: &TlvFrame, framing: ResponseFraming) -> Result<Vec<u8>> {
        let frame = request.encode();
        log::trace!("TX tag={:#04x} {:02X?}", request.tag(), frame);

        let response = match self.transport.kind() {
            ChannelKind::Spi => self.transact_spi(&frame)?,
            ChannelKind::Uart => self.transact_uart(&frame, framing)?,
        };

        log::trace!("RX {} bytes {:02X?}", response.len(), response);
        Ok(response)
    }

    /// Request anchor positions and decode them into readings
    pub fn request_positions(&mut self) -> Result<Vec<AnchorReading>> {
        let request = TlvFrame::command(CMD_POSITION_REPORT);
        let response = self.transact(&request, ResponseFraming::PositionReport)?;
        decode_position_report(&response)
    }

    /// Close the underlying transport
    pub fn close(&mut self) -> Result<()> {
        self.transport.close()
    }

    fn transact_spi(&mut self, frame: &[u8]) -> Result<Vec<u8>> {
        self.transport.exchange(frame, frame.len())?;

        let len = self.probe_length()? as usize;
        let response = self.transport.exchange(&[], len)?;
        if response.len() != len {
            return Err(Error::Communication(format!(
                "SPI payload read returned {} of {} bytes",
                response.len(),
                len
            )));
        }
        Ok(response)
    }

    /// Poll the 1-byte length until it becomes non-zero
    fn probe_length(&mut self) -> Result<u8> {
        let deadline = Instant::now() + self.timing.response_timeout;
        let mut probes: u32 = 0;

        loop {
            let rx = self.transport.exchange(&[SPI_DONT_CARE], 1)?;
            probes += 1;

            match rx.first().copied().unwrap_or(SPI_LENGTH_NOT_READY) {
                SPI_LENGTH_NOT_READY => {}
                SPI_LENGTH_INVALID => {
                    return Err(Error::Communication(
                        "length probe settled on 0xFF".to_string(),
                    ));
                }
                len => {
                    log::trace!("Length {} after {} probes", len, probes);
                    return Ok(len);
                }
            }

            if Instant::now() >= deadline {
                return Err(Error::Communication(format!(
                    "no response length after {} probes in {:?}",
                    probes, self.timing.response_timeout
                )));
            }
            thread::sleep(self.timing.probe_interval);
        }
    }

    fn transact_uart(&mut self, frame: &[u8], framing: ResponseFraming) -> Result<Vec<u8>> {
        let deadline = Instant::now() + self.timing.response_timeout;
        let mut buf = self.transport.exchange(frame, UART_MAX_RESPONSE_LEN)?;

        loop {
            if buf.len() >= UART_MAX_RESPONSE_LEN {
                return Err(Error::Communication(format!(
                    "UART response reached {} bytes",
                    buf.len()
                )));
            }

            if let Some(expected) = framing.expected_len(&buf) {
                if expected >= UART_MAX_RESPONSE_LEN {
                    return Err(Error::Communication(format!(
                        "UART response declares {} bytes",
                        expected
                    )));
                }
                if buf.len() >= expected {
                    if buf.len() > expected {
                        log::debug!("Dropping {} trailing UART bytes", buf.len() - expected);
                        buf.truncate(expected);
                    }
                    return Ok(buf);
                }
            }

            if Instant::now() >= deadline {
                return Err(Error::Communication(if buf.is_empty() {
                    format!("no UART response in {:?}", self.timing.response_timeout)
                } else {
                    format!(
                        "UART response incomplete after {:?} ({} bytes)",
                        self.timing.response_timeout,
                        buf.len()
                    )
                }));
            }

            let chunk = self
                .transport
                .exchange(&[], UART_MAX_RESPONSE_LEN - buf.len())?;
            if chunk.is_empty() {
                thread::sleep(self.timing.probe_interval);
            }
            buf.extend_from_slice(&chunk);
        }
    }
}

impl Drop for TlvCodec {
    fn drop(&mut self) {
        let _ = self.transport.close();
    }
}
