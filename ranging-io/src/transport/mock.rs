//! Mock transport simulating a UWB module
//!
//! Speaks the module side of the protocol on either bus kind, so the codec,
//! poller and facade can be exercised without hardware. Clones share state:
//! keep one clone in the test to script anchors and inject faults while the
//! poller owns the other.

use super::{full_duplex_tx, ChannelKind, Transport};
use crate::core::types::{AnchorId, Position};
use crate::error::{Error, Result};
use crate::protocol::constants::{CMD_POSITION_REPORT, RESP_POSITION_REPORT, SPI_DONT_CARE};
use crate::protocol::position::encode_position_report;
use crate::protocol::tlv::TlvFrame;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Mock transport for unit testing and hardware-free demos
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

struct MockTransportInner {
    kind: ChannelKind,
    anchors: Vec<(AnchorId, Position, u8)>,
    error_code: u8,
    raw_response: Option<Vec<u8>>,

    // SPI fault knobs
    probe_delay: usize,
    stuck_probe: bool,
    probe_length_override: Option<u8>,

    // UART fault knobs
    uart_chunk: usize,
    silent: bool,

    // SPI handshake state
    pending: Option<Vec<u8>>,
    probes_seen: usize,

    // UART receive queue
    rx_queue: VecDeque<u8>,

    requests: Vec<Vec<u8>>,
    exchange_count: u64,
    closed: bool,
    close_count: u32,
}

impl MockTransport {
    /// Create a new mock module on the given bus kind
    pub fn new(kind: ChannelKind) -> Self {
        MockTransport {
            inner: Arc::new(Mutex::new(MockTransportInner {
                kind,
                anchors: Vec::new(),
                error_code: 0,
                raw_response: None,
                probe_delay: 0,
                stuck_probe: false,
                probe_length_override: None,
                uart_chunk: usize::MAX,
                silent: false,
                pending: None,
                probes_seen: 0,
                rx_queue: VecDeque::new(),
                requests: Vec::new(),
                exchange_count: 0,
                closed: false,
                close_count: 0,
            })),
        }
    }

    pub fn spi() -> Self {
        Self::new(ChannelKind::Spi)
    }

    pub fn uart() -> Self {
        Self::new(ChannelKind::Uart)
    }

    /// Replace the anchors reported by position requests
    pub fn set_anchors(&self, anchors: &[(AnchorId, Position, u8)]) {
        self.inner.lock().anchors = anchors.to_vec();
    }

    /// Add or replace one anchor
    pub fn upsert_anchor(&self, id: AnchorId, position: Position, quality: u8) {
        let mut inner = self.inner.lock();
        match inner.anchors.iter_mut().find(|(aid, _, _)| *aid == id) {
            Some(entry) => *entry = (id, position, quality),
            None => inner.anchors.push((id, position, quality)),
        }
    }

    pub fn remove_anchor(&self, id: AnchorId) {
        self.inner.lock().anchors.retain(|(aid, _, _)| *aid != id);
    }

    /// Error code placed in position reports (0 = ok)
    pub fn set_error_code(&self, code: u8) {
        self.inner.lock().error_code = code;
    }

    /// Answer every request with these exact bytes instead of a generated report
    pub fn set_raw_response(&self, bytes: Option<Vec<u8>>) {
        self.inner.lock().raw_response = bytes;
    }

    /// SPI: number of length probes answered with 0x00 before the length
    pub fn set_probe_delay(&self, probes: usize) {
        self.inner.lock().probe_delay = probes;
    }

    /// SPI: answer every length probe with 0x00
    pub fn set_stuck_probe(&self, stuck: bool) {
        self.inner.lock().stuck_probe = stuck;
    }

    /// SPI: answer length probes with this byte instead of the real length
    pub fn set_probe_length_override(&self, value: Option<u8>) {
        self.inner.lock().probe_length_override = value;
    }

    /// UART: maximum bytes delivered per read
    pub fn set_uart_chunk_size(&self, bytes: usize) {
        self.inner.lock().uart_chunk = bytes.max(1);
    }

    /// UART: swallow requests without answering
    pub fn set_silent(&self, silent: bool) {
        self.inner.lock().silent = silent;
    }

    /// Total `exchange` calls seen
    pub fn exchange_count(&self) -> u64 {
        self.inner.lock().exchange_count
    }

    /// Request frames received, in order
    pub fn requests(&self) -> Vec<Vec<u8>> {
        self.inner.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.inner.lock().requests.len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Number of `close` calls that actually released the handle
    pub fn close_count(&self) -> u32 {
        self.inner.lock().close_count
    }
}

impl MockTransportInner {
    /// Record a request frame and build the module's answer
    fn handle_request(&mut self, tx: &[u8]) -> Vec<u8> {
        self.requests.push(tx.to_vec());

        if let Some(ref raw) = self.raw_response {
            return raw.clone();
        }

        match TlvFrame::decode(tx) {
            Ok((frame, _)) if frame.tag() == CMD_POSITION_REPORT => {
                encode_position_report(self.error_code, &self.anchors)
            }
            // Generic acknowledgement: [type, len=1, errcode]
            Ok(_) => vec![RESP_POSITION_REPORT, 0x01, self.error_code],
            Err(e) => {
                log::debug!("Mock module ignoring unparseable request: {}", e);
                Vec::new()
            }
        }
    }

    fn exchange_spi(&mut self, tx: &[u8], rx_len: usize) -> Vec<u8> {
        let is_filler = tx.iter().all(|&b| b == SPI_DONT_CARE);

        // Any non-filler byte starts a new request, whatever state we were in
        if !is_filler {
            let response = self.handle_request(&full_duplex_tx(tx, rx_len.max(tx.len())));
            self.pending = Some(response);
            self.probes_seen = 0;
            return vec![0u8; rx_len];
        }

        let Some(pending) = self.pending.as_ref() else {
            return vec![0u8; rx_len];
        };

        if rx_len == 1 {
            // Length probe
            if self.stuck_probe {
                return vec![0x00];
            }
            if self.probes_seen < self.probe_delay {
                self.probes_seen += 1;
                return vec![0x00];
            }
            let len = self
                .probe_length_override
                .unwrap_or(pending.len().min(u8::MAX as usize) as u8);
            return vec![len];
        }

        // Payload read
        let response = self.pending.take().unwrap_or_default();
        let mut out = response;
        out.resize(rx_len, SPI_DONT_CARE);
        out
    }

    fn exchange_uart(&mut self, tx: &[u8], rx_len: usize) -> Vec<u8> {
        if !tx.is_empty() {
            let response = self.handle_request(tx);
            if !self.silent {
                self.rx_queue.extend(response);
            }
        }

        let n = rx_len.min(self.uart_chunk).min(self.rx_queue.len());
        self.rx_queue.drain(..n).collect()
    }
}

impl Transport for MockTransport {
    fn kind(&self) -> ChannelKind {
        self.inner.lock().kind
    }

    fn exchange(&mut self, tx: &[u8], rx_len: usize) -> Result<Vec<u8>> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(Error::Communication(
                "mock transport is closed".to_string(),
            ));
        }
        inner.exchange_count += 1;

        Ok(match inner.kind {
            ChannelKind::Spi => inner.exchange_spi(tx, rx_len),
            ChannelKind::Uart => inner.exchange_uart(tx, rx_len),
        })
    }

    fn close(&mut self) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.closed {
            inner.closed = true;
            inner.close_count += 1;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.inner.lock().closed
    }
}
