//! TLV frame encoding and decoding
//!
//! ```text
//! ┌──────────┬─────────────┬──────────────────────┐
//! │ Tag (1)  │ Length (1)  │ Value (Length bytes) │
//! │ command  │ 0..=254     │                      │
//! └──────────┴─────────────┴──────────────────────┘
//! ```

use super::constants::{TLV_HEADER_LEN, TLV_MAX_VALUE_LEN};
use crate::error::{Error, Result};

/// One tag-length-value frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlvFrame {
    tag: u8,
    value: Vec<u8>,
}

impl TlvFrame {
    /// Create a frame, rejecting values that do not fit the length byte
    pub fn new(tag: u8, value: &[u8]) -> Result<Self> {
        if value.len() > TLV_MAX_VALUE_LEN {
            return Err(Error::InvalidRequest(format!(
                "payload of {} bytes exceeds {} byte limit",
                value.len(),
                TLV_MAX_VALUE_LEN
            )));
        }
        Ok(Self {
            tag,
            value: value.to_vec(),
        })
    }

    /// Frame with no value bytes
    pub fn command(tag: u8) -> Self {
        Self {
            tag,
            value: Vec::new(),
        }
    }

    pub fn tag(&self) -> u8 {
        self.tag
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Length byte as sent on the wire
    pub fn length(&self) -> u8 {
        // Bounded by TLV_MAX_VALUE_LEN in every constructor
        self.value.len() as u8
    }

    /// Wire bytes: `[tag, length, value...]`
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(TLV_HEADER_LEN + self.value.len());
        out.push(self.tag);
        out.push(self.length());
        out.extend_from_slice(&self.value);
        out
    }

    /// Parse one frame from the start of `bytes`
    ///
    /// Returns the frame and the number of bytes consumed.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize)> {
        if bytes.len() < TLV_HEADER_LEN {
            return Err(Error::MalformedResponse(format!(
                "TLV header needs {} bytes, got {}",
                TLV_HEADER_LEN,
                bytes.len()
            )));
        }
        let tag = bytes[0];
        let len = bytes[1] as usize;
        if len > TLV_MAX_VALUE_LEN {
            return Err(Error::MalformedResponse(format!(
                "TLV length byte {:#04x} is reserved",
                bytes[1]
            )));
        }
        let end = TLV_HEADER_LEN + len;
        if bytes.len() < end {
            return Err(Error::MalformedResponse(format!(
                "TLV tag {:#04x} declares {} value bytes, only {} present",
                tag,
                len,
                bytes.len() - TLV_HEADER_LEN
            )));
        }
        Ok((
            Self {
                tag,
                value: bytes[TLV_HEADER_LEN..end].to_vec(),
            },
            end,
        ))
    }
}
