//! Position report decoding
//!
//! Response layout:
//!
//! ```text
//! [0x40] [count] [errcode] [record 0] ... [record count-1]
//!
//! record (15 bytes, little-endian):
//!   id: u16 | x_mm: i32 | y_mm: i32 | z_mm: i32 | quality: u8
//! ```
//!
//! The anchor ID travels inside every record, so readings map to IDs
//! directly without a separate discovery step.

use super::constants::*;
use crate::core::types::{AnchorReading, Position};
use crate::error::{Error, Result};

/// Decode a position report into anchor readings (response order kept)
pub fn decode_position_report(bytes: &[u8]) -> Result<Vec<AnchorReading>> {
    if bytes.len() < POSITION_HEADER_LEN {
        return Err(Error::MalformedResponse(format!(
            "position report header needs {} bytes, got {}",
            POSITION_HEADER_LEN,
            bytes.len()
        )));
    }
    if bytes[0] != RESP_POSITION_REPORT {
        return Err(Error::MalformedResponse(format!(
            "unexpected response type {:#04x}",
            bytes[0]
        )));
    }

    let errcode = bytes[OFFSET_ERRCODE];
    if errcode != 0 {
        return Err(Error::DeviceError(errcode));
    }

    let count = bytes[OFFSET_COUNT] as usize;
    let needed = POSITION_HEADER_LEN + count * POSITION_RECORD_LEN;
    if bytes.len() < needed {
        return Err(Error::MalformedResponse(format!(
            "{} anchors declared, need {} bytes, got {}",
            count,
            needed,
            bytes.len()
        )));
    }

    let readings = bytes[POSITION_HEADER_LEN..needed]
        .chunks_exact(POSITION_RECORD_LEN)
        .map(decode_record)
        .collect();
    Ok(readings)
}

fn decode_record(rec: &[u8]) -> AnchorReading {
    let id = u16::from_le_bytes([rec[RECORD_OFFSET_ID], rec[RECORD_OFFSET_ID + 1]]);
    let position = Position::new(
        read_i32(rec, RECORD_OFFSET_X),
        read_i32(rec, RECORD_OFFSET_Y),
        read_i32(rec, RECORD_OFFSET_Z),
    );
    AnchorReading::from_position(id, position, rec[RECORD_OFFSET_QUALITY])
}

#[inline]
fn read_i32(rec: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes([
        rec[offset],
        rec[offset + 1],
        rec[offset + 2],
        rec[offset + 3],
    ])
}

/// Build the wire bytes of a position report
///
/// Used by the mock module; real modules produce these bytes themselves.
pub fn encode_position_report(errcode: u8, records: &[(u16, Position, u8)]) -> Vec<u8> {
    let mut out = Vec::with_capacity(POSITION_HEADER_LEN + records.len() * POSITION_RECORD_LEN);
    out.push(RESP_POSITION_REPORT);
    out.push(records.len() as u8);
    out.push(errcode);
    if errcode != 0 {
        return out;
    }
    for (id, pos, quality) in records {
        out.extend_from_slice(&id.to_le_bytes());
        out.extend_from_slice(&pos.x_mm.to_le_bytes());
        out.extend_from_slice(&pos.y_mm.to_le_bytes());
        out.extend_from_slice(&pos.z_mm.to_le_bytes());
        out.push(*quality);
    }
    out
}
