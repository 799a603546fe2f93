//! Core data types for anchor readings and snapshots.
//!
//! Key types:
//! - [`AnchorReading`]: Distance and quality for one anchor, decoded from a position record
//! - [`DistanceSnapshot`]: Complete anchor ID → reading mapping from one poll

use crate::error::{Error, Result};
use std::collections::HashMap;

/// Short UWB address of an anchor as reported by the module
pub type AnchorId = u16;

/// Anchor position relative to the local module (millimetres)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub x_mm: i32,
    pub y_mm: i32,
    pub z_mm: i32,
}

impl Position {
    pub const fn new(x_mm: i32, y_mm: i32, z_mm: i32) -> Self {
        Self { x_mm, y_mm, z_mm }
    }

    /// Euclidean norm rounded to the nearest millimetre
    ///
    /// Squares are summed in `u128`, so every `i32` triple is exact.
    pub fn distance_mm(&self) -> u32 {
        let sq = |v: i32| {
            let v = v.unsigned_abs() as u128;
            v * v
        };
        let sum = sq(self.x_mm) + sq(self.y_mm) + sq(self.z_mm);
        // sqrt(3 * 2^62) < u32::MAX
        rounded_isqrt(sum) as u32
    }
}

/// Integer square root rounded to nearest (ties cannot occur for integers)
fn rounded_isqrt(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    // Newton iteration from an upper bound
    let mut x = n;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }
    // x = floor(sqrt(n)); round up when n - x^2 > x, i.e. n >= (x + 0.5)^2
    if n - x * x > x {
        x + 1
    } else {
        x
    }
}

/// One anchor record from a position report
///
/// Produced fresh on every successful poll and replaced wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorReading {
    pub id: AnchorId,
    pub distance_mm: u32,
    pub quality: u8,
    pub position: Position,
}

impl AnchorReading {
    /// Build a reading from a decoded position, deriving the distance
    pub fn from_position(id: AnchorId, position: Position, quality: u8) -> Self {
        Self {
            id,
            distance_mm: position.distance_mm(),
            quality,
            position,
        }
    }
}

/// Complete set of readings from one poll
///
/// Keys are unique; iteration follows the order of the poll response.
#[derive(Debug, Clone, Default)]
pub struct DistanceSnapshot {
    readings: Vec<AnchorReading>,
    index: HashMap<AnchorId, usize>,
    timestamp_us: u64,
}

impl DistanceSnapshot {
    /// Empty snapshot (no anchors known)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot, rejecting duplicate anchor IDs
    pub fn from_readings(readings: Vec<AnchorReading>) -> Result<Self> {
        let mut index = HashMap::with_capacity(readings.len());
        for (i, reading) in readings.iter().enumerate() {
            if index.insert(reading.id, i).is_some() {
                return Err(Error::MalformedResponse(format!(
                    "anchor {:#06x} reported twice",
                    reading.id
                )));
            }
        }
        Ok(Self {
            readings,
            index,
            timestamp_us: current_timestamp_us(),
        })
    }

    pub fn get(&self, id: AnchorId) -> Option<&AnchorReading> {
        self.index.get(&id).map(|&i| &self.readings[i])
    }

    pub fn contains(&self, id: AnchorId) -> bool {
        self.index.contains_key(&id)
    }

    /// Anchor IDs in poll-response order
    pub fn ids(&self) -> Vec<AnchorId> {
        self.readings.iter().map(|r| r.id).collect()
    }

    pub fn readings(&self) -> &[AnchorReading] {
        &self.readings
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnchorReading> {
        self.readings.iter()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Creation time (microseconds since UNIX epoch, 0 for the empty snapshot)
    pub fn timestamp_us(&self) -> u64 {
        self.timestamp_us
    }
}

fn current_timestamp_us() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}
