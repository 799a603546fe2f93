//! Core data types shared by the codec, registry and store.
//!
//! - [`types::AnchorReading`]: one decoded anchor record
//! - [`types::DistanceSnapshot`]: all readings from one poll

pub mod types;
