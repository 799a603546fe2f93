//! ranging-io - UWB ranging module driver
//!
//! Talks to a UWB ranging module over SPI or UART, polls it for anchor
//! positions on a background thread, and keeps the latest distance per
//! anchor in a shared store. Listeners get connect, disconnect and
//! data-available events as anchors come and go.
//!
//! ```no_run
//! use ranging_io::{ListenerScope, RangingConfig, RangingModule, TagEvent};
//!
//! let module = RangingModule::open(RangingConfig::default().with_channel("UART1"))?;
//! module.subscribe(ListenerScope::AllTags, |event| {
//!     if let TagEvent::Connected(readings) = event {
//!         println!("{} anchors connected", readings.len());
//!     }
//! });
//! module.start_default()?;
//! # Ok::<(), ranging_io::Error>(())
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod poller;
pub mod protocol;
mod ranging;
mod registry;
pub mod store;
pub mod transport;

pub use config::RangingConfig;
pub use crate::core::types::{AnchorId, AnchorReading, DistanceSnapshot, Position};
pub use error::{Error, ErrorKind, Result};
pub use events::{ListenerScope, SubscriptionId, TagEvent};
pub use poller::PollStatsSnapshot;
pub use ranging::RangingModule;
pub use registry::TagDiff;
pub use transport::mock::MockTransport;
pub use transport::{ChannelKind, Transport};
