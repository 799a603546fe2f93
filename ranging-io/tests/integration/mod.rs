//! Integration tests for ranging-io using the mock module
//!
//! Every test drives a full `RangingModule` over `MockTransport`: the real
//! codec handshakes, poll thread, registry and event fan-out all run.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p ranging-io --test integration -- --nocapture
//! ```

mod faults;
mod harness;
mod lifecycle;
mod tag_events;
