//! UWB module protocol: TLV framing, bus handshakes and response decoding

pub mod codec;
pub mod constants;
pub mod position;
pub mod tlv;

pub use codec::{HandshakeTiming, ResponseFraming, TlvCodec};
pub use position::decode_position_report;
pub use tlv::TlvFrame;
