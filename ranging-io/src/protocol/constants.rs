//! Constants for the UWB module TLV protocol

// Frame layout
pub const TLV_HEADER_LEN: usize = 2; // tag + length
pub const TLV_MAX_VALUE_LEN: usize = 254; // 0xFF is reserved on the length byte

// Command tags
pub const CMD_POSITION_REPORT: u8 = 0x0C; // Request anchor positions, empty payload

// Response types
pub const RESP_POSITION_REPORT: u8 = 0x40;

// Position report layout
pub const POSITION_HEADER_LEN: usize = 3; // type + count + errcode
pub const POSITION_RECORD_LEN: usize = 15; // id(2) + x(4) + y(4) + z(4) + quality(1)
pub const OFFSET_COUNT: usize = 1;
pub const OFFSET_ERRCODE: usize = 2;
pub const RECORD_OFFSET_ID: usize = 0;
pub const RECORD_OFFSET_X: usize = 2;
pub const RECORD_OFFSET_Y: usize = 6;
pub const RECORD_OFFSET_Z: usize = 10;
pub const RECORD_OFFSET_QUALITY: usize = 14;

// SPI handshake
pub const SPI_DONT_CARE: u8 = 0xFF; // Filler clocked out while reading
pub const SPI_LENGTH_NOT_READY: u8 = 0x00;
pub const SPI_LENGTH_INVALID: u8 = 0xFF;

// UART handshake
pub const UART_MAX_RESPONSE_LEN: usize = 255; // Assembled responses must stay below this
