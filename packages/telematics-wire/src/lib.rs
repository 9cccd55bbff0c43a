//! # telematics-wire
//!
//! Teltonika FMB wire protocol: Codec 8 Extended AVL records (uplink) and
//! Codec 12 textual commands (downlink), plus the shared frame envelope and
//! CRC-16/IBM implementation they both sit on.
//!
//! Everything here is a pure function over byte slices — no sockets, no
//! clock access beyond an explicitly passed-in fallback timestamp. That
//! makes the whole crate exhaustively unit- and property-testable, and is
//! the only crate the device simulator needs to link against.

pub mod codec12;
pub mod codec8e;
pub mod crc;
pub mod cursor;
pub mod error;
pub mod framer;
pub mod record;

pub use error::{WireError, WireResult};
pub use record::{IoPoint, Record};
