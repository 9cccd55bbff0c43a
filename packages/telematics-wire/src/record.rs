//! Decoded AVL record types. Mirrors the fields `original_source`'s
//! `parse_avl_packet`/`debug_script.py` extract, normalized to the §3 data
//! model (UTC seconds, unsigned IO magnitudes).

/// One uplink AVL row.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// UTC seconds since epoch.
    pub timestamp: i64,
    pub priority: u8,
    /// Decimal degrees.
    pub longitude: f64,
    /// Decimal degrees.
    pub latitude: f64,
    pub altitude: i16,
    pub angle: u16,
    pub satellites: u8,
    pub speed: u16,
    pub event_io_id: u16,
    pub ios: Vec<IoPoint>,
    /// Set when the wire timestamp was out of range and the decoder
    /// substituted wall-clock time for this record (spec.md §4.2, §7).
    pub timestamp_substituted: bool,
}

impl Record {
    /// The last IO element with the given id, wire order. Width classes are
    /// decoded in 1→2→4→8→variable order and later classes win ties, so a
    /// simple forward scan taking the last match reproduces "last write wins"
    /// (spec.md §4.5's tie-break).
    pub fn io_value(&self, io_id: u16) -> Option<u64> {
        self.ios.iter().rev().find(|p| p.io_id == io_id).map(|p| p.value)
    }
}

/// One decoded IO element. Wire width is 1/2/4/8 bytes or a variable-length
/// big-endian magnitude; the decoded value is always stored as `u64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoPoint {
    pub io_id: u16,
    pub value: u64,
}

/// Raw signed 32-bit wire integer scaled by 1e-7, preserving sign, as used
/// for both longitude and latitude.
pub fn decode_coordinate(raw: i32) -> f64 {
    raw as f64 * 1e-7
}

/// Inverse of [`decode_coordinate`], used by the encoder and round-trip tests.
pub fn encode_coordinate(degrees: f64) -> i32 {
    (degrees / 1e-7).round() as i32
}
