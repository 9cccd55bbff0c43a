use thiserror::Error;

/// Structural errors from the framer and codecs.
///
/// `BadTimestamp` from spec.md §7 deliberately has no variant here: per the
/// decoder's contract it never aborts a record, so it is represented as a
/// recovered value (`Record::timestamp_substituted`) rather than an `Err`.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum WireError {
    #[error("frame truncated: needed {needed} bytes, had {available}")]
    Truncated { needed: usize, available: usize },

    #[error("bad preamble: expected 0x00000000, got {0:#010x}")]
    BadPreamble(u32),

    #[error("CRC mismatch: expected {expected:#06x}, computed {computed:#06x}")]
    BadCrc { expected: u16, computed: u16 },

    #[error("unsupported codec id {0:#04x}")]
    UnsupportedCodec(u8),

    #[error("record count mismatch: n_start={n_start} n_end={n_end}")]
    CountMismatch { n_start: u8, n_end: u8 },

    #[error("bad codec 12 response codec id {0:#04x}, expected 0x0c")]
    BadCodec(u8),

    #[error("bad codec 12 response type {0:#04x}, expected 0x06")]
    BadResponseType(u8),

    #[error("codec 12 quantity mismatch: opening={opening} closing={closing}")]
    QuantityMismatch { opening: u8, closing: u8 },
}

pub type WireResult<T> = Result<T, WireError>;
