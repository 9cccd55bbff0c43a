//! Length-prefixed frame envelope shared by both the Codec 8E uplink and the
//! Codec 12 downlink/response frames: `[preamble][data_length][data_field][crc]`.
//! Pure byte-slice in, byte-slice/`Vec<u8>` out — the actual socket reads live
//! in the gateway's session handler, which reads the 8-byte header first to
//! learn `data_length` before reading the rest.

use crate::crc::crc16_ibm;
use crate::cursor::Cursor;
use crate::error::{WireError, WireResult};

pub const HEADER_LEN: usize = 8;

/// Reads the 4-byte preamble and 4-byte data length from the first 8 bytes
/// of a frame, without touching the body. Lets the caller decide how many
/// more bytes to read off the socket.
pub fn peek_data_length(header: &[u8]) -> WireResult<u32> {
    let mut c = Cursor::new(header);
    let preamble = c.read_u32()?;
    if preamble != 0 {
        return Err(WireError::BadPreamble(preamble));
    }
    c.read_u32()
}

/// Decodes a complete envelope (`header || data_field || crc`) and returns
/// the validated `data_field`.
pub fn decode_envelope(frame: &[u8]) -> WireResult<&[u8]> {
    let mut c = Cursor::new(frame);
    let preamble = c.read_u32()?;
    if preamble != 0 {
        return Err(WireError::BadPreamble(preamble));
    }
    let data_length = c.read_u32()? as usize;
    let data_field = c.read_bytes(data_length)?;
    let crc_field = c.read_u32()?;
    let expected = (crc_field & 0xFFFF) as u16;
    let computed = crc16_ibm(data_field);
    if computed != expected {
        return Err(WireError::BadCrc {
            expected,
            computed,
        });
    }
    Ok(data_field)
}

/// Builds a complete envelope around `data_field`.
pub fn encode_envelope(data_field: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + data_field.len() + 4);
    out.extend_from_slice(&0u32.to_be_bytes());
    out.extend_from_slice(&(data_field.len() as u32).to_be_bytes());
    out.extend_from_slice(data_field);
    let crc = crc16_ibm(data_field) as u32;
    out.extend_from_slice(&crc.to_be_bytes());
    out
}

/// Validates an IMEI handshake payload (the ASCII bytes that follow the
/// 2-byte length prefix): length in `[1, 17]`, all-ASCII, trailing NULs
/// trimmed. Returns `None` if the payload should be rejected.
pub fn parse_imei_payload(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() || bytes.len() > 17 {
        return None;
    }
    if !bytes.is_ascii() {
        return None;
    }
    let trimmed = bytes
        .iter()
        .rposition(|&b| b != 0)
        .map(|last| &bytes[..=last])
        .unwrap_or(&[]);
    if trimmed.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(trimmed).into_owned())
}

/// Builds the `[2B length][ascii bytes]` IMEI handshake frame, used by the
/// device simulator and tests.
pub fn build_imei_handshake(imei: &str) -> Vec<u8> {
    let bytes = imei.as_bytes();
    let mut out = Vec::with_capacity(2 + bytes.len());
    out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
    out.extend_from_slice(bytes);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips() {
        let data_field = b"hello world".to_vec();
        let frame = encode_envelope(&data_field);
        let decoded = decode_envelope(&frame).unwrap();
        assert_eq!(decoded, data_field.as_slice());
    }

    #[test]
    fn envelope_rejects_bad_crc() {
        let mut frame = encode_envelope(b"payload");
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        assert!(matches!(decode_envelope(&frame), Err(WireError::BadCrc { .. })));
    }

    #[test]
    fn envelope_rejects_bad_preamble() {
        let mut frame = encode_envelope(b"payload");
        frame[0] = 0x01;
        assert!(matches!(decode_envelope(&frame), Err(WireError::BadPreamble(_))));
    }

    #[test]
    fn imei_handshake_accepts_valid_imei() {
        assert_eq!(
            parse_imei_payload(b"123456789012345"),
            Some("123456789012345".to_string())
        );
    }

    #[test]
    fn imei_handshake_trims_trailing_nuls() {
        assert_eq!(parse_imei_payload(b"123\0\0\0"), Some("123".to_string()));
    }

    #[test]
    fn imei_handshake_rejects_too_long() {
        assert_eq!(parse_imei_payload(&[b'1'; 18]), None);
    }

    #[test]
    fn imei_handshake_rejects_non_ascii() {
        assert_eq!(parse_imei_payload(&[0xff, 0xfe]), None);
    }
}
