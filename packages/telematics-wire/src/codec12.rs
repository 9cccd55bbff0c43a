//! Codec 12 downlink command builder and response parser (spec.md §4.3).

use crate::cursor::Cursor;
use crate::error::{WireError, WireResult};

pub const CODEC_ID: u8 = 0x0C;
const REQUEST_TYPE: u8 = 0x05;
const RESPONSE_TYPE: u8 = 0x06;
const QUANTITY: u8 = 0x01;

/// A parsed Codec 12 command response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    pub body: String,
    pub success: bool,
}

/// The two-token success criterion from spec.md §4.3: a response body is
/// treated as successful iff it contains the substring `OK`.
pub fn is_ok(body: &str) -> bool {
    body.contains("OK")
}

/// Builds the Codec 12 request `data_field` for `command`
/// (`[codec][quantity][type=0x05][cmd_length][cmd bytes][quantity]`).
pub fn build_command_data_field(command: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + command.len());
    out.push(CODEC_ID);
    out.push(QUANTITY);
    out.push(REQUEST_TYPE);
    out.extend_from_slice(&(command.len() as u32).to_be_bytes());
    out.extend_from_slice(command);
    out.push(QUANTITY);
    out
}

/// Parses a Codec 12 request `data_field`
/// (`[codec][quantity][type=0x05][cmd_length][ascii][quantity]`), the
/// inverse of [`build_command_data_field`]. Used by a device-side peer (e.g.
/// the simulator) to read back the command text the gateway sent.
pub fn parse_command_data_field(data: &[u8]) -> WireResult<String> {
    let mut c = Cursor::new(data);

    let codec_id = c.read_u8()?;
    if codec_id != CODEC_ID {
        return Err(WireError::BadCodec(codec_id));
    }
    let opening_quantity = c.read_u8()?;
    let request_type = c.read_u8()?;
    if request_type != REQUEST_TYPE {
        return Err(WireError::BadResponseType(request_type));
    }
    let cmd_length = c.read_u32()? as usize;
    let cmd_bytes = c.read_bytes(cmd_length)?;
    let closing_quantity = c.read_u8()?;

    if opening_quantity != closing_quantity {
        return Err(WireError::QuantityMismatch {
            opening: opening_quantity,
            closing: closing_quantity,
        });
    }

    Ok(String::from_utf8_lossy(cmd_bytes).into_owned())
}

/// Parses a Codec 12 response `data_field`
/// (`[codec][quantity][type=0x06][resp_length][ascii][quantity]`).
pub fn parse_response_data_field(data: &[u8]) -> WireResult<CommandResponse> {
    let mut c = Cursor::new(data);

    let codec_id = c.read_u8()?;
    if codec_id != CODEC_ID {
        return Err(WireError::BadCodec(codec_id));
    }
    let opening_quantity = c.read_u8()?;
    let response_type = c.read_u8()?;
    if response_type != RESPONSE_TYPE {
        return Err(WireError::BadResponseType(response_type));
    }
    let resp_length = c.read_u32()? as usize;
    let body_bytes = c.read_bytes(resp_length)?;
    let closing_quantity = c.read_u8()?;

    if opening_quantity != closing_quantity {
        return Err(WireError::QuantityMismatch {
            opening: opening_quantity,
            closing: closing_quantity,
        });
    }

    let body = String::from_utf8_lossy(body_bytes).into_owned();
    let success = is_ok(&body);
    Ok(CommandResponse { body, success })
}

/// Builds the response `data_field` a device would send back, for tests and
/// the device simulator.
pub fn build_response_data_field(body: &str) -> Vec<u8> {
    let bytes = body.as_bytes();
    let mut out = Vec::with_capacity(8 + bytes.len());
    out.push(CODEC_ID);
    out.push(QUANTITY);
    out.push(RESPONSE_TYPE);
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
    out.push(QUANTITY);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framer::{decode_envelope, encode_envelope};

    #[test]
    fn request_envelope_round_trips() {
        let data_field = build_command_data_field(b"setdigout 1");
        let frame = encode_envelope(&data_field);
        let decoded = decode_envelope(&frame).unwrap();
        assert_eq!(decoded, data_field.as_slice());
    }

    #[test]
    fn request_data_field_parses_back_to_command_text() {
        let data_field = build_command_data_field(b"setdigout 1");
        let command = parse_command_data_field(&data_field).unwrap();
        assert_eq!(command, "setdigout 1");
    }

    #[test]
    fn request_parse_rejects_response_type() {
        let data_field = build_response_data_field("OK");
        assert!(matches!(
            parse_command_data_field(&data_field),
            Err(WireError::BadResponseType(RESPONSE_TYPE))
        ));
    }

    #[test]
    fn response_with_ok_is_success() {
        let data_field = build_response_data_field("OK");
        let response = parse_response_data_field(&data_field).unwrap();
        assert!(response.success);
        assert_eq!(response.body, "OK");
    }

    #[test]
    fn response_without_ok_is_failure() {
        let data_field = build_response_data_field("ERROR");
        let response = parse_response_data_field(&data_field).unwrap();
        assert!(!response.success);
    }

    #[test]
    fn response_rejects_bad_codec() {
        let mut data_field = build_response_data_field("OK");
        data_field[0] = 0x08;
        assert!(matches!(
            parse_response_data_field(&data_field),
            Err(WireError::BadCodec(0x08))
        ));
    }

    #[test]
    fn response_rejects_bad_type() {
        let mut data_field = build_response_data_field("OK");
        data_field[2] = 0x05;
        assert!(matches!(
            parse_response_data_field(&data_field),
            Err(WireError::BadResponseType(0x05))
        ));
    }

    #[test]
    fn response_rejects_quantity_mismatch() {
        let mut data_field = build_response_data_field("OK");
        let last = data_field.len() - 1;
        data_field[last] = 0x02;
        assert!(matches!(
            parse_response_data_field(&data_field),
            Err(WireError::QuantityMismatch { .. })
        ));
    }
}
