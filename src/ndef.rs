// src/ndef.rs
use crate::error::{BridgeError, Result};

pub const TNF_EMPTY: u8 = 0x00;
pub const TNF_WELL_KNOWN: u8 = 0x01;
pub const RTD_TEXT: &[u8] = b"T";

// Type-Length-Value tags found in NFC Forum Type 2 tag memory
const TLV_NULL: u8 = 0x00;
const TLV_NDEF_MESSAGE: u8 = 0x03;
const TLV_TERMINATOR: u8 = 0xFE;

// Bytes some writers put in front of plain payloads
const PADDING: [char; 3] = ['\u{0}', '\u{2}', '\u{3}'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdefRecord {
    pub tnf: u8, // Type Name Format (How to interpret the type)
    pub record_type: Vec<u8>,
    pub payload: Vec<u8>,
    pub id: Option<Vec<u8>>,
}

impl NdefRecord {
    pub fn decode_text(&self) -> Result<String> {
        decode_record(self.tnf, &self.record_type, &self.payload)
    }
}

/// Turns one record into display text.
///
/// Well-known Text records: [Status Byte] + [Lang Code] + [Text], where bits 5-0 of the
/// status byte are the language code length. Anything else is read as UTF-8 with
/// leading NUL/STX/ETX padding removed.
pub fn decode_record(tnf: u8, record_type: &[u8], payload: &[u8]) -> Result<String> {
    if payload.is_empty() {
        return Ok(String::new());
    }

    if tnf == TNF_WELL_KNOWN && record_type == RTD_TEXT {
        let lang_len = (payload[0] & 0x3F) as usize;
        let text_start = 1 + lang_len;
        if text_start > payload.len() {
            return Err(BridgeError::MalformedRecord(format!(
                "text record declares {lang_len}-byte language code but payload is {} bytes",
                payload.len()
            )));
        }
        return Ok(String::from_utf8_lossy(&payload[text_start..]).into_owned());
    }

    let text = String::from_utf8_lossy(payload);
    Ok(text.trim_start_matches(&PADDING[..]).to_string())
}

/// Locates the NDEF message inside raw tag memory by walking its TLV blocks.
/// Returns `None` when the memory holds no NDEF message TLV.
pub fn find_ndef_message(buffer: &[u8]) -> Result<Option<&[u8]>> {
    let mut cursor = 0;

    while cursor < buffer.len() {
        let tag = buffer[cursor];
        cursor += 1;

        match tag {
            TLV_NULL => continue,
            TLV_TERMINATOR => return Ok(None),
            _ => {}
        }

        // L (Length): 1 byte, or 0xFF followed by a 2-byte length
        let (len, len_size) = match buffer.get(cursor) {
            Some(0xFF) => match (buffer.get(cursor + 1), buffer.get(cursor + 2)) {
                (Some(&hi), Some(&lo)) => (((hi as usize) << 8) | lo as usize, 3),
                _ => return Err(BridgeError::MalformedRecord("truncated TLV length".into())),
            },
            Some(&len) => (len as usize, 1),
            None => return Err(BridgeError::MalformedRecord("truncated TLV length".into())),
        };
        cursor += len_size;

        let end = cursor + len;
        if end > buffer.len() {
            return Err(BridgeError::MalformedRecord("Incomplete data".into()));
        }

        if tag == TLV_NDEF_MESSAGE {
            return Ok(Some(&buffer[cursor..end]));
        }
        cursor = end;
    }

    Ok(None)
}

pub fn parse_ndef_records(data: &[u8]) -> Result<Vec<NdefRecord>> {
    let mut records = Vec::new();
    let mut cursor = 0;

    while cursor < data.len() {
        let header = data[cursor];
        let tnf = header & 0x07; // Last 3 bits
        let is_short_record = (header & 0x10) != 0; // SR flag
        let has_id = (header & 0x08) != 0; // IL flag
        let is_me = (header & 0x40) != 0; // Message End flag

        cursor += 1;

        // 1. Get Type Length
        let type_len = take(data, &mut cursor, 1)?[0] as usize;

        // 2. Get Payload Length (1 byte for Short Record, 4 bytes otherwise)
        let payload_len = if is_short_record {
            take(data, &mut cursor, 1)?[0] as usize
        } else {
            let b = take(data, &mut cursor, 4)?;
            u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as usize
        };

        // 3. Get ID Length (if present)
        let id_len = if has_id {
            take(data, &mut cursor, 1)?[0] as usize
        } else {
            0
        };

        // 4. Extract Type
        let record_type = take(data, &mut cursor, type_len)?.to_vec();

        // 5. Extract ID
        let id = if has_id {
            Some(take(data, &mut cursor, id_len)?.to_vec())
        } else {
            None
        };

        // 6. Extract Payload
        let payload = take(data, &mut cursor, payload_len)?.to_vec();

        records.push(NdefRecord {
            tnf,
            record_type,
            payload,
            id,
        });

        if is_me {
            break;
        }
    }

    Ok(records)
}

fn take<'a>(data: &'a [u8], cursor: &mut usize, len: usize) -> Result<&'a [u8]> {
    let end = cursor
        .checked_add(len)
        .filter(|&end| end <= data.len())
        .ok_or_else(|| BridgeError::MalformedRecord(format!("record truncated at byte {cursor}")))?;
    let slice = &data[*cursor..end];
    *cursor = end;
    Ok(slice)
}

#[cfg(test)]
mod tests {
    use super::*;

    // MB=1, ME=1, SR=1, TNF=001
    const SHORT_WELL_KNOWN: u8 = 0xD1;

    #[test]
    fn text_record_skips_language_code() {
        let payload = [0x02, b'e', b'n', b'h', b'i'];
        assert_eq!(decode_record(TNF_WELL_KNOWN, RTD_TEXT, &payload).unwrap(), "hi");
    }

    #[test]
    fn non_text_record_strips_padding() {
        let payload = [0x02, 0x00, 0x03, b'x'];
        assert_eq!(decode_record(0x04, b"android.com:pkg", &payload).unwrap(), "x");
    }

    #[test]
    fn well_known_non_text_type_uses_fallback() {
        let payload = [0x00, b'a', b'b'];
        assert_eq!(decode_record(TNF_WELL_KNOWN, b"U", &payload).unwrap(), "ab");
    }

    #[test]
    fn empty_payload_is_empty_text() {
        assert_eq!(decode_record(TNF_WELL_KNOWN, RTD_TEXT, &[]).unwrap(), "");
        assert_eq!(decode_record(TNF_EMPTY, &[], &[]).unwrap(), "");
    }

    #[test]
    fn language_code_only_yields_empty_text() {
        let payload = [0x02, b'p', b'l'];
        assert_eq!(decode_record(TNF_WELL_KNOWN, RTD_TEXT, &payload).unwrap(), "");
    }

    #[test]
    fn short_text_payload_is_malformed() {
        let payload = [0x05, b'e', b'n'];
        assert!(matches!(
            decode_record(TNF_WELL_KNOWN, RTD_TEXT, &payload),
            Err(BridgeError::MalformedRecord(_))
        ));
    }

    #[test]
    fn utf8_bit_and_high_status_bits_are_masked() {
        // bit 7 set (UTF-16 flag) is ignored, only bits 5-0 count
        let payload = [0x82, b'e', b'n', 0xC5, 0x82];
        assert_eq!(decode_record(TNF_WELL_KNOWN, RTD_TEXT, &payload).unwrap(), "ł");
    }

    #[test]
    fn finds_ndef_after_lock_control_tlv() {
        let memory = [
            0x01, 0x03, 0xA0, 0x0C, 0x34, // lock control TLV
            0x03, 0x03, 0xAA, 0xBB, 0xCC, // NDEF message TLV
            0xFE,
        ];
        assert_eq!(
            find_ndef_message(&memory).unwrap(),
            Some(&[0xAA, 0xBB, 0xCC][..])
        );
    }

    #[test]
    fn blank_tag_has_no_message() {
        assert_eq!(find_ndef_message(&[0x00, 0x00, 0xFE, 0x03]).unwrap(), None);
        assert_eq!(find_ndef_message(&[]).unwrap(), None);
    }

    #[test]
    fn truncated_tlv_is_malformed() {
        assert!(find_ndef_message(&[0x03, 0x10, 0xD1]).is_err());
        assert!(find_ndef_message(&[0x03, 0xFF, 0x00]).is_err());
    }

    #[test]
    fn parses_single_text_record() {
        let message = [SHORT_WELL_KNOWN, 0x01, 0x05, b'T', 0x02, b'e', b'n', b'h', b'i'];
        let records = parse_ndef_records(&message).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tnf, TNF_WELL_KNOWN);
        assert_eq!(records[0].record_type, b"T");
        assert_eq!(records[0].decode_text().unwrap(), "hi");
    }

    #[test]
    fn stops_at_message_end() {
        let message = [
            0x91, 0x01, 0x01, b'T', 0x00, // MB, SR, no ME
            0x51, 0x01, 0x01, b'T', 0x00, // ME
            0xD1, 0x01, 0x01, b'T', 0x00, // trailing garbage past ME
        ];
        assert_eq!(parse_ndef_records(&message).unwrap().len(), 2);
    }

    #[test]
    fn truncated_record_is_an_error_not_a_panic() {
        let message = [SHORT_WELL_KNOWN, 0x01, 0x20, b'T', 0x02];
        assert!(matches!(
            parse_ndef_records(&message),
            Err(BridgeError::MalformedRecord(_))
        ));
    }
}
