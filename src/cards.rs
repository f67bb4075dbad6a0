// src/cards.rs
use log::warn;
use pcsc::Card;

use crate::apdu;
use crate::error::{BridgeError, Result};

// Keys from the JS file
pub const COMMON_KEYS: [[u8; 6]; 8] = [
    [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
    [0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5],
    [0xD3, 0xF7, 0xD3, 0xF7, 0xD3, 0xF7],
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
    [0xB0, 0xB1, 0xB2, 0xB3, 0xB4, 0xB5],
    [0x4D, 0x3A, 0x99, 0xC3, 0x51, 0xDD],
    [0x1A, 0x98, 0x2C, 0x7E, 0x45, 0x9A],
    [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF],
];

// NTAG user memory starts at page 4; NTAG216 ends at page 225
const NTAG_FIRST_PAGE: u8 = 4;
const NTAG_LAST_PAGE: u8 = 225;

pub fn get_mifare_data_blocks() -> Vec<u8> {
    let mut blocks = Vec::new();
    // Sector 0 is usually read-only manufacturer data, so we start at Sector 1
    for sector in 1..16 {
        for block_in_sector in 0..3 {
            // 0, 1, 2 are data. 3 is the Trailer.
            blocks.push((sector * 4) + block_in_sector);
        }
    }
    blocks
}

/// Bytes needed to hold every TLV up to and including the NDEF message (or terminator).
/// `None` while `data` is too short to tell.
fn tlv_area_len(data: &[u8]) -> Option<usize> {
    let mut pos = 0;
    loop {
        match *data.get(pos)? {
            0x00 => pos += 1,
            0xFE => return Some(pos + 1),
            tag => {
                let len_byte = *data.get(pos + 1)?;
                let end = if len_byte == 0xFF {
                    let hi = *data.get(pos + 2)? as usize;
                    let lo = *data.get(pos + 3)? as usize;
                    pos + 4 + ((hi << 8) | lo)
                } else {
                    pos + 2 + len_byte as usize
                };
                if tag == 0x03 {
                    return Some(end);
                }
                pos = end;
            }
        }
    }
}

pub fn read_mifare(card: &Card) -> Result<Vec<u8>> {
    let mut full_data = Vec::new();

    for block in get_mifare_data_blocks() {
        // --- AUTHENTICATION SECTION ---
        // We must authenticate at the start of every sector (blocks 4, 8, 12, etc.)
        if block % 4 == 0 {
            let authenticated = COMMON_KEYS.iter().any(|key| {
                apdu::load_key(card, key).is_ok()
                    // Try Key A (0x60) or Key B (0x61)
                    && (apdu::authenticate(card, block, 0x60).is_ok()
                        || apdu::authenticate(card, block, 0x61).is_ok())
            });

            // If we can't get into this sector, we can't read the rest of the records
            if !authenticated {
                warn!("Could not authenticate sector at block {}. Stopping.", block);
                break;
            }
        }

        // --- READING SECTION ---
        match apdu::read_binary(card, block, 16) {
            Ok(data) => {
                full_data.extend_from_slice(&data);
                if tlv_area_len(&full_data).is_some_and(|len| full_data.len() >= len) {
                    break;
                }
            }
            Err(_) => break,
        }
    }

    if full_data.is_empty() {
        return Err(BridgeError::Reader(
            "No data could be read from the card.".into(),
        ));
    }

    Ok(full_data)
}

pub fn read_ntag(card: &Card) -> Result<Vec<u8>> {
    let mut full_data = Vec::new();

    // READ returns 16 bytes (4 pages) per call
    let mut page = NTAG_FIRST_PAGE;
    while page <= NTAG_LAST_PAGE {
        match apdu::read_binary(card, page, 16) {
            Ok(data) if !data.is_empty() => full_data.extend_from_slice(&data),
            Ok(_) => break,
            Err(e) if full_data.is_empty() => return Err(e),
            Err(_) => break,
        }

        if tlv_area_len(&full_data).is_some_and(|len| full_data.len() >= len) {
            break;
        }
        page = page.saturating_add(4);
    }

    Ok(full_data)
}
