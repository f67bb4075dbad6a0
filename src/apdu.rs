// src/apdu.rs
use pcsc::Card;

use crate::error::{BridgeError, Result};

fn transmit(card: &Card, apdu: &[u8]) -> Result<Vec<u8>> {
    let mut recv_buffer = [0u8; 258];
    let resp = card.transmit(apdu, &mut recv_buffer)?;

    // 0x90 0x00 is Success
    if resp.len() >= 2 && resp[resp.len() - 2] == 0x90 && resp[resp.len() - 1] == 0x00 {
        // Return data without status word
        Ok(resp[0..resp.len() - 2].to_vec())
    } else {
        Err(BridgeError::Reader(format!("APDU {:02X?} rejected: {:02X?}", &apdu[..2], resp)))
    }
}

// Get Data (UID): FF CA 00 00 00
pub fn get_uid(card: &Card) -> Result<Vec<u8>> {
    let uid = transmit(card, &[0xFF, 0xCA, 0x00, 0x00, 0x00])?;
    if uid.is_empty() {
        return Err(BridgeError::Reader("reader returned an empty UID".into()));
    }
    Ok(uid)
}

// Load Authentication Keys into Reader Memory (Location 0x00 or 0x20)
// ACR122U standard: FF 82 00 key_num 06 [KEY]
pub fn load_key(card: &Card, key: &[u8; 6]) -> Result<()> {
    let mut apdu = vec![0xFF, 0x82, 0x00, 0x00, 0x06];
    apdu.extend_from_slice(key);
    transmit(card, &apdu).map(|_| ())
}

// Authenticate Block
// CMD: FF 86 00 00 05 01 00 Block KeyType KeyNumber
// KeyType: 0x60 (A), 0x61 (B)
pub fn authenticate(card: &Card, block: u8, key_type: u8) -> Result<()> {
    let apdu = [
        0xFF, 0x86, 0x00, 0x00, 0x05, 0x01, 0x00, block, key_type, 0x00,
    ];
    transmit(card, &apdu).map(|_| ())
}

// Read: FF B0 00 Block Len
pub fn read_binary(card: &Card, block: u8, length: u8) -> Result<Vec<u8>> {
    transmit(card, &[0xFF, 0xB0, 0x00, block, length])
}
