// src/scan.rs
use chrono::Utc;
use log::{debug, error, info, warn};

use crate::error::{BridgeError, Result};
use crate::ndef::NdefRecord;
use crate::types::{NFC_UNAVAILABLE_MESSAGE, Tag};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Technology {
    NfcA,
    NfcB,
    NfcF,
    NfcV,
}

/// How reader mode is switched on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderMode {
    pub technologies: Vec<Technology>,
    /// Deliver tags without first probing for an NDEF container, so unformatted tags still arrive.
    pub skip_ndef_check: bool,
}

impl ReaderMode {
    pub fn all_technologies() -> Self {
        Self {
            technologies: vec![
                Technology::NfcA,
                Technology::NfcB,
                Technology::NfcF,
                Technology::NfcV,
            ],
            skip_ndef_check: true,
        }
    }
}

/// The process-wide NFC radio. Only `ScanSession` calls the arm/disarm methods.
pub trait NfcAdapter {
    fn is_present(&self) -> bool;
    fn is_enabled(&self) -> bool;
    fn enable_reader_mode(&self, mode: &ReaderMode) -> Result<()>;
    fn disable_reader_mode(&self) -> Result<()>;
}

/// A tag handed over by the adapter's discovery callback.
pub trait TagHandle {
    /// Hardware serial number.
    fn id(&self) -> &[u8];

    /// Opens an NDEF session and returns the message records.
    /// `Ok(None)` means the tag does not speak NDEF at all.
    fn read_ndef(&mut self) -> Result<Option<Vec<NdefRecord>>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Armed,
    /// Scan requested, but the host is in the background and the reader is off.
    Suspended,
}

pub struct ScanSession<A: NfcAdapter> {
    adapter: A,
    state: ScanState,
    mode: ReaderMode,
}

impl<A: NfcAdapter> ScanSession<A> {
    pub fn new(adapter: A) -> Self {
        Self {
            adapter,
            state: ScanState::Idle,
            mode: ReaderMode::all_technologies(),
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn is_available(&self) -> bool {
        self.adapter.is_present() && self.adapter.is_enabled()
    }

    pub fn start_scan(&mut self) -> Result<()> {
        info!("Starting NFC scan");
        if !self.is_available() {
            warn!("NFC adapter missing or disabled");
            return Err(BridgeError::HardwareUnavailable(
                NFC_UNAVAILABLE_MESSAGE.into(),
            ));
        }

        match self.state {
            ScanState::Armed => {
                debug!("Scan already armed");
                Ok(())
            }
            // Intent is already remembered; resume() arms the reader
            ScanState::Suspended => Ok(()),
            ScanState::Idle => {
                self.arm()?;
                self.state = ScanState::Armed;
                Ok(())
            }
        }
    }

    pub fn stop_scan(&mut self) {
        info!("Stopping NFC scan");
        if self.state == ScanState::Armed {
            self.disarm();
        }
        self.state = ScanState::Idle;
    }

    /// Host lost the foreground.
    pub fn suspend(&mut self) {
        if self.state == ScanState::Armed {
            self.disarm();
            self.state = ScanState::Suspended;
            debug!("Scan suspended");
        }
    }

    /// Host regained the foreground.
    pub fn resume(&mut self) {
        if self.state != ScanState::Suspended {
            return;
        }
        match self.arm() {
            Ok(()) => {
                self.state = ScanState::Armed;
                debug!("Scan resumed");
            }
            Err(e) => {
                error!("Could not re-arm reader on resume: {}", e);
                self.state = ScanState::Idle;
            }
        }
    }

    /// Single-shot: the first tag of an armed period disarms the session.
    /// Returns `None` when no scan is armed.
    pub fn on_tag_discovered(&mut self, tag: &mut dyn TagHandle) -> Option<Tag> {
        if self.state != ScanState::Armed {
            debug!("Ignoring tag discovered while {:?}", self.state);
            return None;
        }

        self.disarm();
        self.state = ScanState::Idle;

        let id = tag.id().to_vec();
        info!("Tag discovered: {}", hex::encode_upper(&id));

        let text = match tag.read_ndef() {
            Ok(Some(records)) => match records.first() {
                Some(record) => match record.decode_text() {
                    Ok(text) => Some(text),
                    Err(e) => {
                        warn!("Falling back to tag id: {}", e);
                        None
                    }
                },
                None => None,
            },
            Ok(None) => None,
            Err(e) => {
                error!("Error reading NDEF: {}", e);
                None
            }
        };

        Some(Tag {
            id,
            text,
            discovered_at: Utc::now(),
        })
    }

    fn arm(&self) -> Result<()> {
        self.adapter
            .enable_reader_mode(&self.mode)
            .map_err(|e| BridgeError::HardwareUnavailable(e.to_string()))?;
        debug!("NFC reader mode enabled");
        Ok(())
    }

    fn disarm(&self) {
        if let Err(e) = self.adapter.disable_reader_mode() {
            error!("Error disabling reader mode: {}", e);
        }
        debug!("NFC reader mode disabled");
    }
}
