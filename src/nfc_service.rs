// src/nfc_service.rs
use std::ffi::{CStr, CString};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use log::{debug, error, info};
use pcsc::{Card, Context, PNP_NOTIFICATION, Protocols, ReaderState, Scope, ShareMode, State};

use crate::error::{BridgeError, Result};
use crate::event_loop::BridgeEvent;
use crate::ndef::{self, NdefRecord};
use crate::scan::{NfcAdapter, ReaderMode, TagHandle};
use crate::types::CARD_TYPE_MIFARE_1K;
use crate::{apdu, cards};

// Internal commands sent from the scan session -> NFC Thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderCommand {
    Arm,
    Disarm,
}

#[derive(Debug, Default)]
struct ReaderStatus {
    context_ready: AtomicBool,
    readers_attached: AtomicBool,
}

/// `NfcAdapter` backed by a PC/SC reader polled on its own OS thread.
#[derive(Clone)]
pub struct PcscAdapter {
    commands: Sender<ReaderCommand>,
    status: Arc<ReaderStatus>,
}

impl PcscAdapter {
    /// Spawns the reader thread. Discovered tags are posted to `events`.
    pub fn spawn(events: Sender<BridgeEvent>) -> Self {
        let (cmd_tx, cmd_rx) = unbounded::<ReaderCommand>();
        let status = Arc::new(ReaderStatus::default());

        let thread_status = status.clone();
        // We use a blocking OS thread because PC/SC calls block
        std::thread::spawn(move || run(thread_status, cmd_rx, events));

        Self {
            commands: cmd_tx,
            status,
        }
    }

    fn send(&self, cmd: ReaderCommand) -> Result<()> {
        self.commands
            .send(cmd)
            .map_err(|_| BridgeError::Reader("reader thread has stopped".into()))
    }
}

impl NfcAdapter for PcscAdapter {
    fn is_present(&self) -> bool {
        self.status.context_ready.load(Ordering::SeqCst)
    }

    fn is_enabled(&self) -> bool {
        self.status.readers_attached.load(Ordering::SeqCst)
    }

    fn enable_reader_mode(&self, mode: &ReaderMode) -> Result<()> {
        debug!(
            "Arming reader for {:?} (skip NDEF check: {})",
            mode.technologies, mode.skip_ndef_check
        );
        self.send(ReaderCommand::Arm)
    }

    fn disable_reader_mode(&self) -> Result<()> {
        self.send(ReaderCommand::Disarm)
    }
}

/// A card read while armed. Memory is read on the reader thread; NDEF parsing happens on demand.
pub struct PcscTag {
    uid: Vec<u8>,
    memory: Option<Result<Vec<u8>>>,
}

impl PcscTag {
    pub fn new(uid: Vec<u8>, memory: Result<Vec<u8>>) -> Self {
        Self {
            uid,
            memory: Some(memory),
        }
    }
}

impl TagHandle for PcscTag {
    fn id(&self) -> &[u8] {
        &self.uid
    }

    fn read_ndef(&mut self) -> Result<Option<Vec<NdefRecord>>> {
        let memory = self
            .memory
            .take()
            .ok_or_else(|| BridgeError::Reader("tag memory already consumed".into()))??;

        match ndef::find_ndef_message(&memory)? {
            Some(message) if !message.is_empty() => Ok(Some(ndef::parse_ndef_records(message)?)),
            _ => Ok(None),
        }
    }
}

fn run(status: Arc<ReaderStatus>, commands: Receiver<ReaderCommand>, events: Sender<BridgeEvent>) {
    info!("Starting NFC Service (Event Driven)...");

    let ctx = match Context::establish(Scope::User) {
        Ok(ctx) => ctx,
        Err(err) => {
            error!("Failed to establish context: {}", err);
            return;
        }
    };
    status.context_ready.store(true, Ordering::SeqCst);

    let mut readers_buf = [0; 2048];
    let mut reader_states = vec![ReaderState::new(PNP_NOTIFICATION(), State::UNAWARE)];
    refresh_readers(&ctx, &mut readers_buf, &mut reader_states, &status);

    let mut armed = false;

    loop {
        // 1. Wait for State Change
        if let Err(err) = ctx.get_status_change(Duration::from_millis(500), &mut reader_states) {
            if err != pcsc::Error::Timeout {
                error!("PCSC Error: {}", err);
                std::thread::sleep(Duration::from_secs(1));
            }
        }

        // 2. CHECK FOR COMMANDS
        loop {
            match commands.try_recv() {
                Ok(ReaderCommand::Arm) => {
                    armed = true;
                    info!("NFC reader armed");
                    // A card already lying on the reader counts as discovered
                    let present: Vec<CString> = reader_states[1..]
                        .iter()
                        .filter(|rs| rs.current_state().intersects(State::PRESENT))
                        .map(|rs| rs.name().to_owned())
                        .collect();
                    for name in present {
                        report_card(&ctx, &name, &events);
                    }
                }
                Ok(ReaderCommand::Disarm) => {
                    if armed {
                        info!("NFC reader disarmed");
                    }
                    armed = false;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    info!("NFC adapter dropped, stopping reader thread");
                    return;
                }
            }
        }

        // 3. PROCESS EVENTS
        let mut readers_changed = false;

        // Check PnP (Index 0)
        if reader_states[0].event_state().intersects(State::CHANGED) {
            info!("Hardware change detected");
            readers_changed = true;
            reader_states[0].sync_current_state();
        }

        // Check Readers (Indices 1..)
        for rs in reader_states.iter_mut().skip(1) {
            if !rs.event_state().intersects(State::CHANGED) {
                continue;
            }

            // Card Inserted
            let inserted = rs.event_state().intersects(State::PRESENT)
                && !rs.current_state().intersects(State::PRESENT);
            if inserted {
                info!("Card Inserted on {:?}", rs.name());
                if armed {
                    report_card(&ctx, rs.name(), &events);
                } else {
                    debug!("Reader not armed, ignoring card");
                }
            }

            rs.sync_current_state();
        }

        // 4. REFRESH LIST
        if readers_changed {
            refresh_readers(&ctx, &mut readers_buf, &mut reader_states, &status);
        }
    }
}

fn refresh_readers(
    ctx: &Context,
    readers_buf: &mut [u8],
    reader_states: &mut Vec<ReaderState>,
    status: &ReaderStatus,
) {
    // Keep the PnP state (index 0) and drop everything else
    reader_states.truncate(1);

    match ctx.list_readers(readers_buf) {
        Ok(names) => {
            for name in names {
                reader_states.push(ReaderState::new(CString::from(name), State::UNAWARE));
            }
        }
        Err(err) => debug!("No readers listed: {}", err),
    }

    let attached = reader_states.len() > 1;
    status.readers_attached.store(attached, Ordering::SeqCst);
    info!("{} reader(s) attached", reader_states.len() - 1);
}

fn report_card(ctx: &Context, reader_name: &CStr, events: &Sender<BridgeEvent>) {
    let card = match ctx.connect(reader_name, ShareMode::Shared, Protocols::ANY) {
        Ok(card) => card,
        Err(e) => {
            error!("Failed to connect to card: {}", e);
            return;
        }
    };

    let uid = match apdu::get_uid(&card) {
        Ok(uid) => uid,
        Err(e) => {
            error!("Failed to read card UID: {}", e);
            return;
        }
    };

    let memory = if card_type(&card) == CARD_TYPE_MIFARE_1K {
        cards::read_mifare(&card)
    } else {
        cards::read_ntag(&card)
    };

    let tag = PcscTag::new(uid, memory);
    if events.send(BridgeEvent::TagDiscovered(Box::new(tag))).is_err() {
        error!("Bridge loop is gone, dropping tag");
    }
}

fn card_type(card: &Card) -> String {
    let mut names_buf = [0u8; 128];
    let mut atr_buf = [0u8; 64];
    match card.status2(&mut names_buf, &mut atr_buf) {
        Ok(status) => match status.atr().last() {
            Some(last) => format!("{:x}", last),
            None => "unknown".into(),
        },
        Err(_) => "unknown".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_memory_with_text_record() {
        let memory = vec![
            0x03, 0x09, 0xD1, 0x01, 0x05, b'T', 0x02, b'e', b'n', b'o', b'k', 0xFE,
        ];
        let mut tag = PcscTag::new(vec![0x04, 0x11], Ok(memory));
        let records = tag.read_ndef().unwrap().unwrap();
        assert_eq!(records[0].decode_text().unwrap(), "ok");
    }

    #[test]
    fn blank_memory_has_no_ndef() {
        let mut tag = PcscTag::new(vec![0x04], Ok(vec![0x03, 0x00, 0xFE]));
        assert_eq!(tag.read_ndef().unwrap(), None);

        let mut tag = PcscTag::new(vec![0x04], Ok(vec![0x00; 16]));
        assert_eq!(tag.read_ndef().unwrap(), None);
    }

    #[test]
    fn read_failure_surfaces_as_error() {
        let mut tag = PcscTag::new(vec![0x04], Err(BridgeError::Reader("Auth Failed".into())));
        assert!(tag.read_ndef().is_err());
        assert_eq!(tag.id(), &[0x04]);
    }
}
