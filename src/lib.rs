// src/lib.rs
//! Native side of the Lokaltu bridge: routes envelopes between the web app and
//! the device's NFC reader and camera, and turns auth redirects into navigations.

pub mod apdu;
pub mod auth;
pub mod camera;
pub mod cards;
pub mod codec;
pub mod config;
pub mod error;
pub mod event_loop;
pub mod file_camera;
pub mod navigation;
pub mod ndef;
pub mod nfc_service;
pub mod router;
pub mod scan;
pub mod types;
pub mod ws;

pub use error::{BridgeError, Result};
