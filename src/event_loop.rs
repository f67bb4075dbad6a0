// src/event_loop.rs
use crossbeam_channel::Receiver;
use image::DynamicImage;
use log::{debug, info};

use crate::router::{Router, SharedChannel};
use crate::scan::{NfcAdapter, TagHandle};

/// Everything that reaches the router. Producers live on other threads; the
/// router only ever runs on the thread draining this queue.
pub enum BridgeEvent {
    Inbound(String),
    SurfaceAttached(SharedChannel),
    SurfaceDetached,
    Foreground,
    Background,
    LaunchUri(String),
    TagDiscovered(Box<dyn TagHandle + Send>),
    CameraImage(Option<DynamicImage>),
    Shutdown,
}

impl std::fmt::Debug for BridgeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeEvent::Inbound(raw) => f.debug_tuple("Inbound").field(raw).finish(),
            BridgeEvent::SurfaceAttached(_) => f.write_str("SurfaceAttached"),
            BridgeEvent::SurfaceDetached => f.write_str("SurfaceDetached"),
            BridgeEvent::Foreground => f.write_str("Foreground"),
            BridgeEvent::Background => f.write_str("Background"),
            BridgeEvent::LaunchUri(uri) => f.debug_tuple("LaunchUri").field(uri).finish(),
            BridgeEvent::TagDiscovered(tag) => f
                .debug_tuple("TagDiscovered")
                .field(&hex::encode_upper(tag.id()))
                .finish(),
            BridgeEvent::CameraImage(image) => f
                .debug_tuple("CameraImage")
                .field(&image.as_ref().map(|i| (i.width(), i.height())))
                .finish(),
            BridgeEvent::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Applies one event. Returns `false` once the loop should stop.
pub fn process<A: NfcAdapter>(router: &mut Router<A>, event: BridgeEvent) -> bool {
    debug!("Bridge event: {:?}", event);
    match event {
        BridgeEvent::Inbound(raw) => router.handle_inbound(&raw),
        BridgeEvent::SurfaceAttached(channel) => router.attach(channel),
        BridgeEvent::SurfaceDetached => router.detach(),
        BridgeEvent::Foreground => router.on_foreground(),
        BridgeEvent::Background => router.on_background(),
        BridgeEvent::LaunchUri(uri) => {
            if !router.handle_launch_uri(&uri) {
                info!("Launch URI is not an auth redirect: {}", uri);
            }
        }
        BridgeEvent::TagDiscovered(mut tag) => router.on_tag_discovered(tag.as_mut()),
        BridgeEvent::CameraImage(image) => router.on_camera_image(image.as_ref()),
        BridgeEvent::Shutdown => return false,
    }
    true
}

/// Drains the queue until `Shutdown` or until every sender is gone.
pub fn run<A: NfcAdapter>(mut router: Router<A>, events: Receiver<BridgeEvent>) -> Router<A> {
    info!("Bridge loop started");
    while let Ok(event) = events.recv() {
        if !process(&mut router, event) {
            break;
        }
    }
    info!("Bridge loop stopped");
    router
}
