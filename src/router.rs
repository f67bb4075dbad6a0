// src/router.rs
use std::sync::Arc;

use image::DynamicImage;
use log::{debug, error, info, warn};

use crate::auth::{AuthResolver, Navigator};
use crate::camera::{CameraAdapter, CameraTrigger};
use crate::codec;
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::navigation::{self, NavigationDecision};
use crate::scan::{NfcAdapter, ScanSession, ScanState, TagHandle};
use crate::types::{Action, CAMERA_NO_IMAGE_MESSAGE, OutgoingMessage};

/// The attached content surface.
pub trait DeliveryChannel: Send + Sync {
    /// Hands one encoded envelope to the surface.
    fn deliver(&self, encoded: &str);

    /// Loads `url` as the surface's top-level page.
    fn navigate(&self, url: &str);
}

pub type SharedChannel = Arc<dyn DeliveryChannel>;

/// `DeliveryChannel` for hosts that can only evaluate script (e.g. a WebView).
pub struct ScriptChannel<E, N> {
    evaluate: E,
    load_url: N,
}

impl<E, N> ScriptChannel<E, N>
where
    E: Fn(&str) + Send + Sync,
    N: Fn(&str) + Send + Sync,
{
    pub fn new(evaluate: E, load_url: N) -> Self {
        Self { evaluate, load_url }
    }
}

impl<E, N> DeliveryChannel for ScriptChannel<E, N>
where
    E: Fn(&str) + Send + Sync,
    N: Fn(&str) + Send + Sync,
{
    fn deliver(&self, encoded: &str) {
        (self.evaluate)(&codec::dispatch_script(encoded));
    }

    fn navigate(&self, url: &str) {
        (self.load_url)(url);
    }
}

struct SurfaceNavigator<'a>(&'a dyn DeliveryChannel);

impl Navigator for SurfaceNavigator<'_> {
    fn navigate(&self, url: &str) {
        self.0.navigate(url);
    }
}

/// Central dispatcher between the surface and the native capabilities.
/// Every method runs on the bridge's single serial context.
pub struct Router<A: NfcAdapter> {
    session: ScanSession<A>,
    resolver: AuthResolver,
    camera: CameraAdapter,
    camera_trigger: Box<dyn CameraTrigger + Send>,
    channel: Option<SharedChannel>,
}

impl<A: NfcAdapter> Router<A> {
    pub fn new(
        config: &BridgeConfig,
        adapter: A,
        camera_trigger: Box<dyn CameraTrigger + Send>,
        channel: Option<SharedChannel>,
    ) -> Self {
        Self {
            session: ScanSession::new(adapter),
            resolver: AuthResolver::new(config),
            camera: CameraAdapter::new(config.jpeg_quality),
            camera_trigger,
            channel,
        }
    }

    pub fn scan_state(&self) -> ScanState {
        self.session.state()
    }

    pub fn resolver(&self) -> &AuthResolver {
        &self.resolver
    }

    pub fn is_attached(&self) -> bool {
        self.channel.is_some()
    }

    /// Decodes and dispatches one inbound message. Bad input is logged and dropped.
    pub fn handle_inbound(&mut self, raw: &str) {
        let envelope = match codec::decode(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Dropping inbound message: {}", e);
                return;
            }
        };

        debug!("Received: {}", envelope.kind);
        self.dispatch(Action::from_kind(&envelope.kind));
    }

    pub fn dispatch(&mut self, action: Action) {
        match action {
            Action::AppReady => {
                self.emit(&OutgoingMessage::bridge_ready());
                self.emit(&OutgoingMessage::NfcReady);
            }
            Action::StartNfcScan => {
                if let Err(e) = self.session.start_scan() {
                    self.emit(&OutgoingMessage::NfcError {
                        message: user_message(&e),
                    });
                }
            }
            Action::StopNfcScan => self.session.stop_scan(),
            Action::OpenCamera => {
                info!("Web requested camera");
                if let Err(e) = self.camera_trigger.request_capture() {
                    error!("Could not start capture: {}", e);
                    self.emit(&OutgoingMessage::CameraError {
                        message: CAMERA_NO_IMAGE_MESSAGE.into(),
                    });
                }
            }
            Action::Unrecognized(kind) => warn!("Ignoring unknown action {:?}", kind),
        }
    }

    pub fn on_tag_discovered(&mut self, tag: &mut dyn TagHandle) {
        if let Some(tag) = self.session.on_tag_discovered(tag) {
            self.emit(&tag.into_message());
        }
    }

    pub fn on_camera_image(&mut self, image: Option<&DynamicImage>) {
        let msg = self.camera.on_image(image);
        self.emit(&msg);
    }

    pub fn on_foreground(&mut self) {
        self.session.resume();
    }

    pub fn on_background(&mut self) {
        self.session.suspend();
    }

    /// A surface became available; any queued redirect is played now.
    pub fn attach(&mut self, channel: SharedChannel) {
        info!("Content surface attached");
        self.resolver.flush_pending(&SurfaceNavigator(channel.as_ref()));
        self.channel = Some(channel);
    }

    pub fn detach(&mut self) {
        info!("Content surface detached");
        self.channel = None;
    }

    /// URI the process was started with.
    pub fn handle_launch_uri(&mut self, uri: &str) -> bool {
        let navigator = self.channel.as_ref().map(|c| SurfaceNavigator(c.as_ref()));
        self.resolver
            .handle(uri, navigator.as_ref().map(|n| n as &dyn Navigator))
            .is_some()
    }

    /// Navigation attempted from inside the surface. Called by WebView hosts from their
    /// URL-loading hook; the WebSocket host never sees in-page navigation.
    pub fn intercept_navigation(&mut self, url: &str) -> NavigationDecision {
        let navigator = self.channel.as_ref().map(|c| SurfaceNavigator(c.as_ref()));
        navigation::intercept(
            url,
            &mut self.resolver,
            navigator.as_ref().map(|n| n as &dyn Navigator),
        )
    }

    fn emit(&self, msg: &OutgoingMessage) {
        let Some(channel) = &self.channel else {
            debug!("No surface attached, dropping {}", msg.kind());
            return;
        };
        channel.deliver(&codec::encode_message(msg));
    }
}

fn user_message(err: &BridgeError) -> String {
    match err {
        BridgeError::HardwareUnavailable(message) => message.clone(),
        other => other.to_string(),
    }
}
