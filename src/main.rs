use crossbeam_channel::unbounded;
use log::{error, info};

use lokaltu_bridge::config::BridgeConfig;
use lokaltu_bridge::event_loop::{self, BridgeEvent};
use lokaltu_bridge::file_camera::FileCamera;
use lokaltu_bridge::nfc_service::PcscAdapter;
use lokaltu_bridge::router::Router;
use lokaltu_bridge::ws;

#[tokio::main]
async fn main() {
    env_logger::init();
    info!("Starting Lokaltu bridge...");

    let config = match BridgeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };

    // Channel: WS / NFC / camera -> bridge loop
    // We use Crossbeam (Sync) because the NFC thread is blocking
    let (event_tx, event_rx) = unbounded::<BridgeEvent>();

    let adapter = PcscAdapter::spawn(event_tx.clone());
    let camera = FileCamera::new(config.camera_image.clone(), event_tx.clone());
    let router = Router::new(&config, adapter, Box::new(camera), None);

    // Auth redirect the process was launched with, queued until a client attaches
    if let Some(uri) = std::env::args().nth(1) {
        let _ = event_tx.send(BridgeEvent::LaunchUri(uri));
    }

    // Bridge Loop (Blocking OS Thread, the router's only execution context)
    std::thread::spawn(move || {
        event_loop::run(router, event_rx);
    });

    ws::start_server(config.listen_addr, event_tx).await;
}
