//! Microwave Remote - remote control for a networked microwave
//!
//! This is the main entry point for the microwave-remote application.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use microwave_remote::{
    api::create_router,
    channel::{RemoteChannel, SocketChannel},
    config::Config,
    panel::{ControlPanel, PanelSettings},
    session::SessionController,
    state::AppState,
    tasks::{session_sync_task, status_refresh_task},
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("microwave_remote={},tower_http=info", config.log_level()))
        .init();

    info!("Starting microwave-remote v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: device={}, api={}, max={}min, tolerances={}s/{}s/{}s",
        config.device,
        config.address(),
        config.max_minutes,
        config.transition_tolerance,
        config.drift_tolerance,
        config.idle_confirmation
    );

    // One channel for the whole process, shared by everything that talks to the appliance
    let socket = Arc::new(SocketChannel::connect(config.device.clone(), config.reconnect_delay()));
    let channel: Arc<dyn RemoteChannel> = socket.clone();

    let session = SessionController::with_policy(config.sync_policy());

    // Subscribe before spawning so the first status cannot slip past.
    // The sync task is the only place statuses are folded into the countdown.
    let sync_events = channel.subscribe();
    tokio::spawn(session_sync_task(session.clone(), sync_events));
    tokio::spawn(status_refresh_task(Arc::clone(&channel), config.status_poll()));

    let panel = ControlPanel::spawn(
        Arc::clone(&channel),
        session.clone(),
        PanelSettings {
            max_seconds: config.max_seconds(),
        },
    );

    let state = Arc::new(AppState::new(panel, session.clone(), config.port, config.host.clone()));
    let app = create_router(state);

    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Control API running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST /start  - Start the appliance with the dialed time");
    info!("  POST /pause  - Pause the appliance");
    info!("  POST /stop   - Stop the appliance and the local countdown");
    info!("  POST /time   - Dial time up or down ({{\"delta\": seconds}})");
    info!("  GET  /status - Panel and countdown status");
    info!("  GET  /events - Server-sent countdown and panel events");
    info!("  GET  /health - Health check");

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    session.shutdown();
    socket.close();

    info!("Shutdown complete");
    Ok(())
}
