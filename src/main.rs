//! Room Timers - shared countdown and stopwatch timers coordinated across rooms
//!
//! This is the main entry point for the room-timers server.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use room_timers::{
    api::create_router,
    config::Config,
    state::AppState,
    tasks::room_cleanup_task,
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("room_timers={},tower_http=info", config.log_level()))
        .init();

    info!("Starting room-timers server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, room_ttl={}s, max_timers={}, tick_rate_limit={}/s",
        config.host, config.port, config.room_ttl, config.max_timers, config.tick_rate_limit
    );

    // Create application state
    let state = Arc::new(AppState::new(config.service_settings()));

    // Start the expired room sweep
    let cleanup_state = Arc::clone(&state);
    let cleanup_interval = config.cleanup_interval();
    tokio::spawn(async move {
        room_cleanup_task(cleanup_state, cleanup_interval).await;
    });

    // Create HTTP router with all endpoints
    let app = create_router(Arc::clone(&state));

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST   /api/v1/rooms                          - Create a room");
    info!("  GET    /api/v1/rooms/:id                      - Open a room");
    info!("  GET    /api/v1/rooms/:id/events               - Subscribe to room events");
    info!("  POST   /api/v1/rooms/:id/timers               - Create a timer");
    info!("  POST   /api/v1/rooms/:id/timers/:tid/{{action}} - start|pause|stop|reset|adjust");
    info!("  POST   /api/v1/rooms/:id/messages             - Create a message");
    info!("  GET    /health                                - Health check");

    // Setup graceful shutdown
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

    state.shutdown();
    info!("Server shutdown complete");
    Ok(())
}
