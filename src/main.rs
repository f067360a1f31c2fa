use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use tally::api::{create_api_router, AppState};
use tally::config::{Config, DatabaseBackend};
use tally::storage::{PostgresStore, SqliteStore, VisitBuffer, VisitStore};
use tally::track::{create_track_router, TrackState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize storage
    let store: Arc<dyn VisitStore> = match config.database.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite store: {}", config.database.url);
            Arc::new(SqliteStore::new(&config.database.url, config.database.max_connections).await?)
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL store: {}", config.database.url);
            Arc::new(
                PostgresStore::new(&config.database.url, config.database.max_connections).await?,
            )
        }
    };

    info!("Initializing database...");
    store.init().await?;
    info!("Database initialized successfully");

    // Visit buffer with periodic batch flush into the store
    let buffer = Arc::new(VisitBuffer::with_config(
        config.tracking.buffer_capacity,
        100,
    ));
    let _flush_handle =
        buffer.start_flush_task(Arc::clone(&store), config.tracking.flush_interval_secs);

    // Create routers
    let api_state = Arc::new(AppState {
        store: Arc::clone(&store),
    });
    let api_router = create_api_router(api_state);

    let track_state = Arc::new(TrackState {
        buffer: Arc::clone(&buffer),
        config: config.tracking.clone(),
    });
    let track_router = create_track_router(track_state);

    // Start API server
    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("🚀 Stats API server listening on http://{}", api_addr);
    info!("   - Statistics available at http://{}/api/stats", api_addr);

    // Start tracking server
    let track_addr = format!("{}:{}", config.track_server.host, config.track_server.port);
    let track_listener = tokio::net::TcpListener::bind(&track_addr).await?;
    info!("🚀 Tracking server listening on http://{}", track_addr);
    info!("   - Visits recorded at http://{}/track", track_addr);

    // Run both servers concurrently
    tokio::try_join!(
        axum::serve(api_listener, api_router),
        axum::serve(
            track_listener,
            track_router.into_make_service_with_connect_info::<SocketAddr>(),
        ),
    )?;

    Ok(())
}
