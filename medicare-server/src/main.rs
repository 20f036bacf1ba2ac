//! medicare-server entry point

use medicare_store::{DocumentStore, HistoryLog, RedbDocumentStore, SqliteDocumentStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use medicare_server::{
    build_router,
    config::{LogFormat, LogSettings, ServerConfig, StorageBackend},
    sweep, AppState,
};

fn init_logging(settings: &LogSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.level));
    let registry = tracing_subscriber::registry().with(filter);

    match settings.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn open_documents(config: &ServerConfig) -> Result<Arc<dyn DocumentStore>, String> {
    let path = config.documents_db_path();
    let store: Arc<dyn DocumentStore> = match config.storage.backend {
        StorageBackend::Sqlite => {
            Arc::new(SqliteDocumentStore::open(&path).map_err(|e| e.to_string())?)
        }
        StorageBackend::Redb => Arc::new(RedbDocumentStore::open(&path).map_err(|e| e.to_string())?),
    };
    tracing::info!(backend = store.backend(), path = %path.display(), "Document store opened");
    Ok(store)
}

#[tokio::main]
async fn main() {
    // Load configuration
    let (config, load_error) = match ServerConfig::load(
        std::path::Path::new("config.yaml")
            .exists()
            .then_some("config.yaml"),
    ) {
        Ok(config) => (config, None),
        Err(e) => (ServerConfig::default(), Some(e.to_string())),
    };

    // Initialize logging
    init_logging(&config.log);
    if let Some(e) = load_error {
        tracing::warn!("Failed to load config, using defaults: {}", e);
    }

    tracing::info!("Starting medicare-server...");

    // Create data directory
    if let Err(e) = std::fs::create_dir_all(&config.storage.data_dir) {
        tracing::error!("Failed to create data directory: {}", e);
        std::process::exit(1);
    }

    // Initialize stores
    let store = open_documents(&config).unwrap_or_else(|e| {
        tracing::error!("Failed to open document store: {}", e);
        std::process::exit(1);
    });

    let history = HistoryLog::open(config.history_db_path()).unwrap_or_else(|e| {
        tracing::error!("Failed to open history log: {}", e);
        std::process::exit(1);
    });

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    let state = match AppState::new(config, store, history) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let chores = sweep::spawn_chores(state.clone());
    tracing::info!("Started {} background chores", chores.len());

    // Build router
    let app = build_router(state);

    // Bind TCP listener
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", bind_addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Listening on http://{}", bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .unwrap_or_else(|e| {
        tracing::error!("Server error: {}", e);
    });

    for chore in chores {
        chore.abort();
    }
    tracing::info!("Server shut down gracefully");
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
