//! moodtune-rag - emotion-conditioned track retrieval service
//!
//! Wires the configured store, curator and catalog into the RAG pipeline and
//! serves it over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use moodtune_common::config::{load_config, StoreBackend, TomlConfig};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use moodtune_rag::catalog::{CatalogResolver, MusicServiceClient};
use moodtune_rag::curator::OpenAiCurator;
use moodtune_rag::emotion::EmotionTable;
use moodtune_rag::outcome::{guarded, Outcome};
use moodtune_rag::pipeline::{PipelineConfig, RagPipeline};
use moodtune_rag::store::{MemoryStore, OpenSearchStore, SqliteStore, TrackStore};
use moodtune_rag::AppState;

/// Command-line arguments for moodtune-rag
#[derive(Parser, Debug)]
#[command(name = "moodtune-rag")]
#[command(about = "Emotion-conditioned track retrieval service")]
#[command(version)]
struct Args {
    /// TOML config file (default: ~/.config/moodtune/moodtune.toml)
    #[arg(short, long, env = "MOODTUNE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "MOODTUNE_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "MOODTUNE_PORT")]
    port: Option<u16>,

    /// Store backend: opensearch, sqlite or memory
    #[arg(long)]
    store: Option<StoreBackend>,

    /// Skip the startup seed even when the store is empty
    #[arg(long)]
    no_seed: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(backend) = args.store {
        config.store.backend = backend;
    }

    let level = config.logging.level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("moodtune_rag={},tower_http={}", level, level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting moodtune-rag v{}", env!("CARGO_PKG_VERSION"));

    let store = build_store(&config).await?;
    info!(backend = store.name(), "Document store ready");

    let curator = Arc::new(OpenAiCurator::new(&config.curator)?);
    info!(model = %config.curator.model, "Curator ready");

    let catalog: Arc<dyn CatalogResolver> = Arc::new(
        MusicServiceClient::new(&config.catalog).context("Failed to build catalog client")?,
    );

    let emotions = load_emotion_table(catalog.as_ref(), &config).await?;
    info!(emotions = ?emotions.labels(), "Emotion table loaded");

    let pipeline = Arc::new(RagPipeline::new(
        store,
        curator,
        catalog,
        emotions,
        PipelineConfig::from(&config.rag),
    ));

    if config.rag.auto_seed && !args.no_seed {
        auto_seed(&pipeline, config.rag.seed_per_emotion).await;
    }

    let state = AppState::new(pipeline, &config.rag);
    let app = moodtune_rag::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid listen address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn build_store(config: &TomlConfig) -> Result<Arc<dyn TrackStore>> {
    let store: Arc<dyn TrackStore> = match config.store.backend {
        StoreBackend::OpenSearch => {
            info!(url = %config.store.base_url(), index = %config.store.index, "Using OpenSearch store");
            Arc::new(OpenSearchStore::new(&config.store, config.curator.embedding_dim)?)
        }
        StoreBackend::Sqlite => {
            let path = config.store.sqlite_path_or_default();
            info!("Database: {}", path.display());
            Arc::new(SqliteStore::connect(&path).await?)
        }
        StoreBackend::Memory => {
            warn!("Using in-memory store; documents are lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    if let Err(e) = store.ensure_collection().await {
        warn!(error = %e, "Could not create collection at startup; will retry lazily");
    }
    Ok(store)
}

/// Remote table when the catalog publishes one, else the `[emotions]` config
async fn load_emotion_table(
    catalog: &dyn CatalogResolver,
    config: &TomlConfig,
) -> Result<EmotionTable> {
    match guarded(
        "catalog.emotion_table",
        Duration::from_secs(config.catalog.timeout_secs),
        catalog.emotion_table(),
    )
    .await
    {
        Outcome::Success(table) => Ok(table),
        Outcome::Degraded(_) => {
            info!("Using configured emotion table");
            Ok(EmotionTable::from_config(&config.emotions)?)
        }
    }
}

async fn auto_seed(pipeline: &RagPipeline, per_emotion: usize) {
    let timeout = pipeline.config().call_timeout;
    match guarded("store.count", timeout, pipeline.store().count()).await {
        Outcome::Success(0) => {
            info!(per_emotion, "Store is empty, seeding knowledge base");
            let report = pipeline.seed_knowledge(per_emotion).await;
            info!(indexed = report.indexed, "Startup seed finished");
        }
        Outcome::Success(count) => info!(count, "Store already populated"),
        Outcome::Degraded(_) => warn!("Skipping startup seed, store unreachable"),
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
