//! companion-nlp - NLP orchestration service
//!
//! Startup order:
//! 1. Configuration and logging
//! 2. HTTP gateway (health answers `loading` from here on)
//! 3. Model load on the blocking pool; failure is fatal
//! 4. Bus registration of every NLP address

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use companion_common::config::{self, AnalyzeMode, RootFolderResolver, StoreBackend};
use companion_common::events::EventBus;
use companion_common::store::{InMemoryReferenceStore, ReferenceStore, SqliteReferenceStore};
use companion_common::{MessageBus, NlpAddress};
use companion_nlp::{build_router, AppState, ModelSet, NlpService, ServiceStatus, StartOptions};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter};

const MODULE_NAME: &str = "companion-nlp";

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "companion-nlp", version, about = "NLP orchestration service")]
struct Args {
    /// Configuration file (default: <config_dir>/companion/companion-nlp.toml)
    #[arg(long, env = "COMPANION_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder for models and the reference database
    #[arg(long, env = "COMPANION_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Directory holding the four model resources
    #[arg(long, env = "COMPANION_MODELS_DIR")]
    models_dir: Option<PathBuf>,

    /// HTTP bind address
    #[arg(long, env = "COMPANION_HOST")]
    host: Option<String>,

    /// HTTP port
    #[arg(long, env = "COMPANION_PORT")]
    port: Option<u16>,

    /// Default `nlp.analyze` mode: inline or reference
    #[arg(long, env = "COMPANION_ANALYZE_MODE")]
    analyze_mode: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logging comes up before the config file is read; the configured level
    // replaces the bootstrap filter afterwards unless RUST_LOG is set
    let env_filter = EnvFilter::try_from_default_env().ok();
    let has_env_filter = env_filter.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new("info")));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    info!(
        "Starting Companion NLP (companion-nlp) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config_path = args
        .config
        .clone()
        .or_else(|| config::default_config_path(MODULE_NAME));
    let mut config = config::load_or_default(config_path.as_deref())?;
    if config_path.is_none() {
        info!("No configuration directory, using built-in defaults");
    }

    if !has_env_filter {
        match EnvFilter::try_new(&config.logging.level) {
            Ok(level) => filter_handle.reload(level)?,
            Err(e) => warn!("Invalid log level {:?}, keeping info: {}", config.logging.level, e),
        }
    }

    if let Some(mode) = &args.analyze_mode {
        config.analyze.mode = mode.parse::<AnalyzeMode>()?;
    }
    config.validate()?;

    let root_folder = RootFolderResolver::new()
        .with_cli_arg(args.root_folder.clone())
        .with_toml_config(&config)
        .resolve();
    info!("Root folder: {}", root_folder.display());

    let store: Arc<dyn ReferenceStore> = match config.store.backend {
        StoreBackend::Memory => Arc::new(InMemoryReferenceStore::new()),
        StoreBackend::Sqlite => {
            let db_path = config.database_path(&root_folder);
            info!("Reference database: {}", db_path.display());
            Arc::new(
                SqliteReferenceStore::open(&db_path)
                    .await
                    .with_context(|| format!("Opening {}", db_path.display()))?,
            )
        }
    };
    info!("Reference store backend: {}", store.backend_name());

    let bus = MessageBus::new(config.bus.capacity);
    let events = EventBus::new(config.bus.event_capacity);
    let state = AppState::new(
        bus.clone(),
        events.clone(),
        Duration::from_millis(config.http.request_timeout_ms),
    );

    // Gateway first, so /health answers during model load
    let host = args.host.clone().unwrap_or_else(|| config.http.host.clone());
    let port = args.port.unwrap_or(config.http.port);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", host, port))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("companion-nlp listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    let app = build_router(state.clone());
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
    });

    let models_dir = resolve_models_dir(&args, &config, &root_folder);
    let options = StartOptions {
        default_mode: config.analyze.mode,
        reference_locking: config.store.serialize_per_reference,
    };
    let dispatchers = match NlpService::start(&models_dir, store, events, &bus, options).await {
        Ok(dispatchers) => dispatchers,
        Err(e) => {
            error!("NLP service failed to start, no bus addresses registered: {}", e);
            state.set_status(ServiceStatus::Failed(e.to_string())).await;
            server.abort();
            return Err(e.into());
        }
    };

    state.set_status(ServiceStatus::Ready).await;
    info!("✓ NLP service ready");

    server.await??;

    // Dropping the senders ends the dispatch loops
    for address in NlpAddress::ALL {
        bus.unregister(address.address()).await;
    }
    for dispatcher in dispatchers {
        if let Err(e) = dispatcher.await {
            warn!("Dispatch task ended abnormally: {}", e);
        }
    }

    info!("companion-nlp stopped");
    Ok(())
}

/// CLI, then TOML, then `<root>/nlp`, then the bundled resources
fn resolve_models_dir(
    args: &Args,
    config: &config::TomlConfig,
    root_folder: &std::path::Path,
) -> PathBuf {
    if let Some(dir) = &args.models_dir {
        return dir.clone();
    }
    let dir = config.models_dir(root_folder);
    if config.models.dir.is_none() && !dir.exists() {
        let bundled = ModelSet::bundled_dir();
        info!(
            "{} does not exist, using bundled models at {}",
            dir.display(),
            bundled.display()
        );
        return bundled;
    }
    dir
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
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
