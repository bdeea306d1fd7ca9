//! Banter server binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use banter::api::{AppState, create_router};
use banter::relay::Relay;
use banter::session::SessionStore;
use banter::{backend, naming, settings};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Banter - self-hosted LLM chat relay server."
)]
struct Cli {
    /// Override the config file path
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Override the bind host
    #[arg(long)]
    host: Option<String>,
    /// Override the bind port
    #[arg(long)]
    port: Option<u16>,
    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(settings::default_config_path);
    let mut settings = settings::load_or_init(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;
    if let Some(host) = cli.host {
        settings.server.host = host;
    }
    if let Some(port) = cli.port {
        settings.server.port = port;
    }

    // An unsupported backend kind is fatal here, before the server binds.
    let backend = backend::from_settings(&settings.llm).context("constructing LLM backend")?;
    info!(
        "using {} backend (model {})",
        settings.llm.backend, settings.llm.model
    );

    let sessions_dir = settings.sessions_dir();
    let store = Arc::new(
        SessionStore::open(&sessions_dir, settings.chat.max_history)
            .await
            .with_context(|| format!("opening session store at {}", sessions_dir.display()))?,
    );
    info!("session store at {}", sessions_dir.display());

    let naming_queue = settings.naming.enabled.then(|| {
        naming::spawn_worker(store.clone(), backend.clone(), settings.naming.prompt.clone())
    });

    let relay = Relay::new(store.clone(), backend, naming_queue, settings.llm.streaming);
    let settings = Arc::new(settings);
    let router = create_router(AppState::new(store, relay, settings.clone()));

    let listener = TcpListener::bind((settings.server.host.as_str(), settings.server.port))
        .await
        .with_context(|| {
            format!(
                "binding {}:{}",
                settings.server.host, settings.server.port
            )
        })?;
    info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router).await.context("serving")?;
    Ok(())
}

fn init_logging(debug: bool) {
    let default_filter = if debug {
        "banter=debug,tower_http=debug"
    } else {
        "banter=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
