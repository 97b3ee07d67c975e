use anyhow::{Context, Result};
use clap::Parser;
use fwdcache_server::config::LoggingConfig;
use fwdcache_server::{AppState, ProxyMode, ServerConfig, create_router};
use std::path::PathBuf;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fwdcache-server")]
#[command(about = "Caching HTTP forwarding proxy", long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen host
    #[arg(long)]
    host: Option<String>,

    /// Listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Target resolution mode
    #[arg(short, long, value_enum)]
    mode: Option<ProxyMode>,

    /// Maximum number of cached responses
    #[arg(long)]
    cache_capacity: Option<usize>,

    /// Upstream request timeout in seconds
    #[arg(long)]
    fetch_timeout_secs: Option<u64>,
}

impl Args {
    fn load_config(&self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => ServerConfig::default(),
        };

        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(mode) = self.mode {
            config.proxy.mode = mode;
        }
        if let Some(capacity) = self.cache_capacity {
            config.cache.capacity = capacity;
        }
        if let Some(timeout) = self.fetch_timeout_secs {
            config.proxy.fetch_timeout_secs = timeout;
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.load_config()?;

    init_tracing(&config.logging);

    info!("Starting fwdcache v{}", env!("CARGO_PKG_VERSION"));
    info!(
        mode = %config.proxy.mode,
        cache_capacity = config.cache.capacity,
        fetch_timeout_secs = config.proxy.fetch_timeout_secs,
        "proxy configured"
    );

    let state = AppState::from_config(&config).context("failed to build upstream client")?;
    let cache = state.cache.clone();
    let app = create_router(state);

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let stats = cache.stats();
    info!(
        hits = stats.hits,
        misses = stats.misses,
        evictions = stats.evictions,
        entries = stats.entries,
        capacity = stats.capacity,
        hit_rate = stats.hit_rate(),
        "cache summary"
    );
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT"),
        () = terminate => info!("received SIGTERM"),
    }
}
