use anyhow::{Context, Result};
use clap::Parser;
use modelseed::cache::{CachePolicy, TorrentCache};
use modelseed::catalog::ModelCatalog;
use modelseed::config::{CliArgs, Config};
use modelseed::http::{create_router, AppState};
use modelseed::manifest::ManifestResolver;
use modelseed::store::BlobStore;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "modelseed")]
#[command(about = "Serves private BitTorrent metainfo for models in an Ollama store")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(short, long, env = "MODELSEED_CONFIG")]
    config: Option<PathBuf>,

    /// Root of the model store
    #[arg(long)]
    store: Option<PathBuf>,

    /// Tracker announce URL written into every torrent
    #[arg(long)]
    announce: Option<String>,

    #[arg(long)]
    bind: Option<IpAddr>,

    #[arg(short, long)]
    port: Option<u16>,

    /// Directory torrents are written to
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// When a cached torrent is reused: `content` or `existence`
    #[arg(long)]
    cache_policy: Option<CachePolicy>,

    /// Also build a torrent covering the whole store
    #[arg(long)]
    store_torrent: bool,

    /// Seconds between store rescans (0 disables)
    #[arg(long)]
    rescan_interval: Option<u64>,

    #[arg(long)]
    max_concurrent_builds: Option<usize>,

    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn into_args(self) -> CliArgs {
        CliArgs {
            config_file: self.config,
            store_root: self.store,
            announce: self.announce,
            bind: self.bind,
            port: self.port,
            cache_dir: self.cache_dir,
            cache_policy: self.cache_policy,
            store_torrent: self.store_torrent,
            rescan_interval_secs: self.rescan_interval,
            max_concurrent_builds: self.max_concurrent_builds,
            log_level: self.log_level,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse().into_args();
    let config = Config::load_with_cli(&args).context("failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    config.validate()?;

    let store = BlobStore::new(config.store.root.clone());
    let resolver = ManifestResolver::new(
        store,
        config.store.namespace.clone(),
        config.store.missing_blob,
    );
    let cache = TorrentCache::new(config.artifact_dir(), config.cache.policy);
    let options = config.catalog_options();
    info!(
        store = %config.store.root.display(),
        artifacts = %cache.dir().display(),
        announce = %options.announce,
        "starting modelseed"
    );

    let catalog = Arc::new(ModelCatalog::new(resolver, cache, options));
    let snapshot = tokio::select! {
        result = catalog.refresh() => result.context("initial store scan failed")?,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted during initial scan");
            return Ok(());
        }
    };
    info!(models = snapshot.len(), built = snapshot.built(), "catalog ready");

    let rescanner = config
        .rescan_interval()
        .map(|interval| tokio::spawn(rescan(Arc::clone(&catalog), interval)));

    let app = create_router(AppState::new(catalog));
    let addr = SocketAddr::new(config.server.bind, config.server.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(task) = rescanner {
        task.abort();
    }
    info!("shut down");
    Ok(())
}

async fn rescan(catalog: Arc<ModelCatalog>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately and the initial scan already ran.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if let Err(e) = catalog.refresh().await {
            error!(error = %e, "store rescan failed; keeping previous catalog");
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
