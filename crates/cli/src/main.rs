use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use fixture_store::{
    AssetCatalog, AssetServer, CatalogServer, FixtureStore, Params, RefreshErrorPolicy,
    RefreshOutcome, RefreshTrigger, RefreshUpdate, StoreConfig,
};
use log::{info, warn};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

#[derive(Parser)]
#[command(name = "fixture-store")]
#[command(about = "Serve image fixtures from an in-memory catalog", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,

    /// TOML config file (dir and refresh settings)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Fixture directory (overrides `dir` from --config)
    #[arg(long, short = 'd', global = true)]
    dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the directory and print the catalog as JSON
    List(ListArgs),

    /// Resolve one asset through the `source` parameter and write its bytes
    Get(GetArgs),

    /// Load the directory and keep refreshing it until interrupted
    Watch(WatchArgs),
}

#[derive(Args)]
struct ListArgs {
    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct GetArgs {
    /// Asset filename
    name: String,

    /// Write to this file instead of stdout
    #[arg(long, short = 'o')]
    out: Option<PathBuf>,
}

#[derive(Args)]
struct WatchArgs {
    /// Poll interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// What forces a rebuild
    #[arg(long, value_enum)]
    trigger: Option<TriggerFlag>,

    /// What to do when a refresh tick fails
    #[arg(long, value_enum)]
    on_error: Option<OnErrorFlag>,
}

#[derive(Copy, Clone, ValueEnum)]
enum TriggerFlag {
    Additions,
    AnyDifference,
}

impl TriggerFlag {
    const fn as_domain(self) -> RefreshTrigger {
        match self {
            TriggerFlag::Additions => RefreshTrigger::Additions,
            TriggerFlag::AnyDifference => RefreshTrigger::AnyDifference,
        }
    }
}

#[derive(Copy, Clone, ValueEnum)]
enum OnErrorFlag {
    Abort,
    LogAndRetry,
}

impl OnErrorFlag {
    const fn as_domain(self) -> RefreshErrorPolicy {
        match self {
            OnErrorFlag::Abort => RefreshErrorPolicy::Abort,
            OnErrorFlag::LogAndRetry => RefreshErrorPolicy::LogAndRetry,
        }
    }
}

#[derive(Serialize)]
struct AssetListing {
    name: String,
    format: String,
    bytes: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = resolve_config(cli.config.as_deref(), cli.dir.clone())?;

    match cli.command {
        Commands::List(args) => run_list(args, config).await?,
        Commands::Get(args) => run_get(args, config).await?,
        Commands::Watch(args) => run_watch(args, config).await?,
    }

    Ok(())
}

fn resolve_config(path: Option<&std::path::Path>, dir: Option<PathBuf>) -> Result<StoreConfig> {
    let mut config = match path {
        Some(path) => StoreConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => StoreConfig::new(dir.clone().context("either --dir or --config is required")?),
    };
    if let Some(dir) = dir {
        config.dir = dir;
    }
    Ok(config)
}

async fn load_catalog(config: &StoreConfig) -> Result<Arc<AssetCatalog>> {
    let catalog = Arc::new(AssetCatalog::open_dir(&config.dir));
    let loader = catalog.clone();
    tokio::task::spawn_blocking(move || loader.load())
        .await
        .context("load task panicked")?
        .with_context(|| format!("Failed to load {}", config.dir.display()))?;
    Ok(catalog)
}

async fn run_list(args: ListArgs, config: StoreConfig) -> Result<()> {
    let catalog = load_catalog(&config).await?;
    let snapshot = catalog.snapshot();
    let listing: Vec<AssetListing> = snapshot
        .names()
        .into_iter()
        .filter_map(|name| {
            let record = snapshot.get(&name)?;
            Some(AssetListing {
                format: record.format.as_str().to_string(),
                bytes: record.len(),
                name,
            })
        })
        .collect();

    if args.pretty {
        println!("{}", serde_json::to_string_pretty(&listing)?);
    } else {
        println!("{}", serde_json::to_string(&listing)?);
    }
    Ok(())
}

async fn run_get(args: GetArgs, config: StoreConfig) -> Result<()> {
    let server = CatalogServer::new(load_catalog(&config).await?);
    let record = server.serve(&Params::with_source(args.name))?;

    match args.out {
        Some(path) => {
            std::fs::write(&path, &record.data)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(
                "Wrote {} bytes ({}) to {}",
                record.len(),
                record.format,
                path.display()
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&record.data)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

async fn run_watch(args: WatchArgs, mut config: StoreConfig) -> Result<()> {
    let mut refresh = config.refresh.unwrap_or_default();
    if let Some(interval_ms) = args.interval_ms {
        refresh.interval_ms = interval_ms;
    }
    if let Some(trigger) = args.trigger {
        refresh.trigger = trigger.as_domain();
    }
    if let Some(on_error) = args.on_error {
        refresh.on_error = on_error.as_domain();
    }
    config.refresh = Some(refresh);

    let store = FixtureStore::start(config)
        .await
        .context("Failed to start fixture store")?;
    let refresh = store
        .refresh()
        .context("refresh loop did not start")?
        .clone();
    let mut updates = refresh.subscribe_updates();
    let mut status = refresh.status_stream();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted, stopping refresh loop");
                break;
            }
            update = updates.recv() => match update {
                Ok(update) => report_update(&update),
                Err(RecvError::Lagged(skipped)) => warn!("Missed {skipped} refresh updates"),
                Err(RecvError::Closed) => break,
            },
            changed = status.changed() => {
                if changed.is_err() || !status.borrow().running {
                    break;
                }
            }
        }
    }

    store.shutdown().await.context("Refresh loop failed")?;
    Ok(())
}

fn report_update(update: &RefreshUpdate) {
    match (&update.outcome, &update.error) {
        (Some(RefreshOutcome::Rebuilt { added, removed, stats }), _) => info!(
            "Rebuilt catalog in {}ms: {} files (added {:?}, removed {:?})",
            update.duration_ms, stats.files, added, removed
        ),
        (Some(RefreshOutcome::Unchanged), _) => {
            log::debug!("No new files ({})", update.reason);
        }
        (None, Some(err)) => warn!("Refresh failed: {err}"),
        (None, None) => {}
    }
}
