//! Binary entrypoint for the Amiibo Finder CLI.
//!
//! Commands:
//! - `init` - write a starter `config.toml` and create the data directory
//! - `status` - cooldown countdown, collection size and catalog cache state
//! - `unlock` - try to unlock a new figure
//! - `watch` - poll the cooldown and announce when the next gift is ready
//! - `list [--name <prefix>] [--series <name>] [--sort <mode>] [--favorites]`
//! - `series` - distinct series across the collection
//! - `favorite <id>` - toggle the favorite flag (`id` is `head` + `tail`)
//! - `export [--out <file>]` / `import <file>` - JSON backup of the collection
//! - `clear --yes` - empty the collection
//!
//! See the library crate docs for module-level details: `amiibofinder::`.
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::{debug, info, warn};
use std::sync::{Arc, Mutex};

use amiibofinder::collection::{CollectionStore, Item, ItemId};
use amiibofinder::config::Config;
use amiibofinder::filter::{self, FilterCriteria, SortMode};
use amiibofinder::metrics;
use amiibofinder::storage::{read_json, FileStore, KeyValueStore, KEY_CATALOG_CACHE};
use amiibofinder::unlock::{
    format_remaining, spawn_cooldown_watcher, LogNotifier, SystemClock, UnlockEngine,
    UnlockEvent, UnlockOutcome,
};

#[derive(Parser)]
#[command(name = "amiibofinder")]
#[command(about = "Unlock and browse a personal Amiibo collection")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a default configuration file and data directory
    Init,
    /// Show cooldown and collection status
    Status,
    /// Unlock a random figure you don't own yet
    Unlock,
    /// Keep running and announce when the cooldown finishes
    Watch,
    /// List owned figures
    List {
        /// Case-insensitive name prefix
        #[arg(short, long)]
        name: Option<String>,
        /// Exact series name
        #[arg(short, long)]
        series: Option<String>,
        /// newest, oldest, name-asc, name-desc, series, favorites-first
        #[arg(long, default_value = "newest")]
        sort: SortMode,
        /// Only favorites
        #[arg(short, long)]
        favorites: bool,
    },
    /// List the distinct series in the collection
    Series,
    /// Toggle the favorite flag on an owned figure
    Favorite {
        /// Figure id (head + tail)
        id: String,
    },
    /// Export the collection as JSON
    Export {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        out: Option<String>,
    },
    /// Replace the collection with a JSON export
    Import {
        /// File produced by `export`
        file: String,
    },
    /// Remove every figure from the collection
    Clear {
        /// Confirm the wipe
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Init writes the config, so there is nothing to load yet
    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);
    let config = match pre_config {
        Some(cfg) => cfg,
        None => {
            debug!("No config loaded from {}; using defaults", cli.config);
            Config::default()
        }
    };

    let store = Arc::new(FileStore::open(&config.storage.data_dir)?);
    let collection = Arc::new(Mutex::new(CollectionStore::load(store.clone())));

    match cli.command {
        Commands::Init => {
            info!("Initializing new Amiibo Finder configuration");
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
            info!("Data directory ready at {}", store.data_dir().display());
        }
        Commands::Status => {
            let engine = build_engine(&config, store.clone(), collection.clone())?;
            let status = engine.status();
            let owned = lock(&collection).len();
            let cached = read_json::<Vec<Item>>(store.as_ref(), KEY_CATALOG_CACHE).map(|c| c.len());
            println!("Amiibo Finder v{}", env!("CARGO_PKG_VERSION"));
            println!("State: {:?}", status.state);
            if status.is_locked() {
                println!("Next gift in: {}", format_remaining(status.remaining));
            } else {
                println!("Gift ready: unlock now!");
            }
            if let Some(at) = status.last_unlock_at {
                println!("Last unlock: {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
            }
            match cached {
                Some(total) => println!("Collection: {} of {} figures", owned, total),
                None => println!("Collection: {} figures (catalog not cached yet)", owned),
            }
        }
        Commands::Unlock => {
            let engine = build_engine(&config, store.clone(), collection.clone())?;
            match engine.unlock().await {
                UnlockOutcome::Unlocked(item) => {
                    println!("🎉 You unlocked {} ({})!", item.name, item.series);
                    println!("   id: {}", item.id());
                    println!(
                        "Next gift in {}",
                        format_remaining(engine.remaining_cooldown())
                    );
                }
                UnlockOutcome::CoolingDown(left) => {
                    println!("Next gift in {}", format_remaining(left));
                }
                UnlockOutcome::CollectionComplete => {
                    println!("You have collected every figure. Congratulations!");
                }
                UnlockOutcome::NetworkFailure(e) => {
                    println!("Could not reach the catalog ({}). Try again.", e);
                }
                UnlockOutcome::StorageFailure(e) => {
                    return Err(anyhow!("failed to save unlock: {}", e));
                }
                UnlockOutcome::InFlight => {}
            }
            debug!("metrics: {:?}", metrics::snapshot());
        }
        Commands::Watch => {
            let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
            let engine = Arc::new(
                build_engine(&config, store.clone(), collection.clone())?.with_events(tx),
            );
            let watcher = spawn_cooldown_watcher(engine.clone(), config.unlock.poll_interval());
            let status = engine.status();
            if status.is_locked() {
                info!("Watching cooldown: next gift in {}", format_remaining(status.remaining));
            } else {
                info!("Gift ready: run `amiibofinder unlock`");
            }
            loop {
                tokio::select! {
                    event = rx.recv() => match event {
                        Some(UnlockEvent::CooldownReady) => println!("🎁 Your gift is ready!"),
                        Some(UnlockEvent::Celebrate(item)) => println!("🎉 {}", item.name),
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => {
                        info!("Shutting down watcher");
                        break;
                    }
                }
            }
            watcher.stop().await;
            debug!("metrics: {:?}", metrics::snapshot());
        }
        Commands::List {
            name,
            series,
            sort,
            favorites,
        } => {
            let criteria = FilterCriteria {
                name_prefix: name.unwrap_or_default(),
                series: series.unwrap_or_default(),
                sort_mode: sort,
                favorites_only: favorites,
            };
            let guard = lock(&collection);
            let shown = filter::project(guard.items(), &criteria);
            for item in &shown {
                println!(
                    "{} {:<24} {:<28} {} {}",
                    if item.is_favorite { "★" } else { " " },
                    item.name,
                    item.series,
                    item.unlocked_at.as_deref().unwrap_or("-"),
                    item.id()
                );
            }
            println!("{}", filter::summarize(shown.len(), guard.len(), &criteria));
        }
        Commands::Series => {
            for series in filter::unique_series(lock(&collection).items()) {
                println!("{}", series);
            }
        }
        Commands::Favorite { id } => {
            let id = ItemId::from(id);
            match lock(&collection).toggle_favorite(&id)? {
                Some(true) => println!("★ {} is now a favorite", id),
                Some(false) => println!("{} removed from favorites", id),
                None => println!("No owned figure with id {}", id),
            }
        }
        Commands::Export { out } => {
            let json = lock(&collection).export_json()?;
            match out {
                Some(path) => {
                    tokio::fs::write(&path, json).await?;
                    info!("Collection exported to {}", path);
                }
                None => println!("{}", json),
            }
        }
        Commands::Import { file } => {
            let raw = tokio::fs::read_to_string(&file)
                .await
                .map_err(|e| anyhow!("Failed to read {}: {}", file, e))?;
            let count = lock(&collection).import_json(&raw)?;
            println!("Imported {} figures from {}", count, file);
        }
        Commands::Clear { yes } => {
            if !yes {
                warn!("Refusing to clear without --yes");
                return Ok(());
            }
            lock(&collection).clear()?;
            println!("Collection cleared");
        }
    }

    Ok(())
}

fn lock(collection: &Mutex<CollectionStore>) -> std::sync::MutexGuard<'_, CollectionStore> {
    collection.lock().expect("collection mutex poisoned")
}

fn build_engine(
    config: &Config,
    store: Arc<FileStore>,
    collection: Arc<Mutex<CollectionStore>>,
) -> Result<UnlockEngine> {
    let store: Arc<dyn KeyValueStore> = store;
    let engine = UnlockEngine::new(
        store,
        collection,
        engine_source(config)?,
        Arc::new(SystemClock),
        (&config.unlock).into(),
    )
    .with_notifier(Arc::new(LogNotifier::new(config.notifications.enabled)));

    #[cfg(feature = "http")]
    let engine = engine.with_preloader(Arc::new(amiibofinder::unlock::HttpImagePreloader::new()));

    Ok(engine)
}

#[cfg(feature = "http")]
fn engine_source(config: &Config) -> Result<Arc<dyn amiibofinder::catalog::CatalogSource>> {
    Ok(Arc::new(amiibofinder::catalog::HttpCatalog::new(
        config.catalog.clone(),
    )))
}

#[cfg(not(feature = "http"))]
fn engine_source(_config: &Config) -> Result<Arc<dyn amiibofinder::catalog::CatalogSource>> {
    Err(anyhow!(
        "catalog access requires the 'http' feature (cargo build --features http)"
    ))
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|cfg| cfg.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .as_ref()
        .and_then(|cfg| cfg.logging.file.as_ref())
        .and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });

    if let Some(f) = log_file {
        let write_mutex = Arc::new(Mutex::new(f));
        // Interactive runs also echo to the console
        let is_tty = atty::is(atty::Stream::Stdout);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}
