use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use metar_storage::{MemoryStore, MetarStore, PgStore};
use metar_sync::{SyncConfig, SyncPipeline};
use metar_web::AppState;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "metar-cli")]
#[command(about = "Incremental METAR sync and query service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Keep everything in process memory instead of Postgres
    #[arg(long, global = true)]
    memory: bool,

    /// Postgres connection string
    #[arg(long, global = true, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Log filter, e.g. `info` or `metar_sync=debug`
    #[arg(long, global = true, env = "RUST_LOG", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a sync cycle every check period until interrupted
    Sync {
        #[arg(long, env = "METAR_CHECK_PERIOD_SECS")]
        check_period_secs: Option<u64>,

        #[arg(long, env = "METAR_FETCH_CONCURRENCY")]
        concurrency: Option<usize>,

        /// Also serve the query API from this process
        #[arg(long)]
        serve: bool,

        #[arg(long, env = "METAR_WEB_PORT")]
        port: Option<u16>,
    },
    /// Run a single sync cycle and exit
    Once {
        #[arg(long, env = "METAR_FETCH_CONCURRENCY")]
        concurrency: Option<usize>,
    },
    /// Import station coordinates from the stations file
    LoadCoordinates {
        /// Import even if coordinates are already present
        #[arg(long)]
        force: bool,
    },
    /// Serve the query API
    Serve {
        #[arg(long, env = "METAR_WEB_PORT")]
        port: Option<u16>,
    },
    /// Apply database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json)?;

    let mut config = SyncConfig::from_env();
    if let Some(url) = &cli.database_url {
        config.database_url = url.clone();
    }

    match cli.command.unwrap_or(Commands::Sync {
        check_period_secs: None,
        concurrency: None,
        serve: false,
        port: None,
    }) {
        Commands::Sync {
            check_period_secs,
            concurrency,
            serve,
            port,
        } => {
            if let Some(secs) = check_period_secs {
                config.check_period = Duration::from_secs(secs);
            }
            if let Some(n) = concurrency.filter(|n| *n > 0) {
                config.fetch_concurrency = n;
            }
            if let Some(port) = port {
                config.web_port = port;
            }

            let store = open_store(cli.memory, &config).await?;
            bootstrap_coordinates(&config, store.as_ref()).await;
            let pipeline = SyncPipeline::from_config(config.clone(), store.clone())?;

            if serve {
                let listener = metar_web::bind(config.web_port).await?;
                let shutdown = shutdown_on_ctrl_c();
                let web = tokio::spawn({
                    let shutdown = shutdown.clone();
                    async move {
                        let served =
                            metar_web::serve_on(listener, AppState::new(store), shutdown.clone())
                                .await;
                        // A dead query service stops the sync loop too.
                        shutdown.cancel();
                        served
                    }
                });
                let synced = pipeline.run_forever(shutdown.clone()).await;
                shutdown.cancel();
                web.await.context("joining query service")??;
                synced?;
            } else {
                pipeline.run_forever(shutdown_on_ctrl_c()).await?;
            }
        }
        Commands::Once { concurrency } => {
            if let Some(n) = concurrency.filter(|n| *n > 0) {
                config.fetch_concurrency = n;
            }
            let store = open_store(cli.memory, &config).await?;
            bootstrap_coordinates(&config, store.as_ref()).await;
            let pipeline = SyncPipeline::from_config(config, store)?;
            let summary = pipeline.run_cycle(&shutdown_on_ctrl_c()).await?;
            println!(
                "cycle complete: cycle_id={} listed={} new={} inserted={} skipped={} fetch_failures={} parse_failures={} elapsed={:.2?}",
                summary.cycle_id,
                summary.listed,
                summary.new_entries,
                summary.inserted,
                summary.skipped,
                summary.fetch_failures,
                summary.parse_failures,
                summary.elapsed
            );
        }
        Commands::LoadCoordinates { force } => {
            let store = open_store(cli.memory, &config).await?;
            let loader = config.coordinate_loader()?;
            let outcome = if force {
                Some(loader.load(store.as_ref()).await?)
            } else {
                loader.ensure_loaded(store.as_ref()).await?
            };
            match outcome {
                Some(outcome) => println!(
                    "coordinates loaded: inserted={} skipped={}",
                    outcome.inserted, outcome.skipped
                ),
                None => println!("coordinates already present; use --force to reload"),
            }
        }
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.web_port);
            let store = open_store(cli.memory, &config).await?;
            metar_web::serve(AppState::new(store), port, shutdown_on_ctrl_c()).await?;
        }
        Commands::Migrate => {
            if cli.memory {
                bail!("migrate needs a database; drop --memory");
            }
            let store = PgStore::connect(&config.database_url)
                .await
                .context("connecting to postgres")?;
            store.migrate().await.context("running migrations")?;
            println!("migrations applied");
        }
    }

    Ok(())
}

fn init_tracing(filter: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_new(filter).with_context(|| format!("invalid log filter {filter:?}"))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|err| anyhow!(err))
}

async fn open_store(memory: bool, config: &SyncConfig) -> Result<Arc<dyn MetarStore>> {
    if memory {
        info!("using in-memory store");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let store = PgStore::connect(&config.database_url)
        .await
        .context("connecting to postgres")?;
    store.migrate().await.context("running migrations")?;
    Ok(Arc::new(store))
}

/// Coordinates only feed the geo query, so a failed import never blocks syncing.
async fn bootstrap_coordinates(config: &SyncConfig, store: &dyn MetarStore) {
    let loaded = match config.coordinate_loader() {
        Ok(loader) => loader.ensure_loaded(store).await,
        Err(err) => Err(err),
    };
    if let Err(err) = loaded {
        warn!(error = %format!("{err:#}"), "station coordinates not loaded");
    }
}

fn shutdown_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received, shutting down");
                trigger.cancel();
            }
            Err(err) => warn!(error = %err, "cannot listen for ctrl-c"),
        }
    });
    token
}
