//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use ndc_core::{CycleReport, EngineHandle, StoreView};
use ndc_fetch::Upstream;
use ndc_shared::{AppConfig, Credentials, NdcError, init_config, load_config, load_config_from};
use ndc_storage::Storage;
use serde::Serialize;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ndc-candidates: enrich election candidates with on-chain data.
#[derive(Parser)]
#[command(
    name = "ndc-candidates",
    version,
    about = "Seed and incrementally enrich the election candidate store.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.ndc-candidates/ndc-candidates.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// State database path, overriding `[storage] db_path`.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run enrichment cycles (seeding the store first if needed).
    Cycle {
        /// Listing/analytics provider key. Falls back to the env var named in config.
        #[arg(long)]
        pikespeak_key: Option<String>,

        /// NFT provider key. Falls back to the env var named in config.
        #[arg(long)]
        pagoda_key: Option<String>,

        /// Number of consecutive cycles to run.
        #[arg(short = 'n', long, default_value = "1")]
        cycles: u32,
    },

    /// Print every candidate record as JSON.
    Candidates,

    /// Print fungible-token metadata as JSON.
    FtMetas,

    /// Print non-fungible-token metadata as JSON.
    NftMetas,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "ndc=info",
        1 => "ndc=debug",
        _ => "ndc=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    let db = cli.db.as_deref();

    match cli.command {
        Command::Cycle {
            pikespeak_key,
            pagoda_key,
            cycles,
        } => cmd_cycle(config_path, db, pikespeak_key, pagoda_key, cycles).await,
        Command::Candidates => {
            let view = inspect(config_path, db).await?;
            print_json(&view.candidates().map_err(read_error)?)
        }
        Command::FtMetas => print_json(&inspect(config_path, db).await?.ft_metas()),
        Command::NftMetas => print_json(&inspect(config_path, db).await?.nft_metas()),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

fn db_path(config: &AppConfig, db: Option<&Path>) -> PathBuf {
    db.map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&config.storage.db_path))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_cycle(
    config_path: Option<&Path>,
    db: Option<&Path>,
    pikespeak_key: Option<String>,
    pagoda_key: Option<String>,
    cycles: u32,
) -> Result<()> {
    let config = resolve_config(config_path)?;

    let mut creds = Credentials::from_env(&config.credentials);
    if let Some(key) = pikespeak_key {
        creds.pikespeak_api_key = key;
    }
    if let Some(key) = pagoda_key {
        creds.pagoda_api_key = key;
    }

    let path = db_path(&config, db);
    let storage = Storage::open(&path).await?;
    let upstream = Upstream::new(&config.upstream, config.retry.clone())?;
    let handle = EngineHandle::spawn(storage, upstream, config.cycle.clone());
    info!(db = %path.display(), cycles, "engine started");

    for n in 1..=cycles {
        match handle.trigger(creds.clone()).await {
            Ok(report) => print_report(n, &report),
            Err(e) => {
                return Err(eyre!("cycle {n} failed with status {}: {e}", e.status_code()));
            }
        }
    }
    Ok(())
}

/// Snapshot the store read-only. Upstream settings are not needed here.
async fn inspect(config_path: Option<&Path>, db: Option<&Path>) -> Result<StoreView> {
    let config = resolve_config(config_path)?;
    let path = db_path(&config, db);
    let storage = Storage::open_readonly(&path).await?;
    Ok(StoreView::load(&storage).await?)
}

fn read_error(e: NdcError) -> color_eyre::Report {
    match e {
        NdcError::NotSeeded => eyre!("the candidate store has not been seeded yet; run `cycle` first"),
        other => other.into(),
    }
}

fn print_report(n: u32, report: &CycleReport) {
    let mut line = format!(
        "cycle {n}: {} advanced, cursor {}/{}, {} calls",
        report.advanced, report.cursor, report.candidates, report.calls
    );
    if report.seeded {
        line.push_str(", seeded");
    }
    if report.stopped_on_budget {
        line.push_str(", budget reached");
    }
    if let Some(failure) = &report.failure {
        line.push_str(&format!(
            ", stopped at {} ({}): {}",
            failure.candidate, failure.step, failure.error
        ));
    }
    if !report.persisted {
        line.push_str(", NOT persisted");
    }
    println!("{line}");
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
