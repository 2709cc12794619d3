//! TIDE daemon: configuration, scripted replays and yield projections.

mod replay;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;

use tide_nullables::NullCustody;
use tide_pool::{accrual_delta, ExchangeRate};
use tide_service::{PoolConfig, PoolService};
use tide_utils::{init_logging, LogFormat, SystemClock};

use crate::replay::{Replay, Script};

const DAY_SECS: u64 = 86_400;

#[derive(Parser)]
#[command(name = "tide-daemon", about = "TIDE pooled-asset ledger daemon")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "TIDE_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for pool and wrapper snapshots.
    #[arg(long, env = "TIDE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Target APR over 1e8 (8_000_000 = 8%).
    #[arg(long, env = "TIDE_TARGET_APR")]
    target_apr: Option<u64>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "TIDE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "TIDE_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Print the resolved configuration as TOML.
    ShowConfig,

    /// Apply a JSON script of timed operations to a fresh in-memory pool.
    Replay {
        script: PathBuf,

        /// Abort at the first rejected step instead of recording it.
        #[arg(long)]
        strict: bool,
    },

    /// Print the price per token after `days` of accrual.
    Project {
        #[arg(long)]
        days: u64,

        /// APR over 1e8; defaults to the configured target APR.
        #[arg(long)]
        apr: Option<u64>,

        /// Underlying deposited at the start, in base units.
        #[arg(long, default_value_t = 1_000_000)]
        principal: u128,
    },

    /// Run an in-memory pool, checkpointing to the data directory until interrupted.
    Run,
}

#[derive(Serialize)]
struct Projection {
    days: u64,
    apr: u64,
    principal: u128,
    value: u128,
    price_per_token: u128,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let file_config = match cli.config {
        Some(ref path) => Some(
            PoolConfig::from_toml_file(&path.to_string_lossy())
                .with_context(|| format!("failed to load config from {}", path.display()))?,
        ),
        None => None,
    };
    let file_cfg = file_config.unwrap_or_default();

    let config = PoolConfig {
        data_dir: cli.data_dir.unwrap_or(file_cfg.data_dir.clone()),
        target_apr: cli.target_apr.unwrap_or(file_cfg.target_apr),
        log_level: cli.log_level.unwrap_or(file_cfg.log_level.clone()),
        log_format: cli.log_format.unwrap_or(file_cfg.log_format),
        ..file_cfg
    };
    config.validate().context("invalid configuration")?;

    init_logging(config.log_format, &config.log_level);
    if let Some(ref path) = cli.config {
        tracing::info!("loaded config from {}", path.display());
    }

    match cli.command {
        Command::ShowConfig => {
            print!("{}", config.to_toml_string());
        }
        Command::Replay { script, strict } => {
            let contents = std::fs::read_to_string(&script)
                .with_context(|| format!("failed to read {}", script.display()))?;
            let script: Script =
                serde_json::from_str(&contents).context("failed to parse replay script")?;
            tracing::info!(steps = script.steps.len(), strict, "replaying script");
            let report = Replay::new(&config, &script)?
                .run(&script.steps, strict)
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Project { days, apr, principal } => {
            let apr = apr.unwrap_or(config.target_apr);
            let projection = project(&config, days, apr, principal)?;
            println!("{}", serde_json::to_string_pretty(&projection)?);
        }
        Command::Run => run(&config).await?,
    }

    Ok(())
}

fn project(config: &PoolConfig, days: u64, apr: u64, principal: u128) -> anyhow::Result<Projection> {
    let initial = config.pool_params().initial_ctoken_to_underlying()?;
    let supply = ExchangeRate::new(0, 0, initial).ctoken_by_underlying(principal)?;
    let secs = days
        .checked_mul(DAY_SECS)
        .context("projection horizon overflows")?;
    let value = principal + accrual_delta(principal, apr, secs)?;
    let price_per_token = ExchangeRate::new(value, supply, initial).price_per_token()?;
    Ok(Projection {
        days,
        apr,
        principal,
        value,
        price_per_token,
    })
}

async fn run(config: &PoolConfig) -> anyhow::Result<()> {
    let dir = config.data_dir.as_path();
    let custody = Arc::new(NullCustody::new());
    let service = if PoolService::<Arc<NullCustody>, SystemClock>::has_snapshot(dir) {
        tracing::info!("restoring pool from {}", dir.display());
        PoolService::restore_from(dir, custody, SystemClock)?
    } else {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        PoolService::new(config, custody, SystemClock)?
    };

    tracing::info!(
        interval_secs = config.checkpoint_interval_secs,
        "TIDE pool running on {}",
        dir.display()
    );
    let mut ticker = tokio::time::interval(Duration::from_secs(config.checkpoint_interval_secs));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let accrued = service.checkpoint().await?;
                service.save_to(dir).await?;
                tracing::debug!(accrued, "checkpoint written");
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    tracing::info!("shutdown signal received, writing final snapshot");
    service.checkpoint().await?;
    service.save_to(dir).await?;
    tracing::info!("TIDE daemon exited cleanly");
    Ok(())
}
