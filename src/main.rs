mod bot;
mod config;
mod domain;
mod events;
mod exchanges;
mod execution;
mod market;
mod monitoring;
mod storage;
mod strategy;

use std::env;
use std::path::{Path, PathBuf};
use std::process;

use bot::{Bot, BotConfig, ReplayConfig};
use config::Config;
use monitoring::TradeReport;
use storage::{SqliteTradeStore, SqliteTradeStoreConfig, TradeStore};
use tracing::{Level, error, info};
use tracing_subscriber::{EnvFilter, fmt};

const DEFAULT_CONFIG_PATH: &str = "configs/config.yaml";

/// Command line options.
struct Args {
    config_path: String,
    replay: Option<PathBuf>,
    speed: f64,
    report: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        config_path: DEFAULT_CONFIG_PATH.to_string(),
        replay: None,
        speed: 1.0,
        report: false,
    };

    for arg in env::args().skip(1) {
        if let Some(path) = arg.strip_prefix("--config=") {
            args.config_path = path.to_string();
        } else if let Some(path) = arg.strip_prefix("--replay=") {
            args.replay = Some(PathBuf::from(path));
        } else if let Some(speed) = arg.strip_prefix("--speed=") {
            args.speed = speed
                .parse()
                .map_err(|_| format!("invalid --speed value: {}", speed))?;
        } else if arg == "--report" {
            args.report = true;
        } else {
            return Err(format!("unknown argument: {}", arg));
        }
    }

    Ok(args)
}

fn init_tracing(log_level: Option<&str>) {
    let level = match log_level {
        Some("debug") => Level::DEBUG,
        Some("info") => Level::INFO,
        Some("warn") | Some("warning") => Level::WARN,
        Some("error") => Level::ERROR,
        Some("trace") => Level::TRACE,
        _ => Level::INFO,
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("usage: spread-arb [--config=<path>] [--replay=<file> [--speed=<n>]] [--report]");
            process::exit(2);
        }
    };

    let config = match Config::load(&args.config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            process::exit(1);
        }
    };

    init_tracing(config.app.log_level.as_deref());

    if args.report {
        if let Err(e) = print_report(&config).await {
            eprintln!("{}", e);
            process::exit(1);
        }
        return;
    }

    let replay = args.replay.map(|path| ReplayConfig {
        path,
        speed: args.speed,
    });

    let bot = match Bot::new(BotConfig {
        app_config: config,
        version: env!("CARGO_PKG_VERSION").to_string(),
        replay,
    })
    .await
    {
        Ok(bot) => bot,
        Err(e) => {
            error!(error = %e, "Failed to create bot");
            process::exit(1);
        }
    };

    info!(config = %args.config_path, "Bot initialized");

    match bot.run().await {
        Ok(stats) => info!(
            signals = stats.signals,
            executions = stats.executions,
            pnl = %stats.total_pnl,
            "Session summary"
        ),
        Err(e) => {
            error!(error = %e, "Bot error");
            process::exit(1);
        }
    }
}

/// Prints a summary of the persisted trade log.
async fn print_report(config: &Config) -> Result<(), String> {
    let path = &config.storage.path;
    if !Path::new(path).exists() {
        return Err(format!("No trade log found at {}", path));
    }

    let store = SqliteTradeStore::new(SqliteTradeStoreConfig::new(path))
        .await
        .map_err(|e| format!("Failed to open trade log: {}", e))?;
    let records = store
        .get_all()
        .await
        .map_err(|e| format!("Failed to read trade log: {}", e))?;
    let _ = store.close().await;

    let venues: Vec<String> = config
        .enabled_venues()
        .into_iter()
        .map(|(name, _)| name.to_string())
        .collect();

    print!(
        "{}",
        TradeReport::from_records(&records, &venues, config.dry_run.start_balance)
    );

    Ok(())
}
