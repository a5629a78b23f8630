use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fxbook_config::{load_config, AppConfig, LoggingConfig};
use fxbook_core::{AccountId, Currency};
use fxbook_engine::FxBook;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fxbook", version)]
#[command(about = "FIFO lot accounting for a two-currency exchange desk", long_about = None)]
struct Cli {
    /// Directory holding default.toml and per-environment overrides
    #[arg(long, global = true, default_value = "config")]
    config_dir: PathBuf,

    /// Environment overlay to apply (loads <config-dir>/<env>.toml)
    #[arg(long, global = true)]
    env: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema and the profit account
    Init,

    /// Compare balances, ledger and inventory; exits non-zero on mismatch
    Check {
        /// Only check this currency (defaults to both)
        #[arg(long)]
        currency: Option<String>,
    },

    /// Reset drifted account balances to their ledger replay
    Repair {
        #[arg(long)]
        currency: Option<String>,

        /// Reason stored on every correction entry
        #[arg(long, default_value = "operator repair")]
        reason: String,

        /// Required acknowledgement that balances will be rewritten
        #[arg(long, default_value_t = false)]
        confirm: bool,
    },

    /// Print the inventory summary
    Inventory {
        #[arg(long)]
        currency: Option<String>,
    },

    /// Print one page of an account's ledger with running balances
    History {
        account: i64,

        #[arg(long, default_value_t = 1)]
        page: usize,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = load_config(&cli.config_dir, cli.env.as_deref())
        .with_context(|| format!("failed to load config from {}", cli.config_dir.display()))?;
    init_tracing(&config.logging);

    match cli.command {
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Init => {
            let book = open_book(&config)?;
            info!(
                database = %config.database.path.display(),
                profit_account = %book.profit_account_id(),
                "database initialized"
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check { currency } => {
            let book = open_book(&config)?;
            let mut consistent = true;
            for currency in currencies(&config, currency.as_deref())? {
                let report = book.check_consistency(&currency)?;
                consistent &= report.is_consistent();
                print_json(&report)?;
            }
            Ok(if consistent {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            })
        }
        Commands::Repair {
            currency,
            reason,
            confirm,
        } => {
            if !confirm {
                bail!("repair rewrites account balances; re-run with --confirm");
            }
            let book = open_book(&config)?;
            let mut consistent = true;
            for currency in currencies(&config, currency.as_deref())? {
                let report = book.repair(&currency, &reason)?;
                consistent &= report.report.is_consistent();
                print_json(&report)?;
            }
            Ok(if consistent {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            })
        }
        Commands::Inventory { currency } => {
            let book = open_book(&config)?;
            let currency = match currency {
                Some(code) => parse_currency(&code)?,
                None => config.engine.foreign_currency.clone(),
            };
            print_json(&book.inventory_summary(&currency)?)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::History { account, page } => {
            let book = open_book(&config)?;
            print_json(&book.ledger_history(AccountId(account), page)?)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn open_book(config: &AppConfig) -> Result<FxBook> {
    FxBook::open(config).with_context(|| {
        format!(
            "failed to open books at {}",
            config.database.path.display()
        )
    })
}

fn currencies(config: &AppConfig, requested: Option<&str>) -> Result<Vec<Currency>> {
    match requested {
        Some(code) => Ok(vec![parse_currency(code)?]),
        None => Ok(vec![
            config.engine.foreign_currency.clone(),
            config.engine.home_currency.clone(),
        ]),
    }
}

fn parse_currency(code: &str) -> Result<Currency> {
    code.parse::<Currency>().map_err(anyhow::Error::msg)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
