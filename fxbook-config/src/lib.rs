//! Typed settings for the fxbook engine and its operator tooling.
//!
//! Sources are layered, later ones winning:
//! 1. built-in defaults ([`AppConfig::default`]),
//! 2. `<config_dir>/default.toml`,
//! 3. `<config_dir>/<env>.toml` when an environment name is given,
//! 4. `FXBOOK__<SECTION>__<KEY>` environment variables.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use fxbook_core::Currency;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const ENV_PREFIX: &str = "FXBOOK";

/// Root configuration object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        if self.database.path.as_os_str().is_empty() {
            bail!("database.path must not be empty");
        }
        Ok(())
    }

    /// Render the effective configuration, used by `fxbook config`.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to render configuration as TOML")
    }
}

/// SQLite storage settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "DatabaseConfig::default_path")]
    pub path: PathBuf,
    /// How long a writer waits on a locked database before reporting a
    /// conflict to the retry loop.
    #[serde(default = "DatabaseConfig::default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl DatabaseConfig {
    fn default_path() -> PathBuf {
        PathBuf::from("data/fxbook.db")
    }

    fn default_busy_timeout_ms() -> u64 {
        5_000
    }

    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join("fxbook.db"),
            ..Self::default()
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
            busy_timeout_ms: Self::default_busy_timeout_ms(),
        }
    }
}

/// Accounting rules applied by the allocation engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "EngineConfig::default_home_currency")]
    pub home_currency: Currency,
    #[serde(default = "EngineConfig::default_foreign_currency")]
    pub foreign_currency: Currency,
    /// Tolerance used when comparing account totals against inventory.
    #[serde(default = "EngineConfig::default_epsilon")]
    pub epsilon: Decimal,
    /// Decimal places kept for home-currency amounts.
    #[serde(default = "EngineConfig::default_money_scale")]
    pub money_scale: u32,
    #[serde(default = "EngineConfig::default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "EngineConfig::default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "EngineConfig::default_history_page_size")]
    pub history_page_size: usize,
}

impl EngineConfig {
    fn default_home_currency() -> Currency {
        Currency::from("TWD")
    }

    fn default_foreign_currency() -> Currency {
        Currency::from("RMB")
    }

    fn default_epsilon() -> Decimal {
        Decimal::new(1, 2)
    }

    fn default_money_scale() -> u32 {
        2
    }

    fn default_max_retries() -> u32 {
        3
    }

    fn default_retry_backoff_ms() -> u64 {
        25
    }

    fn default_history_page_size() -> usize {
        50
    }

    pub fn validate(&self) -> Result<()> {
        if self.home_currency == self.foreign_currency {
            bail!(
                "engine.home_currency and engine.foreign_currency must differ (both {})",
                self.home_currency
            );
        }
        if self.epsilon < Decimal::ZERO {
            bail!("engine.epsilon must be non-negative, got {}", self.epsilon);
        }
        if self.money_scale > 8 {
            bail!("engine.money_scale must be at most 8, got {}", self.money_scale);
        }
        if self.history_page_size == 0 {
            bail!("engine.history_page_size must be positive");
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            home_currency: Self::default_home_currency(),
            foreign_currency: Self::default_foreign_currency(),
            epsilon: Self::default_epsilon(),
            money_scale: Self::default_money_scale(),
            max_retries: Self::default_max_retries(),
            retry_backoff_ms: Self::default_retry_backoff_ms(),
            history_page_size: Self::default_history_page_size(),
        }
    }
}

/// Log output settings consumed by the CLI subscriber.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
        }
    }
}

/// Load configuration from `config_dir`, optionally layering `<env>.toml`.
pub fn load_config(config_dir: impl AsRef<Path>, env: Option<&str>) -> Result<AppConfig> {
    let dir = config_dir.as_ref();
    let defaults = Config::try_from(&AppConfig::default())
        .context("failed to seed configuration defaults")?;
    let mut builder = Config::builder()
        .add_source(defaults)
        .add_source(File::from(dir.join("default.toml")).required(false));
    if let Some(name) = env {
        builder = builder.add_source(File::from(dir.join(format!("{name}.toml"))).required(false));
    }
    let config = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("failed to read configuration from {}", dir.display()))?;
    let app: AppConfig = config
        .try_deserialize()
        .context("configuration does not match the expected schema")?;
    app.validate()?;
    Ok(app)
}
