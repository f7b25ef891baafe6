//! Configuration management for the ledger store.
//!
//! Configuration is loaded from a YAML file (default `tally.yaml`) and can be overridden with
//! environment variables prefixed `TALLY_`. Nested fields use double underscores:
//!
//! ```bash
//! TALLY_DATABASE__PATH=/var/lib/tally/ledger.db
//! TALLY_DATABASE__POOL__MAX_OPEN_CONNS=64
//! TALLY_DATABASE__POOL__IDLE_TIMEOUT=5m
//! TALLY_LOG_FORMAT=json
//! ```
//!
//! `DATABASE_PATH` (or `TALLY_DATABASE_PATH`) is accepted as a shortcut for the database file.
//!
//! Durations are written in humantime format (`"10s"`, `"3m"`).

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::db::pools::PoolMetricsConfig;

/// CLI args for locating the config file
#[derive(clap::Args, Debug, Clone)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "TALLY_CONFIG", default_value = "tally.yaml", global = true)]
    pub config: String,

    /// Validate configuration and exit without touching the database.
    #[arg(long, global = true)]
    pub validate: bool,
}

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub database: DatabaseConfig,
    /// Console log format
    pub log_format: LogFormat,
    /// Background pool gauge sampling
    pub pool_metrics: PoolMetricsSettings,
    /// Shortcut for `database.path`, populated from `DATABASE_PATH` / `TALLY_DATABASE_PATH`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Embedded database file and session settings applied to every connection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Database file; created on first open
    pub path: PathBuf,
    /// How long a statement waits on a locked database before failing with a busy error
    #[serde(with = "humantime_serde")]
    pub busy_timeout: Duration,
    /// Page cache per connection, in KiB
    pub cache_size_kib: u32,
    /// Upper bound in bytes for the WAL file left on disk after a checkpoint
    pub journal_size_limit: i64,
    /// Reader pool sizing
    pub pool: ReaderPoolSettings,
    /// Writer handle timeouts. The writer always holds exactly one connection.
    pub writer: WriterPoolSettings,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("tally.db"),
            busy_timeout: Duration::from_secs(10),
            cache_size_kib: 16_000,
            journal_size_limit: 200_000_000,
            pool: ReaderPoolSettings::default(),
            writer: WriterPoolSettings::default(),
        }
    }
}

impl DatabaseConfig {
    /// Settings for a database file at `path`, everything else defaulted.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReaderPoolSettings {
    /// Ceiling on concurrently open reader connections
    pub max_open_conns: u32,
    /// Ceiling on reader connections kept idle; extra connections are closed on release
    pub max_idle_conns: u32,
    /// Idle connections older than this are recycled
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,
    /// How long a caller waits for a reader connection before failing with a busy error
    #[serde(with = "humantime_serde")]
    pub acquire_timeout: Duration,
}

impl Default for ReaderPoolSettings {
    fn default() -> Self {
        Self {
            max_open_conns: 120,
            max_idle_conns: 15,
            idle_timeout: Duration::from_secs(180),
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct WriterPoolSettings {
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,
    /// How long a write waits for the writer connection before failing with a busy error
    #[serde(with = "humantime_serde")]
    pub acquire_timeout: Duration,
}

impl Default for WriterPoolSettings {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(180),
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolMetricsSettings {
    pub enabled: bool,
    #[serde(with = "humantime_serde")]
    pub sample_interval: Duration,
}

impl Default for PoolMetricsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            sample_interval: Duration::from_secs(5),
        }
    }
}

impl From<&PoolMetricsSettings> for PoolMetricsConfig {
    fn from(settings: &PoolMetricsSettings) -> Self {
        Self {
            sample_interval: settings.sample_interval,
        }
    }
}

impl Config {
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        if let Some(path) = config.database_path.take() {
            config.database.path = path;
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> anyhow::Result<()> {
        let pool = &self.database.pool;
        if self.database.path.as_os_str().is_empty() {
            anyhow::bail!("Config validation: database.path must not be empty");
        }
        if pool.max_open_conns == 0 {
            anyhow::bail!("Config validation: database.pool.max_open_conns must be at least 1");
        }
        if pool.max_idle_conns > pool.max_open_conns {
            anyhow::bail!(
                "Config validation: database.pool.max_idle_conns ({}) cannot exceed max_open_conns ({})",
                pool.max_idle_conns,
                pool.max_open_conns
            );
        }
        if self.pool_metrics.enabled && self.pool_metrics.sample_interval.is_zero() {
            anyhow::bail!("Config validation: pool_metrics.sample_interval must be non-zero");
        }
        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            // Accept both DATABASE_PATH and TALLY_DATABASE_PATH, the prefixed one wins
            .merge(Env::raw().only(&["DATABASE_PATH"]))
            // TALLY_CONFIG names the file itself and is consumed by clap
            .merge(Env::prefixed("TALLY_").ignore(&["CONFIG"]).split("__"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn args(config: &str) -> Args {
        Args {
            config: config.to_string(),
            validate: false,
        }
    }

    #[test]
    fn test_defaults_without_file() {
        Jail::expect_with(|_jail| {
            let config = Config::load(&args("missing.yaml"))?;

            assert_eq!(config.database.path, PathBuf::from("tally.db"));
            assert_eq!(config.database.busy_timeout, Duration::from_secs(10));
            assert_eq!(config.database.cache_size_kib, 16_000);
            assert_eq!(config.database.pool.max_open_conns, 120);
            assert_eq!(config.database.pool.max_idle_conns, 15);
            assert_eq!(config.database.pool.idle_timeout, Duration::from_secs(180));
            assert_eq!(config.database.writer.idle_timeout, Duration::from_secs(180));
            assert_eq!(config.log_format, LogFormat::Pretty);
            assert!(!config.pool_metrics.enabled);

            Ok(())
        });
    }

    #[test]
    fn test_yaml_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
log_format: json
database:
  path: /tmp/ledger.db
  busy_timeout: 2s
  pool:
    max_open_conns: 8
    max_idle_conns: 2
    idle_timeout: 1m
pool_metrics:
  enabled: true
  sample_interval: 250ms
"#,
            )?;

            let config = Config::load(&args("test.yaml"))?;

            assert_eq!(config.log_format, LogFormat::Json);
            assert_eq!(config.database.path, PathBuf::from("/tmp/ledger.db"));
            assert_eq!(config.database.busy_timeout, Duration::from_secs(2));
            assert_eq!(config.database.pool.max_open_conns, 8);
            assert_eq!(config.database.pool.max_idle_conns, 2);
            assert_eq!(config.database.pool.idle_timeout, Duration::from_secs(60));
            // untouched fields keep their defaults
            assert_eq!(config.database.pool.acquire_timeout, Duration::from_secs(30));
            assert_eq!(config.pool_metrics.sample_interval, Duration::from_millis(250));

            Ok(())
        });
    }

    #[test]
    fn test_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
database:
  path: from-file.db
  pool:
    max_open_conns: 10
"#,
            )?;

            jail.set_env("TALLY_DATABASE__POOL__MAX_OPEN_CONNS", "40");
            jail.set_env("TALLY_DATABASE__WRITER__ACQUIRE_TIMEOUT", "5s");

            let config = Config::load(&args("test.yaml"))?;

            assert_eq!(config.database.path, PathBuf::from("from-file.db"));
            assert_eq!(config.database.pool.max_open_conns, 40);
            assert_eq!(config.database.writer.acquire_timeout, Duration::from_secs(5));

            Ok(())
        });
    }

    #[test]
    fn test_database_path_shortcuts() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "database:\n  path: from-file.db\n")?;

            jail.set_env("DATABASE_PATH", "/data/raw.db");
            let config = Config::load(&args("test.yaml"))?;
            assert_eq!(config.database.path, PathBuf::from("/data/raw.db"));

            jail.set_env("TALLY_DATABASE_PATH", "/data/prefixed.db");
            let config = Config::load(&args("test.yaml"))?;
            assert_eq!(config.database.path, PathBuf::from("/data/prefixed.db"));

            Ok(())
        });
    }

    #[test]
    fn test_idle_ceiling_above_open_ceiling_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
database:
  pool:
    max_open_conns: 4
    max_idle_conns: 5
"#,
            )?;

            let err = Config::load(&args("test.yaml")).unwrap_err();
            assert!(err.to_string().contains("max_idle_conns"), "got: {err}");

            Ok(())
        });
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "database:\n  max_connections: 4\n")?;
            assert!(Config::load(&args("test.yaml")).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_zero_open_conns_is_rejected() {
        let mut config = Config::default();
        config.database.pool.max_open_conns = 0;
        config.database.pool.max_idle_conns = 0;
        assert!(config.validate().is_err());
    }
}
