//! Dual-pool connection manager for the embedded database.
//!
//! SQLite allows any number of concurrent readers under WAL but only one writer per file.
//! [`ConnectionManager`] makes that explicit by opening two pools against the same file:
//!
//! ```text
//!     ┌───────────────────┐
//!     │ ConnectionManager │
//!     └─────────┬─────────┘
//!          ┌────┴─────┐
//!          ↓          ↓
//!   ┌─────────────┐ ┌─────────────┐
//!   │ Reader pool │ │   Writer    │
//!   │  (max 120)  │ │ (exactly 1) │
//!   └─────────────┘ └─────────────┘
//! ```
//!
//! - Use `.read()` for queries. Reader connections run with `query_only`, so a mutating statement
//!   routed here fails instead of racing the writer.
//! - Use `.write()` for every insert, update and delete. Callers queue for the single writer
//!   connection in the pool's FIFO order instead of retrying inside the engine.
//!
//! Acquire a writer connection per logical statement and drop it straight after; never hold it
//! across unrelated work.
//!
//! The schema is not migrated here. Run [`crate::migrator`] against `.write()` first.

pub mod idle;
pub mod metrics;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use tracing::{info, instrument};

use crate::config::DatabaseConfig;
use crate::db::errors::{DbError, Result, ResultExt};

pub use idle::IdleCeiling;
pub use metrics::{LabeledPool, PoolMetricsConfig, run_pool_metrics_sampler};

/// Reader pool plus single-connection writer pool over one database file.
///
/// Cheap to clone; clones share the same pools.
#[derive(Clone, Debug)]
pub struct ConnectionManager {
    reader: SqlitePool,
    writer: SqlitePool,
    idle_ceiling: IdleCeiling,
}

impl ConnectionManager {
    /// Open both pools. The writer is opened first so that it creates the file and switches it to
    /// WAL; if the reader pool then fails the writer is closed again and nothing stays open.
    #[instrument(skip(config), fields(path = %config.path.display()), err)]
    pub async fn open(config: &DatabaseConfig) -> Result<Self> {
        let options = Self::connect_options(config);

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(0)
            .acquire_timeout(config.writer.acquire_timeout)
            .idle_timeout(Some(config.writer.idle_timeout))
            .max_lifetime(None)
            .connect_with(options.clone())
            .await
            .op("open writer pool")?;

        let ceiling = IdleCeiling::new(config.pool.max_idle_conns, config.pool.idle_timeout);
        let on_release = ceiling.clone();
        let on_acquire = ceiling.clone();

        let reader = SqlitePoolOptions::new()
            .max_connections(config.pool.max_open_conns)
            .min_connections(0)
            .acquire_timeout(config.pool.acquire_timeout)
            // idle limits are enforced by the hooks below
            .idle_timeout(None)
            .max_lifetime(None)
            .test_before_acquire(false)
            .after_release(move |_conn, _meta| {
                let keep = on_release.admit();
                Box::pin(async move { Ok(keep) })
            })
            .before_acquire(move |_conn, meta| {
                let fresh = on_acquire.take(meta.idle_for);
                Box::pin(async move { Ok(fresh) })
            })
            .connect_with(options.pragma("query_only", "ON"))
            .await;

        let reader = match reader {
            Ok(reader) => reader,
            Err(err) => {
                writer.close().await;
                return Err(DbError::from(err).with_operation("open reader pool"));
            }
        };

        info!(
            max_open_conns = config.pool.max_open_conns,
            max_idle_conns = config.pool.max_idle_conns,
            "Opened reader and writer pools"
        );

        Ok(Self {
            reader,
            writer,
            idle_ceiling: ceiling,
        })
    }

    /// Session settings shared by every connection.
    ///
    /// The busy timeout is installed on the connection handle before any pragma runs, so the
    /// switch to WAL already waits out concurrent openers instead of failing busy.
    fn connect_options(config: &DatabaseConfig) -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true)
            .busy_timeout(config.busy_timeout)
            .journal_mode(SqliteJournalMode::Wal)
            .pragma("journal_size_limit", config.journal_size_limit.to_string())
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .pragma("temp_store", "MEMORY")
            // negative means KiB rather than pages
            .pragma("cache_size", format!("-{}", config.cache_size_kib))
    }

    /// Pool for read-only statements.
    pub fn read(&self) -> &SqlitePool {
        &self.reader
    }

    /// Pool for every mutating statement. Holds exactly one connection.
    pub fn write(&self) -> &SqlitePool {
        &self.writer
    }

    /// Both pools labeled for the metrics sampler.
    pub fn labeled_pools(&self) -> Vec<LabeledPool> {
        vec![
            LabeledPool {
                name: "reader",
                pool: self.reader.clone(),
                idle_ceiling: Some(self.idle_ceiling.clone()),
            },
            LabeledPool {
                name: "writer",
                pool: self.writer.clone(),
                idle_ceiling: None,
            },
        ]
    }

    /// Close all database connections, readers first so the writer's close can checkpoint the WAL.
    pub async fn close(&self) {
        self.reader.close().await;
        self.writer.close().await;
    }
}
