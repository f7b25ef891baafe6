//! # tally: embedded ledger store
//!
//! `tally` stores income and expense entries per account in a single SQLite file and answers
//! the question a ledger view asks most: "which entries fall in this date range, one page at a
//! time, and how many are there in total?"
//!
//! ## Architecture
//!
//! SQLite under WAL lets readers run alongside each other and alongside the writer, but only one
//! connection may write at a time. The [`db::pools::ConnectionManager`] encodes that directly: a
//! large reader pool plus a writer pool capped at one connection. Writers queue on the pool
//! instead of retrying busy errors inside the engine.
//!
//! On top of it:
//!
//! - the **repositories** ([`db::handlers`]) build parameterized SQL. The entries repository
//!   builds the count query and the page query from one shared predicate
//! - the **fetcher** ([`ledger::fetch`]) runs the count and the page concurrently on two reader
//!   connections and joins them, cancelling the sibling when one fails
//! - the **grouping** step ([`ledger::grouping`]) folds a page into per-date groups with
//!   expense/income totals
//! - the **façade** ([`ledger::Ledger`]) composes these and resolves each entry's optional
//!   category, always scoped to the caller's account
//!
//! Every account-owned row is read and written with its account id in the `WHERE` clause.
//!
//! ## Quick Start
//!
//! ```no_run
//! use tally::{Ledger, config::DatabaseConfig, db::pools::ConnectionManager};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pools = ConnectionManager::open(&DatabaseConfig::at("ledger.db")).await?;
//! tally::migrator().run(pools.write()).await?;
//!
//! let ledger = Ledger::new(pools);
//! let cancel = CancellationToken::new();
//! let account = ledger
//!     .create_account(&tally::db::models::accounts::AccountCreateDBRequest::new("Household"), &cancel)
//!     .await?;
//! # let _ = account;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod config;
pub mod db;
pub mod ledger;
pub mod telemetry;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::Config;
pub use db::errors::{DbError, ErrorKind};
pub use ledger::Ledger;

/// Get the tally database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}
