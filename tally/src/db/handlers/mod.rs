//! Repository implementations for database access.
//!
//! Each repository wraps a `&mut SqliteConnection` borrowed from one of the pools in
//! [`ConnectionManager`](crate::db::pools::ConnectionManager). Which pool is the caller's
//! decision: reads go to `.read()`, anything that mutates goes to `.write()`.
//!
//! # Available Repositories
//!
//! - [`Accounts`]: Tenant roots
//! - [`Categories`]: Per-account categories, implements [`Repository`]
//! - [`Entries`]: Ledger entries; the count and page queries share one predicate builder
//!
//! # Common Pattern
//!
//! ```ignore
//! use tally::db::handlers::{Categories, Repository};
//!
//! async fn example(pools: &ConnectionManager, account_id: AccountId) -> tally::db::errors::Result<()> {
//!     let mut conn = pools.read().acquire().await?;
//!     let mut repo = Categories::new(&mut conn, account_id);
//!     let categories = repo.list(&CategoryFilter::default()).await?;
//!     Ok(())
//! }
//! ```

pub mod accounts;
pub mod categories;
pub mod entries;
pub mod repository;

pub use accounts::Accounts;
pub use categories::Categories;
pub use entries::Entries;
pub use repository::Repository;
