//! Database layer: connection pools, repositories, record models and the error taxonomy.
//!
//! # Module Organization
//!
//! - [`pools`]: [`ConnectionManager`](pools::ConnectionManager) with a reader pool and a
//!   single-connection writer
//! - [`handlers`]: Repository implementations, one per table
//! - [`models`]: Request and response records passed in and out of repositories
//! - [`errors`]: [`DbError`](errors::DbError) and its four-way [`ErrorKind`](errors::ErrorKind)
//!
//! # Tenancy
//!
//! Every category and entry belongs to exactly one account. Repositories that touch those tables
//! take the [`AccountId`](crate::types::AccountId) up front and put it into every statement's
//! `WHERE` clause; there is no unscoped lookup.
//!
//! # Migrations
//!
//! The schema lives in `migrations/` and is embedded through [`crate::migrator`]. Migrations are
//! run by the binary's `migrate` command and by the test fixture, never implicitly on open.

pub mod errors;
pub mod handlers;
pub mod models;
pub mod pools;
