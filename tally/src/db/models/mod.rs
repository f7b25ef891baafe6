//! Database record models.
//!
//! Each module holds the request records accepted by a repository and the response record it
//! returns. Row structs that mirror table columns stay private to the handlers; these types are
//! what crosses the repository boundary.
//!
//! - [`accounts`]: Tenant roots
//! - [`categories`]: Per-account categories, with input normalisation for colors
//! - [`entries`]: Ledger entries, the list filter and the category snapshot attached on read

pub mod accounts;
pub mod categories;
pub mod entries;
