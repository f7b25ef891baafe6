//! Test utilities (available with the `test-utils` feature).
//!
//! [`TestDb`] gives each test its own database file in a temporary directory, already migrated.

use std::path::PathBuf;

use chrono::NaiveDate;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::config::DatabaseConfig;
use crate::db::models::{
    accounts::{AccountCreateDBRequest, AccountDBResponse},
    categories::{CategoryCreateDBRequest, CategoryDBResponse},
    entries::{EntryCreateDBRequest, EntryDBResponse, EntryType},
};
use crate::db::pools::ConnectionManager;
use crate::ledger::Ledger;
use crate::types::{AccountId, CategoryId};

pub struct TestDb {
    // dropped last: removes the database files
    _dir: TempDir,
    pub ledger: Ledger,
}

impl TestDb {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(configure: impl FnOnce(&mut DatabaseConfig)) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut config = DatabaseConfig::at(dir.path().join("tally.db"));
        configure(&mut config);

        let pools = ConnectionManager::open(&config).await.expect("Failed to open test database");
        crate::migrator().run(pools.write()).await.expect("Failed to run migrations");

        Self {
            _dir: dir,
            ledger: Ledger::new(pools),
        }
    }

    /// The database file both pools are opened on
    pub fn path(&self) -> PathBuf {
        self._dir.path().join("tally.db")
    }

    pub async fn account(&self, name: &str) -> AccountDBResponse {
        self.ledger
            .create_account(&AccountCreateDBRequest::new(name), &CancellationToken::new())
            .await
            .expect("Failed to create test account")
    }

    pub async fn category(&self, account_id: AccountId, name: &str) -> CategoryDBResponse {
        let request = CategoryCreateDBRequest::builder().name(name).icon("🏷️").color_hex("#4a90e2").build();
        self.ledger
            .create_category(account_id, &request, &CancellationToken::new())
            .await
            .expect("Failed to create test category")
    }
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("Invalid test date")
}

/// Five entries between 2024-11-25 and 2024-11-30: three expenses and two incomes, one per day
/// except the 29th.
pub async fn seed_november(ledger: &Ledger, account_id: AccountId, category_id: Option<CategoryId>) -> Vec<EntryDBResponse> {
    let rows = [
        (30, EntryType::Expense, "Groceries", 4599),
        (28, EntryType::Income, "Salary", 250_000),
        (27, EntryType::Expense, "Coffee", 450),
        (26, EntryType::Expense, "Books", 2999),
        (25, EntryType::Income, "Refund", 1500),
    ];

    let mut created = Vec::with_capacity(rows.len());
    for (day, entry_type, name, amount) in rows {
        let request = EntryCreateDBRequest::builder()
            .account_id(account_id)
            .entry_type(entry_type)
            .name(name)
            .amount(amount)
            .date(date(2024, 11, day))
            .maybe_category_id(category_id)
            .build();
        created.push(
            ledger
                .create_entry(&request, &CancellationToken::new())
                .await
                .expect("Failed to seed entry"),
        );
    }
    created
}
