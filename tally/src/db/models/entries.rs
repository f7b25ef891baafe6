//! Database models for ledger entries.
//!
//! Amounts are integer minor units (cents). Dates are calendar dates without a time component;
//! `created_at`/`updated_at` are assigned by the database.

use bon::Builder;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::errors::{DbError, Result};
use crate::db::models::categories::CategoryDBResponse;
use crate::types::{AccountId, CategoryId, EntryId};

/// Direction of money movement. Stored as an integer: 0 expense, 1 income.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum EntryType {
    Expense = 0,
    Income = 1,
}

impl EntryType {
    pub const ALL: [EntryType; 2] = [EntryType::Expense, EntryType::Income];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Income => "income",
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntryType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "expense" => Ok(Self::Expense),
            "income" => Ok(Self::Income),
            _ => Err(format!("Unknown entry type: {}", s)),
        }
    }
}

/// Sort direction by date
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Asc),
            "desc" | "descending" => Ok(Self::Desc),
            _ => Err(format!("Unknown sort order: {}", s)),
        }
    }
}

/// Filter for listing an account's entries by date.
///
/// `count` and `list` in the entries repository build their `WHERE` clause from the same
/// filter, so the total count always describes the same predicate as the page.
#[derive(Debug, Clone, Builder)]
pub struct EntryFilter {
    pub account_id: AccountId,
    /// Inclusive
    pub start_date: NaiveDate,
    /// Inclusive
    pub end_date: NaiveDate,
    #[builder(default = EntryType::ALL.to_vec())]
    pub entry_types: Vec<EntryType>,
    #[builder(default = 50)]
    pub limit: i64,
    #[builder(default)]
    pub offset: i64,
    #[builder(default)]
    pub order: SortOrder,
}

impl EntryFilter {
    /// Reject filters that would produce meaningless SQL. Runs before any query is built.
    pub fn validate(&self) -> Result<()> {
        if self.entry_types.is_empty() {
            return Err(DbError::invalid("entry_types", "at least one entry type is required"));
        }
        if self.limit <= 0 {
            return Err(DbError::invalid("limit", format!("must be positive, got {}", self.limit)));
        }
        if self.offset < 0 {
            return Err(DbError::invalid("offset", format!("must not be negative, got {}", self.offset)));
        }
        if self.start_date > self.end_date {
            return Err(DbError::invalid(
                "start_date",
                format!("{} is after end date {}", self.start_date, self.end_date),
            ));
        }
        Ok(())
    }
}

/// Database request for creating a new entry
#[derive(Debug, Clone, Builder)]
pub struct EntryCreateDBRequest {
    pub account_id: AccountId,
    pub entry_type: EntryType,
    #[builder(into)]
    pub name: String,
    /// Minor units, non-negative
    pub amount: i64,
    #[builder(into)]
    pub description: Option<String>,
    pub date: NaiveDate,
    pub category_id: Option<CategoryId>,
}

impl EntryCreateDBRequest {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(DbError::invalid("name", "must not be empty"));
        }
        if self.amount < 0 {
            return Err(DbError::invalid("amount", format!("must not be negative, got {}", self.amount)));
        }
        Ok(())
    }
}

/// Denormalized view of the category an entry points at, recomputed on every read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySnapshot {
    pub id: CategoryId,
    pub name: String,
    pub icon: String,
    pub color_hex: String,
}

impl From<CategoryDBResponse> for CategorySnapshot {
    fn from(category: CategoryDBResponse) -> Self {
        Self {
            id: category.id,
            name: category.name,
            icon: category.icon,
            color_hex: category.color_hex,
        }
    }
}

/// Database response for an entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryDBResponse {
    pub id: EntryId,
    pub account_id: AccountId,
    pub entry_type: EntryType,
    pub name: String,
    pub amount: i64,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub category_id: Option<CategoryId>,
    /// Present exactly when `category_id` resolved to a category of the same account
    pub category: Option<CategorySnapshot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, d).unwrap()
    }

    #[test]
    fn test_entry_type_parsing() {
        assert_eq!("expense".parse::<EntryType>().unwrap(), EntryType::Expense);
        assert_eq!("Income".parse::<EntryType>().unwrap(), EntryType::Income);
        assert!("transfer".parse::<EntryType>().is_err());
        assert_eq!(EntryType::Expense as i32, 0);
        assert_eq!(EntryType::Income as i32, 1);
    }

    #[test]
    fn test_filter_defaults() {
        let filter = EntryFilter::builder().account_id(Uuid::new_v4()).start_date(day(1)).end_date(day(30)).build();
        assert_eq!(filter.entry_types, vec![EntryType::Expense, EntryType::Income]);
        assert_eq!(filter.limit, 50);
        assert_eq!(filter.offset, 0);
        assert_eq!(filter.order, SortOrder::Desc);
        assert!(filter.validate().is_ok());
    }

    #[test]
    fn test_filter_rejects_malformed_input() {
        let base = EntryFilter::builder().account_id(Uuid::new_v4()).start_date(day(1)).end_date(day(30)).build();

        let cases = [
            (EntryFilter { entry_types: vec![], ..base.clone() }, "entry_types"),
            (EntryFilter { limit: 0, ..base.clone() }, "limit"),
            (EntryFilter { limit: -5, ..base.clone() }, "limit"),
            (EntryFilter { offset: -1, ..base.clone() }, "offset"),
            (
                EntryFilter {
                    start_date: day(30),
                    end_date: day(1),
                    ..base.clone()
                },
                "start_date",
            ),
        ];

        for (filter, expected) in cases {
            match filter.validate() {
                Err(DbError::Invalid { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected invalid {expected}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_single_day_range_is_valid() {
        let filter = EntryFilter::builder().account_id(Uuid::new_v4()).start_date(day(5)).end_date(day(5)).build();
        assert!(filter.validate().is_ok());
    }

    #[test]
    fn test_create_request_validation() {
        let request = EntryCreateDBRequest::builder()
            .account_id(Uuid::new_v4())
            .entry_type(EntryType::Expense)
            .name("Coffee")
            .amount(350)
            .date(day(3))
            .build();
        assert!(request.validate().is_ok());

        let negative = EntryCreateDBRequest { amount: -1, ..request.clone() };
        assert!(matches!(negative.validate(), Err(DbError::Invalid { field: "amount", .. })));

        let unnamed = EntryCreateDBRequest {
            name: " ".to_string(),
            ..request
        };
        assert!(matches!(unnamed.validate(), Err(DbError::Invalid { field: "name", .. })));
    }
}
