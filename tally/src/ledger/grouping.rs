//! Group a page of entries by calendar date with per-type totals.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::db::errors::{DbError, Result};
use crate::db::models::entries::{EntryDBResponse, EntryType, SortOrder};

/// Entries sharing one date
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateGroup {
    pub date: NaiveDate,
    pub entries: Vec<EntryDBResponse>,
    /// Sum of expense amounts in this group, minor units
    pub total_expense: i64,
    /// Sum of income amounts in this group, minor units
    pub total_income: i64,
}

impl DateGroup {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            entries: Vec::new(),
            total_expense: 0,
            total_income: 0,
        }
    }

    fn push(&mut self, entry: EntryDBResponse) -> Result<()> {
        let total = match entry.entry_type {
            EntryType::Expense => &mut self.total_expense,
            EntryType::Income => &mut self.total_income,
        };
        *total = total.checked_add(entry.amount).ok_or_else(|| {
            DbError::Other(anyhow::anyhow!(
                "{} total for {} overflows i64 minor units",
                entry.entry_type,
                self.date
            ))
        })?;
        self.entries.push(entry);
        Ok(())
    }
}

/// Group `entries` by date in one pass.
///
/// Groups are ordered by date in `order`, regardless of input order. Within a group entries keep
/// their input order. Fails when a per-day total does not fit in an `i64`.
pub fn group_by_date(entries: Vec<EntryDBResponse>, order: SortOrder) -> Result<Vec<DateGroup>> {
    let mut groups: BTreeMap<NaiveDate, DateGroup> = BTreeMap::new();

    for entry in entries {
        let date = entry.date;
        groups.entry(date).or_insert_with(|| DateGroup::new(date)).push(entry)?;
    }

    Ok(match order {
        SortOrder::Asc => groups.into_values().collect(),
        SortOrder::Desc => groups.into_values().rev().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn entry(day: u32, entry_type: EntryType, amount: i64) -> EntryDBResponse {
        EntryDBResponse {
            id: Uuid::new_v4(),
            account_id: Uuid::nil(),
            entry_type,
            name: format!("{entry_type} on {day}"),
            amount,
            description: None,
            date: NaiveDate::from_ymd_opt(2024, 11, day).unwrap(),
            category_id: None,
            category: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(group_by_date(Vec::new(), SortOrder::Desc).unwrap().is_empty());
    }

    #[test]
    fn test_totals_per_type() {
        let groups = group_by_date(
            vec![
                entry(30, EntryType::Expense, 1200),
                entry(30, EntryType::Income, 50000),
                entry(30, EntryType::Expense, 800),
                entry(28, EntryType::Expense, 300),
            ],
            SortOrder::Desc,
        )
        .unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].date, NaiveDate::from_ymd_opt(2024, 11, 30).unwrap());
        assert_eq!(groups[0].total_expense, 2000);
        assert_eq!(groups[0].total_income, 50000);
        assert_eq!(groups[0].entries.len(), 3);
        assert_eq!(groups[1].total_expense, 300);
        assert_eq!(groups[1].total_income, 0);
    }

    #[test]
    fn test_order_is_derived_not_inherited() {
        // shuffled input dates
        let input = vec![
            entry(26, EntryType::Expense, 1),
            entry(30, EntryType::Expense, 1),
            entry(25, EntryType::Income, 1),
            entry(28, EntryType::Expense, 1),
            entry(30, EntryType::Income, 1),
        ];

        let desc: Vec<u32> = group_by_date(input.clone(), SortOrder::Desc)
            .unwrap()
            .iter()
            .map(|g| chrono::Datelike::day(&g.date))
            .collect();
        assert_eq!(desc, vec![30, 28, 26, 25]);

        let asc: Vec<u32> = group_by_date(input, SortOrder::Asc)
            .unwrap()
            .iter()
            .map(|g| chrono::Datelike::day(&g.date))
            .collect();
        assert_eq!(asc, vec![25, 26, 28, 30]);
    }

    #[test]
    fn test_within_group_order_is_preserved() {
        let first = entry(30, EntryType::Expense, 1);
        let second = entry(30, EntryType::Income, 2);
        let groups = group_by_date(vec![first.clone(), second.clone()], SortOrder::Desc).unwrap();
        assert_eq!(groups[0].entries, vec![first, second]);
    }

    #[test]
    fn test_grouping_law() {
        let input: Vec<EntryDBResponse> = (0..40)
            .map(|i| {
                let entry_type = if i % 3 == 0 { EntryType::Income } else { EntryType::Expense };
                entry(1 + (i * 7 % 30) as u32, entry_type, (i * 137 % 1000) as i64)
            })
            .collect();
        let total_amount: i64 = input.iter().map(|e| e.amount).sum();

        let groups = group_by_date(input.clone(), SortOrder::Asc).unwrap();

        assert_eq!(groups.iter().map(|g| g.entries.len()).sum::<usize>(), input.len());
        for group in &groups {
            let sum: i64 = group.entries.iter().map(|e| e.amount).sum();
            assert_eq!(group.total_expense + group.total_income, sum);
            assert!(group.entries.iter().all(|e| e.date == group.date));
        }
        assert_eq!(groups.iter().map(|g| g.total_expense + g.total_income).sum::<i64>(), total_amount);
    }

    #[test]
    fn test_missing_category_stays_absent() {
        let groups = group_by_date(vec![entry(1, EntryType::Expense, 10)], SortOrder::Desc).unwrap();
        assert!(groups[0].entries[0].category.is_none());
        assert!(groups[0].entries[0].category_id.is_none());
    }

    #[test]
    fn test_day_total_overflow_is_an_error() {
        let err = group_by_date(
            vec![entry(30, EntryType::Expense, i64::MAX), entry(30, EntryType::Expense, 1)],
            SortOrder::Desc,
        )
        .unwrap_err();
        assert!(matches!(err, DbError::Other(_)), "got {err:?}");
        assert_eq!(err.kind(), crate::db::errors::ErrorKind::Internal);
    }

    #[test]
    fn test_large_totals_of_different_types_do_not_interfere() {
        let groups = group_by_date(
            vec![entry(30, EntryType::Expense, i64::MAX), entry(30, EntryType::Income, i64::MAX)],
            SortOrder::Desc,
        )
        .unwrap();
        assert_eq!(groups[0].total_expense, i64::MAX);
        assert_eq!(groups[0].total_income, i64::MAX);
    }
}
