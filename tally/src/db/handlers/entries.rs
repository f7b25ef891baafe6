//! Database repository for ledger entries.
//!
//! Two query shapes serve the list-with-total use case:
//!
//! - count: `SELECT COUNT(e.id) FROM entry e WHERE <predicate>`
//! - rows: `SELECT ... FROM entry e LEFT JOIN category c ... WHERE <predicate> ORDER BY ... LIMIT ? OFFSET ?`
//!
//! Both take their `WHERE` clause from [`push_predicate`], so the total and the page can never
//! describe different filters. Rows are ordered by date, then creation time, then id, all in the
//! requested direction, which makes every `LIMIT`/`OFFSET` window part of one total order.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use tracing::instrument;
use uuid::Uuid;

use crate::db::{
    errors::{DbError, Result, ResultExt},
    models::entries::{CategorySnapshot, EntryCreateDBRequest, EntryDBResponse, EntryFilter, EntryType},
};
use crate::types::{AccountId, CategoryId, EntryId, abbrev_uuid};

const ENTRY_COLUMNS: &str = "e.id, e.account_id, e.entry_type, e.name, e.amount, e.description, e.date, e.category_id, e.created_at, e.updated_at";

// The category join repeats the tenant condition so a foreign category can never be attached
const CATEGORY_JOIN: &str = "LEFT JOIN category c ON c.id = e.category_id AND c.account_id = e.account_id";

const SNAPSHOT_COLUMNS: &str = "c.id AS snapshot_id, c.name AS snapshot_name, c.icon AS snapshot_icon, c.color_hex AS snapshot_color_hex";

// Database entity model, with the optional category columns from the join
#[derive(Debug, Clone, FromRow)]
struct EntryRow {
    pub id: EntryId,
    pub account_id: AccountId,
    pub entry_type: EntryType,
    pub name: String,
    pub amount: i64,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub category_id: Option<CategoryId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(default)]
    pub snapshot_id: Option<CategoryId>,
    #[sqlx(default)]
    pub snapshot_name: Option<String>,
    #[sqlx(default)]
    pub snapshot_icon: Option<String>,
    #[sqlx(default)]
    pub snapshot_color_hex: Option<String>,
}

impl From<EntryRow> for EntryDBResponse {
    fn from(row: EntryRow) -> Self {
        // all-or-nothing: a half-populated join never becomes a snapshot
        let category = match (row.snapshot_id, row.snapshot_name, row.snapshot_icon, row.snapshot_color_hex) {
            (Some(id), Some(name), Some(icon), Some(color_hex)) => Some(CategorySnapshot { id, name, icon, color_hex }),
            _ => None,
        };

        Self {
            id: row.id,
            account_id: row.account_id,
            entry_type: row.entry_type,
            name: row.name,
            amount: row.amount,
            description: row.description,
            date: row.date,
            category_id: row.category_id,
            category,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Append the shared `WHERE` clause for `filter`. Every value is bound, never interpolated.
fn push_predicate(query: &mut QueryBuilder<'_, Sqlite>, filter: &EntryFilter) {
    query.push(" WHERE e.account_id = ");
    query.push_bind(filter.account_id);

    query.push(" AND e.entry_type IN (");
    let mut types = query.separated(", ");
    for entry_type in &filter.entry_types {
        types.push_bind(*entry_type);
    }
    types.push_unseparated(")");

    query.push(" AND e.date BETWEEN ");
    query.push_bind(filter.start_date);
    query.push(" AND ");
    query.push_bind(filter.end_date);
}

pub struct Entries<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> Entries<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Number of entries matching `filter`, ignoring `limit` and `offset`.
    #[instrument(skip(self, filter), fields(account_id = %abbrev_uuid(&filter.account_id)), err)]
    pub async fn count(&mut self, filter: &EntryFilter) -> Result<i64> {
        filter.validate()?;

        let mut query = QueryBuilder::new("SELECT COUNT(e.id) FROM entry e");
        push_predicate(&mut query, filter);

        tracing::debug!("Executing SQL: {}", query.sql());

        query
            .build_query_scalar::<i64>()
            .fetch_one(&mut *self.db)
            .await
            .op("list_entries.count")
    }

    /// One page of entries matching `filter`, with category snapshots attached.
    #[instrument(
        skip(self, filter),
        fields(account_id = %abbrev_uuid(&filter.account_id), limit = filter.limit, offset = filter.offset),
        err
    )]
    pub async fn list(&mut self, filter: &EntryFilter) -> Result<Vec<EntryDBResponse>> {
        filter.validate()?;

        let mut query = QueryBuilder::new(format!("SELECT {ENTRY_COLUMNS}, {SNAPSHOT_COLUMNS} FROM entry e {CATEGORY_JOIN}"));
        push_predicate(&mut query, filter);

        let direction = filter.order.as_sql();
        query.push(format!(
            " ORDER BY e.date {direction}, e.created_at {direction}, e.id {direction} LIMIT "
        ));
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.offset);

        tracing::debug!("Executing SQL: {}", query.sql());

        let rows = query
            .build_query_as::<EntryRow>()
            .fetch_all(&mut *self.db)
            .await
            .op("list_entries.rows")?;

        Ok(rows.into_iter().map(EntryDBResponse::from).collect())
    }

    /// Fetch one entry of `account_id` with its category snapshot.
    #[instrument(skip(self), fields(account_id = %abbrev_uuid(&account_id), entry_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, account_id: AccountId, id: EntryId) -> Result<Option<EntryDBResponse>> {
        let row = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {ENTRY_COLUMNS}, {SNAPSHOT_COLUMNS} FROM entry e {CATEGORY_JOIN} WHERE e.id = ? AND e.account_id = ?"
        ))
        .bind(id)
        .bind(account_id)
        .fetch_optional(&mut *self.db)
        .await
        .op("get_entry")?;

        Ok(row.map(EntryDBResponse::from))
    }

    /// Insert an entry in a single round trip. The returned entry carries `category_id` but no
    /// snapshot; the caller resolves that on the reader pool.
    ///
    /// The insert is guarded by the category's tenancy: a category id that is unknown or belongs
    /// to another account inserts nothing and fails with `NotFound`.
    #[instrument(
        skip(self, request),
        fields(account_id = %abbrev_uuid(&request.account_id), entry_type = %request.entry_type, date = %request.date),
        err
    )]
    pub async fn create(&mut self, request: &EntryCreateDBRequest) -> Result<EntryDBResponse> {
        request.validate()?;

        let inserted = sqlx::query_as::<_, EntryRow>(
            r#"
            INSERT INTO entry (id, account_id, entry_type, name, amount, description, date, category_id)
            SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8
            WHERE ?8 IS NULL OR EXISTS (SELECT 1 FROM category WHERE id = ?8 AND account_id = ?2)
            RETURNING id, account_id, entry_type, name, amount, description, date, category_id, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.account_id)
        .bind(request.entry_type)
        .bind(request.name.trim())
        .bind(request.amount)
        .bind(request.description.as_deref())
        .bind(request.date)
        .bind(request.category_id)
        .fetch_optional(&mut *self.db)
        .await;

        match inserted {
            Ok(Some(row)) => Ok(EntryDBResponse::from(row)),
            Ok(None) => Err(DbError::NotFound { entity: "category" }),
            Err(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation() => Err(DbError::NotFound { entity: "account" }),
            Err(e) => Err(DbError::from(e).with_operation("create_entry.insert")),
        }
    }
}
