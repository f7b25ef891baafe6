//! Ledger façade over the connection manager and repositories.
//!
//! [`Ledger`] is the entry point applications use. Every operation:
//!
//! - takes the caller's [`CancellationToken`]; when it fires the in-flight future is dropped,
//!   its pooled connection goes back to the pool, and [`DbError::Cancelled`] is returned
//! - acquires a connection per logical statement and releases it before doing anything else
//! - routes reads to the reader pool and writes to the single writer connection
//!
//! Listing runs the count and the page concurrently (see [`fetch`]); grouping by date is a
//! separate step (see [`grouping`]) exposed through [`Ledger::list_entries_grouped_by_date`].

pub mod fetch;
pub mod grouping;

use std::future::Future;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::db::errors::{DbError, Result, ResultExt};
use crate::db::handlers::{Accounts, Categories, Entries, Repository};
use crate::db::models::{
    accounts::{AccountCreateDBRequest, AccountDBResponse},
    categories::{CategoryCreateDBRequest, CategoryDBResponse, CategoryFilter, CategoryUpdateDBRequest},
    entries::{CategorySnapshot, EntryCreateDBRequest, EntryDBResponse, EntryFilter},
};
use crate::db::pools::ConnectionManager;
use crate::types::{AccountId, CategoryId, EntryId, abbrev_uuid};

pub use fetch::EntryPage;
pub use grouping::{DateGroup, group_by_date};

/// A page of entries grouped by date, plus the total for the whole filter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedEntryPage {
    pub groups: Vec<DateGroup>,
    pub total_count: i64,
}

/// Run `fut` unless `cancel` fires first.
async fn cancellable<T>(cancel: &CancellationToken, operation: &'static str, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DbError::Cancelled { operation }),
        result = fut => result,
    }
}

#[derive(Clone, Debug)]
pub struct Ledger {
    pools: ConnectionManager,
}

impl Ledger {
    pub fn new(pools: ConnectionManager) -> Self {
        Self { pools }
    }

    pub fn pools(&self) -> &ConnectionManager {
        &self.pools
    }

    /// One page of entries matching `filter` plus the unpaginated total.
    pub async fn list_entries_by_date(&self, filter: &EntryFilter, cancel: &CancellationToken) -> Result<EntryPage> {
        cancellable(cancel, "list_entries", fetch::fetch_page(&self.pools, filter, cancel)).await
    }

    /// Same page as [`Self::list_entries_by_date`], grouped by date in the filter's order.
    pub async fn list_entries_grouped_by_date(&self, filter: &EntryFilter, cancel: &CancellationToken) -> Result<GroupedEntryPage> {
        let page = self.list_entries_by_date(filter, cancel).await?;
        Ok(GroupedEntryPage {
            groups: group_by_date(page.entries, filter.order)?,
            total_count: page.total_count,
        })
    }

    /// Insert an entry through the writer, then attach its category snapshot from a reader.
    ///
    /// A category id that is unknown or belongs to another account fails with `NotFound` and
    /// commits nothing. If the row was committed but the snapshot read fails (or is cancelled),
    /// the error is [`DbError::EntryCreatedCategoryUnresolved`] carrying the new entry's id:
    /// retry with [`Self::get_entry`], not with another create.
    #[instrument(skip(self, request, cancel), fields(account_id = %abbrev_uuid(&request.account_id)), err)]
    pub async fn create_entry(&self, request: &EntryCreateDBRequest, cancel: &CancellationToken) -> Result<EntryDBResponse> {
        request.validate()?;

        let mut entry = cancellable(cancel, "create_entry", async {
            let mut conn = self.pools.write().acquire().await.op("create_entry.acquire")?;
            Entries::new(&mut conn).create(request).await
        })
        .await?;

        if let Some(category_id) = entry.category_id {
            let snapshot = cancellable(cancel, "create_entry.resolve_category", self.resolve_category(entry.account_id, category_id))
                .await
                .map_err(|source| DbError::EntryCreatedCategoryUnresolved {
                    entry_id: entry.id,
                    source: Box::new(source),
                })?;
            entry.category = Some(snapshot);
        }

        Ok(entry)
    }

    async fn resolve_category(&self, account_id: AccountId, category_id: CategoryId) -> Result<CategorySnapshot> {
        let mut conn = self.pools.read().acquire().await.op("create_entry.resolve_category")?;
        let category = Categories::new(&mut conn, account_id).get_required(category_id).await?;
        Ok(CategorySnapshot::from(category))
    }

    pub async fn get_entry(&self, account_id: AccountId, id: EntryId, cancel: &CancellationToken) -> Result<EntryDBResponse> {
        cancellable(cancel, "get_entry", async {
            let mut conn = self.pools.read().acquire().await.op("get_entry.acquire")?;
            Entries::new(&mut conn)
                .get_by_id(account_id, id)
                .await?
                .ok_or(DbError::NotFound { entity: "entry" })
        })
        .await
    }

    pub async fn create_account(&self, request: &AccountCreateDBRequest, cancel: &CancellationToken) -> Result<AccountDBResponse> {
        request.validate()?;
        cancellable(cancel, "create_account", async {
            let mut conn = self.pools.write().acquire().await.op("create_account.acquire")?;
            Accounts::new(&mut conn).create(request).await
        })
        .await
    }

    pub async fn get_account(&self, id: AccountId, cancel: &CancellationToken) -> Result<AccountDBResponse> {
        cancellable(cancel, "get_account", async {
            let mut conn = self.pools.read().acquire().await.op("get_account.acquire")?;
            Accounts::new(&mut conn)
                .get_by_id(id)
                .await?
                .ok_or(DbError::NotFound { entity: "account" })
        })
        .await
    }

    /// The name check and the insert share the writer connection, so in-process creators cannot
    /// interleave between them. The unique index covers other processes.
    pub async fn create_category(
        &self,
        account_id: AccountId,
        request: &CategoryCreateDBRequest,
        cancel: &CancellationToken,
    ) -> Result<CategoryDBResponse> {
        request.validate()?;
        cancellable(cancel, "create_category", async {
            let mut conn = self.pools.write().acquire().await.op("create_category.acquire")?;
            Categories::new(&mut conn, account_id).create(request).await
        })
        .await
    }

    pub async fn get_category(&self, account_id: AccountId, id: CategoryId, cancel: &CancellationToken) -> Result<CategoryDBResponse> {
        cancellable(cancel, "get_category", async {
            let mut conn = self.pools.read().acquire().await.op("get_category.acquire")?;
            Categories::new(&mut conn, account_id).get_required(id).await
        })
        .await
    }

    pub async fn list_categories(
        &self,
        account_id: AccountId,
        filter: &CategoryFilter,
        cancel: &CancellationToken,
    ) -> Result<Vec<CategoryDBResponse>> {
        filter.validate()?;
        cancellable(cancel, "list_categories", async {
            let mut conn = self.pools.read().acquire().await.op("list_categories.acquire")?;
            Categories::new(&mut conn, account_id).list(filter).await
        })
        .await
    }

    pub async fn update_category(
        &self,
        account_id: AccountId,
        id: CategoryId,
        request: &CategoryUpdateDBRequest,
        cancel: &CancellationToken,
    ) -> Result<CategoryDBResponse> {
        request.validate()?;
        cancellable(cancel, "update_category", async {
            let mut conn = self.pools.write().acquire().await.op("update_category.acquire")?;
            Categories::new(&mut conn, account_id).update(id, request).await
        })
        .await
    }

    /// Returns whether a category was deleted. Entries that referenced it keep existing with no
    /// category.
    pub async fn delete_category(&self, account_id: AccountId, id: CategoryId, cancel: &CancellationToken) -> Result<bool> {
        cancellable(cancel, "delete_category", async {
            let mut conn = self.pools.write().acquire().await.op("delete_category.acquire")?;
            Categories::new(&mut conn, account_id).delete(id).await
        })
        .await
    }
}
