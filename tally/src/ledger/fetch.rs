//! Concurrent count + page fetch for the list-with-total use case.
//!
//! The count query and the rows query are independent, so they run at the same time on two
//! reader connections and are joined afterwards. Both branches always run to completion or
//! cancellation before [`fetch_page`] returns; nothing is left running in the background.
//!
//! The two queries do not share a snapshot. With writes landing concurrently, `total_count` and
//! `entries` may reflect slightly different instants.
//!
//! # Failure precedence
//!
//! - a count error wins over everything
//! - otherwise a rows error
//! - the first branch to fail cancels its sibling; that induced cancellation is never reported
//!   in place of the real error
//! - if the caller's token fires, the result is [`DbError::Cancelled`]

use std::future::Future;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::db::errors::{DbError, Result, ResultExt};
use crate::db::handlers::Entries;
use crate::db::models::entries::{EntryDBResponse, EntryFilter};
use crate::db::pools::ConnectionManager;
use crate::types::abbrev_uuid;

/// One page of entries plus the number of entries matching the filter overall
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryPage {
    pub entries: Vec<EntryDBResponse>,
    /// Ignores `limit` and `offset`
    pub total_count: i64,
}

/// How one branch of the fan-out ended
#[derive(Debug)]
pub(crate) enum Branch<T> {
    Done(Result<T>),
    Cancelled,
}

/// Run `fut` until it finishes or `token` fires. A failing branch cancels `token` so its
/// sibling stops early.
pub(crate) async fn guarded<T>(token: &CancellationToken, fut: impl Future<Output = Result<T>>) -> Branch<T> {
    let outcome = tokio::select! {
        biased;
        _ = token.cancelled() => return Branch::Cancelled,
        outcome = fut => outcome,
    };

    if outcome.is_err() {
        token.cancel();
    }
    Branch::Done(outcome)
}

/// Join both branches. A pure function of the two outcomes; see the module docs for precedence.
pub(crate) fn resolve<R>(count: Branch<i64>, rows: Branch<Vec<R>>) -> Result<(Vec<R>, i64)> {
    match (count, rows) {
        (Branch::Done(Err(err)), _) => Err(err),
        (_, Branch::Done(Err(err))) => Err(err),
        (Branch::Done(Ok(total_count)), Branch::Done(Ok(entries))) => Ok((entries, total_count)),
        _ => Err(DbError::Cancelled { operation: "list_entries" }),
    }
}

/// Fetch one page and the total count concurrently on the reader pool.
#[instrument(
    skip(pools, filter, cancel),
    fields(account_id = %abbrev_uuid(&filter.account_id), limit = filter.limit, offset = filter.offset),
    err
)]
pub async fn fetch_page(pools: &ConnectionManager, filter: &EntryFilter, cancel: &CancellationToken) -> Result<EntryPage> {
    filter.validate()?;

    let token = cancel.child_token();

    let count = guarded(&token, async {
        let mut conn = pools.read().acquire().await.op("list_entries.count")?;
        Entries::new(&mut conn).count(filter).await
    });

    let rows = guarded(&token, async {
        let mut conn = pools.read().acquire().await.op("list_entries.rows")?;
        Entries::new(&mut conn).list(filter).await
    });

    let (count, rows) = tokio::join!(count, rows);
    let (entries, total_count) = resolve(count, rows)?;

    Ok(EntryPage { entries, total_count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn busy() -> DbError {
        DbError::Busy { operation: "test" }
    }

    #[test]
    fn test_resolve_success() {
        let (rows, total) = resolve(Branch::Done(Ok(7)), Branch::Done(Ok(vec![1, 2]))).unwrap();
        assert_eq!(rows, vec![1, 2]);
        assert_eq!(total, 7);
    }

    #[test]
    fn test_resolve_count_error_wins() {
        let err = resolve::<u8>(
            Branch::Done(Err(DbError::NotFound { entity: "count" })),
            Branch::Done(Err(busy())),
        )
        .unwrap_err();
        assert!(matches!(err, DbError::NotFound { entity: "count" }));

        let err = resolve::<u8>(Branch::Done(Err(busy())), Branch::Done(Ok(vec![]))).unwrap_err();
        assert!(matches!(err, DbError::Busy { .. }));
    }

    #[test]
    fn test_resolve_rows_error_survives_induced_cancellation() {
        let err = resolve::<u8>(Branch::Cancelled, Branch::Done(Err(busy()))).unwrap_err();
        assert!(matches!(err, DbError::Busy { .. }));

        let err = resolve::<u8>(Branch::Done(Err(busy())), Branch::Cancelled).unwrap_err();
        assert!(matches!(err, DbError::Busy { .. }));
    }

    #[test]
    fn test_resolve_cancelled() {
        let err = resolve::<u8>(Branch::Cancelled, Branch::Cancelled).unwrap_err();
        assert!(matches!(err, DbError::Cancelled { .. }));

        let err = resolve::<u8>(Branch::Done(Ok(3)), Branch::Cancelled).unwrap_err();
        assert!(matches!(err, DbError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn test_failing_branch_cancels_sibling() {
        let token = CancellationToken::new();

        let count = guarded(&token, async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err::<i64, _>(busy())
        });
        let rows = guarded(&token, std::future::pending::<Result<Vec<u8>>>());

        let (count, rows) = tokio::time::timeout(Duration::from_secs(5), async { tokio::join!(count, rows) })
            .await
            .expect("sibling should have been cancelled");

        assert!(matches!(rows, Branch::Cancelled));
        let err = resolve(count, rows).unwrap_err();
        assert!(matches!(err, DbError::Busy { .. }));
    }

    #[tokio::test]
    async fn test_parent_cancellation_stops_both_branches() {
        let parent = CancellationToken::new();
        let token = parent.child_token();

        let count = guarded(&token, std::future::pending::<Result<i64>>());
        let rows = guarded(&token, std::future::pending::<Result<Vec<u8>>>());

        let canceller = parent.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let (count, rows) = tokio::join!(count, rows);
        assert!(matches!(resolve(count, rows), Err(DbError::Cancelled { .. })));
    }

    #[tokio::test]
    async fn test_successful_branch_does_not_cancel() {
        let token = CancellationToken::new();
        let outcome = guarded(&token, async { Ok::<_, DbError>(1) }).await;
        assert!(matches!(outcome, Branch::Done(Ok(1))));
        assert!(!token.is_cancelled());
    }
}
