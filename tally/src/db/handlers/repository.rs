//! CRUD trait shared by table repositories.

use crate::db::errors::{DbError, Result};

/// Create/read/update/delete plus a filtered list over one table.
///
/// Repositories for account-owned tables take the account at construction; every method on this
/// trait is then implicitly limited to rows of that account, and ids from other accounts behave
/// exactly like ids that do not exist.
#[async_trait::async_trait]
pub trait Repository {
    type CreateRequest: Sync;
    type UpdateRequest: Sync;
    type Response: Send;
    type Id: Copy + Send + Sync;
    type Filter: Send + Sync;

    /// Name used in `NotFound` errors
    const ENTITY: &'static str;

    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response>;

    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>>;

    /// Like [`Self::get_by_id`] but a missing row is `NotFound`
    async fn get_required(&mut self, id: Self::Id) -> Result<Self::Response> {
        self.get_by_id(id).await?.ok_or(DbError::NotFound { entity: Self::ENTITY })
    }

    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>>;

    /// Returns whether a row was removed
    async fn delete(&mut self, id: Self::Id) -> Result<bool>;

    /// Fails with `NotFound` when no row matches
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response>;
}
