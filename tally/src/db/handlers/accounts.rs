//! Database repository for accounts.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};
use tracing::instrument;
use uuid::Uuid;

use crate::db::{
    errors::{Result, ResultExt},
    models::accounts::{AccountCreateDBRequest, AccountDBResponse},
};
use crate::types::{AccountId, abbrev_uuid};

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct Account {
    pub id: AccountId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Account> for AccountDBResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            name: account.name,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

pub struct Accounts<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> Accounts<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    pub async fn create(&mut self, request: &AccountCreateDBRequest) -> Result<AccountDBResponse> {
        request.validate()?;

        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO account (id, name)
            VALUES (?, ?)
            RETURNING id, name, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.name.trim())
        .fetch_one(&mut *self.db)
        .await
        .op("create_account")?;

        Ok(AccountDBResponse::from(account))
    }

    #[instrument(skip(self), fields(account_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: AccountId) -> Result<Option<AccountDBResponse>> {
        let account = sqlx::query_as::<_, Account>("SELECT id, name, created_at, updated_at FROM account WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await
            .op("get_account")?;

        Ok(account.map(AccountDBResponse::from))
    }
}
