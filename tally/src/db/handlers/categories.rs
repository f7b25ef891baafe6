//! Database repository for categories.
//!
//! The repository is bound to one account; every statement filters on it. Names are unique per
//! account: a lookup by name runs first to produce a readable conflict, and the
//! `category_account_name_unique` index stays the authoritative guard.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use tracing::instrument;
use uuid::Uuid;

use crate::db::{
    errors::{DbError, Result, ResultExt},
    handlers::repository::Repository,
    models::categories::{CategoryCreateDBRequest, CategoryDBResponse, CategoryFilter, CategoryUpdateDBRequest},
};
use crate::types::{AccountId, CategoryId, abbrev_uuid};

const CATEGORY_COLUMNS: &str = "id, account_id, name, icon, color_hex, created_at, updated_at";

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct Category {
    pub id: CategoryId,
    pub account_id: AccountId,
    pub name: String,
    pub icon: String,
    pub color_hex: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Category> for CategoryDBResponse {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            account_id: category.account_id,
            name: category.name,
            icon: category.icon,
            color_hex: category.color_hex,
            created_at: category.created_at,
            updated_at: category.updated_at,
        }
    }
}

pub struct Categories<'c> {
    db: &'c mut SqliteConnection,
    account_id: AccountId,
}

impl<'c> Categories<'c> {
    pub fn new(db: &'c mut SqliteConnection, account_id: AccountId) -> Self {
        Self { db, account_id }
    }

    /// Id of the category in this account using `name`, if any
    async fn find_by_name(&mut self, name: &str) -> Result<Option<CategoryId>> {
        sqlx::query_scalar::<_, CategoryId>("SELECT id FROM category WHERE account_id = ? AND name = ?")
            .bind(self.account_id)
            .bind(name)
            .fetch_optional(&mut *self.db)
            .await
            .op("category.find_by_name")
    }
}

fn already_exists(name: &str) -> DbError {
    DbError::UniqueViolation {
        table: Some("category".to_string()),
        message: format!("{name} category already exists"),
        conflicting_value: Some(name.to_string()),
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Categories<'c> {
    type CreateRequest = CategoryCreateDBRequest;
    type UpdateRequest = CategoryUpdateDBRequest;
    type Response = CategoryDBResponse;
    type Id = CategoryId;
    type Filter = CategoryFilter;

    const ENTITY: &'static str = "category";

    #[instrument(skip(self, request), fields(account_id = %abbrev_uuid(&self.account_id), name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let color_hex = request.validate()?;
        let name = request.name.trim();

        if self.find_by_name(name).await?.is_some() {
            return Err(already_exists(name));
        }

        let category = sqlx::query_as::<_, Category>(&format!(
            r#"
            INSERT INTO category (id, account_id, name, icon, color_hex)
            VALUES (?, ?, ?, ?, ?)
            RETURNING {CATEGORY_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(self.account_id)
        .bind(name)
        .bind(request.icon.trim())
        .bind(color_hex)
        .fetch_one(&mut *self.db)
        .await;

        match category {
            Ok(category) => Ok(CategoryDBResponse::from(category)),
            // lost the race against a concurrent creator; the index decides
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(already_exists(name)),
            Err(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation() => Err(DbError::NotFound { entity: "account" }),
            Err(e) => Err(DbError::from(e).with_operation("create_category")),
        }
    }

    #[instrument(skip(self), fields(account_id = %abbrev_uuid(&self.account_id), category_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let category = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM category WHERE id = ? AND account_id = ?"
        ))
        .bind(id)
        .bind(self.account_id)
        .fetch_optional(&mut *self.db)
        .await
        .op("get_category")?;

        Ok(category.map(CategoryDBResponse::from))
    }

    #[instrument(skip(self, filter), fields(account_id = %abbrev_uuid(&self.account_id), limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        filter.validate()?;

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!("SELECT {CATEGORY_COLUMNS} FROM category WHERE account_id = "));
        query.push_bind(self.account_id);
        query.push(" ORDER BY name, id LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        tracing::debug!("Executing SQL: {}", query.sql());

        let categories = query
            .build_query_as::<Category>()
            .fetch_all(&mut *self.db)
            .await
            .op("list_categories")?;

        Ok(categories.into_iter().map(CategoryDBResponse::from).collect())
    }

    #[instrument(skip(self), fields(account_id = %abbrev_uuid(&self.account_id), category_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        // entries pointing here keep existing; the foreign key nulls their reference
        let result = sqlx::query("DELETE FROM category WHERE id = ? AND account_id = ?")
            .bind(id)
            .bind(self.account_id)
            .execute(&mut *self.db)
            .await
            .op("delete_category")?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(account_id = %abbrev_uuid(&self.account_id), category_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let color_hex = request.validate()?;
        let name = request.name.as_deref().map(str::trim);

        if let Some(name) = name
            && self.find_by_name(name).await?.is_some_and(|existing| existing != id)
        {
            return Err(already_exists(name));
        }

        // Atomic update with conditional field updates
        let category = sqlx::query_as::<_, Category>(&format!(
            r#"
            UPDATE category SET
                name = COALESCE(?, name),
                icon = COALESCE(?, icon),
                color_hex = COALESCE(?, color_hex),
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            WHERE id = ? AND account_id = ?
            RETURNING {CATEGORY_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(request.icon.as_deref().map(str::trim))
        .bind(color_hex)
        .bind(id)
        .bind(self.account_id)
        .fetch_optional(&mut *self.db)
        .await;

        match category {
            Ok(Some(category)) => Ok(CategoryDBResponse::from(category)),
            Ok(None) => Err(DbError::NotFound { entity: Self::ENTITY }),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(already_exists(name.unwrap_or_default())),
            Err(e) => Err(DbError::from(e).with_operation("update_category")),
        }
    }
}
