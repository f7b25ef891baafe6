//! Database models for accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::errors::{DbError, Result};
use crate::types::AccountId;

/// Database request for creating a new account
#[derive(Debug, Clone, Deserialize)]
pub struct AccountCreateDBRequest {
    pub name: String,
}

impl AccountCreateDBRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(DbError::invalid("name", "must not be empty"));
        }
        Ok(())
    }
}

/// Database response for an account
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountDBResponse {
    pub id: AccountId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
