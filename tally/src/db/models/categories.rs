//! Database models for categories.

use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::errors::{DbError, Result};
use crate::types::{AccountId, CategoryId};

/// Database request for creating a new category. The owning account is bound by the repository.
#[derive(Debug, Clone, Builder, Deserialize)]
pub struct CategoryCreateDBRequest {
    #[builder(into)]
    pub name: String,
    #[builder(into)]
    pub icon: String,
    /// Six hex digits, optionally prefixed with `#`
    #[builder(into)]
    pub color_hex: String,
}

impl CategoryCreateDBRequest {
    /// Check fields and return the color in its stored form.
    pub fn validate(&self) -> Result<String> {
        require_non_empty("name", &self.name)?;
        require_non_empty("icon", &self.icon)?;
        normalize_color_hex(&self.color_hex)
    }
}

/// Database request for updating a category; absent fields are left unchanged
#[derive(Debug, Clone, Builder, Default, Deserialize)]
pub struct CategoryUpdateDBRequest {
    #[builder(into)]
    pub name: Option<String>,
    #[builder(into)]
    pub icon: Option<String>,
    #[builder(into)]
    pub color_hex: Option<String>,
}

impl CategoryUpdateDBRequest {
    /// Check fields and return the color in its stored form, if one was given.
    pub fn validate(&self) -> Result<Option<String>> {
        if self.name.is_none() && self.icon.is_none() && self.color_hex.is_none() {
            return Err(DbError::invalid("request", "at least one field must be provided"));
        }
        if let Some(name) = &self.name {
            require_non_empty("name", name)?;
        }
        if let Some(icon) = &self.icon {
            require_non_empty("icon", icon)?;
        }
        self.color_hex.as_deref().map(normalize_color_hex).transpose()
    }
}

/// Database response for a category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryDBResponse {
    pub id: CategoryId,
    pub account_id: AccountId,
    pub name: String,
    pub icon: String,
    pub color_hex: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filter for listing categories
#[derive(Debug, Clone)]
pub struct CategoryFilter {
    pub skip: i64,
    pub limit: i64,
}

impl CategoryFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }

    pub fn validate(&self) -> Result<()> {
        if self.limit <= 0 {
            return Err(DbError::invalid("limit", format!("must be positive, got {}", self.limit)));
        }
        if self.skip < 0 {
            return Err(DbError::invalid("skip", format!("must not be negative, got {}", self.skip)));
        }
        Ok(())
    }
}

impl Default for CategoryFilter {
    fn default() -> Self {
        Self::new(0, 100)
    }
}

fn require_non_empty(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DbError::invalid(field, "must not be empty"));
    }
    Ok(())
}

/// Accepts `#a1b2c3` or `a1b2c3`, returns `A1B2C3`.
pub fn normalize_color_hex(input: &str) -> Result<String> {
    let digits = input.trim();
    let digits = digits.strip_prefix('#').unwrap_or(digits);
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(DbError::invalid("color_hex", format!("expected 6 hex digits, got {input:?}")));
    }
    Ok(digits.to_ascii_uppercase())
}
