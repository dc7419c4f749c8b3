//! Entity repository abstraction.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Value of an explicit key column (foreign key or indexed text).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyValue {
    /// Raw id of another entity.
    Id(i64),
    /// Indexed text such as a unique name.
    Text(String),
}

impl KeyValue {
    /// Returns the id, if this is an id key.
    #[must_use]
    pub fn as_id(&self) -> Option<i64> {
        match self {
            Self::Id(id) => Some(*id),
            Self::Text(_) => None,
        }
    }

    /// Returns the text, if this is a text key.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Id(_) => None,
            Self::Text(text) => Some(text),
        }
    }

    /// Returns the key as a JSON value.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Id(id) => serde_json::Value::from(*id),
            Self::Text(text) => serde_json::Value::from(text.as_str()),
        }
    }
}

/// Explicit key columns of a row, by name.
pub type RowKeys = BTreeMap<String, KeyValue>;

/// Stored representation of one entity row.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    /// Raw entity identifier.
    pub id: i64,
    /// Version written by the last successful save (0 = never stored).
    pub version: i64,
    /// Foreign keys and indexed columns.
    pub keys: RowKeys,
    /// Opaque attribute blob.
    pub attributes: String,
    /// Timestamp of creation.
    pub created_at: DateTime<Utc>,
}

/// Selection of rows within one entity kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Every row of the kind.
    All,
    /// Rows whose key column `field` equals `value`.
    Key {
        /// Key column name.
        field: String,
        /// Value to match.
        value: KeyValue,
    },
}

impl Filter {
    /// Rows whose id-valued key `field` equals `id`.
    #[must_use]
    pub fn by_id(field: &str, id: i64) -> Self {
        Self::Key {
            field: field.to_owned(),
            value: KeyValue::Id(id),
        }
    }

    /// Rows whose text-valued key `field` equals `text`.
    #[must_use]
    pub fn by_text(field: &str, text: &str) -> Self {
        Self::Key {
            field: field.to_owned(),
            value: KeyValue::Text(text.to_owned()),
        }
    }

    /// Returns whether `keys` satisfies the filter.
    #[must_use]
    pub fn matches(&self, keys: &RowKeys) -> bool {
        match self {
            Self::All => true,
            Self::Key { field, value } => keys.get(field) == Some(value),
        }
    }
}

/// Repository trait for loading and saving entity rows.
#[async_trait]
pub trait EntityRepository: Send + Sync {
    /// Reserves a fresh raw id for a new row of `kind`.
    async fn next_id(&self, kind: &'static str) -> Result<i64, DomainError>;

    /// Loads a row, `None` if it does not exist.
    async fn load(&self, kind: &'static str, id: i64) -> Result<Option<StoredRow>, DomainError>;

    /// Writes `row` atomically with optimistic concurrency and returns the
    /// new version. `expected_version` is the version the caller loaded; 0
    /// means the row must not exist yet.
    async fn save(
        &self,
        kind: &'static str,
        row: &StoredRow,
        expected_version: i64,
    ) -> Result<i64, DomainError>;

    /// Returns the ids of matching rows in ascending order.
    async fn query(&self, kind: &'static str, filter: &Filter) -> Result<Vec<i64>, DomainError>;
}
