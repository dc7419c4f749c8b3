//! `PostgreSQL` implementation of the `EntityRepository` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::debug;

use quarry_core::error::DomainError;
use quarry_core::repository::{EntityRepository, Filter, RowKeys, StoredRow};

use crate::schema::CREATE_ENTITIES_TABLE;

fn infrastructure(context: &str) -> impl FnOnce(sqlx::Error) -> DomainError + '_ {
    move |e| DomainError::Infrastructure(format!("{context}: {e}"))
}

fn row_from_pg(row: &PgRow) -> Result<StoredRow, DomainError> {
    let keys: serde_json::Value = row.try_get("keys").map_err(infrastructure("read keys"))?;
    let keys: RowKeys = serde_json::from_value(keys)
        .map_err(|e| DomainError::CorruptState(format!("row keys are malformed: {e}")))?;
    let created_at: DateTime<Utc> = row
        .try_get("created_at")
        .map_err(infrastructure("read created_at"))?;
    Ok(StoredRow {
        id: row.try_get("id").map_err(infrastructure("read id"))?,
        version: row.try_get("version").map_err(infrastructure("read version"))?,
        keys,
        attributes: row
            .try_get("attributes")
            .map_err(infrastructure("read attributes"))?,
        created_at,
    })
}

/// PostgreSQL-backed entity repository.
#[derive(Debug, Clone)]
pub struct PgEntityRepository {
    pool: PgPool,
}

impl PgEntityRepository {
    /// Creates a new `PgEntityRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the entities table and id sequence if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the DDL fails.
    pub async fn ensure_schema(&self) -> Result<(), DomainError> {
        sqlx::raw_sql(CREATE_ENTITIES_TABLE)
            .execute(&self.pool)
            .await
            .map_err(infrastructure("create schema"))?;
        Ok(())
    }

    async fn current_version(
        &self,
        kind: &'static str,
        id: i64,
    ) -> Result<Option<i64>, DomainError> {
        sqlx::query_scalar::<_, i64>("SELECT version FROM entities WHERE kind = $1 AND id = $2")
            .bind(kind)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(infrastructure("load version"))
    }
}

#[async_trait]
impl EntityRepository for PgEntityRepository {
    async fn next_id(&self, _kind: &'static str) -> Result<i64, DomainError> {
        sqlx::query_scalar::<_, i64>("SELECT nextval('entity_ids')")
            .fetch_one(&self.pool)
            .await
            .map_err(infrastructure("allocate id"))
    }

    async fn load(&self, kind: &'static str, id: i64) -> Result<Option<StoredRow>, DomainError> {
        let row = sqlx::query(
            "SELECT id, version, keys, attributes, created_at FROM entities WHERE kind = $1 AND id = $2",
        )
        .bind(kind)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(infrastructure("load row"))?;
        row.as_ref().map(row_from_pg).transpose()
    }

    async fn save(
        &self,
        kind: &'static str,
        row: &StoredRow,
        expected_version: i64,
    ) -> Result<i64, DomainError> {
        let keys = serde_json::to_value(&row.keys)
            .map_err(|e| DomainError::Infrastructure(format!("encode keys: {e}")))?;

        let written: Option<i64> = if expected_version == 0 {
            sqlx::query_scalar(
                "INSERT INTO entities (kind, id, version, keys, attributes, created_at) \
                 VALUES ($1, $2, 1, $3, $4, $5) \
                 ON CONFLICT (kind, id) DO NOTHING \
                 RETURNING version",
            )
            .bind(kind)
            .bind(row.id)
            .bind(&keys)
            .bind(&row.attributes)
            .bind(row.created_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(infrastructure("insert row"))?
        } else {
            sqlx::query_scalar(
                "UPDATE entities SET version = version + 1, keys = $3, attributes = $4 \
                 WHERE kind = $1 AND id = $2 AND version = $5 \
                 RETURNING version",
            )
            .bind(kind)
            .bind(row.id)
            .bind(&keys)
            .bind(&row.attributes)
            .bind(expected_version)
            .fetch_optional(&self.pool)
            .await
            .map_err(infrastructure("update row"))?
        };

        if let Some(version) = written {
            debug!(kind, id = row.id, version, "row written");
            return Ok(version);
        }

        match self.current_version(kind, row.id).await? {
            Some(actual) => Err(DomainError::ConcurrencyConflict {
                kind,
                id: row.id,
                expected: expected_version,
                actual,
            }),
            None => Err(DomainError::EntityNotFound { kind, id: row.id }),
        }
    }

    async fn query(&self, kind: &'static str, filter: &Filter) -> Result<Vec<i64>, DomainError> {
        let ids = match filter {
            Filter::All => {
                sqlx::query_scalar::<_, i64>("SELECT id FROM entities WHERE kind = $1 ORDER BY id")
                    .bind(kind)
                    .fetch_all(&self.pool)
                    .await
            }
            Filter::Key { field, value } => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT id FROM entities WHERE kind = $1 AND keys -> $2 = $3 ORDER BY id",
                )
                .bind(kind)
                .bind(field)
                .bind(value.to_json())
                .fetch_all(&self.pool)
                .await
            }
        };
        ids.map_err(infrastructure("query rows"))
    }
}
