//! In-process implementation of the `EntityRepository` trait.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use quarry_core::error::DomainError;
use quarry_core::repository::{EntityRepository, Filter, StoredRow};

#[derive(Debug, Default)]
struct Tables {
    last_id: i64,
    rows: BTreeMap<(&'static str, i64), StoredRow>,
}

/// Mutex-guarded entity store for a single process.
///
/// Every call takes the lock once, so each save is an atomic
/// compare-version-and-write.
#[derive(Debug, Default)]
pub struct InMemoryEntityRepository {
    tables: Mutex<Tables>,
}

impl InMemoryEntityRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, DomainError> {
        self.tables
            .lock()
            .map_err(|e| DomainError::Infrastructure(format!("entity store mutex poisoned: {e}")))
    }

    /// Writes `row` as is, bypassing version checks. Used to seed rows with
    /// hand-written blobs, e.g. ones that predate a schema change.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the mutex is poisoned.
    pub fn put_raw(&self, kind: &'static str, row: StoredRow) -> Result<(), DomainError> {
        let mut tables = self.lock()?;
        tables.last_id = tables.last_id.max(row.id);
        tables.rows.insert((kind, row.id), row);
        Ok(())
    }

    /// Returns a copy of a stored row.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the mutex is poisoned.
    pub fn row(&self, kind: &'static str, id: i64) -> Result<Option<StoredRow>, DomainError> {
        Ok(self.lock()?.rows.get(&(kind, id)).cloned())
    }

    /// Number of rows of `kind`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the mutex is poisoned.
    pub fn count(&self, kind: &'static str) -> Result<usize, DomainError> {
        Ok(self
            .lock()?
            .rows
            .keys()
            .filter(|(k, _)| *k == kind)
            .count())
    }
}

#[async_trait]
impl EntityRepository for InMemoryEntityRepository {
    async fn next_id(&self, _kind: &'static str) -> Result<i64, DomainError> {
        let mut tables = self.lock()?;
        tables.last_id += 1;
        Ok(tables.last_id)
    }

    async fn load(&self, kind: &'static str, id: i64) -> Result<Option<StoredRow>, DomainError> {
        self.row(kind, id)
    }

    async fn save(
        &self,
        kind: &'static str,
        row: &StoredRow,
        expected_version: i64,
    ) -> Result<i64, DomainError> {
        let mut tables = self.lock()?;
        let actual = tables.rows.get(&(kind, row.id)).map(|stored| stored.version);
        match actual {
            None if expected_version != 0 => {
                return Err(DomainError::EntityNotFound { kind, id: row.id });
            }
            Some(actual) if actual != expected_version => {
                return Err(DomainError::ConcurrencyConflict {
                    kind,
                    id: row.id,
                    expected: expected_version,
                    actual,
                });
            }
            _ => {}
        }

        let version = expected_version + 1;
        let mut stored = row.clone();
        stored.version = version;
        tables.last_id = tables.last_id.max(row.id);
        tables.rows.insert((kind, row.id), stored);
        debug!(kind, id = row.id, version, "row written");
        Ok(version)
    }

    async fn query(&self, kind: &'static str, filter: &Filter) -> Result<Vec<i64>, DomainError> {
        let tables = self.lock()?;
        Ok(tables
            .rows
            .iter()
            .filter(|((k, _), row)| *k == kind && filter.matches(&row.keys))
            .map(|((_, id), _)| *id)
            .collect())
    }
}
