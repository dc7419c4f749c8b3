//! Test repositories: mock `EntityRepository` implementations for tests.

use async_trait::async_trait;
use quarry_core::error::DomainError;
use quarry_core::repository::{EntityRepository, Filter, StoredRow};

/// An entity repository that always returns an infrastructure error. Useful
/// for testing error-handling paths.
#[derive(Debug)]
pub struct FailingEntityRepository;

#[async_trait]
impl EntityRepository for FailingEntityRepository {
    async fn next_id(&self, _kind: &'static str) -> Result<i64, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn load(&self, _kind: &'static str, _id: i64) -> Result<Option<StoredRow>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn save(
        &self,
        _kind: &'static str,
        _row: &StoredRow,
        _expected_version: i64,
    ) -> Result<i64, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn query(&self, _kind: &'static str, _filter: &Filter) -> Result<Vec<i64>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}
