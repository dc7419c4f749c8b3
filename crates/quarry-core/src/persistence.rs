//! Typed load/save helpers over an [`EntityRepository`].
//!
//! Loading materializes a row into its entity; saving validates the entity,
//! reconciles its attribute store and writes it with the loaded version as
//! the expected version, so a concurrent writer makes the save fail with
//! `DomainError::ConcurrencyConflict` instead of being silently overwritten.

use tracing::{debug, warn};

use crate::entity::{Entity, Record};
use crate::error::DomainError;
use crate::ids::EntityId;
use crate::repository::{EntityRepository, Filter, RowKeys};

/// Reserves an id for a new entity of type `E`.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the repository fails.
pub async fn allocate_id<E: Entity>(repo: &dyn EntityRepository) -> Result<E::Id, DomainError> {
    let raw = repo.next_id(E::KIND).await?;
    Ok(E::Id::from_raw(raw))
}

/// Builds an unsaved record for a new entity of type `E`.
#[must_use]
pub fn new_record<E: Entity>(
    id: E::Id,
    keys: RowKeys,
    created_at: chrono::DateTime<chrono::Utc>,
) -> Record {
    Record::new(id.raw(), keys, E::attribute_defaults(), created_at)
}

/// Loads an entity, `None` if the row does not exist.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the repository fails.
pub async fn try_load<E: Entity>(
    repo: &dyn EntityRepository,
    id: E::Id,
) -> Result<Option<E>, DomainError> {
    let row = repo.load(E::KIND, id.raw()).await?;
    Ok(row.map(|row| E::from_record(Record::from_row(row, E::attribute_defaults()))))
}

/// Loads an entity.
///
/// # Errors
///
/// Returns `DomainError::EntityNotFound` if the row does not exist.
pub async fn load<E: Entity>(repo: &dyn EntityRepository, id: E::Id) -> Result<E, DomainError> {
    try_load(repo, id)
        .await?
        .ok_or(DomainError::EntityNotFound {
            kind: E::KIND,
            id: id.raw(),
        })
}

/// Loads every entity in `ids`, preserving order.
///
/// # Errors
///
/// Returns `DomainError::EntityNotFound` on the first missing row.
pub async fn load_all<E, I>(repo: &dyn EntityRepository, ids: I) -> Result<Vec<E>, DomainError>
where
    E: Entity,
    I: IntoIterator<Item = E::Id>,
{
    let mut entities = Vec::new();
    for id in ids {
        entities.push(load(repo, id).await?);
    }
    Ok(entities)
}

/// Returns the ids of entities matching `filter`, ascending.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the repository fails.
pub async fn find<E: Entity>(
    repo: &dyn EntityRepository,
    filter: &Filter,
) -> Result<Vec<E::Id>, DomainError> {
    let ids = repo.query(E::KIND, filter).await?;
    Ok(ids.into_iter().map(E::Id::from_raw).collect())
}

/// Loads every entity matching `filter`.
///
/// # Errors
///
/// Returns `DomainError` if the query or a load fails.
pub async fn find_all<E: Entity>(
    repo: &dyn EntityRepository,
    filter: &Filter,
) -> Result<Vec<E>, DomainError> {
    let ids = find::<E>(repo, filter).await?;
    load_all(repo, ids).await
}

/// Validates, reconciles and writes an entity.
///
/// # Errors
///
/// Returns `DomainError::InvariantViolation` if validation fails,
/// `DomainError::ConcurrencyConflict` if the row changed since it was
/// loaded, or `DomainError::Infrastructure` if the repository fails.
pub async fn save<E: Entity>(
    repo: &dyn EntityRepository,
    entity: &mut E,
) -> Result<(), DomainError> {
    entity.validate()?;
    let expected_version = entity.record().version();
    let row = entity.record_mut().to_row();
    let version = repo.save(E::KIND, &row, expected_version).await?;
    entity.record_mut().mark_saved(version);
    debug!(kind = E::KIND, id = row.id, version, "entity saved");
    Ok(())
}

/// Loads an entity, applies `change`, and saves it, reloading and
/// reapplying on concurrency conflicts up to `attempts` times.
///
/// `change` may run more than once and must only derive its edits from the
/// entity it is given.
///
/// # Errors
///
/// Returns the error of `change`, the last `ConcurrencyConflict` once the
/// attempts are exhausted, or any load/save error.
pub async fn modify<E, F>(
    repo: &dyn EntityRepository,
    id: E::Id,
    attempts: u32,
    mut change: F,
) -> Result<E, DomainError>
where
    E: Entity,
    F: FnMut(&mut E) -> Result<(), DomainError> + Send,
{
    let mut attempt = 1;
    loop {
        let mut entity: E = load(repo, id).await?;
        change(&mut entity)?;
        match save(repo, &mut entity).await {
            Ok(()) => return Ok(entity),
            Err(DomainError::ConcurrencyConflict { .. }) if attempt < attempts => {
                warn!(kind = E::KIND, id = id.raw(), attempt, "concurrent update; retrying");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
