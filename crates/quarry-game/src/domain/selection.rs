//! Random selection of stunts, prey and judges, and the freshness policy of
//! potential missions.
//!
//! All randomness goes through [`DeterministicRng`] so tests can script the
//! picks.

use chrono::{DateTime, TimeDelta, Utc};
use quarry_core::error::DomainError;
use quarry_core::rng::DeterministicRng;

use crate::domain::ids::{CharactorId, StuntId};
use crate::domain::mission::Mission;

/// Number of judges assigned to every submission.
pub const JUDGES_PER_SUBMISSION: usize = 2;

/// Picks `count` distinct items from `pool` (all of them if the pool is
/// smaller), using a partial Fisher–Yates shuffle.
pub fn sample<T: Copy>(pool: &[T], count: usize, rng: &mut dyn DeterministicRng) -> Vec<T> {
    let mut items = pool.to_vec();
    let take = count.min(items.len());
    for i in 0..take {
        let j = i + rng.next_index(items.len() - i);
        items.swap(i, j);
    }
    items.truncate(take);
    items
}

/// Picks a stunt uniformly from the catalog.
///
/// # Errors
///
/// Returns `DomainError::InvariantViolation` for an empty catalog.
pub fn choose_stunt(
    catalog: &[StuntId],
    rng: &mut dyn DeterministicRng,
) -> Result<StuntId, DomainError> {
    if catalog.is_empty() {
        return Err(DomainError::InvariantViolation(
            "the stunt catalog is empty".into(),
        ));
    }
    let index = rng.next_index(catalog.len());
    catalog.get(index).copied().ok_or_else(|| {
        DomainError::InvariantViolation(format!(
            "stunt index {index} is outside a catalog of {}",
            catalog.len()
        ))
    })
}

/// Picks up to `count` prey for `hunter` from the game roster. Charactors
/// that were prey in the hunter's previous batch are only considered when
/// too few others remain.
pub fn choose_potential_prey(
    hunter: CharactorId,
    roster: &[CharactorId],
    previous_prey: &[CharactorId],
    count: usize,
    rng: &mut dyn DeterministicRng,
) -> Vec<CharactorId> {
    let candidates: Vec<CharactorId> = roster.iter().copied().filter(|c| *c != hunter).collect();
    let unseen: Vec<CharactorId> = candidates
        .iter()
        .copied()
        .filter(|c| !previous_prey.contains(c))
        .collect();
    if unseen.len() >= count {
        sample(&unseen, count, rng)
    } else {
        sample(&candidates, count, rng)
    }
}

/// Picks the two judges of a submission from the roster, never the hunter
/// or the prey.
///
/// # Errors
///
/// Returns `DomainError::InvariantViolation` when fewer than two charactors
/// are eligible.
pub fn choose_judges(
    hunter: CharactorId,
    prey: CharactorId,
    roster: &[CharactorId],
    rng: &mut dyn DeterministicRng,
) -> Result<Vec<CharactorId>, DomainError> {
    let eligible: Vec<CharactorId> = roster
        .iter()
        .copied()
        .filter(|c| *c != hunter && *c != prey)
        .collect();
    if eligible.len() < JUDGES_PER_SUBMISSION {
        return Err(DomainError::InvariantViolation(format!(
            "only {} charactors can judge, need {JUDGES_PER_SUBMISSION}",
            eligible.len()
        )));
    }
    Ok(sample(&eligible, JUDGES_PER_SUBMISSION, rng))
}

/// Whether every potential mission of a batch is stale. Missing rows count
/// as stale; so does an empty batch.
#[must_use]
pub fn batch_is_stale(batch: &[Option<Mission>], now: DateTime<Utc>, freshness: TimeDelta) -> bool {
    batch
        .iter()
        .all(|m| m.as_ref().is_none_or(|m| m.is_stale(now, freshness)))
}
