//! The `Mission` entity: photograph a prey performing a stunt.
//!
//! Missions are written once when a batch is generated and never change
//! afterwards; a new batch abandons the old rows.

use chrono::{DateTime, TimeDelta, Utc};
use quarry_core::attribute_schema;
use quarry_core::attributes::AttributeMap;
use quarry_core::entity::{Entity, Record};
use quarry_core::error::DomainError;
use quarry_core::persistence;
use quarry_core::repository::{KeyValue, RowKeys};

use crate::domain::charactor::GAME_KEY;
use crate::domain::ids::{BountyId, CharactorId, GameId, MissionId, StuntId};

/// A potential or accepted mission.
#[derive(Debug)]
pub struct Mission {
    record: Record,
}

attribute_schema! {
    Mission {
        /// Stunt the prey must be caught performing.
        stunt: Option<StuntId> = None => fn set_stunt,
        /// Charactor hunting.
        hunter: Option<CharactorId> = None => fn set_hunter,
        /// Charactor being hunted.
        prey: Option<CharactorId> = None => fn set_prey,
        /// Flat award paid on success.
        award: i64 = 0 => fn set_award,
        /// Bounties on the prey when the mission was generated.
        bounties: Vec<BountyId> = Vec::new() => fn set_bounties,
    }
}

/// Parameters of a generated mission.
#[derive(Debug, Clone)]
pub struct MissionSpec {
    /// Game the mission belongs to.
    pub game: GameId,
    /// Stunt to capture.
    pub stunt: StuntId,
    /// Hunting charactor.
    pub hunter: CharactorId,
    /// Hunted charactor.
    pub prey: CharactorId,
    /// Flat award.
    pub award: i64,
    /// Unclaimed bounties on the prey.
    pub bounties: Vec<BountyId>,
}

impl Mission {
    /// Builds an unsaved mission.
    #[must_use]
    pub fn generate(id: MissionId, spec: MissionSpec, created_at: DateTime<Utc>) -> Self {
        let mut keys = RowKeys::new();
        keys.insert(GAME_KEY.to_owned(), KeyValue::Id(spec.game.0));
        let mut mission = Self::from_record(persistence::new_record::<Self>(id, keys, created_at));
        mission.set_stunt(Some(spec.stunt));
        mission.set_hunter(Some(spec.hunter));
        mission.set_prey(Some(spec.prey));
        mission.set_award(spec.award);
        mission.set_bounties(spec.bounties);
        mission
    }

    /// The game this mission belongs to.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::CorruptState` if the key column is missing.
    pub fn game_id(&self) -> Result<GameId, DomainError> {
        self.record.key_id(GAME_KEY).map(GameId)
    }

    /// Hunter and prey of the mission.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::CorruptState` if either is missing.
    pub fn participants(&self) -> Result<(CharactorId, CharactorId), DomainError> {
        match (self.hunter()?, self.prey()?) {
            (Some(hunter), Some(prey)) => Ok((hunter, prey)),
            _ => Err(DomainError::CorruptState(format!(
                "mission {} has no hunter or prey",
                self.id()
            ))),
        }
    }

    /// Whether the mission is older than `freshness` at `now`.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, freshness: TimeDelta) -> bool {
        now - self.record.created_at() >= freshness
    }
}

impl Entity for Mission {
    type Id = MissionId;

    fn attribute_defaults() -> AttributeMap {
        Self::schema_defaults()
    }

    fn from_record(record: Record) -> Self {
        Self { record }
    }

    fn record(&self) -> &Record {
        &self.record
    }

    fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }
}
