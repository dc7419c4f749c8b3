//! The `Event` entity: an append-only game log entry.

use chrono::{DateTime, Utc};
use quarry_core::attribute_schema;
use quarry_core::attributes::AttributeMap;
use quarry_core::entity::{Entity, Record};
use quarry_core::error::DomainError;
use quarry_core::persistence;
use quarry_core::repository::{KeyValue, RowKeys};

use crate::domain::charactor::GAME_KEY;
use crate::domain::ids::{EventId, GameId};

/// Event name for a created game.
pub const GAME_CREATED: &str = "game_created";
/// Event name for a charactor joining.
pub const CHARACTOR_JOINED: &str = "charactor_joined";
/// Event name for a started game.
pub const GAME_STARTED: &str = "game_started";
/// Event name for an accepted mission.
pub const MISSION_ACCEPTED: &str = "mission_accepted";
/// Event name for a new submission.
pub const SUBMISSION_STARTED: &str = "submission_started";
/// Event name for a judged submission.
pub const SUBMISSION_JUDGED: &str = "submission_judged";
/// Event name for a dismissed submission.
pub const SUBMISSION_DISMISSED: &str = "submission_dismissed";
/// Event name for a posted bounty.
pub const BOUNTY_POSTED: &str = "bounty_posted";
/// Event name for the end of a game.
pub const GAME_OVER: &str = "game_over";

/// Something that happened in a game. The record's creation time is the
/// event timestamp.
#[derive(Debug)]
pub struct Event {
    record: Record,
}

attribute_schema! {
    Event {
        /// Event name.
        name: String = "generic event".to_owned() => fn set_name,
    }
}

impl Event {
    /// Builds an unsaved event.
    #[must_use]
    pub fn new(id: EventId, game: GameId, name: &str, occurred_at: DateTime<Utc>) -> Self {
        let mut keys = RowKeys::new();
        keys.insert(GAME_KEY.to_owned(), KeyValue::Id(game.0));
        let mut event = Self::from_record(persistence::new_record::<Self>(id, keys, occurred_at));
        event.set_name(name.to_owned());
        event
    }

    /// When the event happened.
    #[must_use]
    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.record.created_at()
    }
}

impl Entity for Event {
    type Id = EventId;

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

    fn validate(&self) -> Result<(), DomainError> {
        if self.record.version() > 0 {
            return Err(DomainError::InvariantViolation(format!(
                "event {} is append-only",
                self.id()
            )));
        }
        Ok(())
    }
}
