//! The `Bounty` entity: coin put on a charactor's head.

use chrono::{DateTime, Utc};
use quarry_core::attribute_schema;
use quarry_core::attributes::AttributeMap;
use quarry_core::entity::{Entity, Record};
use quarry_core::error::DomainError;
use quarry_core::persistence;
use quarry_core::repository::{KeyValue, RowKeys};

use crate::domain::charactor::GAME_KEY;
use crate::domain::ids::{BountyId, CharactorId, GameId};

/// Key column holding the targeted charactor.
pub const TARGET_KEY: &str = "target_id";

/// Coin paid to whoever completes a mission on the target.
#[derive(Debug)]
pub struct Bounty {
    record: Record,
}

attribute_schema! {
    Bounty {
        /// Amount paid out.
        coin: i64 = 0 => fn set_coin,
        /// Charactor who put up the coin.
        poster: Option<CharactorId> = None => fn set_poster,
        /// Charactor who collected the bounty.
        claimed_by: Option<CharactorId> = None => fn set_claimed_by,
    }
}

impl Bounty {
    /// Builds an unsaved bounty.
    #[must_use]
    pub fn post(
        id: BountyId,
        game: GameId,
        target: CharactorId,
        poster: CharactorId,
        coin: i64,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut keys = RowKeys::new();
        keys.insert(GAME_KEY.to_owned(), KeyValue::Id(game.0));
        keys.insert(TARGET_KEY.to_owned(), KeyValue::Id(target.0));
        let mut bounty = Self::from_record(persistence::new_record::<Self>(id, keys, created_at));
        bounty.set_coin(coin);
        bounty.set_poster(Some(poster));
        bounty
    }

    /// The targeted charactor.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::CorruptState` if the key column is missing.
    pub fn target_id(&self) -> Result<CharactorId, DomainError> {
        self.record.key_id(TARGET_KEY).map(CharactorId)
    }

    /// The game of the bounty.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::CorruptState` if the key column is missing.
    pub fn game_id(&self) -> Result<GameId, DomainError> {
        self.record.key_id(GAME_KEY).map(GameId)
    }

    /// Whether nobody collected the bounty yet.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::CorruptState` if the field cannot be read.
    pub fn is_open(&self) -> Result<bool, DomainError> {
        Ok(self.claimed_by()?.is_none())
    }

    /// Claims the bounty for `hunter`, returning the coin won. A bounty
    /// pays out once; later claims win nothing.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::CorruptState` if a field cannot be read.
    pub fn claim(&mut self, hunter: CharactorId) -> Result<i64, DomainError> {
        if !self.is_open()? {
            return Ok(0);
        }
        self.set_claimed_by(Some(hunter));
        self.coin()
    }
}

impl Entity for Bounty {
    type Id = BountyId;

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
        let coin = self.coin()?;
        if coin < 0 {
            return Err(DomainError::InvariantViolation(format!(
                "bounty {} has negative coin ({coin})",
                self.id()
            )));
        }
        Ok(())
    }
}
