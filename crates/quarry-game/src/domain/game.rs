//! The `Game` entity.

use chrono::{DateTime, Utc};
use quarry_core::attribute_schema;
use quarry_core::attributes::AttributeMap;
use quarry_core::entity::{Entity, Record};
use quarry_core::error::DomainError;
use quarry_core::guard::{deny, ensure};
use quarry_core::persistence;
use quarry_core::repository::{KeyValue, RowKeys};
use serde_json::Value;

use crate::config::GameRules;
use crate::domain::ids::{GameId, PlayerId};

/// Key column holding the game name.
pub const NAME_KEY: &str = "name";

/// A single play session grouping charactors, missions and submissions.
#[derive(Debug)]
pub struct Game {
    record: Record,
}

attribute_schema! {
    Game {
        /// Player who created the game.
        creator: Option<PlayerId> = None => fn set_creator,
        /// Whether the game has started.
        started: bool = false => fn set_started,
        /// Whether the game is over.
        finished: bool = false => fn set_finished,
        /// Invite payloads, in the order they arrived.
        invites: Vec<Value> = Vec::new() => fn set_invites,
    }
}

impl Game {
    /// Builds an unsaved game.
    #[must_use]
    pub fn new(id: GameId, name: &str, creator: PlayerId, created_at: DateTime<Utc>) -> Self {
        let mut keys = RowKeys::new();
        keys.insert(NAME_KEY.to_owned(), KeyValue::Text(name.to_owned()));
        let mut game = Self::from_record(persistence::new_record::<Self>(id, keys, created_at));
        game.set_creator(Some(creator));
        game
    }

    /// The game name.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::CorruptState` if the key column is missing.
    pub fn name(&self) -> Result<&str, DomainError> {
        self.record.key_text(NAME_KEY)
    }

    /// Checks whether a game called `name` may be created next to the
    /// `existing` games of the same name.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Denied` for a blank name or while another game
    /// of that name is waiting to start.
    pub fn create_allowed(name: &str, existing: &[Self]) -> Result<(), DomainError> {
        ensure(!name.trim().is_empty(), "create_new_game", "name must not be blank")?;
        for game in existing {
            if !game.started()? {
                return Err(deny(
                    "create_new_game",
                    "another game with the same name is waiting to start",
                ));
            }
        }
        Ok(())
    }

    /// Checks whether the game can start, given how many charactors it has
    /// and whether the requestor owns one of them.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Denied` if the game already started, has too few
    /// charactors, or the requestor is not playing.
    pub fn start_allowed(
        &self,
        charactor_count: usize,
        requestor_is_member: bool,
        rules: &GameRules,
    ) -> Result<(), DomainError> {
        ensure(!self.started()?, "start", "game has already started")?;
        ensure(
            charactor_count >= rules.min_charactors,
            "start",
            "need more charactors",
        )?;
        ensure(requestor_is_member, "start", "you are not in this game")
    }

    /// Marks the game as started.
    pub fn start(&mut self) {
        self.set_started(true);
    }

    /// Checks whether a new charactor may join.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Denied` once the game has started or when the
    /// player already plays in it.
    pub fn join_allowed(&self, already_member: bool) -> Result<(), DomainError> {
        ensure(!self.started()?, "join", "game has already started")?;
        ensure(!already_member, "join", "player is already in this game")
    }

    /// Checks an invite payload.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Denied` if the payload is not JSON.
    pub fn invite_allowed(invite_json: &str) -> Result<(), DomainError> {
        serde_json::from_str::<Value>(invite_json)
            .map(|_| ())
            .map_err(|_| deny("invite", "invalid JSON"))
    }

    /// Appends an invite payload.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Denied` for an invalid payload or
    /// `DomainError::CorruptState` if the stored invites cannot be read.
    pub fn invite(&mut self, invite_json: &str) -> Result<(), DomainError> {
        Self::invite_allowed(invite_json)?;
        let invite: Value =
            serde_json::from_str(invite_json).map_err(|_| deny("invite", "invalid JSON"))?;
        let mut invites = self.invites()?;
        invites.push(invite);
        self.set_invites(invites);
        Ok(())
    }

    /// Checks whether `requestor` may end the game.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Denied` unless the creator ends a running game.
    pub fn end_allowed(&self, requestor: PlayerId) -> Result<(), DomainError> {
        ensure(
            self.creator()? == Some(requestor),
            "game_over",
            "only the creator may end the game",
        )?;
        ensure(self.started()?, "game_over", "game has not started")?;
        ensure(!self.finished()?, "game_over", "game is already over")
    }

    /// Marks the game as over.
    pub fn finish(&mut self) {
        self.set_finished(true);
    }
}

impl Entity for Game {
    type Id = GameId;

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
        if self.finished()? && !self.started()? {
            return Err(DomainError::InvariantViolation(format!(
                "game {} finished without starting",
                self.id()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use quarry_core::error::DomainError;
    use serde_json::json;

    use super::*;

    fn new_game() -> Game {
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        Game::new(GameId(1), "night hunt", PlayerId(7), now)
    }

    fn denial_reason(result: Result<(), DomainError>) -> String {
        match result {
            Err(DomainError::Denied(denial)) => denial.reason,
            other => panic!("expected Denied, got {other:?}"),
        }
    }

    #[test]
    fn test_new_game_has_defaults_and_creator() {
        let game = new_game();

        assert_eq!(game.name().unwrap(), "night hunt");
        assert_eq!(game.creator().unwrap(), Some(PlayerId(7)));
        assert!(!game.started().unwrap());
        assert!(game.invites().unwrap().is_empty());
    }

    #[test]
    fn test_start_needs_enough_charactors() {
        let game = new_game();
        let rules = GameRules::default();

        assert_eq!(denial_reason(game.start_allowed(5, true, &rules)), "need more charactors");
        assert!(game.start_allowed(6, true, &rules).is_ok());
    }

    #[test]
    fn test_start_needs_requestor_in_game() {
        let game = new_game();

        let result = game.start_allowed(6, false, &GameRules::default());

        assert_eq!(denial_reason(result), "you are not in this game");
    }

    #[test]
    fn test_start_is_denied_twice() {
        let mut game = new_game();
        game.start();

        let result = game.start_allowed(6, true, &GameRules::default());

        assert_eq!(denial_reason(result), "game has already started");
    }

    #[test]
    fn test_create_denied_while_same_name_waits_to_start() {
        let waiting = new_game();
        let mut running = new_game();
        running.start();

        assert!(Game::create_allowed("night hunt", &[]).is_ok());
        assert!(Game::create_allowed("night hunt", std::slice::from_ref(&running)).is_ok());
        assert_eq!(
            denial_reason(Game::create_allowed("night hunt", &[running, waiting])),
            "another game with the same name is waiting to start"
        );
        assert_eq!(denial_reason(Game::create_allowed("  ", &[])), "name must not be blank");
    }

    #[test]
    fn test_invite_appends_valid_json_only() {
        let mut game = new_game();

        game.invite(r#"{"email":"a@example.com"}"#).unwrap();
        let result = game.invite("{not json");

        assert_eq!(denial_reason(result), "invalid JSON");
        assert_eq!(game.invites().unwrap(), vec![json!({ "email": "a@example.com" })]);
    }

    #[test]
    fn test_only_creator_ends_a_running_game() {
        let mut game = new_game();
        assert_eq!(denial_reason(game.end_allowed(PlayerId(7))), "game has not started");

        game.start();

        assert_eq!(
            denial_reason(game.end_allowed(PlayerId(8))),
            "only the creator may end the game"
        );
        assert!(game.end_allowed(PlayerId(7)).is_ok());
        game.finish();
        assert_eq!(denial_reason(game.end_allowed(PlayerId(7))), "game is already over");
    }
}
