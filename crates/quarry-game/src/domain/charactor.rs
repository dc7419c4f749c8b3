//! The `Charactor` entity: a player's presence in one game.
//!
//! A charactor moves through the activities
//! `choosing_mission → hunting → awaiting_judgement → collecting_reward`,
//! falling back to `hunting` when a judge rules against it. Coin only
//! changes through [`Charactor::add_coin`] and [`Charactor::pay`].

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use quarry_core::attribute_schema;
use quarry_core::attributes::AttributeMap;
use quarry_core::entity::{Entity, Record};
use quarry_core::error::DomainError;
use quarry_core::guard::{deny, ensure};
use quarry_core::persistence;
use quarry_core::repository::{KeyValue, RowKeys};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{CharactorId, GameId, MissionId, PlayerId, SubmissionId};

/// Key column linking a row to its game.
pub const GAME_KEY: &str = "game_id";
/// Key column linking a charactor to its player.
pub const PLAYER_KEY: &str = "player_id";

/// What a charactor is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    /// Picking one of the potential missions.
    ChoosingMission,
    /// Working on an accepted mission.
    Hunting,
    /// Waiting for a judge to rule on a submission.
    AwaitingJudgement,
    /// The submission was approved; the reward is waiting.
    CollectingReward,
}

impl Activity {
    /// Stored name of the activity.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChoosingMission => "choosing_mission",
            Self::Hunting => "hunting",
            Self::AwaitingJudgement => "awaiting_judgement",
            Self::CollectingReward => "collecting_reward",
        }
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A player's charactor within one game.
#[derive(Debug)]
pub struct Charactor {
    record: Record,
}

attribute_schema! {
    Charactor {
        /// Display name.
        c_name: String = "C-?".to_owned() => fn set_c_name,
        /// Coin balance.
        coin: i64 = 0 => fn set_coin,
        /// Current activity.
        activity: Activity = Activity::ChoosingMission => fn set_activity,
        /// Missions on offer, one per potential prey.
        potential_missions: Vec<MissionId> = Vec::new() => fn set_potential_missions,
        /// Prey of the latest batch of potential missions.
        recent_prey: Vec<CharactorId> = Vec::new() => fn set_recent_prey,
        /// Pending submissions in which this charactor is the prey.
        current_prey_submissions: BTreeSet<SubmissionId> = BTreeSet::new()
            => fn set_current_prey_submissions,
        /// Pending submissions this charactor has to judge.
        current_judge_submissions: BTreeSet<SubmissionId> = BTreeSet::new()
            => fn set_current_judge_submissions,
        /// Accepted mission.
        mission: Option<MissionId> = None => fn set_mission,
        /// Submission for the accepted mission.
        submission: Option<SubmissionId> = None => fn set_submission,
    }
}

impl Charactor {
    /// Builds an unsaved charactor for `player` in `game`.
    #[must_use]
    pub fn new(id: CharactorId, game: GameId, player: PlayerId, created_at: DateTime<Utc>) -> Self {
        let mut keys = RowKeys::new();
        keys.insert(GAME_KEY.to_owned(), KeyValue::Id(game.0));
        keys.insert(PLAYER_KEY.to_owned(), KeyValue::Id(player.0));
        Self::from_record(persistence::new_record::<Self>(id, keys, created_at))
    }

    /// The game this charactor plays in.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::CorruptState` if the key column is missing.
    pub fn game_id(&self) -> Result<GameId, DomainError> {
        self.record.key_id(GAME_KEY).map(GameId)
    }

    /// The player controlling this charactor.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::CorruptState` if the key column is missing.
    pub fn player_id(&self) -> Result<PlayerId, DomainError> {
        self.record.key_id(PLAYER_KEY).map(PlayerId)
    }

    /// Checks that `requestor` controls this charactor.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Denied` for any other player.
    pub fn control_allowed(
        &self,
        operation: &'static str,
        requestor: PlayerId,
    ) -> Result<(), DomainError> {
        ensure(
            self.player_id()? == requestor,
            operation,
            "player does not own char",
        )
    }

    /// Checks that the charactor can spend `amount`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Denied` for a non-positive amount or an
    /// insufficient balance.
    pub fn spend_allowed(&self, operation: &'static str, amount: i64) -> Result<(), DomainError> {
        ensure(amount > 0, operation, "amount must be positive")?;
        ensure(self.coin()? >= amount, operation, "char does not have the coin")
    }

    /// Sets the in-game name and starting coin when the game starts.
    pub fn on_game_start(&mut self, unique_name: &str, starting_coin: i64) {
        self.set_c_name(format!("C-{unique_name}"));
        self.set_coin(starting_coin);
    }

    /// Credits `amount` coin.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for a negative amount.
    pub fn add_coin(&mut self, amount: i64) -> Result<(), DomainError> {
        if amount < 0 {
            return Err(DomainError::Validation(format!(
                "cannot add a negative amount ({amount})"
            )));
        }
        let coin = self.coin()?;
        self.set_coin(coin.saturating_add(amount));
        Ok(())
    }

    /// Debits `amount` coin.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Denied` when the balance does not cover a
    /// positive `amount`.
    pub fn pay(&mut self, amount: i64) -> Result<(), DomainError> {
        self.spend_allowed("pay", amount)?;
        let coin = self.coin()?;
        self.set_coin(coin - amount);
        Ok(())
    }

    /// Checks whether the potential missions may be refreshed.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Denied` before the game starts or while the
    /// charactor is busy with a mission.
    pub fn refresh_allowed(&self, game_started: bool) -> Result<(), DomainError> {
        ensure(game_started, "refresh_missions", "game has not started")?;
        ensure(
            self.activity()? == Activity::ChoosingMission,
            "refresh_missions",
            "not choosing_mission",
        )
    }

    /// Replaces the potential missions with a new batch.
    pub fn offer_missions(&mut self, missions: Vec<MissionId>, prey: Vec<CharactorId>) {
        self.set_potential_missions(missions);
        self.set_recent_prey(prey);
    }

    /// Checks whether `mission` may be accepted. `batch_is_stale` tells
    /// whether every potential mission has outlived its freshness.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Denied` if the requestor does not control the
    /// charactor, it is not choosing a mission, the batch expired, or the
    /// mission was not offered.
    pub fn accept_allowed(
        &self,
        requestor: PlayerId,
        mission: MissionId,
        batch_is_stale: bool,
    ) -> Result<(), DomainError> {
        self.control_allowed("accept", requestor)?;
        ensure(
            self.activity()? == Activity::ChoosingMission,
            "accept",
            "not choosing_mission",
        )?;
        ensure(!batch_is_stale, "accept", "mission has expired")?;
        ensure(
            self.potential_missions()?.contains(&mission),
            "accept",
            "mission is not a potential",
        )
    }

    /// Starts hunting `mission` and drops the other offers.
    pub fn accept_mission(&mut self, mission: MissionId) {
        self.set_activity(Activity::Hunting);
        self.set_mission(Some(mission));
        self.set_potential_missions(Vec::new());
    }

    /// Checks whether the requestor may submit a photo for the active
    /// mission.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Denied` unless the requestor controls a hunting
    /// charactor.
    pub fn submit_allowed(&self, requestor: PlayerId) -> Result<(), DomainError> {
        self.control_allowed("submit", requestor)?;
        ensure(self.activity()? == Activity::Hunting, "submit", "not hunting")
    }

    /// Waits for a judge to rule on `submission`.
    pub fn await_judgement(&mut self, submission: SubmissionId) {
        self.set_activity(Activity::AwaitingJudgement);
        self.set_submission(Some(submission));
    }

    /// Reacts to the judgement of `submission`. Judgements on submissions
    /// other than the active one leave the charactor untouched.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::CorruptState` if the state cannot be read.
    pub fn receive_judgement(
        &mut self,
        submission: SubmissionId,
        judgement: bool,
    ) -> Result<(), DomainError> {
        if self.submission()? != Some(submission) {
            return Ok(());
        }
        self.set_activity(if judgement {
            Activity::CollectingReward
        } else {
            Activity::Hunting
        });
        Ok(())
    }

    /// Collects `amount` for the finished mission and goes back to
    /// choosing one.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for a negative amount.
    pub fn collect_reward(&mut self, amount: i64) -> Result<(), DomainError> {
        self.add_coin(amount)?;
        self.set_activity(Activity::ChoosingMission);
        self.set_mission(None);
        self.set_submission(None);
        Ok(())
    }

    /// Returns to hunting the same mission after a rejected `submission`.
    /// An older submission than the active one leaves the charactor as is.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::CorruptState` if the state cannot be read.
    pub fn resume_hunting(&mut self, submission: SubmissionId) -> Result<(), DomainError> {
        if self.submission()? != Some(submission) {
            return Ok(());
        }
        self.set_submission(None);
        if self.mission()?.is_some() {
            self.set_activity(Activity::Hunting);
        }
        Ok(())
    }

    /// Adds `submission` to the pending prey notifications.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::CorruptState` if the set cannot be read.
    pub fn notify_as_prey(&mut self, submission: SubmissionId) -> Result<(), DomainError> {
        let mut pending = self.current_prey_submissions()?;
        pending.insert(submission);
        self.set_current_prey_submissions(pending);
        Ok(())
    }

    /// Adds `submission` to the pending judge notifications.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::CorruptState` if the set cannot be read.
    pub fn notify_as_judge(&mut self, submission: SubmissionId) -> Result<(), DomainError> {
        let mut pending = self.current_judge_submissions()?;
        pending.insert(submission);
        self.set_current_judge_submissions(pending);
        Ok(())
    }

    /// Drops `submission` from both pending sets.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::CorruptState` if a set cannot be read.
    pub fn clear_notification(&mut self, submission: SubmissionId) -> Result<(), DomainError> {
        let mut as_prey = self.current_prey_submissions()?;
        if as_prey.remove(&submission) {
            self.set_current_prey_submissions(as_prey);
        }
        let mut as_judge = self.current_judge_submissions()?;
        if as_judge.remove(&submission) {
            self.set_current_judge_submissions(as_judge);
        }
        Ok(())
    }
}

impl Entity for Charactor {
    type Id = CharactorId;

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
        let activity = self.activity()?;
        let has_mission = self.mission()?.is_some();
        let has_submission = self.submission()?.is_some();
        let consistent = match activity {
            Activity::ChoosingMission => !has_mission && !has_submission,
            Activity::Hunting => has_mission,
            Activity::AwaitingJudgement | Activity::CollectingReward => {
                has_mission && has_submission
            }
        };
        if !consistent {
            return Err(DomainError::InvariantViolation(format!(
                "charactor {} is {activity} with mission {has_mission} and submission {has_submission}",
                self.id()
            )));
        }
        let coin = self.coin()?;
        if coin < 0 {
            return Err(DomainError::InvariantViolation(format!(
                "charactor {} has negative coin ({coin})",
                self.id()
            )));
        }
        Ok(())
    }
}

/// Denies `operation` when `charactor` does not play in `game`.
///
/// # Errors
///
/// Returns `DomainError::Denied` for a charactor of another game.
pub fn same_game_allowed(
    operation: &'static str,
    charactor: &Charactor,
    game: GameId,
) -> Result<(), DomainError> {
    if charactor.game_id()? == game {
        Ok(())
    } else {
        Err(deny(operation, "char is not in this game"))
    }
}
