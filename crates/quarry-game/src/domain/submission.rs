//! The `Submission` entity: a photo handed in for judgement.

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

use crate::domain::charactor::{Charactor, GAME_KEY, same_game_allowed};
use crate::domain::ids::{CharactorId, GameId, MissionId, PlayerId, SubmissionId};
use crate::domain::mission::Mission;

/// A judge's verdict, also used to pick the side of a tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    /// The photo shows the prey doing the stunt.
    Yes,
    /// It does not.
    No,
}

impl From<bool> for Vote {
    fn from(judgement: bool) -> Self {
        if judgement { Self::Yes } else { Self::No }
    }
}

/// Coin tipped towards each verdict, paid to the judge who rules that way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tips {
    /// Tipped towards yes.
    pub yes: i64,
    /// Tipped towards no.
    pub no: i64,
}

impl Tips {
    /// Coin tipped towards `vote`.
    #[must_use]
    pub fn for_vote(self, vote: Vote) -> i64 {
        match vote {
            Vote::Yes => self.yes,
            Vote::No => self.no,
        }
    }

    fn add(&mut self, vote: Vote, amount: i64) {
        match vote {
            Vote::Yes => self.yes += amount,
            Vote::No => self.no += amount,
        }
    }
}

/// How a charactor relates to a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Submitted the photo.
    Hunter,
    /// Appears in the photo.
    Prey,
    /// Rules on the photo.
    Judge,
    /// Anyone else.
    Spectator,
}

impl Role {
    /// Name of the role as shown to players.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hunter => "hunter",
            Self::Prey => "prey",
            Self::Judge => "judge",
            Self::Spectator => "spectator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everyone with a stake in a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stakeholders {
    /// The hunter.
    pub hunter: CharactorId,
    /// The prey.
    pub prey: CharactorId,
    /// The two judges.
    pub judges: Vec<CharactorId>,
}

/// A photo submitted for a mission.
#[derive(Debug)]
pub struct Submission {
    record: Record,
}

attribute_schema! {
    Submission {
        /// Mission the photo was taken for.
        mission: Option<MissionId> = None => fn set_mission,
        /// Where the photo lives.
        photo_url: String = String::new() => fn set_photo_url,
        /// Charactors allowed to judge.
        judges: Vec<CharactorId> = Vec::new() => fn set_judges,
        /// Coin tipped towards each verdict.
        tips: Tips = Tips::default() => fn set_tips,
        /// Verdict, once a judge ruled.
        judgement: Option<bool> = None => fn set_judgement,
        /// Judge who ruled.
        winning_judge: Option<CharactorId> = None => fn set_winning_judge,
        /// Whether the hunter dismissed the result.
        dismissed: bool = false => fn set_dismissed,
    }
}

impl Submission {
    /// Builds an unsaved submission.
    #[must_use]
    pub fn new(
        id: SubmissionId,
        game: GameId,
        mission: MissionId,
        photo_url: &str,
        judges: Vec<CharactorId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut keys = RowKeys::new();
        keys.insert(GAME_KEY.to_owned(), KeyValue::Id(game.0));
        let record = persistence::new_record::<Self>(id, keys, created_at);
        let mut submission = Self::from_record(record);
        submission.set_mission(Some(mission));
        submission.set_photo_url(photo_url.to_owned());
        submission.set_judges(judges);
        submission
    }

    /// The game of the submission.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::CorruptState` if the key column is missing.
    pub fn game_id(&self) -> Result<GameId, DomainError> {
        self.record.key_id(GAME_KEY).map(GameId)
    }

    /// The mission the photo was taken for.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::CorruptState` if no mission is recorded.
    pub fn mission_id(&self) -> Result<MissionId, DomainError> {
        self.mission()?.ok_or_else(|| {
            DomainError::CorruptState(format!("submission {} has no mission", self.id()))
        })
    }

    /// Hunter, prey and judges.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::CorruptState` if the mission lacks participants.
    pub fn stakeholders(&self, mission: &Mission) -> Result<Stakeholders, DomainError> {
        let (hunter, prey) = mission.participants()?;
        Ok(Stakeholders {
            hunter,
            prey,
            judges: self.judges()?,
        })
    }

    /// Role of `charactor` in this submission.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::CorruptState` if the state cannot be read.
    pub fn role_of(&self, charactor: CharactorId, mission: &Mission) -> Result<Role, DomainError> {
        let stakeholders = self.stakeholders(mission)?;
        Ok(if charactor == stakeholders.hunter {
            Role::Hunter
        } else if charactor == stakeholders.prey {
            Role::Prey
        } else if stakeholders.judges.contains(&charactor) {
            Role::Judge
        } else {
            Role::Spectator
        })
    }

    /// Checks whether `judge` may rule on the submission.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Denied` unless the requestor controls one of the
    /// judges of a pending submission.
    pub fn judge_allowed(&self, judge: &Charactor, requestor: PlayerId) -> Result<(), DomainError> {
        judge.control_allowed("judge", requestor)?;
        ensure(
            self.judges()?.contains(&judge.id()),
            "judge",
            "char is not a judge",
        )?;
        ensure(
            self.judgement()?.is_none(),
            "judge",
            "submission has already been judged",
        )?;
        ensure(!self.dismissed()?, "judge", "submission was dismissed")
    }

    /// Records the verdict of `judge`.
    pub fn record_judgement(&mut self, judge: CharactorId, judgement: bool) {
        self.set_winning_judge(Some(judge));
        self.set_judgement(Some(judgement));
    }

    /// Checks whether `hunter` may dismiss the judged submission.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Denied` unless the requestor controls the hunter
    /// of a judged, not yet dismissed submission.
    pub fn dismiss_allowed(
        &self,
        hunter: &Charactor,
        requestor: PlayerId,
        mission: &Mission,
    ) -> Result<(), DomainError> {
        hunter.control_allowed("dismiss", requestor)?;
        ensure(
            self.judgement()?.is_some(),
            "dismiss",
            "submission has not been judged",
        )?;
        ensure(
            self.role_of(hunter.id(), mission)? == Role::Hunter,
            "dismiss",
            "hunter only may dismiss",
        )?;
        ensure(!self.dismissed()?, "dismiss", "submission was already dismissed")
    }

    /// Marks the submission as dismissed.
    pub fn dismiss(&mut self) {
        self.set_dismissed(true);
    }

    /// Checks whether `tipper` may tip `amount` on a verdict.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Denied` unless the requestor controls a
    /// charactor of the same game who is not judging, the submission is still
    /// pending, and the tipper can afford `amount`.
    pub fn tip_allowed(
        &self,
        tipper: &Charactor,
        requestor: PlayerId,
        amount: i64,
    ) -> Result<(), DomainError> {
        tipper.control_allowed("tip", requestor)?;
        same_game_allowed("tip", tipper, self.game_id()?)?;
        self.pending_allowed("tip")?;
        ensure(
            !self.judges()?.contains(&tipper.id()),
            "tip",
            "judges may not tip",
        )?;
        tipper.spend_allowed("tip", amount)
    }

    /// Adds `amount` to the tips for `vote`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Denied` once the submission has been judged.
    pub fn add_tip(&mut self, vote: Vote, amount: i64) -> Result<(), DomainError> {
        self.pending_allowed("tip")?;
        let mut tips = self.tips()?;
        tips.add(vote, amount);
        self.set_tips(tips);
        Ok(())
    }

    fn pending_allowed(&self, operation: &'static str) -> Result<(), DomainError> {
        ensure(
            self.judgement()?.is_none(),
            operation,
            "submission has already been judged",
        )?;
        ensure(!self.dismissed()?, operation, "submission was dismissed")
    }

    /// Checks whether `poster` may put a bounty of `amount` on the judge who
    /// ruled against them.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Denied` unless the requestor controls the
    /// disfavoured hunter or prey of a judged submission and can afford
    /// `amount`.
    pub fn add_bounty_allowed(
        &self,
        poster: &Charactor,
        requestor: PlayerId,
        mission: &Mission,
        amount: i64,
    ) -> Result<(), DomainError> {
        poster.control_allowed("add_bounty", requestor)?;
        let Some(judgement) = self.judgement()? else {
            return Err(deny("add_bounty", "submission has not been judged"));
        };
        match self.role_of(poster.id(), mission)? {
            Role::Hunter if judgement => return Err(deny("add_bounty", "hunter was favoured")),
            Role::Prey if !judgement => return Err(deny("add_bounty", "prey was favoured")),
            Role::Hunter | Role::Prey => {}
            Role::Judge | Role::Spectator => {
                return Err(deny("add_bounty", "must be hunter or prey"));
            }
        }
        poster.spend_allowed("add_bounty", amount)
    }

    /// The judge who ruled.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::CorruptState` if the submission was never
    /// judged.
    pub fn require_winning_judge(&self) -> Result<CharactorId, DomainError> {
        self.winning_judge()?.ok_or_else(|| {
            DomainError::CorruptState(format!("submission {} has no winning judge", self.id()))
        })
    }
}

impl Entity for Submission {
    type Id = SubmissionId;

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
        let judges = self.judges()?;
        if judges.len() != 2 || judges[0] == judges[1] {
            return Err(DomainError::InvariantViolation(format!(
                "submission {} needs two distinct judges, has {judges:?}",
                self.id()
            )));
        }
        if self.judgement()?.is_some() != self.winning_judge()?.is_some() {
            return Err(DomainError::InvariantViolation(format!(
                "submission {} has a verdict without a judge",
                self.id()
            )));
        }
        let tips = self.tips()?;
        if tips.yes < 0 || tips.no < 0 {
            return Err(DomainError::InvariantViolation(format!(
                "submission {} has negative tips",
                self.id()
            )));
        }
        Ok(())
    }
}
