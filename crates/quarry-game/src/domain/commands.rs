//! Commands for the game context.

use quarry_core::command::Command;
use uuid::Uuid;

use crate::domain::ids::{CharactorId, GameId, MissionId, PlayerId, SubmissionId};
use crate::domain::submission::Vote;

/// Command to register a new player.
#[derive(Debug, Clone)]
pub struct RegisterPlayer {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The unique player name.
    pub unique_name: String,
}

impl Command for RegisterPlayer {
    fn command_type(&self) -> &'static str {
        "game.register_player"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to create a game; the creator joins it.
#[derive(Debug, Clone)]
pub struct CreateGame {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The game name.
    pub name: String,
    /// The player creating the game.
    pub creator: PlayerId,
}

impl Command for CreateGame {
    fn command_type(&self) -> &'static str {
        "game.create_game"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to add a player's charactor to an unstarted game.
#[derive(Debug, Clone)]
pub struct JoinGame {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The game to join.
    pub game_id: GameId,
    /// The joining player.
    pub player_id: PlayerId,
}

impl Command for JoinGame {
    fn command_type(&self) -> &'static str {
        "game.join_game"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to store an invite payload on a game.
#[derive(Debug, Clone)]
pub struct Invite {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The game the invite is for.
    pub game_id: GameId,
    /// The inviting player.
    pub requestor: PlayerId,
    /// The raw JSON invite payload.
    pub invite_json: String,
}

impl Command for Invite {
    fn command_type(&self) -> &'static str {
        "game.invite"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to start a game.
#[derive(Debug, Clone)]
pub struct StartGame {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The game to start.
    pub game_id: GameId,
    /// The player asking to start.
    pub requestor: PlayerId,
}

impl Command for StartGame {
    fn command_type(&self) -> &'static str {
        "game.start_game"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to refresh a charactor's potential missions if they went stale.
#[derive(Debug, Clone)]
pub struct RefreshPotentialMissions {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The charactor choosing a mission.
    pub charactor_id: CharactorId,
}

impl Command for RefreshPotentialMissions {
    fn command_type(&self) -> &'static str {
        "game.refresh_potential_missions"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to accept one of the potential missions.
#[derive(Debug, Clone)]
pub struct AcceptMission {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The player controlling the charactor.
    pub requestor: PlayerId,
    /// The hunting charactor.
    pub charactor_id: CharactorId,
    /// The mission to accept.
    pub mission_id: MissionId,
}

impl Command for AcceptMission {
    fn command_type(&self) -> &'static str {
        "game.accept_mission"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to submit a photo for the active mission.
#[derive(Debug, Clone)]
pub struct SubmitMission {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The player controlling the hunter.
    pub requestor: PlayerId,
    /// The hunter.
    pub charactor_id: CharactorId,
    /// Where the photo lives.
    pub photo_url: String,
}

impl Command for SubmitMission {
    fn command_type(&self) -> &'static str {
        "game.submit_mission"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to rule on a submission.
#[derive(Debug, Clone)]
pub struct JudgeSubmission {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The player controlling the judge.
    pub requestor: PlayerId,
    /// The judging charactor.
    pub judge_id: CharactorId,
    /// The submission to rule on.
    pub submission_id: SubmissionId,
    /// The verdict.
    pub judgement: bool,
}

impl Command for JudgeSubmission {
    fn command_type(&self) -> &'static str {
        "game.judge_submission"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command for the hunter to dismiss a judged submission.
#[derive(Debug, Clone)]
pub struct DismissSubmission {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The player controlling the hunter.
    pub requestor: PlayerId,
    /// The hunter.
    pub hunter_id: CharactorId,
    /// The judged submission.
    pub submission_id: SubmissionId,
}

impl Command for DismissSubmission {
    fn command_type(&self) -> &'static str {
        "game.dismiss_submission"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to tip coin towards a verdict on a pending submission.
#[derive(Debug, Clone)]
pub struct TipSubmission {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The player controlling the tipper.
    pub requestor: PlayerId,
    /// The tipping charactor.
    pub tipper_id: CharactorId,
    /// The pending submission.
    pub submission_id: SubmissionId,
    /// The verdict the tip rewards.
    pub vote: Vote,
    /// Coin to tip.
    pub amount: i64,
}

impl Command for TipSubmission {
    fn command_type(&self) -> &'static str {
        "game.tip_submission"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to put a bounty on the judge who ruled against the poster.
#[derive(Debug, Clone)]
pub struct PostBounty {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The player controlling the poster.
    pub requestor: PlayerId,
    /// The disfavoured hunter or prey.
    pub poster_id: CharactorId,
    /// The judged submission.
    pub submission_id: SubmissionId,
    /// Coin to put up.
    pub amount: i64,
}

impl Command for PostBounty {
    fn command_type(&self) -> &'static str {
        "game.post_bounty"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to end a running game.
#[derive(Debug, Clone)]
pub struct EndGame {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The game to end.
    pub game_id: GameId,
    /// The player asking, who must be the creator.
    pub requestor: PlayerId,
}

impl Command for EndGame {
    fn command_type(&self) -> &'static str {
        "game.end_game"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to load mission stunts from a YAML catalog.
#[derive(Debug, Clone)]
pub struct ImportStunts {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The catalog, a YAML list of `text` entries.
    pub yaml: String,
}

impl Command for ImportStunts {
    fn command_type(&self) -> &'static str {
        "game.import_stunts"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to remember a freshly issued session token.
#[derive(Debug, Clone)]
pub struct IssueAuthToken {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The player the token belongs to.
    pub player_id: PlayerId,
    /// The raw token.
    pub token: String,
}

impl Command for IssueAuthToken {
    fn command_type(&self) -> &'static str {
        "game.issue_auth_token"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to check a session token.
#[derive(Debug, Clone)]
pub struct AuthorizeSession {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The player presenting the token.
    pub player_id: PlayerId,
    /// The raw token.
    pub token: String,
}

impl Command for AuthorizeSession {
    fn command_type(&self) -> &'static str {
        "game.authorize_session"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
