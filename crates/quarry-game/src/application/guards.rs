//! Guard probes for presentation code.
//!
//! Each function loads the state a guard needs and evaluates it exactly as
//! the matching command handler would, without changing anything. Callers
//! usually turn the result into a flag with
//! [`Probe::is_allowed`](quarry_core::guard::Probe::is_allowed), which maps a
//! denial to `false` and lets other errors through.

use quarry_core::clock::Clock;
use quarry_core::error::DomainError;
use quarry_core::persistence;
use quarry_core::repository::EntityRepository;

use crate::application::command_handlers::{charactor_of, charactors_in, offer_expired};
use crate::config::GameRules;
use crate::domain::charactor::Charactor;
use crate::domain::game::Game;
use crate::domain::ids::{CharactorId, GameId, MissionId, PlayerId, SubmissionId};
use crate::domain::mission::Mission;
use crate::domain::submission::Submission;

/// Whether `requestor` may start `game_id`.
///
/// # Errors
///
/// Returns `DomainError::Denied` with the handler's reason, or a load error.
pub async fn start_game_allowed(
    repo: &dyn EntityRepository,
    rules: &GameRules,
    game_id: GameId,
    requestor: PlayerId,
) -> Result<(), DomainError> {
    let game: Game = persistence::load(repo, game_id).await?;
    let charactors = charactors_in(repo, game_id).await?;
    let is_member = charactor_of(&charactors, requestor)?.is_some();
    game.start_allowed(charactors.len(), is_member, rules)
}

/// Whether `player` may join `game_id`.
///
/// # Errors
///
/// Returns `DomainError::Denied` with the handler's reason, or a load error.
pub async fn join_game_allowed(
    repo: &dyn EntityRepository,
    game_id: GameId,
    player: PlayerId,
) -> Result<(), DomainError> {
    let game: Game = persistence::load(repo, game_id).await?;
    let charactors = charactors_in(repo, game_id).await?;
    game.join_allowed(charactor_of(&charactors, player)?.is_some())
}

/// Whether `requestor` may end `game_id`.
///
/// # Errors
///
/// Returns `DomainError::Denied` with the handler's reason, or a load error.
pub async fn end_game_allowed(
    repo: &dyn EntityRepository,
    game_id: GameId,
    requestor: PlayerId,
) -> Result<(), DomainError> {
    let game: Game = persistence::load(repo, game_id).await?;
    game.end_allowed(requestor)
}

/// Whether `requestor` may accept `mission` for `charactor_id`.
///
/// # Errors
///
/// Returns `DomainError::Denied` with the handler's reason, or a load error.
pub async fn accept_mission_allowed(
    repo: &dyn EntityRepository,
    clock: &dyn Clock,
    rules: &GameRules,
    charactor_id: CharactorId,
    requestor: PlayerId,
    mission: MissionId,
) -> Result<(), DomainError> {
    let charactor: Charactor = persistence::load(repo, charactor_id).await?;
    let expired = offer_expired(repo, &charactor, mission, clock, rules).await?;
    charactor.accept_allowed(requestor, mission, expired)
}

/// Whether `requestor` may submit a photo for `charactor_id`.
///
/// # Errors
///
/// Returns `DomainError::Denied` with the handler's reason, or a load error.
pub async fn submit_mission_allowed(
    repo: &dyn EntityRepository,
    charactor_id: CharactorId,
    requestor: PlayerId,
) -> Result<(), DomainError> {
    let charactor: Charactor = persistence::load(repo, charactor_id).await?;
    charactor.submit_allowed(requestor)
}

/// Whether `requestor` may judge `submission_id` as `judge_id`.
///
/// # Errors
///
/// Returns `DomainError::Denied` with the handler's reason, or a load error.
pub async fn judge_submission_allowed(
    repo: &dyn EntityRepository,
    submission_id: SubmissionId,
    judge_id: CharactorId,
    requestor: PlayerId,
) -> Result<(), DomainError> {
    let submission: Submission = persistence::load(repo, submission_id).await?;
    let judge: Charactor = persistence::load(repo, judge_id).await?;
    submission.judge_allowed(&judge, requestor)
}

/// Whether `requestor` may dismiss `submission_id` as `hunter_id`.
///
/// # Errors
///
/// Returns `DomainError::Denied` with the handler's reason, or a load error.
pub async fn dismiss_submission_allowed(
    repo: &dyn EntityRepository,
    submission_id: SubmissionId,
    hunter_id: CharactorId,
    requestor: PlayerId,
) -> Result<(), DomainError> {
    let submission: Submission = persistence::load(repo, submission_id).await?;
    let hunter: Charactor = persistence::load(repo, hunter_id).await?;
    let mission: Mission = persistence::load(repo, submission.mission_id()?).await?;
    submission.dismiss_allowed(&hunter, requestor, &mission)
}

/// Whether `requestor` may tip `amount` on `submission_id` as `tipper_id`.
///
/// # Errors
///
/// Returns `DomainError::Denied` with the handler's reason, or a load error.
pub async fn tip_submission_allowed(
    repo: &dyn EntityRepository,
    submission_id: SubmissionId,
    tipper_id: CharactorId,
    requestor: PlayerId,
    amount: i64,
) -> Result<(), DomainError> {
    let submission: Submission = persistence::load(repo, submission_id).await?;
    let tipper: Charactor = persistence::load(repo, tipper_id).await?;
    submission.tip_allowed(&tipper, requestor, amount)
}

/// Whether `requestor` may post a bounty of `amount` on the judge of
/// `submission_id` as `poster_id`.
///
/// # Errors
///
/// Returns `DomainError::Denied` with the handler's reason, or a load error.
pub async fn post_bounty_allowed(
    repo: &dyn EntityRepository,
    submission_id: SubmissionId,
    poster_id: CharactorId,
    requestor: PlayerId,
    amount: i64,
) -> Result<(), DomainError> {
    let submission: Submission = persistence::load(repo, submission_id).await?;
    let poster: Charactor = persistence::load(repo, poster_id).await?;
    let mission: Mission = persistence::load(repo, submission.mission_id()?).await?;
    submission.add_bounty_allowed(&poster, requestor, &mission, amount)
}
