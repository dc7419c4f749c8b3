//! Query handlers for the game context.
//!
//! Projections are plain JSON objects for the rendering layer: every stored
//! attribute of the entity, its id, selected key columns, and derived values
//! such as a charactor's role in a submission.

use quarry_core::entity::Entity;
use quarry_core::error::DomainError;
use quarry_core::guard::Probe;
use quarry_core::persistence;
use quarry_core::repository::{EntityRepository, Filter};
use serde_json::{Value, json};

use crate::application::command_handlers::roster;
use crate::application::guards;
use crate::config::GameRules;
use crate::domain::bounty::Bounty;
use crate::domain::charactor::{Charactor, GAME_KEY, PLAYER_KEY};
use crate::domain::event::Event;
use crate::domain::game::{Game, NAME_KEY};
use crate::domain::ids::{CharactorId, GameId, MissionId, SubmissionId};
use crate::domain::mission::Mission;
use crate::domain::stunt::MissionStunt;
use crate::domain::submission::Submission;

fn with_fields<const N: usize>(mut projection: Value, fields: [(&str, Value); N]) -> Value {
    if let Value::Object(map) = &mut projection {
        for (name, value) in fields {
            map.insert(name.to_owned(), value);
        }
    }
    projection
}

/// Projection of a game with the ids of its charactors.
///
/// # Errors
///
/// Returns `DomainError::EntityNotFound` for an unknown game, or a read
/// error.
pub async fn get_game(repo: &dyn EntityRepository, game_id: GameId) -> Result<Value, DomainError> {
    let game: Game = persistence::load(repo, game_id).await?;
    let charactor_ids = roster(repo, game_id).await?;
    Ok(with_fields(
        game.to_projection(&[NAME_KEY, "created_at"])?,
        [("charactor_ids", json!(charactor_ids))],
    ))
}

/// Projections of every game, oldest first.
///
/// # Errors
///
/// Returns a repository or read error.
pub async fn list_games(repo: &dyn EntityRepository) -> Result<Vec<Value>, DomainError> {
    let games: Vec<Game> = persistence::find_all(repo, &Filter::All).await?;
    games.iter().map(|g| g.to_projection(&[NAME_KEY, "created_at"])).collect()
}

/// Projection of a charactor, including whether its player could start the
/// game right now.
///
/// # Errors
///
/// Returns `DomainError::EntityNotFound` for an unknown charactor, or a
/// read error.
pub async fn get_charactor(
    repo: &dyn EntityRepository,
    rules: &GameRules,
    charactor_id: CharactorId,
) -> Result<Value, DomainError> {
    let charactor: Charactor = persistence::load(repo, charactor_id).await?;
    let can_start =
        guards::start_game_allowed(repo, rules, charactor.game_id()?, charactor.player_id()?)
            .await
            .is_allowed()?;
    Ok(with_fields(
        charactor.to_projection(&[GAME_KEY, PLAYER_KEY])?,
        [
            ("name", json!(charactor.c_name()?)),
            ("can_start", json!(can_start)),
        ],
    ))
}

/// Projection of a submission as seen by `viewer`, with the viewer's role.
///
/// # Errors
///
/// Returns `DomainError::EntityNotFound` for an unknown submission or
/// mission, or a read error.
pub async fn get_submission(
    repo: &dyn EntityRepository,
    submission_id: SubmissionId,
    viewer: CharactorId,
) -> Result<Value, DomainError> {
    let submission: Submission = persistence::load(repo, submission_id).await?;
    let mission: Mission = persistence::load(repo, submission.mission_id()?).await?;
    let stakeholders = submission.stakeholders(&mission)?;
    let role = submission.role_of(viewer, &mission)?;
    Ok(with_fields(
        submission.to_projection(&[GAME_KEY])?,
        [
            ("role", json!(role)),
            ("hunter", json!(stakeholders.hunter)),
            ("prey", json!(stakeholders.prey)),
        ],
    ))
}

/// Human-readable description of a mission, e.g. `"C-ana eating a banana"`.
///
/// # Errors
///
/// Returns `DomainError::EntityNotFound` if the mission, its prey or its
/// stunt is missing, or a read error.
pub async fn describe_mission(
    repo: &dyn EntityRepository,
    mission: &Mission,
) -> Result<String, DomainError> {
    let (_, prey_id) = mission.participants()?;
    let prey: Charactor = persistence::load(repo, prey_id).await?;
    let stunt_id = mission.stunt()?.ok_or_else(|| {
        DomainError::CorruptState(format!("mission {} has no stunt", mission.id()))
    })?;
    let stunt: MissionStunt = persistence::load(repo, stunt_id).await?;
    Ok(format!("{} {}", prey.c_name()?, stunt.text()?))
}

/// Award and still-open bounty coin of a mission.
///
/// # Errors
///
/// Returns a repository or read error.
pub async fn award_amounts(
    repo: &dyn EntityRepository,
    mission: &Mission,
) -> Result<(i64, i64), DomainError> {
    let mut bounty = 0;
    for id in mission.bounties()? {
        if let Some(b) = persistence::try_load::<Bounty>(repo, id).await? {
            if b.is_open()? {
                bounty += b.coin()?;
            }
        }
    }
    Ok((mission.award()?, bounty))
}

/// Projection of a mission with its description and payouts.
///
/// # Errors
///
/// Returns `DomainError::EntityNotFound` for an unknown mission, or a read
/// error.
pub async fn get_mission(
    repo: &dyn EntityRepository,
    mission_id: MissionId,
) -> Result<Value, DomainError> {
    let mission: Mission = persistence::load(repo, mission_id).await?;
    let description = describe_mission(repo, &mission).await?;
    let (award, bounty) = award_amounts(repo, &mission).await?;
    Ok(with_fields(
        mission.to_projection(&[GAME_KEY, "created_at"])?,
        [
            ("description", json!(description)),
            ("award", json!(award)),
            ("bounty", json!(bounty)),
        ],
    ))
}

/// Projections of a charactor's potential missions; offers whose rows are
/// gone are skipped.
///
/// # Errors
///
/// Returns `DomainError::EntityNotFound` for an unknown charactor, or a
/// read error.
pub async fn get_potential_missions(
    repo: &dyn EntityRepository,
    charactor_id: CharactorId,
) -> Result<Vec<Value>, DomainError> {
    let charactor: Charactor = persistence::load(repo, charactor_id).await?;
    let mut missions = Vec::new();
    for id in charactor.potential_missions()? {
        if persistence::try_load::<Mission>(repo, id).await?.is_some() {
            missions.push(get_mission(repo, id).await?);
        }
    }
    Ok(missions)
}

/// The event log of a game, oldest first.
///
/// # Errors
///
/// Returns a repository or read error.
pub async fn get_event_log(
    repo: &dyn EntityRepository,
    game_id: GameId,
) -> Result<Vec<Value>, DomainError> {
    let events: Vec<Event> =
        persistence::find_all(repo, &Filter::by_id(GAME_KEY, game_id.0)).await?;
    events
        .iter()
        .map(|e| e.to_projection(&["created_at"]))
        .collect()
}
