//! Command handlers for the game context.
//!
//! Each handler loads the entities it needs, runs the paired guard strictly
//! (a denial aborts before anything is written), applies the transition and
//! saves. The primary entity of a command is saved with an optimistic version
//! check; side effects on other charactors (notifications, payouts) go
//! through `persistence::modify`, which retries on concurrent updates.

use std::sync::Mutex;

use quarry_core::clock::Clock;
use quarry_core::command::Command;
use quarry_core::entity::Entity;
use quarry_core::error::DomainError;
use quarry_core::persistence;
use quarry_core::repository::{EntityRepository, Filter};
use quarry_core::rng::DeterministicRng;
use tracing::{debug, info, instrument, warn};

use crate::application::hooks::GameOverHook;
use crate::config::GameRules;
use crate::domain::bounty::{Bounty, TARGET_KEY};
use crate::domain::charactor::{Charactor, GAME_KEY};
use crate::domain::commands::{
    AcceptMission, AuthorizeSession, CreateGame, DismissSubmission, EndGame, ImportStunts, Invite,
    IssueAuthToken, JoinGame, JudgeSubmission, PostBounty, RefreshPotentialMissions,
    RegisterPlayer, StartGame, SubmitMission, TipSubmission,
};
use crate::domain::event::{self, Event};
use crate::domain::game::{self, Game};
use crate::domain::ids::{
    BountyId, CharactorId, EventId, GameId, MissionId, PlayerId, StuntId, SubmissionId,
};
use crate::domain::mission::{Mission, MissionSpec};
use crate::domain::player::{self, Player};
use crate::domain::selection;
use crate::domain::stunt::{self, MissionStunt};
use crate::domain::submission::{Submission, Vote};

/// Ids of a newly created game and its creator's charactor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedGame {
    /// The new game.
    pub game_id: GameId,
    /// The creator's charactor in it.
    pub charactor_id: CharactorId,
}

/// Runs `pick` with the RNG locked. The lock is never held across an await.
fn with_rng<T>(
    rng: &Mutex<dyn DeterministicRng + Send>,
    pick: impl FnOnce(&mut dyn DeterministicRng) -> Result<T, DomainError>,
) -> Result<T, DomainError> {
    let mut guard = rng
        .lock()
        .map_err(|e| DomainError::Infrastructure(format!("RNG mutex poisoned: {e}")))?;
    pick(&mut *guard)
}

async fn record_event(
    repo: &dyn EntityRepository,
    clock: &dyn Clock,
    game: GameId,
    name: &str,
) -> Result<EventId, DomainError> {
    let id = persistence::allocate_id::<Event>(repo).await?;
    let mut event = Event::new(id, game, name, clock.now());
    persistence::save(repo, &mut event).await?;
    Ok(id)
}

/// Ids of every charactor in `game`, ascending.
pub(crate) async fn roster(
    repo: &dyn EntityRepository,
    game: GameId,
) -> Result<Vec<CharactorId>, DomainError> {
    persistence::find::<Charactor>(repo, &Filter::by_id(GAME_KEY, game.0)).await
}

/// Every charactor in `game`.
pub(crate) async fn charactors_in(
    repo: &dyn EntityRepository,
    game: GameId,
) -> Result<Vec<Charactor>, DomainError> {
    persistence::find_all(repo, &Filter::by_id(GAME_KEY, game.0)).await
}

/// The charactor `player` controls among `charactors`, if any.
pub(crate) fn charactor_of(
    charactors: &[Charactor],
    player: PlayerId,
) -> Result<Option<CharactorId>, DomainError> {
    for charactor in charactors {
        if charactor.player_id()? == player {
            return Ok(Some(charactor.id()));
        }
    }
    Ok(None)
}

/// Loads the listed potential missions; rows that no longer exist are `None`.
pub(crate) async fn load_batch(
    repo: &dyn EntityRepository,
    ids: &[MissionId],
) -> Result<Vec<Option<Mission>>, DomainError> {
    let mut batch = Vec::with_capacity(ids.len());
    for id in ids {
        batch.push(persistence::try_load::<Mission>(repo, *id).await?);
    }
    Ok(batch)
}

/// Whether accepting `mission` must fail as expired: every offer in the
/// batch is stale, or the offered mission row is gone.
pub(crate) async fn offer_expired(
    repo: &dyn EntityRepository,
    charactor: &Charactor,
    mission: MissionId,
    clock: &dyn Clock,
    rules: &GameRules,
) -> Result<bool, DomainError> {
    let offered = charactor.potential_missions()?;
    let batch = load_batch(repo, &offered).await?;
    let gone = offered.contains(&mission) && !batch.iter().flatten().any(|m| m.id() == mission);
    Ok(gone || selection::batch_is_stale(&batch, clock.now(), rules.mission_freshness))
}

/// Unclaimed bounties targeting `prey`.
pub(crate) async fn open_bounties_on(
    repo: &dyn EntityRepository,
    prey: CharactorId,
) -> Result<Vec<Bounty>, DomainError> {
    let bounties: Vec<Bounty> =
        persistence::find_all(repo, &Filter::by_id(TARGET_KEY, prey.0)).await?;
    let mut open = Vec::with_capacity(bounties.len());
    for bounty in bounties {
        if bounty.is_open()? {
            open.push(bounty);
        }
    }
    Ok(open)
}

async fn enlist(
    repo: &dyn EntityRepository,
    clock: &dyn Clock,
    game: GameId,
    player: PlayerId,
) -> Result<CharactorId, DomainError> {
    let id = persistence::allocate_id::<Charactor>(repo).await?;
    let mut charactor = Charactor::new(id, game, player, clock.now());
    persistence::save(repo, &mut charactor).await?;
    Ok(id)
}

/// Generates a new batch of potential missions for `hunter_id`: one stunt,
/// `prey_per_batch` prey, the flat award and the open bounties on each prey.
async fn generate_potential_missions(
    hunter_id: CharactorId,
    clock: &dyn Clock,
    rng: &Mutex<dyn DeterministicRng + Send>,
    rules: &GameRules,
    repo: &dyn EntityRepository,
) -> Result<Vec<MissionId>, DomainError> {
    let hunter: Charactor = persistence::load(repo, hunter_id).await?;
    let game_id = hunter.game_id()?;
    let roster = roster(repo, game_id).await?;
    let catalog = persistence::find::<MissionStunt>(repo, &Filter::All).await?;
    let previous_prey = hunter.recent_prey()?;

    let (stunt, prey) = with_rng(rng, |rng| {
        let stunt = selection::choose_stunt(&catalog, rng)?;
        let prey = selection::choose_potential_prey(
            hunter_id,
            &roster,
            &previous_prey,
            rules.prey_per_batch,
            rng,
        );
        Ok((stunt, prey))
    })?;

    let now = clock.now();
    let mut missions = Vec::with_capacity(prey.len());
    for target in &prey {
        let bounties = open_bounties_on(repo, *target)
            .await?
            .iter()
            .map(Entity::id)
            .collect();
        let id = persistence::allocate_id::<Mission>(repo).await?;
        let spec = MissionSpec {
            game: game_id,
            stunt,
            hunter: hunter_id,
            prey: *target,
            award: rules.mission_award,
            bounties,
        };
        let mut mission = Mission::generate(id, spec, now);
        persistence::save(repo, &mut mission).await?;
        missions.push(id);
    }

    persistence::modify(repo, hunter_id, rules.save_attempts, |c: &mut Charactor| {
        c.offer_missions(missions.clone(), prey.clone());
        Ok(())
    })
    .await?;

    debug!(charactor_id = %hunter_id, ?missions, "potential missions generated");
    Ok(missions)
}

/// Handles the `RegisterPlayer` command.
///
/// # Errors
///
/// Returns `DomainError::Denied` for a blank or taken name, or a repository
/// error.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id))]
pub async fn handle_register_player(
    command: &RegisterPlayer,
    clock: &dyn Clock,
    repo: &dyn EntityRepository,
) -> Result<PlayerId, DomainError> {
    info!(
        command_type = command.command_type(),
        unique_name = %command.unique_name,
        "handling command",
    );

    let taken = !persistence::find::<Player>(
        repo,
        &Filter::by_text(player::UNIQUE_NAME_KEY, &command.unique_name),
    )
    .await?
    .is_empty();
    Player::register_allowed(&command.unique_name, taken)?;

    let id = persistence::allocate_id::<Player>(repo).await?;
    let mut player = Player::new(id, &command.unique_name, clock.now());
    persistence::save(repo, &mut player).await?;
    Ok(id)
}

/// Handles the `CreateGame` command: creates the game and the creator's
/// charactor.
///
/// # Errors
///
/// Returns `DomainError::Denied` for a blank name or while another game of
/// that name waits to start, `DomainError::EntityNotFound` for an unknown
/// creator, or a repository error.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id))]
pub async fn handle_create_game(
    command: &CreateGame,
    clock: &dyn Clock,
    repo: &dyn EntityRepository,
) -> Result<CreatedGame, DomainError> {
    info!(command_type = command.command_type(), name = %command.name, "handling command");

    persistence::load::<Player>(repo, command.creator).await?;
    let same_name: Vec<Game> =
        persistence::find_all(repo, &Filter::by_text(game::NAME_KEY, &command.name)).await?;
    Game::create_allowed(&command.name, &same_name)?;

    let game_id = persistence::allocate_id::<Game>(repo).await?;
    let mut game = Game::new(game_id, &command.name, command.creator, clock.now());
    persistence::save(repo, &mut game).await?;
    let charactor_id = enlist(repo, clock, game_id, command.creator).await?;
    record_event(repo, clock, game_id, event::GAME_CREATED).await?;

    Ok(CreatedGame {
        game_id,
        charactor_id,
    })
}

/// Handles the `JoinGame` command.
///
/// # Errors
///
/// Returns `DomainError::Denied` once the game started or if the player is
/// already in it, `DomainError::EntityNotFound` for an unknown game or
/// player, or a repository error.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id))]
pub async fn handle_join_game(
    command: &JoinGame,
    clock: &dyn Clock,
    repo: &dyn EntityRepository,
) -> Result<CharactorId, DomainError> {
    info!(command_type = command.command_type(), game_id = %command.game_id, "handling command");

    let game: Game = persistence::load(repo, command.game_id).await?;
    persistence::load::<Player>(repo, command.player_id).await?;
    let charactors = charactors_in(repo, command.game_id).await?;
    game.join_allowed(charactor_of(&charactors, command.player_id)?.is_some())?;

    let id = enlist(repo, clock, command.game_id, command.player_id).await?;
    record_event(repo, clock, command.game_id, event::CHARACTOR_JOINED).await?;
    Ok(id)
}

/// Handles the `Invite` command.
///
/// # Errors
///
/// Returns `DomainError::Denied` for a payload that is not JSON,
/// `DomainError::EntityNotFound` for an unknown game, or a repository error.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id))]
pub async fn handle_invite(
    command: &Invite,
    rules: &GameRules,
    repo: &dyn EntityRepository,
) -> Result<(), DomainError> {
    info!(
        command_type = command.command_type(),
        requestor = %command.requestor,
        "handling command",
    );

    Game::invite_allowed(&command.invite_json)?;
    persistence::modify(repo, command.game_id, rules.save_attempts, |g: &mut Game| {
        g.invite(&command.invite_json)
    })
    .await?;
    Ok(())
}

/// Handles the `StartGame` command: starts the game, hands every charactor
/// its name and starting coin, and offers each a first batch of missions.
///
/// # Errors
///
/// Returns `DomainError::Denied` if the game already started, has too few
/// charactors, or the requestor is not in it; `DomainError::ConcurrencyConflict`
/// if another start won; or a repository error.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id))]
pub async fn handle_start_game(
    command: &StartGame,
    clock: &dyn Clock,
    rng: &Mutex<dyn DeterministicRng + Send>,
    rules: &GameRules,
    repo: &dyn EntityRepository,
) -> Result<(), DomainError> {
    info!(command_type = command.command_type(), game_id = %command.game_id, "handling command");

    let mut game: Game = persistence::load(repo, command.game_id).await?;
    let charactors = charactors_in(repo, command.game_id).await?;
    let is_member = charactor_of(&charactors, command.requestor)?.is_some();
    game.start_allowed(charactors.len(), is_member, rules)?;
    if persistence::find::<MissionStunt>(repo, &Filter::All).await?.is_empty() {
        return Err(DomainError::InvariantViolation(
            "cannot start a game with an empty stunt catalog".into(),
        ));
    }

    game.start();
    persistence::save(repo, &mut game).await?;

    for charactor in &charactors {
        let player: Player = persistence::load(repo, charactor.player_id()?).await?;
        let unique_name = player.unique_name()?;
        persistence::modify(repo, charactor.id(), rules.save_attempts, |c: &mut Charactor| {
            c.on_game_start(&unique_name, rules.starting_coin);
            Ok(())
        })
        .await?;
    }
    for charactor in &charactors {
        generate_potential_missions(charactor.id(), clock, rng, rules, repo).await?;
    }

    record_event(repo, clock, command.game_id, event::GAME_STARTED).await?;
    Ok(())
}

/// Handles the `RefreshPotentialMissions` command. The current batch is kept
/// while any of its missions is fresh; otherwise a new batch replaces it.
///
/// # Errors
///
/// Returns `DomainError::Denied` before the game starts or while the
/// charactor is busy, or a repository error.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id))]
pub async fn handle_refresh_potential_missions(
    command: &RefreshPotentialMissions,
    clock: &dyn Clock,
    rng: &Mutex<dyn DeterministicRng + Send>,
    rules: &GameRules,
    repo: &dyn EntityRepository,
) -> Result<Vec<MissionId>, DomainError> {
    info!(
        command_type = command.command_type(),
        charactor_id = %command.charactor_id,
        "handling command",
    );

    let charactor: Charactor = persistence::load(repo, command.charactor_id).await?;
    let game: Game = persistence::load(repo, charactor.game_id()?).await?;
    charactor.refresh_allowed(game.started()?)?;

    let current = charactor.potential_missions()?;
    let batch = load_batch(repo, &current).await?;
    if selection::batch_is_stale(&batch, clock.now(), rules.mission_freshness) {
        generate_potential_missions(command.charactor_id, clock, rng, rules, repo).await
    } else {
        Ok(current)
    }
}

/// Handles the `AcceptMission` command.
///
/// # Errors
///
/// Returns `DomainError::Denied` if the requestor does not control the
/// charactor, it is not choosing a mission, the mission expired or was not
/// offered; `DomainError::ConcurrencyConflict` if the charactor changed
/// meanwhile; or a repository error.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id))]
pub async fn handle_accept_mission(
    command: &AcceptMission,
    clock: &dyn Clock,
    rules: &GameRules,
    repo: &dyn EntityRepository,
) -> Result<(), DomainError> {
    info!(
        command_type = command.command_type(),
        mission_id = %command.mission_id,
        "handling command",
    );

    let mut charactor: Charactor = persistence::load(repo, command.charactor_id).await?;
    let expired = offer_expired(repo, &charactor, command.mission_id, clock, rules).await?;
    charactor.accept_allowed(command.requestor, command.mission_id, expired)?;

    charactor.accept_mission(command.mission_id);
    persistence::save(repo, &mut charactor).await?;
    record_event(repo, clock, charactor.game_id()?, event::MISSION_ACCEPTED).await?;
    Ok(())
}

/// Handles the `SubmitMission` command: creates the submission, assigns two
/// judges and notifies the prey and the judges.
///
/// # Errors
///
/// Returns `DomainError::Denied` unless the requestor controls a hunting
/// charactor, `DomainError::InvariantViolation` if too few charactors can
/// judge, or a repository error.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id))]
pub async fn handle_submit_mission(
    command: &SubmitMission,
    clock: &dyn Clock,
    rng: &Mutex<dyn DeterministicRng + Send>,
    rules: &GameRules,
    repo: &dyn EntityRepository,
) -> Result<SubmissionId, DomainError> {
    info!(
        command_type = command.command_type(),
        charactor_id = %command.charactor_id,
        "handling command",
    );

    let mut hunter: Charactor = persistence::load(repo, command.charactor_id).await?;
    hunter.submit_allowed(command.requestor)?;

    let mission_id = hunter.mission()?.ok_or_else(|| {
        DomainError::CorruptState(format!("hunting charactor {} has no mission", hunter.id()))
    })?;
    let mission: Mission = persistence::load(repo, mission_id).await?;
    let (hunter_id, prey_id) = mission.participants()?;
    let game_id = hunter.game_id()?;
    let roster = roster(repo, game_id).await?;
    let judges = with_rng(rng, |rng| {
        selection::choose_judges(hunter_id, prey_id, &roster, rng)
    })?;

    // The hunter save decides a race between two submits; only the winner
    // goes on to write the submission row.
    let submission_id = persistence::allocate_id::<Submission>(repo).await?;
    hunter.await_judgement(submission_id);
    persistence::save(repo, &mut hunter).await?;

    let mut submission = Submission::new(
        submission_id,
        game_id,
        mission_id,
        &command.photo_url,
        judges.clone(),
        clock.now(),
    );
    persistence::save(repo, &mut submission).await?;

    persistence::modify(repo, prey_id, rules.save_attempts, |c: &mut Charactor| {
        c.notify_as_prey(submission_id)
    })
    .await?;
    for judge in judges {
        persistence::modify(repo, judge, rules.save_attempts, |c: &mut Charactor| {
            c.notify_as_judge(submission_id)
        })
        .await?;
    }

    record_event(repo, clock, game_id, event::SUBMISSION_STARTED).await?;
    Ok(submission_id)
}

/// Handles the `JudgeSubmission` command. The first judge to save wins; a
/// second judge gets a concurrency conflict or, having loaded the ruled
/// submission, a denial.
///
/// # Errors
///
/// Returns `DomainError::Denied` unless the requestor controls a judge of a
/// pending submission, `DomainError::ConcurrencyConflict` if another judge
/// ruled first, or a repository error.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id))]
pub async fn handle_judge_submission(
    command: &JudgeSubmission,
    clock: &dyn Clock,
    rules: &GameRules,
    repo: &dyn EntityRepository,
) -> Result<(), DomainError> {
    info!(
        command_type = command.command_type(),
        submission_id = %command.submission_id,
        judgement = command.judgement,
        "handling command"
    );

    let mut submission: Submission = persistence::load(repo, command.submission_id).await?;
    let judge: Charactor = persistence::load(repo, command.judge_id).await?;
    submission.judge_allowed(&judge, command.requestor)?;

    submission.record_judgement(command.judge_id, command.judgement);
    persistence::save(repo, &mut submission).await?;

    let mission: Mission = persistence::load(repo, submission.mission_id()?).await?;
    let stakeholders = submission.stakeholders(&mission)?;
    let vote = Vote::from(command.judgement);
    let pay = rules.judge_base_pay(vote) + submission.tips()?.for_vote(vote);

    persistence::modify(repo, stakeholders.prey, rules.save_attempts, |c: &mut Charactor| {
        c.clear_notification(command.submission_id)
    })
    .await?;
    for judge_id in stakeholders.judges {
        persistence::modify(repo, judge_id, rules.save_attempts, |c: &mut Charactor| {
            c.clear_notification(command.submission_id)?;
            if judge_id == command.judge_id {
                c.add_coin(pay)?;
            }
            Ok(())
        })
        .await?;
    }
    persistence::modify(repo, stakeholders.hunter, rules.save_attempts, |c: &mut Charactor| {
        c.receive_judgement(command.submission_id, command.judgement)
    })
    .await?;

    record_event(repo, clock, submission.game_id()?, event::SUBMISSION_JUDGED).await?;
    Ok(())
}

/// Handles the `DismissSubmission` command. After a favourable verdict the
/// hunter collects the award and the open bounties listed on the mission,
/// then gets a new batch of missions; otherwise it resumes hunting.
///
/// # Errors
///
/// Returns `DomainError::Denied` unless the requestor controls the hunter of
/// a judged, not yet dismissed submission, or a repository error.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id))]
pub async fn handle_dismiss_submission(
    command: &DismissSubmission,
    clock: &dyn Clock,
    rng: &Mutex<dyn DeterministicRng + Send>,
    rules: &GameRules,
    repo: &dyn EntityRepository,
) -> Result<(), DomainError> {
    info!(
        command_type = command.command_type(),
        submission_id = %command.submission_id,
        "handling command",
    );

    let mut submission: Submission = persistence::load(repo, command.submission_id).await?;
    let hunter: Charactor = persistence::load(repo, command.hunter_id).await?;
    let mission: Mission = persistence::load(repo, submission.mission_id()?).await?;
    submission.dismiss_allowed(&hunter, command.requestor, &mission)?;

    submission.dismiss();
    persistence::save(repo, &mut submission).await?;

    if submission.judgement()? == Some(true) {
        let mut winnings = mission.award()?;
        for bounty_id in mission.bounties()? {
            if persistence::try_load::<Bounty>(repo, bounty_id).await?.is_none() {
                warn!(bounty_id = %bounty_id, "bounty listed on mission no longer exists");
                continue;
            }
            let mut won = 0;
            persistence::modify(repo, bounty_id, rules.save_attempts, |b: &mut Bounty| {
                won = b.claim(command.hunter_id)?;
                Ok(())
            })
            .await?;
            winnings += won;
        }
        persistence::modify(repo, command.hunter_id, rules.save_attempts, |c: &mut Charactor| {
            c.collect_reward(winnings)
        })
        .await?;
        generate_potential_missions(command.hunter_id, clock, rng, rules, repo).await?;
    } else {
        persistence::modify(repo, command.hunter_id, rules.save_attempts, |c: &mut Charactor| {
            c.resume_hunting(command.submission_id)
        })
        .await?;
    }

    record_event(repo, clock, submission.game_id()?, event::SUBMISSION_DISMISSED).await?;
    Ok(())
}

/// Handles the `TipSubmission` command: moves coin from the tipper into the
/// tips of a pending submission.
///
/// # Errors
///
/// Returns `DomainError::Denied` if the tip is not allowed (also when the
/// submission got judged while tipping, in which case the coin is refunded),
/// or a repository error.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id))]
pub async fn handle_tip_submission(
    command: &TipSubmission,
    rules: &GameRules,
    repo: &dyn EntityRepository,
) -> Result<(), DomainError> {
    info!(
        command_type = command.command_type(),
        submission_id = %command.submission_id,
        amount = command.amount,
        "handling command"
    );

    let submission: Submission = persistence::load(repo, command.submission_id).await?;
    let tipper: Charactor = persistence::load(repo, command.tipper_id).await?;
    submission.tip_allowed(&tipper, command.requestor, command.amount)?;

    persistence::modify(repo, command.tipper_id, rules.save_attempts, |c: &mut Charactor| {
        c.pay(command.amount)
    })
    .await?;
    let tipped = persistence::modify(
        repo,
        command.submission_id,
        rules.save_attempts,
        |s: &mut Submission| s.add_tip(command.vote, command.amount),
    )
    .await;
    if let Err(e) = tipped {
        warn!(error = %e, "tip failed; refunding tipper");
        persistence::modify(repo, command.tipper_id, rules.save_attempts, |c: &mut Charactor| {
            c.add_coin(command.amount)
        })
        .await?;
        return Err(e);
    }
    Ok(())
}

/// Handles the `PostBounty` command: the disfavoured hunter or prey pays to
/// put a bounty on the judge who ruled.
///
/// # Errors
///
/// Returns `DomainError::Denied` if the bounty is not allowed, or a
/// repository error.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id))]
pub async fn handle_post_bounty(
    command: &PostBounty,
    clock: &dyn Clock,
    rules: &GameRules,
    repo: &dyn EntityRepository,
) -> Result<BountyId, DomainError> {
    info!(
        command_type = command.command_type(),
        submission_id = %command.submission_id,
        amount = command.amount,
        "handling command"
    );

    let submission: Submission = persistence::load(repo, command.submission_id).await?;
    let poster: Charactor = persistence::load(repo, command.poster_id).await?;
    let mission: Mission = persistence::load(repo, submission.mission_id()?).await?;
    submission.add_bounty_allowed(&poster, command.requestor, &mission, command.amount)?;
    let target = submission.require_winning_judge()?;

    persistence::modify(repo, command.poster_id, rules.save_attempts, |c: &mut Charactor| {
        c.pay(command.amount)
    })
    .await?;
    let game_id = submission.game_id()?;
    let id = persistence::allocate_id::<Bounty>(repo).await?;
    let mut bounty = Bounty::post(
        id,
        game_id,
        target,
        command.poster_id,
        command.amount,
        clock.now(),
    );
    persistence::save(repo, &mut bounty).await?;

    record_event(repo, clock, game_id, event::BOUNTY_POSTED).await?;
    Ok(id)
}

/// Handles the `EndGame` command and then runs `hook`.
///
/// # Errors
///
/// Returns `DomainError::Denied` unless the creator ends a running game, the
/// hook's error, or a repository error.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id))]
pub async fn handle_end_game(
    command: &EndGame,
    clock: &dyn Clock,
    repo: &dyn EntityRepository,
    hook: &dyn GameOverHook,
) -> Result<(), DomainError> {
    info!(command_type = command.command_type(), game_id = %command.game_id, "handling command");

    let mut game: Game = persistence::load(repo, command.game_id).await?;
    game.end_allowed(command.requestor)?;
    game.finish();
    persistence::save(repo, &mut game).await?;
    record_event(repo, clock, command.game_id, event::GAME_OVER).await?;

    hook.on_game_over(&game, repo).await
}

/// Handles the `ImportStunts` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a malformed catalog, or a repository
/// error.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id))]
pub async fn handle_import_stunts(
    command: &ImportStunts,
    clock: &dyn Clock,
    repo: &dyn EntityRepository,
) -> Result<Vec<StuntId>, DomainError> {
    info!(command_type = command.command_type(), "handling command");

    let entries = stunt::parse_catalog(&command.yaml)?;
    let now = clock.now();
    let mut ids = Vec::with_capacity(entries.len());
    for entry in &entries {
        let id = persistence::allocate_id::<MissionStunt>(repo).await?;
        let mut stunt = MissionStunt::new(id, &entry.text, now);
        persistence::save(repo, &mut stunt).await?;
        ids.push(id);
    }
    info!(count = ids.len(), "stunts imported");
    Ok(ids)
}

/// Handles the `IssueAuthToken` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a blank token,
/// `DomainError::EntityNotFound` for an unknown player, or a repository
/// error.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id))]
pub async fn handle_issue_auth_token(
    command: &IssueAuthToken,
    clock: &dyn Clock,
    rules: &GameRules,
    repo: &dyn EntityRepository,
) -> Result<(), DomainError> {
    info!(
        command_type = command.command_type(),
        player_id = %command.player_id,
        "handling command",
    );

    if command.token.is_empty() {
        return Err(DomainError::Validation("auth token must not be empty".into()));
    }
    let now = clock.now();
    persistence::modify(repo, command.player_id, rules.save_attempts, |p: &mut Player| {
        p.issue_auth_token(&command.token, now);
        Ok(())
    })
    .await?;
    Ok(())
}

/// Handles the `AuthorizeSession` command.
///
/// # Errors
///
/// Returns `DomainError::Denied` for an unknown or expired token,
/// `DomainError::EntityNotFound` for an unknown player, or a repository
/// error.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id))]
pub async fn handle_authorize_session(
    command: &AuthorizeSession,
    clock: &dyn Clock,
    rules: &GameRules,
    repo: &dyn EntityRepository,
) -> Result<(), DomainError> {
    info!(
        command_type = command.command_type(),
        player_id = %command.player_id,
        "handling command",
    );

    let player: Player = persistence::load(repo, command.player_id).await?;
    player.authorize_allowed(&command.token, clock.now(), rules.auth_token_ttl)
}
