//! Integration tests for creating, joining, starting and ending games.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::TimeDelta;
use quarry_core::entity::Entity;
use quarry_core::error::DomainError;
use quarry_core::guard::Probe;
use quarry_core::persistence;
use quarry_core::repository::EntityRepository;
use quarry_game::application::command_handlers::{
    handle_create_game, handle_end_game, handle_invite, handle_join_game, handle_register_player,
};
use quarry_game::application::hooks::{GameOverHook, RetainEverything};
use quarry_game::application::{guards, query_handlers};
use quarry_game::domain::charactor::Activity;
use quarry_game::domain::commands::{CreateGame, EndGame, Invite, JoinGame, RegisterPlayer};
use quarry_game::config::GameRules;
use quarry_game::domain::game::Game;
use quarry_game::domain::ids::{GameId, PlayerId};
use quarry_test_support::{FailingEntityRepository, FixedClock};
use serde_json::json;
use uuid::Uuid;

use common::{World, denial_reason, start_time};

#[derive(Default)]
struct CountingHook {
    calls: AtomicUsize,
}

#[async_trait]
impl GameOverHook for CountingHook {
    async fn on_game_over(
        &self,
        game: &Game,
        _repo: &dyn EntityRepository,
    ) -> Result<(), DomainError> {
        assert!(game.finished()?);
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// --- register / create / join ---

#[tokio::test]
async fn test_register_player_rejects_taken_name() {
    // Arrange
    let world = World::new();
    world.register("ana").await;

    // Act
    let result = handle_register_player(
        &RegisterPlayer {
            correlation_id: Uuid::new_v4(),
            unique_name: "ana".to_owned(),
        },
        &world.clock,
        &world.repo,
    )
    .await;

    // Assert
    assert_eq!(denial_reason(result), "name is already taken");
}

#[tokio::test]
async fn test_create_game_gives_creator_a_charactor() {
    // Arrange
    let world = World::new();
    let creator = world.register("ana").await;

    // Act
    let created = handle_create_game(
        &CreateGame {
            correlation_id: Uuid::new_v4(),
            name: "night hunt".to_owned(),
            creator,
        },
        &world.clock,
        &world.repo,
    )
    .await
    .unwrap();

    // Assert
    let charactor = world.charactor(created.charactor_id).await;
    assert_eq!(charactor.game_id().unwrap(), created.game_id);
    assert_eq!(charactor.player_id().unwrap(), creator);
    let view = query_handlers::get_game(&world.repo, created.game_id).await.unwrap();
    assert_eq!(view["name"], "night hunt");
    assert_eq!(view["started"], false);
    assert_eq!(view["charactor_ids"], json!([created.charactor_id]));
}

#[tokio::test]
async fn test_create_game_denied_while_same_name_waits_to_start() {
    // Arrange
    let world = World::new();
    world.gather("night hunt", 1).await;
    let other = world.register("bo").await;
    let command = CreateGame {
        correlation_id: Uuid::new_v4(),
        name: "night hunt".to_owned(),
        creator: other,
    };

    // Act
    let result = handle_create_game(&command, &world.clock, &world.repo).await;

    // Assert
    assert_eq!(
        denial_reason(result),
        "another game with the same name is waiting to start"
    );
}

#[tokio::test]
async fn test_create_game_allowed_once_same_name_started() {
    let world = World::new();
    world.started_game("night hunt").await;
    let other = world.register("bo").await;

    let result = handle_create_game(
        &CreateGame {
            correlation_id: Uuid::new_v4(),
            name: "night hunt".to_owned(),
            creator: other,
        },
        &world.clock,
        &world.repo,
    )
    .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_join_denied_twice_and_after_start() {
    // Arrange
    let world = World::new();
    let (game_id, seats) = world.gather("night hunt", 6).await;
    let join = |player_id| JoinGame {
        correlation_id: Uuid::new_v4(),
        game_id,
        player_id,
    };

    let newcomer = world.register("newcomer").await;

    // Act
    let newcomer_may_join = guards::join_game_allowed(&world.repo, game_id, newcomer)
        .await
        .is_allowed()
        .unwrap();
    let member_denial = guards::join_game_allowed(&world.repo, game_id, seats[1].player)
        .await
        .denial()
        .unwrap();
    let twice = handle_join_game(&join(seats[1].player), &world.clock, &world.repo).await;
    world.import_stunts().await;
    world.start(game_id, seats[0].player).await.unwrap();
    let late = world.register("late").await;
    let after_start = handle_join_game(&join(late), &world.clock, &world.repo).await;

    // Assert
    assert_eq!(denial_reason(twice), "player is already in this game");
    assert_eq!(denial_reason(after_start), "game has already started");
    assert!(newcomer_may_join);
    assert_eq!(
        member_denial.map(|d| d.reason),
        Some("player is already in this game".to_owned())
    );
    assert!(!guards::join_game_allowed(&world.repo, game_id, newcomer)
        .await
        .is_allowed()
        .unwrap());
}

// --- start ---

#[tokio::test]
async fn test_start_with_six_charactors_succeeds() {
    // Arrange
    let world = World::new();
    world.import_stunts().await;
    let (game_id, seats) = world.gather("night hunt", 6).await;

    // Act
    world.start(game_id, seats[3].player).await.unwrap();

    // Assert
    let game: Game = persistence::load(&world.repo, game_id).await.unwrap();
    assert!(game.started().unwrap());
    for seat in &seats {
        let charactor = world.charactor(seat.charactor).await;
        assert_eq!(charactor.coin().unwrap(), 100);
        assert!(charactor.c_name().unwrap().starts_with("C-night hunt-p"));
        assert_eq!(charactor.activity().unwrap(), Activity::ChoosingMission);
        let missions = charactor.potential_missions().unwrap();
        assert_eq!(missions.len(), 2);
        for id in missions {
            let mission = world.mission(id).await;
            let (hunter, prey) = mission.participants().unwrap();
            assert_eq!(hunter, seat.charactor);
            assert_ne!(prey, seat.charactor);
            assert_eq!(mission.award().unwrap(), 200);
        }
    }
}

#[tokio::test]
async fn test_start_with_five_charactors_needs_more() {
    // Arrange
    let world = World::new();
    world.import_stunts().await;
    let (game_id, seats) = world.gather("night hunt", 5).await;

    // Act
    let result = world.start(game_id, seats[0].player).await;

    // Assert
    assert_eq!(denial_reason(result), "need more charactors");
}

#[tokio::test]
async fn test_start_by_outsider_is_denied() {
    // Arrange
    let world = World::new();
    world.import_stunts().await;
    let (game_id, _) = world.gather("night hunt", 6).await;
    let outsider = world.register("outsider").await;

    // Act
    let result = world.start(game_id, outsider).await;

    // Assert
    assert_eq!(denial_reason(result), "you are not in this game");
}

#[tokio::test]
async fn test_start_without_stunts_changes_nothing() {
    let world = World::new();
    let (game_id, seats) = world.gather("night hunt", 6).await;

    let result = world.start(game_id, seats[0].player).await;

    assert!(matches!(result, Err(DomainError::InvariantViolation(_))));
    let game: Game = persistence::load(&world.repo, game_id).await.unwrap();
    assert!(!game.started().unwrap());
}

#[tokio::test]
async fn test_start_probe_returns_flag_instead_of_error() {
    // Arrange
    let world = World::new();
    world.import_stunts().await;
    let (game_id, seats) = world.gather("night hunt", 5).await;

    // Act
    let allowed = guards::start_game_allowed(&world.repo, &world.rules, game_id, seats[0].player)
        .await
        .is_allowed()
        .unwrap();
    let view = query_handlers::get_charactor(&world.repo, &world.rules, seats[0].charactor)
        .await
        .unwrap();

    // Assert
    assert!(!allowed);
    assert_eq!(view["can_start"], false);
    assert_eq!(view["name"], "C-?");
    assert_eq!(view["game_id"], json!(game_id));
}

#[tokio::test]
async fn test_probe_of_unknown_game_still_fails() {
    let world = World::new();
    let player = world.register("ana").await;

    let result = guards::start_game_allowed(
        &world.repo,
        &world.rules,
        GameId(404),
        player,
    )
    .await
    .is_allowed();

    assert!(matches!(result, Err(DomainError::EntityNotFound { kind: "game", id: 404 })));
}

// --- invite ---

#[tokio::test]
async fn test_invite_stores_valid_json_and_denies_garbage() {
    // Arrange
    let world = World::new();
    let (game_id, seats) = world.gather("night hunt", 1).await;
    let invite = |payload: &str| Invite {
        correlation_id: Uuid::new_v4(),
        game_id,
        requestor: seats[0].player,
        invite_json: payload.to_owned(),
    };

    // Act
    handle_invite(&invite(r#"{"to":"bo@example.com"}"#), &world.rules, &world.repo)
        .await
        .unwrap();
    let garbage = handle_invite(&invite("not json"), &world.rules, &world.repo).await;

    // Assert
    assert_eq!(denial_reason(garbage), "invalid JSON");
    let game: Game = persistence::load(&world.repo, game_id).await.unwrap();
    assert_eq!(game.invites().unwrap(), vec![json!({ "to": "bo@example.com" })]);
}

// --- end ---

#[tokio::test]
async fn test_end_game_by_creator_runs_hook_once() {
    // Arrange
    let world = World::new();
    let (game_id, seats) = world.started_game("night hunt").await;
    let hook = CountingHook::default();
    let end = |requestor| EndGame {
        correlation_id: Uuid::new_v4(),
        game_id,
        requestor,
    };

    // Act
    let creator_may_end = guards::end_game_allowed(&world.repo, game_id, seats[0].player)
        .await
        .is_allowed()
        .unwrap();
    let other_may_end = guards::end_game_allowed(&world.repo, game_id, seats[1].player)
        .await
        .is_allowed()
        .unwrap();
    let by_other = handle_end_game(&end(seats[1].player), &world.clock, &world.repo, &hook).await;
    handle_end_game(&end(seats[0].player), &world.clock, &world.repo, &hook)
        .await
        .unwrap();
    let again = handle_end_game(&end(seats[0].player), &world.clock, &world.repo, &hook).await;

    // Assert
    assert_eq!(denial_reason(by_other), "only the creator may end the game");
    assert_eq!(denial_reason(again), "game is already over");
    assert_eq!(hook.calls.load(Ordering::SeqCst), 1);
    assert!(creator_may_end);
    assert!(!other_may_end);
    let after_end = guards::end_game_allowed(&world.repo, game_id, seats[0].player)
        .await
        .denial()
        .unwrap();
    assert_eq!(after_end.map(|d| d.reason), Some("game is already over".to_owned()));
}

#[tokio::test]
async fn test_event_log_records_game_history_in_order() {
    // Arrange
    let world = World::new();
    let (game_id, seats) = world.started_game("night hunt").await;
    world.clock.advance(TimeDelta::minutes(5));

    // Act
    handle_end_game(
        &EndGame {
            correlation_id: Uuid::new_v4(),
            game_id,
            requestor: seats[0].player,
        },
        &world.clock,
        &world.repo,
        &RetainEverything,
    )
    .await
    .unwrap();
    let log = query_handlers::get_event_log(&world.repo, game_id).await.unwrap();

    // Assert
    let names: Vec<&str> = log.iter().map(|e| e["name"].as_str().unwrap()).collect();
    assert_eq!(names.first(), Some(&"game_created"));
    assert_eq!(names.iter().filter(|n| **n == "charactor_joined").count(), 5);
    assert_eq!(names[names.len() - 2..], ["game_started", "game_over"]);
    assert!(log.iter().all(|e| e["created_at"].is_string()));
}

#[tokio::test]
async fn test_list_games_projects_every_game() {
    let world = World::new();
    let (first, _) = world.gather("first", 1).await;
    let (second, _) = world.gather("second", 1).await;

    let games = query_handlers::list_games(&world.repo).await.unwrap();

    let ids: Vec<i64> = games.iter().map(|g| g["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![first.0, second.0]);
    let game: Game = persistence::load(&world.repo, second).await.unwrap();
    assert_eq!(game.id(), second);
}

#[tokio::test]
async fn test_repository_failure_surfaces_as_infrastructure_error() {
    // Arrange
    let repo = FailingEntityRepository;
    let clock = FixedClock(start_time());
    let command = RegisterPlayer {
        correlation_id: Uuid::new_v4(),
        unique_name: "ana".to_owned(),
    };

    // Act
    let result = handle_register_player(&command, &clock, &repo).await;

    // Assert
    assert!(matches!(result, Err(DomainError::Infrastructure(_))));
}

#[tokio::test]
async fn test_probe_lets_infrastructure_errors_through() {
    let repo = FailingEntityRepository;
    let rules = GameRules::default();

    let result = guards::start_game_allowed(&repo, &rules, GameId(1), PlayerId(1))
        .await
        .is_allowed();

    assert!(matches!(result, Err(DomainError::Infrastructure(_))));
}
