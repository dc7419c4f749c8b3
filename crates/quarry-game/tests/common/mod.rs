//! Shared test helpers for game integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use quarry_core::error::DomainError;
use quarry_core::persistence;
use quarry_core::rng::DeterministicRng;
use quarry_game::application::command_handlers::{
    handle_create_game, handle_import_stunts, handle_join_game, handle_register_player,
    handle_start_game,
};
use quarry_game::config::GameRules;
use quarry_game::domain::charactor::Charactor;
use quarry_game::domain::commands::{
    CreateGame, ImportStunts, JoinGame, RegisterPlayer, StartGame,
};
use quarry_game::domain::ids::{CharactorId, GameId, MissionId, PlayerId};
use quarry_game::domain::mission::Mission;
use quarry_store::memory::InMemoryEntityRepository;
use quarry_test_support::{ManualClock, MockRng, init_test_tracing};
use uuid::Uuid;

/// Fixed start time used across game tests.
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
}

/// A seat in a game: the player and their charactor.
#[derive(Debug, Clone, Copy)]
pub struct Seat {
    pub player: PlayerId,
    pub charactor: CharactorId,
}

/// In-memory game world with a manual clock and an injectable RNG.
pub struct World {
    pub repo: InMemoryEntityRepository,
    pub clock: ManualClock,
    pub rng: Arc<Mutex<dyn DeterministicRng + Send>>,
    pub rules: GameRules,
}

impl World {
    /// World whose RNG always picks the first candidate.
    pub fn new() -> Self {
        Self::with_rng(MockRng)
    }

    pub fn with_rng(rng: impl DeterministicRng + Send + 'static) -> Self {
        init_test_tracing();
        Self {
            repo: InMemoryEntityRepository::new(),
            clock: ManualClock::new(start_time()),
            rng: Arc::new(Mutex::new(rng)),
            rules: GameRules::default(),
        }
    }

    pub async fn import_stunts(&self) {
        let command = ImportStunts {
            correlation_id: Uuid::new_v4(),
            yaml: "- text: eating a banana\n- text: doing a cartwheel\n".to_owned(),
        };
        handle_import_stunts(&command, &self.clock, &self.repo).await.unwrap();
    }

    pub async fn register(&self, name: &str) -> PlayerId {
        let command = RegisterPlayer {
            correlation_id: Uuid::new_v4(),
            unique_name: name.to_owned(),
        };
        handle_register_player(&command, &self.clock, &self.repo)
            .await
            .unwrap()
    }

    /// Creates a game named `name` with `size` charactors, the first one
    /// belonging to the creator. The game is not started.
    pub async fn gather(&self, name: &str, size: usize) -> (GameId, Vec<Seat>) {
        let creator = self.register(&format!("{name}-p0")).await;
        let command = CreateGame {
            correlation_id: Uuid::new_v4(),
            name: name.to_owned(),
            creator,
        };
        let created = handle_create_game(&command, &self.clock, &self.repo)
            .await
            .unwrap();
        let mut seats = vec![Seat {
            player: creator,
            charactor: created.charactor_id,
        }];
        for i in 1..size {
            let player = self.register(&format!("{name}-p{i}")).await;
            let join = JoinGame {
                correlation_id: Uuid::new_v4(),
                game_id: created.game_id,
                player_id: player,
            };
            let charactor = handle_join_game(&join, &self.clock, &self.repo)
                .await
                .unwrap();
            seats.push(Seat { player, charactor });
        }
        (created.game_id, seats)
    }

    pub async fn start(&self, game_id: GameId, requestor: PlayerId) -> Result<(), DomainError> {
        let command = StartGame {
            correlation_id: Uuid::new_v4(),
            game_id,
            requestor,
        };
        handle_start_game(&command, &self.clock, &*self.rng, &self.rules, &self.repo).await
    }

    /// Imports stunts, gathers six charactors and starts the game.
    pub async fn started_game(&self, name: &str) -> (GameId, Vec<Seat>) {
        self.import_stunts().await;
        let (game_id, seats) = self.gather(name, 6).await;
        self.start(game_id, seats[0].player).await.unwrap();
        (game_id, seats)
    }

    pub async fn charactor(&self, id: CharactorId) -> Charactor {
        persistence::load(&self.repo, id).await.unwrap()
    }

    pub async fn mission(&self, id: MissionId) -> Mission {
        persistence::load(&self.repo, id).await.unwrap()
    }
}

/// Reason of a denial, panicking on any other outcome.
pub fn denial_reason<T: std::fmt::Debug>(result: Result<T, DomainError>) -> String {
    match result {
        Err(DomainError::Denied(denial)) => denial.reason,
        other => panic!("expected Denied, got {other:?}"),
    }
}
