//! Extension points invoked by command handlers.

use async_trait::async_trait;
use quarry_core::entity::Entity;
use quarry_core::error::DomainError;
use quarry_core::repository::EntityRepository;
use tracing::debug;

use crate::domain::game::Game;

/// Called once a game has been marked over.
#[async_trait]
pub trait GameOverHook: Send + Sync {
    /// Reacts to the end of `game`, e.g. by archiving or cleaning up rows.
    ///
    /// # Errors
    ///
    /// Returns `DomainError` if the reaction fails; the game stays over.
    async fn on_game_over(
        &self,
        game: &Game,
        repo: &dyn EntityRepository,
    ) -> Result<(), DomainError>;
}

/// Keeps every row of a finished game.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetainEverything;

#[async_trait]
impl GameOverHook for RetainEverything {
    async fn on_game_over(
        &self,
        game: &Game,
        _repo: &dyn EntityRepository,
    ) -> Result<(), DomainError> {
        debug!(game_id = %game.id(), "game over; retaining all rows");
        Ok(())
    }
}
