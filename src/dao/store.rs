use std::error::Error;

use futures::future::BoxFuture;
use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::{GameEntity, PlayerEntity, RoundEntity};

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not complete the operation.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Human-readable description of the failure.
        message: String,
        /// Underlying backend error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}

/// Abstraction over the persistence layer for games, players, and rounds.
///
/// `save_*` methods have upsert semantics. Deleting a game cascades to its
/// players and rounds. Round submissions are working state for the current
/// round only and are never persisted.
pub trait GameStore: Send + Sync {
    /// Insert or update a game record.
    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Look up a game by its session code.
    fn find_game_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Delete a game and cascade to its players and rounds.
    fn delete_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>>;
    /// Insert or update a player record.
    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Delete a single player record.
    fn delete_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>>;
    /// List the players belonging to a game.
    fn list_players(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>>;
    /// Insert or update a round record.
    fn save_round(&self, round: RoundEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// List the rounds belonging to a game.
    fn list_rounds(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<RoundEntity>>>;
    /// Verify the backend is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
