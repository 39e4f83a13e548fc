use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    models::{GameEntity, PlayerEntity, RoundEntity},
    store::{GameStore, StorageResult},
};

/// In-memory storage backend.
///
/// The default backend: the process is the system of record for live
/// sessions, so records live in concurrent maps. Implements the same
/// cascade semantics a relational backend would enforce with foreign keys.
#[derive(Default)]
pub struct MemoryStore {
    inner: Arc<Tables>,
}

#[derive(Default)]
struct Tables {
    games: DashMap<Uuid, GameEntity>,
    codes: DashMap<String, Uuid>,
    players: DashMap<Uuid, PlayerEntity>,
    rounds: DashMap<Uuid, RoundEntity>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl GameStore for MemoryStore {
    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.inner.clone();
        Box::pin(async move {
            tables.codes.insert(game.code.clone(), game.id);
            tables.games.insert(game.id, game);
            Ok(())
        })
    }

    fn find_game_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let tables = self.inner.clone();
        Box::pin(async move {
            let id = tables.codes.get(&code).map(|entry| *entry.value());
            Ok(id.and_then(|id| tables.games.get(&id).map(|entry| entry.value().clone())))
        })
    }

    fn delete_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.inner.clone();
        Box::pin(async move {
            if let Some((_, game)) = tables.games.remove(&id) {
                tables.codes.remove(&game.code);
            }
            tables.players.retain(|_, player| player.game_id != id);
            tables.rounds.retain(|_, round| round.game_id != id);
            Ok(())
        })
    }

    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.inner.clone();
        Box::pin(async move {
            tables.players.insert(player.id, player);
            Ok(())
        })
    }

    fn delete_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.inner.clone();
        Box::pin(async move {
            tables.players.remove(&id);
            Ok(())
        })
    }

    fn list_players(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let tables = self.inner.clone();
        Box::pin(async move {
            Ok(tables
                .players
                .iter()
                .filter(|entry| entry.value().game_id == game_id)
                .map(|entry| entry.value().clone())
                .collect())
        })
    }

    fn save_round(&self, round: RoundEntity) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.inner.clone();
        Box::pin(async move {
            tables.rounds.insert(round.id, round);
            Ok(())
        })
    }

    fn list_rounds(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<RoundEntity>>> {
        let tables = self.inner.clone();
        Box::pin(async move {
            let mut rounds: Vec<RoundEntity> = tables
                .rounds
                .iter()
                .filter(|entry| entry.value().game_id == game_id)
                .map(|entry| entry.value().clone())
                .collect();
            rounds.sort_by_key(|round| round.number);
            Ok(rounds)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::state::state_machine::{RoundStatus, Stage};

    fn game(code: &str) -> GameEntity {
        GameEntity {
            id: Uuid::new_v4(),
            code: code.into(),
            stage: Stage::Lobby,
            created_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn save_then_find_by_code() {
        let store = MemoryStore::new();
        let game = game("A1B2C3");
        store.save_game(game.clone()).await.unwrap();

        let found = store.find_game_by_code("A1B2C3".into()).await.unwrap();
        assert_eq!(found.unwrap().id, game.id);
        assert!(
            store
                .find_game_by_code("ZZZZZZ".into())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn delete_game_cascades_to_players_and_rounds() {
        let store = MemoryStore::new();
        let game = game("A1B2C3");
        store.save_game(game.clone()).await.unwrap();

        store
            .save_player(PlayerEntity {
                id: Uuid::new_v4(),
                game_id: game.id,
                name: "Alice".into(),
                score: 0,
                is_host: true,
                hand: vec!["c1".into()],
            })
            .await
            .unwrap();
        store
            .save_round(RoundEntity {
                id: Uuid::new_v4(),
                game_id: game.id,
                number: 1,
                status: RoundStatus::Pending,
                narrator_id: Uuid::new_v4(),
                clue: None,
            })
            .await
            .unwrap();

        store.delete_game(game.id).await.unwrap();

        assert!(
            store
                .find_game_by_code("A1B2C3".into())
                .await
                .unwrap()
                .is_none()
        );
        assert!(store.list_players(game.id).await.unwrap().is_empty());
        assert!(store.list_rounds(game.id).await.unwrap().is_empty());
    }
}
