use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::{
    session::{GameSession, Player, Round},
    state_machine::{RoundStatus, Stage},
};

/// Persisted representation of a game session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameEntity {
    /// Primary key of the game.
    pub id: Uuid,
    /// Human-shareable session code (unique).
    pub code: String,
    /// Current stage of the session.
    pub stage: Stage,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

/// Persisted representation of a player.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerEntity {
    /// Primary key of the player.
    pub id: Uuid,
    /// Foreign key to the owning game (cascade on game deletion).
    pub game_id: Uuid,
    /// Display name.
    pub name: String,
    /// Current score.
    pub score: i32,
    /// Host flag.
    pub is_host: bool,
    /// Hand of opaque card identifiers.
    pub hand: Vec<String>,
}

/// Persisted representation of a round.
///
/// Submissions are deliberately absent: they are ephemeral working state
/// owned by the in-memory session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundEntity {
    /// Primary key of the round.
    pub id: Uuid,
    /// Foreign key to the owning game (cascade on game deletion).
    pub game_id: Uuid,
    /// Sequential round number within the game.
    pub number: u32,
    /// Lifecycle status of the round.
    pub status: RoundStatus,
    /// The narrator for this round.
    pub narrator_id: Uuid,
    /// Clue text once submitted.
    pub clue: Option<String>,
}

impl From<&GameSession> for GameEntity {
    fn from(session: &GameSession) -> Self {
        Self {
            id: session.id,
            code: session.code.clone(),
            stage: session.stage,
            created_at: session.created_at,
        }
    }
}

impl PlayerEntity {
    /// Build the persisted form of a player belonging to `game_id`.
    pub fn from_player(game_id: Uuid, player: &Player) -> Self {
        Self {
            id: player.id,
            game_id,
            name: player.name.clone(),
            score: player.score,
            is_host: player.is_host,
            hand: player.hand.clone(),
        }
    }
}

impl RoundEntity {
    /// Build the persisted form of a round belonging to `game_id`.
    pub fn from_round(game_id: Uuid, round: &Round) -> Self {
        Self {
            id: round.id,
            game_id,
            number: round.number,
            status: round.status,
            narrator_id: round.narrator_id,
            clue: round.clue.clone(),
        }
    }
}
