use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Messages accepted from WebSocket clients.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join the room for a session code. When `player_name` is present the
    /// join also binds game-level membership (idempotent rejoin by name);
    /// without it the join is pure routing.
    JoinGame {
        /// Session code to join.
        code: String,
        /// Optional display name for game-level membership.
        #[serde(default)]
        player_name: Option<String>,
    },
    /// Stop receiving broadcasts for a session code.
    LeaveGame {
        /// Session code to leave.
        code: String,
    },
    /// Request a fresh state snapshot for a session code.
    Resync {
        /// Session code to resync.
        code: String,
    },
    /// Any unrecognized message type.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parse a message from its JSON text frame.
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Event carried across a session room and down each WebSocket connection.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomEvent {
    /// Event name (e.g. `game.state`, `player.joined`, `session.closed`).
    pub event: String,
    /// JSON payload for the event.
    pub data: Value,
}

impl RoomEvent {
    /// Convenience wrapper that serialises `payload` into the data field.
    pub fn json<T: Serialize>(event: &str, payload: &T) -> serde_json::Result<Self> {
        Ok(Self {
            event: event.to_string(),
            data: serde_json::to_value(payload)?,
        })
    }

    /// Build an error event delivered to a single connection.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            event: "error".to_string(),
            data: Value::String(message.into()),
        }
    }
}

/// Payload of the `player.joined` room event.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerJoinedEvent {
    /// The player who joined (hand omitted).
    pub player: crate::dto::game::PlayerSummary,
}

/// Payload of the `player.left` room event.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerLeftEvent {
    /// The player who left.
    pub player_id: uuid::Uuid,
    /// Player promoted to host, when host migration happened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_host: Option<uuid::Uuid>,
}

/// Payload of the `session.closed` room event.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionClosedEvent {
    /// Code of the retired session.
    pub code: String,
}
