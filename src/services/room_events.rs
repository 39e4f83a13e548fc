use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dto::{
        game::{GameSummary, PlayerSummary},
        ws::{PlayerJoinedEvent, PlayerLeftEvent, RoomEvent, SessionClosedEvent},
    },
    state::{rooms::RoomHub, session::GameSession},
};

const EVENT_GAME_STATE: &str = "game.state";
const EVENT_PLAYER_JOINED: &str = "player.joined";
const EVENT_PLAYER_LEFT: &str = "player.left";
const EVENT_SESSION_CLOSED: &str = "session.closed";

/// Broadcast the full session state to the room.
///
/// Rendered with no viewer so hands are never leaked. Callers invoke this
/// while holding the session lock, which is what gives every already-joined
/// connection the same event order.
pub fn broadcast_game_state(room: &RoomHub, session: &GameSession) {
    let summary = GameSummary::render(session, None);
    publish(room, EVENT_GAME_STATE, &summary);
}

/// Broadcast that a player joined the session.
pub fn broadcast_player_joined(room: &RoomHub, player: PlayerSummary) {
    let payload = PlayerJoinedEvent {
        player: PlayerSummary { hand: None, ..player },
    };
    publish(room, EVENT_PLAYER_JOINED, &payload);
}

/// Broadcast that a player left, including any host migration.
pub fn broadcast_player_left(room: &RoomHub, player_id: Uuid, new_host: Option<Uuid>) {
    let payload = PlayerLeftEvent {
        player_id,
        new_host,
    };
    publish(room, EVENT_PLAYER_LEFT, &payload);
}

/// Broadcast that the session has been retired.
pub fn broadcast_session_closed(room: &RoomHub, code: &str) {
    let payload = SessionClosedEvent {
        code: code.to_string(),
    };
    publish(room, EVENT_SESSION_CLOSED, &payload);
}

/// Build the snapshot event sent to a single connection on resync.
pub fn game_state_event(session: &GameSession) -> Option<RoomEvent> {
    let summary = GameSummary::render(session, None);
    match RoomEvent::json(EVENT_GAME_STATE, &summary) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(error = %err, "failed to serialize game state snapshot");
            None
        }
    }
}

fn publish(room: &RoomHub, event: &str, payload: &impl Serialize) {
    match RoomEvent::json(event, payload) {
        Ok(event) => room.publish(event),
        Err(err) => warn!(event, error = %err, "failed to serialize room event payload"),
    }
}
