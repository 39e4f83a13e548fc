use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{
    sync::{broadcast::error::RecvError, mpsc},
    task::JoinHandle,
};
use tracing::{info, warn};

use crate::{
    dto::ws::{ClientMessage, RoomEvent},
    services::{auth_service, auth_service::Claims, game_service, room_events},
    state::SharedState,
};

/// Handle the full lifecycle of one client WebSocket connection.
///
/// The connection authenticates once via the `token` query parameter, then
/// routes itself into session rooms with `join_game`/`leave_game` messages.
/// Room membership here is pure event routing; game-level membership only
/// changes when a join carries a `player_name`.
pub async fn handle_socket(state: SharedState, mut socket: WebSocket, token: Option<String>) {
    let claims = match authenticate(&state, token) {
        Ok(claims) => claims,
        Err(reason) => {
            warn!(reason, "closing unauthenticated websocket");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps room broadcasts flowing even while we
    // await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let player = claims.as_ref().map(|claims| claims.player_id);
    info!(player = ?player, "websocket connected");

    // One forwarding task per joined room, keyed by session code.
    let mut rooms: HashMap<String, JoinHandle<()>> = HashMap::new();

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match ClientMessage::from_json_str(&text) {
                Ok(ClientMessage::JoinGame { code, player_name }) => {
                    handle_join(&state, &claims, &mut rooms, &outbound_tx, code, player_name)
                        .await;
                }
                Ok(ClientMessage::LeaveGame { code }) => {
                    if let Some(task) = rooms.remove(&code) {
                        task.abort();
                        info!(%code, "websocket left room");
                    }
                }
                Ok(ClientMessage::Resync { code }) => {
                    send_snapshot(&state, &outbound_tx, &code).await;
                }
                Ok(ClientMessage::Unknown) => {
                    send_event(&outbound_tx, &RoomEvent::error("unknown message type"));
                }
                Err(err) => {
                    warn!(error = %err, "failed to parse client message");
                    send_event(&outbound_tx, &RoomEvent::error("malformed message"));
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(error = %err, "websocket error");
                break;
            }
        }
    }

    for task in rooms.into_values() {
        task.abort();
    }

    // A dropped connection counts as a leave for the authenticated player.
    if let Some(claims) = claims {
        match game_service::leave_game(&state, &claims.code, claims.player_id).await {
            Ok(outcome) => {
                info!(
                    code = %claims.code,
                    player = %claims.player_id,
                    ?outcome,
                    "websocket disconnected; leave applied"
                );
            }
            Err(err) => {
                warn!(
                    code = %claims.code,
                    player = %claims.player_id,
                    error = %err,
                    "failed to apply leave on disconnect"
                );
            }
        }
    }

    finalize(writer_task, outbound_tx).await;
}

fn authenticate(
    state: &SharedState,
    token: Option<String>,
) -> Result<Option<Claims>, &'static str> {
    match token {
        Some(token) => match auth_service::verify(state.config(), &token) {
            Ok(claims) => Ok(Some(claims)),
            // The bypass admits any handshake; an unverifiable token just
            // downgrades the connection to anonymous.
            Err(_) if state.config().allow_unverified_sockets() => {
                warn!("ignoring unverifiable token on unverified-socket connection");
                Ok(None)
            }
            Err(_) => Err("invalid token"),
        },
        None if state.config().allow_unverified_sockets() => Ok(None),
        None => Err("missing token"),
    }
}

async fn handle_join(
    state: &SharedState,
    claims: &Option<Claims>,
    rooms: &mut HashMap<String, JoinHandle<()>>,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    code: String,
    player_name: Option<String>,
) {
    let Some(handle) = state.registry().resolve(&code) else {
        send_event(outbound_tx, &RoomEvent::error(format!("session `{code}` not found")));
        return;
    };

    // With a name the join also binds game-level membership (idempotent
    // rejoin by name).
    if let Some(name) = player_name {
        if let Err(err) = game_service::join_by_name(state, &code, &name).await {
            send_event(outbound_tx, &RoomEvent::error(err.to_string()));
            return;
        }
    }

    if rooms.contains_key(&code) {
        send_snapshot(state, outbound_tx, &code).await;
        return;
    }

    let mut events = handle.room.subscribe();
    let tx = outbound_tx.clone();
    let forward_code = code.clone();
    let forward = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if send_event(&tx, &event).is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(code = %forward_code, skipped, "room subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
    rooms.insert(code.clone(), forward);

    info!(%code, player = ?claims.as_ref().map(|c| c.player_id), "websocket joined room");
    send_snapshot(state, outbound_tx, &code).await;
}

/// Send the current session state to this connection only.
async fn send_snapshot(
    state: &SharedState,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    code: &str,
) {
    let Some(handle) = state.registry().resolve(code) else {
        send_event(outbound_tx, &RoomEvent::error(format!("session `{code}` not found")));
        return;
    };
    let session = handle.session.lock().await;
    if let Some(event) = room_events::game_state_event(&session) {
        let _ = send_event(outbound_tx, &event);
    }
}

/// Serialize a room event and queue it onto the writer channel.
///
/// Returns `Err(())` when the writer is gone so forwarding loops can stop.
fn send_event(tx: &mpsc::UnboundedSender<Message>, event: &RoomEvent) -> Result<(), ()> {
    let payload = match serde_json::to_string(event) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize room event");
            return Ok(());
        }
    };
    tx.send(Message::Text(payload.into())).map_err(|_| ())
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{config::AppConfig, dao::memory::MemoryStore, state::AppState};
    use uuid::Uuid;

    fn state_with(config: AppConfig) -> SharedState {
        AppState::new(config, Arc::new(MemoryStore::new()))
    }

    #[test]
    fn handshake_requires_a_valid_token_by_default() {
        let state = state_with(AppConfig::default());

        assert!(authenticate(&state, None).is_err());
        assert!(authenticate(&state, Some("garbage".into())).is_err());

        let token =
            auth_service::sign(state.config(), Uuid::new_v4(), Uuid::new_v4(), "A1B2C3").unwrap();
        let claims = authenticate(&state, Some(token)).unwrap().unwrap();
        assert_eq!(claims.code, "A1B2C3");
    }

    #[test]
    fn bypass_admits_missing_and_unverifiable_tokens_as_anonymous() {
        let state = state_with(AppConfig::default().with_unverified_sockets(true));

        assert!(matches!(authenticate(&state, None), Ok(None)));
        assert!(matches!(
            authenticate(&state, Some("garbage".into())),
            Ok(None)
        ));

        // A verifiable token still binds the connection to its claims.
        let token =
            auth_service::sign(state.config(), Uuid::new_v4(), Uuid::new_v4(), "A1B2C3").unwrap();
        assert!(matches!(authenticate(&state, Some(token)), Ok(Some(_))));
    }
}
