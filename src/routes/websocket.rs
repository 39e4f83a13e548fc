use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;

use crate::{services::ws_service, state::SharedState};

/// Query parameters accepted by the WebSocket handshake.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    /// Session credential issued at create/join time.
    token: Option<String>,
}

#[utoipa::path(
    get,
    path = "/ws",
    tag = "rooms",
    params(("token" = Option<String>, Query, description = "Session credential")),
    responses((status = 101, description = "Switching protocols to WebSocket"))
)]
/// Upgrade the HTTP connection into a room-streaming WebSocket session.
pub async fn ws_handler(
    State(state): State<SharedState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let shared_state = state.clone();
    ws.on_upgrade(move |socket| ws_service::handle_socket(shared_state, socket, params.token))
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws", get(ws_handler))
}
