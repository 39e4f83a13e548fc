use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::{
        game::{
            CreateGameRequest, CreateGameResponse, GameSummary, JoinGameRequest, JoinGameResponse,
            SubmitCardRequest, SubmitClueRequest,
        },
        validation::validate_session_code,
    },
    error::AppError,
    services::{
        auth_service::{self, Claims},
        game_service, round_service,
    },
    state::SharedState,
};

/// Session lifecycle and round endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games", post(create_game))
        .route("/games/{code}", get(fetch_game))
        .route("/games/{code}/join", post(join_game))
        .route("/games/{code}/rounds", post(start_round))
        .route("/games/{code}/clue", post(submit_clue))
        .route("/games/{code}/cards", post(submit_card))
        .route("/games/{code}/advance", post(advance))
        .route("/games/{code}/leave", post(leave_game))
}

/// Create a new session with the requester as host.
#[utoipa::path(
    post,
    path = "/games",
    tag = "games",
    request_body = CreateGameRequest,
    responses(
        (status = 201, description = "Session created", body = CreateGameResponse),
        (status = 400, description = "Invalid player name"),
    )
)]
pub async fn create_game(
    State(state): State<SharedState>,
    Json(payload): Json<CreateGameRequest>,
) -> Result<(StatusCode, Json<CreateGameResponse>), AppError> {
    payload.validate()?;
    let response = game_service::create_game(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Join an existing session by code.
#[utoipa::path(
    post,
    path = "/games/{code}/join",
    tag = "games",
    params(("code" = String, Path, description = "Session code")),
    request_body = JoinGameRequest,
    responses(
        (status = 200, description = "Joined the session", body = JoinGameResponse),
        (status = 404, description = "Unknown session code"),
    )
)]
pub async fn join_game(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<JoinGameRequest>,
) -> Result<Json<JoinGameResponse>, AppError> {
    let code = checked_code(code)?;
    payload.validate()?;
    Ok(Json(game_service::join_game(&state, &code, payload).await?))
}

/// Fetch the current state of a session.
///
/// An optional bearer credential makes the response include the caller's
/// own hand; without one the summary is fully public.
#[utoipa::path(
    get,
    path = "/games/{code}",
    tag = "games",
    params(("code" = String, Path, description = "Session code")),
    responses(
        (status = 200, description = "Session state", body = GameSummary),
        (status = 404, description = "Unknown session code"),
    )
)]
pub async fn fetch_game(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    headers: HeaderMap,
) -> Result<Json<GameSummary>, AppError> {
    let code = checked_code(code)?;
    let viewer = auth_service::bearer_token(&headers)
        .and_then(|token| auth_service::verify(state.config(), token).ok())
        .filter(|claims| claims.code == code)
        .map(|claims| claims.player_id);
    Ok(Json(game_service::fetch_game(&state, &code, viewer).await?))
}

/// Start a new round from the lobby.
#[utoipa::path(
    post,
    path = "/games/{code}/rounds",
    tag = "games",
    params(("code" = String, Path, description = "Session code")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Round started", body = GameSummary),
        (status = 403, description = "Not legal from the current stage"),
        (status = 412, description = "No players in the session"),
    )
)]
pub async fn start_round(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    headers: HeaderMap,
) -> Result<Json<GameSummary>, AppError> {
    let code = checked_code(code)?;
    let claims = authorize(&state, &headers, &code)?;
    Ok(Json(
        round_service::start_round(&state, &code, claims.player_id).await?,
    ))
}

/// Submit the narrator's clue, opening card submissions.
#[utoipa::path(
    post,
    path = "/games/{code}/clue",
    tag = "games",
    params(("code" = String, Path, description = "Session code")),
    security(("bearer" = [])),
    request_body = SubmitClueRequest,
    responses(
        (status = 200, description = "Clue recorded", body = GameSummary),
        (status = 403, description = "Caller is not the narrator"),
    )
)]
pub async fn submit_clue(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<SubmitClueRequest>,
) -> Result<Json<GameSummary>, AppError> {
    let code = checked_code(code)?;
    let claims = authorize(&state, &headers, &code)?;
    payload.validate()?;
    Ok(Json(
        round_service::submit_clue(&state, &code, claims.player_id, payload.clue).await?,
    ))
}

/// Submit a card for the current round.
#[utoipa::path(
    post,
    path = "/games/{code}/cards",
    tag = "games",
    params(("code" = String, Path, description = "Session code")),
    security(("bearer" = [])),
    request_body = SubmitCardRequest,
    responses(
        (status = 200, description = "Card recorded", body = GameSummary),
        (status = 403, description = "Submissions are closed or caller is the narrator"),
        (status = 409, description = "Caller already submitted this round"),
    )
)]
pub async fn submit_card(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<SubmitCardRequest>,
) -> Result<Json<GameSummary>, AppError> {
    let code = checked_code(code)?;
    let claims = authorize(&state, &headers, &code)?;
    payload.validate()?;
    Ok(Json(
        round_service::submit_card(&state, &code, claims.player_id, payload.card_id).await?,
    ))
}

/// Advance out of the vote stage into the next round.
#[utoipa::path(
    post,
    path = "/games/{code}/advance",
    tag = "games",
    params(("code" = String, Path, description = "Session code")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Next round started", body = GameSummary),
        (status = 403, description = "Not legal from the current stage"),
    )
)]
pub async fn advance(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    headers: HeaderMap,
) -> Result<Json<GameSummary>, AppError> {
    let code = checked_code(code)?;
    let claims = authorize(&state, &headers, &code)?;
    Ok(Json(
        round_service::start_round(&state, &code, claims.player_id).await?,
    ))
}

/// Leave a session. Idempotent; returns 204 even when the caller already
/// left or the session is gone.
#[utoipa::path(
    post,
    path = "/games/{code}/leave",
    tag = "games",
    params(("code" = String, Path, description = "Session code")),
    security(("bearer" = [])),
    responses((status = 204, description = "Leave applied"))
)]
pub async fn leave_game(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let code = checked_code(code)?;
    let claims = authorize(&state, &headers, &code)?;
    game_service::leave_game(&state, &code, claims.player_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn checked_code(code: String) -> Result<String, AppError> {
    validate_session_code(&code)
        .map_err(|err| AppError::BadRequest(format!("invalid session code: {err}")))?;
    Ok(code)
}

fn authorize(state: &SharedState, headers: &HeaderMap, code: &str) -> Result<Claims, AppError> {
    let claims = auth_service::bearer_claims(state.config(), headers)?;
    if claims.code != code {
        return Err(AppError::Forbidden(
            "credential was issued for a different session".into(),
        ));
    }
    Ok(claims)
}
