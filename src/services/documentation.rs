use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Fabula Back.
#[openapi(
    paths(
        crate::routes::game::create_game,
        crate::routes::game::join_game,
        crate::routes::game::fetch_game,
        crate::routes::game::start_round,
        crate::routes::game::submit_clue,
        crate::routes::game::submit_card,
        crate::routes::game::advance,
        crate::routes::game::leave_game,
        crate::routes::health::healthcheck,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::game::CreateGameRequest,
            crate::dto::game::JoinGameRequest,
            crate::dto::game::SubmitClueRequest,
            crate::dto::game::SubmitCardRequest,
            crate::dto::game::CreateGameResponse,
            crate::dto::game::JoinGameResponse,
            crate::dto::game::GameSummary,
            crate::dto::game::PlayerSummary,
            crate::dto::game::RoundSummary,
            crate::dto::game::SubmissionSummary,
            crate::dto::health::HealthResponse,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::RoomEvent,
        )
    ),
    tags(
        (name = "games", description = "Session lifecycle and round operations"),
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "WebSocket room streaming"),
    )
)]
pub struct ApiDoc;
