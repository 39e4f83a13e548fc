/// Credential signing and verification.
pub mod auth_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Session lifecycle and membership management.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Room event construction and broadcasting.
pub mod room_events;
/// Round state machine operations.
pub mod round_service;
/// WebSocket connection and message handling service.
pub mod ws_service;
