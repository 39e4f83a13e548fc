use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::http::{HeaderMap, header};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{config::AppConfig, error::ServiceError};

/// Claims carried by a session credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// The authenticated player.
    pub player_id: Uuid,
    /// The game the player belongs to.
    pub game_id: Uuid,
    /// The session code the credential was issued for.
    pub code: String,
    /// Expiry as seconds since the Unix epoch.
    pub exp: u64,
}

/// Sign a credential binding a player to a session.
pub fn sign(
    config: &AppConfig,
    player_id: Uuid,
    game_id: Uuid,
    code: &str,
) -> Result<String, ServiceError> {
    let claims = Claims {
        player_id,
        game_id,
        code: code.to_string(),
        exp: expiry(config.token_ttl()),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.token_secret().as_bytes()),
    )
    .map_err(|err| ServiceError::InvalidState(format!("failed to sign credential: {err}")))
}

/// Verify a credential and return its claims.
pub fn verify(config: &AppConfig, token: &str) -> Result<Claims, ServiceError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.token_secret().as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|err| ServiceError::InvalidCredential(err.to_string()))
}

/// Extract and verify the bearer credential from request headers.
pub fn bearer_claims(config: &AppConfig, headers: &HeaderMap) -> Result<Claims, ServiceError> {
    let token = bearer_token(headers)
        .ok_or_else(|| ServiceError::InvalidCredential("missing bearer token".into()))?;
    verify(config, token)
}

/// Extract the bearer token from request headers, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
}

fn expiry(ttl: Duration) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);
    (now + ttl).as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn sign_then_verify_roundtrip() {
        let config = AppConfig::default();
        let player_id = Uuid::new_v4();
        let game_id = Uuid::new_v4();

        let token = sign(&config, player_id, game_id, "A1B2C3").unwrap();
        let claims = verify(&config, &token).unwrap();

        assert_eq!(claims.player_id, player_id);
        assert_eq!(claims.game_id, game_id);
        assert_eq!(claims.code, "A1B2C3");
    }

    #[test]
    fn tampered_token_is_rejected() {
        let config = AppConfig::default();
        let token = sign(&config, Uuid::new_v4(), Uuid::new_v4(), "A1B2C3").unwrap();

        let mut tampered = token.clone();
        tampered.push('x');
        assert!(matches!(
            verify(&config, &tampered),
            Err(ServiceError::InvalidCredential(_))
        ));
        assert!(matches!(
            verify(&config, "not-a-token"),
            Err(ServiceError::InvalidCredential(_))
        ));
    }

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_none());

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert!(bearer_token(&headers).is_none());
    }
}
