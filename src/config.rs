//! Application-level configuration loading, including the runtime card deck.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use rand::seq::SliceRandom;
use serde::Deserialize;
use tracing::{info, warn};

use crate::state::session::NarratorPolicy;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "FABULA_BACK_CONFIG_PATH";
/// Environment variable that overrides the token signing secret.
const TOKEN_SECRET_ENV: &str = "JWT_SECRET";

const DEFAULT_TOKEN_SECRET: &str = "secret";
const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;
const DEFAULT_PROTECTION_WINDOW_MS: u64 = 30_000;
const DEFAULT_HAND_SIZE: usize = 6;
const DEFAULT_DECK_SIZE: usize = 18;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    token_secret: String,
    token_ttl: Duration,
    protection_window: Duration,
    hand_size: usize,
    deck: Vec<String>,
    narrator_policy: NarratorPolicy,
    allow_unverified_sockets: bool,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to
    /// built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        deck = config.deck.len(),
                        "loaded configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        if config.allow_unverified_sockets {
            warn!("unverified WebSocket connections are enabled; never use this in production");
        }

        config
    }

    /// Secret used to sign and verify session credentials.
    pub fn token_secret(&self) -> &str {
        &self.token_secret
    }

    /// Lifetime of issued session credentials.
    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    /// Duration of the protected-creation window armed at session creation.
    pub fn protection_window(&self) -> Duration {
        self.protection_window
    }

    /// Narrator selection policy applied when a round starts.
    pub fn narrator_policy(&self) -> NarratorPolicy {
        self.narrator_policy
    }

    /// Whether WebSocket handshakes without a valid credential are accepted.
    ///
    /// Development-mode bypass only; defaults to false and is never enabled
    /// implicitly.
    pub fn allow_unverified_sockets(&self) -> bool {
        self.allow_unverified_sockets
    }

    /// Builder-style override for the protection window.
    pub fn with_protection_window(mut self, window: Duration) -> Self {
        self.protection_window = window;
        self
    }

    /// Builder-style override for the unverified-socket bypass.
    pub fn with_unverified_sockets(mut self, allow: bool) -> Self {
        self.allow_unverified_sockets = allow;
        self
    }

    /// Draw a shuffled hand of opaque card identifiers from the deck.
    pub fn draw_hand(&self) -> Vec<String> {
        let mut cards = self.deck.clone();
        let mut rng = rand::rng();
        cards.shuffle(&mut rng);
        cards.truncate(self.hand_size);
        cards
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            token_secret: token_secret_from_env().unwrap_or_else(|| DEFAULT_TOKEN_SECRET.into()),
            token_ttl: Duration::from_secs(DEFAULT_TOKEN_TTL_SECS),
            protection_window: Duration::from_millis(DEFAULT_PROTECTION_WINDOW_MS),
            hand_size: DEFAULT_HAND_SIZE,
            deck: default_deck(),
            narrator_policy: NarratorPolicy::default(),
            allow_unverified_sockets: false,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at
/// [`DEFAULT_CONFIG_PATH`]. Every field is optional.
struct RawConfig {
    token_secret: Option<String>,
    token_ttl_secs: Option<u64>,
    protection_window_ms: Option<u64>,
    hand_size: Option<usize>,
    deck: Option<Vec<String>>,
    narrator_policy: Option<NarratorPolicy>,
    allow_unverified_sockets: Option<bool>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            // The environment always wins over the file for the secret.
            token_secret: token_secret_from_env()
                .or(raw.token_secret)
                .unwrap_or(defaults.token_secret),
            token_ttl: raw
                .token_ttl_secs
                .map_or(defaults.token_ttl, Duration::from_secs),
            protection_window: raw
                .protection_window_ms
                .map_or(defaults.protection_window, Duration::from_millis),
            hand_size: raw.hand_size.unwrap_or(defaults.hand_size),
            deck: raw.deck.unwrap_or(defaults.deck),
            narrator_policy: raw.narrator_policy.unwrap_or(defaults.narrator_policy),
            allow_unverified_sockets: raw
                .allow_unverified_sockets
                .unwrap_or(defaults.allow_unverified_sockets),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn token_secret_from_env() -> Option<String> {
    env::var(TOKEN_SECRET_ENV).ok().filter(|s| !s.is_empty())
}

/// Built-in deck shipped with the binary.
fn default_deck() -> Vec<String> {
    (1..=DEFAULT_DECK_SIZE)
        .map(|index| format!("card-{index:03}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_safe() {
        let config = AppConfig::default();
        assert!(!config.allow_unverified_sockets());
        assert_eq!(config.protection_window(), Duration::from_millis(30_000));
        assert_eq!(config.narrator_policy(), NarratorPolicy::Random);
    }

    #[test]
    fn drawn_hand_has_configured_size_and_unique_cards() {
        let config = AppConfig::default();
        let hand = config.draw_hand();
        assert_eq!(hand.len(), DEFAULT_HAND_SIZE);

        let mut deduped = hand.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), hand.len());
    }

    #[test]
    fn raw_config_overrides_apply() {
        let raw: RawConfig = serde_json::from_str(
            r#"{
                "protection_window_ms": 1000,
                "hand_size": 3,
                "narrator_policy": "rotation",
                "deck": ["a", "b", "c", "d"]
            }"#,
        )
        .unwrap();
        let config: AppConfig = raw.into();

        assert_eq!(config.protection_window(), Duration::from_millis(1000));
        assert_eq!(config.draw_hand().len(), 3);
        assert_eq!(config.narrator_policy(), NarratorPolicy::Rotation);
    }
}
