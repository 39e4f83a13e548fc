use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rand::seq::IndexedRandom;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::state::{rooms::RoomHub, session::GameSession};

/// Number of characters in a session code.
pub const CODE_LENGTH: usize = 6;
/// Characters a session code is drawn from.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
/// Capacity of each session's room broadcast channel.
const ROOM_CAPACITY: usize = 32;

/// Handle to one live session: its room hub plus the lock that serializes
/// every mutation against the session.
pub struct SessionHandle {
    /// The session code this handle is registered under.
    pub code: String,
    /// Broadcast hub for the session's room.
    pub room: RoomHub,
    /// The session state. All mutating operations (join, leave, round and
    /// submission handling) must run under this lock, and broadcasts are
    /// published before it is released.
    pub session: Mutex<GameSession>,
}

/// Outcome of asking the registry to retire a session.
#[derive(Debug, PartialEq, Eq)]
pub enum RetireOutcome {
    /// The session was removed from the registry.
    Retired,
    /// The protection window is still active; the request was refused.
    Protected,
    /// No session is registered under the code.
    NotFound,
}

/// Owns the set of live sessions keyed by session code.
///
/// The map itself is only locked for insert/lookup/delete; session
/// internals are guarded by each handle's own mutex.
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<SessionHandle>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Create a fresh session under a code not currently in use.
    ///
    /// Code collisions are retried internally and never surfaced.
    pub fn create_session(&self) -> Arc<SessionHandle> {
        loop {
            let code = generate_code();
            match self.sessions.entry(code.clone()) {
                Entry::Occupied(_) => {
                    debug!(%code, "session code collision; retrying");
                    continue;
                }
                Entry::Vacant(slot) => {
                    let handle = Arc::new(SessionHandle {
                        code: code.clone(),
                        room: RoomHub::new(ROOM_CAPACITY),
                        session: Mutex::new(GameSession::new(code.clone())),
                    });
                    slot.insert(handle.clone());
                    info!(%code, "session created");
                    return handle;
                }
            }
        }
    }

    /// Resolve a code to its live session handle.
    pub fn resolve(&self, code: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.get(code).map(|entry| entry.value().clone())
    }

    /// Whether the session's protected-creation window is still active.
    pub async fn is_protected(&self, code: &str) -> bool {
        match self.resolve(code) {
            Some(handle) => handle.session.lock().await.is_protected(),
            None => false,
        }
    }

    /// Retire a session, refusing while its protection window is active.
    pub async fn retire(&self, code: &str) -> RetireOutcome {
        let Some(handle) = self.resolve(code) else {
            return RetireOutcome::NotFound;
        };

        if handle.session.lock().await.is_protected() {
            info!(%code, "retire refused: session is inside its protection window");
            return RetireOutcome::Protected;
        }

        if self.sessions.remove(code).is_some() {
            info!(%code, "session retired");
            RetireOutcome::Retired
        } else {
            RetireOutcome::NotFound
        }
    }

    /// Remove a session from the map without the protection check.
    ///
    /// For callers that already hold the session lock and have made the
    /// teardown decision themselves (the last-player-leaves path).
    pub fn remove(&self, code: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.remove(code).map(|(_, handle)| handle)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is currently registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a random session code from the uppercase alphanumeric alphabet.
fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| {
            let byte = CODE_ALPHABET
                .choose(&mut rng)
                .copied()
                .unwrap_or(b'A');
            byte as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn generated_codes_are_uppercase_alphanumeric() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(
                code.chars()
                    .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
            );
        }
    }

    #[tokio::test]
    async fn create_then_resolve_returns_lobby_session() {
        let registry = SessionRegistry::new();
        let handle = registry.create_session();

        let resolved = registry.resolve(&handle.code).unwrap();
        let session = resolved.session.lock().await;
        assert_eq!(session.code, handle.code);
        assert!(session.players.is_empty());
    }

    #[tokio::test]
    async fn retire_refused_while_protected() {
        let registry = SessionRegistry::new();
        let handle = registry.create_session();
        handle
            .session
            .lock()
            .await
            .arm_protection(Duration::from_secs(3600));

        assert_eq!(registry.retire(&handle.code).await, RetireOutcome::Protected);
        assert!(registry.resolve(&handle.code).is_some());
    }

    #[tokio::test]
    async fn retire_removes_unprotected_session() {
        let registry = SessionRegistry::new();
        let handle = registry.create_session();

        assert_eq!(registry.retire(&handle.code).await, RetireOutcome::Retired);
        assert!(registry.resolve(&handle.code).is_none());
        assert_eq!(registry.retire(&handle.code).await, RetireOutcome::NotFound);
    }
}
