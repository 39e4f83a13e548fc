use std::time::{Duration, Instant, SystemTime};

use indexmap::IndexMap;
use rand::seq::IndexedRandom;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::state::state_machine::{InvalidTransition, RoundStatus, Stage, StageEvent};

/// Player info tracked during a game session.
#[derive(Debug, Clone)]
pub struct Player {
    /// Stable identifier for the player.
    pub id: Uuid,
    /// Display name chosen at join time.
    pub name: String,
    /// Current score for the player.
    pub score: i32,
    /// Whether this player is the session host. Exactly one player holds
    /// this flag while the session is non-empty.
    pub is_host: bool,
    /// Ordered hand of opaque card identifiers drawn at join time.
    pub hand: Vec<String>,
}

/// One narrator-led cycle within a session.
///
/// Closed rounds (status [`RoundStatus::Revealed`]) are retained for
/// history and never mutated again.
#[derive(Debug, Clone)]
pub struct Round {
    /// Stable identifier for the round.
    pub id: Uuid,
    /// Sequential round number, strictly increasing from 1.
    pub number: u32,
    /// Lifecycle status of this round.
    pub status: RoundStatus,
    /// The player who supplies the clue and does not submit a card.
    pub narrator_id: Uuid,
    /// Clue text, absent until the narrator submits it.
    pub clue: Option<String>,
    /// Card submissions keyed by player id. Working state for the current
    /// round only; reset when the clue is recorded and never persisted.
    pub submissions: IndexMap<Uuid, String>,
}

/// How the narrator is selected when a round starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarratorPolicy {
    /// Uniformly at random among current members (observed behavior).
    #[default]
    Random,
    /// The roster member after the previous narrator, wrapping around.
    Rotation,
}

/// Errors raised by session-level operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The requested stage change is not legal from the current stage.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    /// A round cannot start without at least one player.
    #[error("cannot start a round without players")]
    NoPlayers,
    /// The session has no round in progress.
    #[error("session has no active round")]
    NoActiveRound,
    /// The acting player is not a member of the session.
    #[error("player `{0}` is not a member of this session")]
    UnknownPlayer(Uuid),
    /// Someone other than the narrator tried to submit the clue.
    #[error("only the narrator may submit the clue")]
    NotNarrator,
    /// The narrator tried to submit a card.
    #[error("the narrator cannot submit a card")]
    NarratorCannotSubmit,
    /// The player already has a recorded submission for this round.
    #[error("player `{0}` already submitted a card this round")]
    DuplicateSubmission(Uuid),
    /// A card was submitted outside of the submit stage.
    #[error("cards can only be submitted during the submit stage")]
    SubmissionsClosed,
}

/// Result of removing a player from a session.
#[derive(Debug)]
pub enum Removal {
    /// The player id was not a member; leave is idempotent, so this is not
    /// an error.
    NotMember,
    /// The player was removed.
    Removed {
        /// The removed player.
        player: Player,
        /// Player promoted to host, when the departing player held it and
        /// members remain.
        new_host: Option<Uuid>,
        /// True when the departing player narrated a still-open round; the
        /// round was closed and the session returned to the lobby.
        round_aborted: bool,
    },
}

/// Progress of the submission set after recording a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionProgress {
    /// Number of submissions recorded for the current round.
    pub submitted: usize,
    /// Submissions required before the vote opens, recomputed at check
    /// time from the current member count.
    pub required: usize,
    /// True when the session just advanced to the vote stage.
    pub advanced: bool,
}

/// Aggregated state for one running game instance, addressed by code.
#[derive(Debug, Clone)]
pub struct GameSession {
    /// Primary key of the session.
    pub id: Uuid,
    /// Human-shareable session code.
    pub code: String,
    /// Current stage of the session.
    pub stage: Stage,
    /// Ordered roster of members keyed by player id.
    pub players: IndexMap<Uuid, Player>,
    /// Every round played so far; the last entry is the current round.
    pub rounds: Vec<Round>,
    /// Creation timestamp for auditing/debugging.
    pub created_at: SystemTime,
    /// While set and in the future, automatic empty-session teardown is
    /// suppressed.
    pub protected_until: Option<Instant>,
}

impl GameSession {
    /// Build a fresh session in the lobby stage with an empty roster.
    pub fn new(code: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            code,
            stage: Stage::Lobby,
            players: IndexMap::new(),
            rounds: Vec::new(),
            created_at: SystemTime::now(),
            protected_until: None,
        }
    }

    /// Arm the protected-creation window for `window` from now.
    ///
    /// The window is a one-shot expiring marker; it is not renewable and is
    /// not tied to any particular player.
    pub fn arm_protection(&mut self, window: Duration) {
        self.protected_until = Some(Instant::now() + window);
    }

    /// Whether the protection window is still active.
    pub fn is_protected(&self) -> bool {
        self.protected_until
            .is_some_and(|until| Instant::now() < until)
    }

    /// Add a new member with a freshly drawn hand.
    ///
    /// The first player to join an empty roster becomes host.
    pub fn add_player(&mut self, name: String, hand: Vec<String>) -> &Player {
        let player = Player {
            id: Uuid::new_v4(),
            name,
            score: 0,
            is_host: self.players.is_empty(),
            hand,
        };
        let id = player.id;
        self.players.insert(id, player);
        &self.players[&id]
    }

    /// Look up a member by display name (socket rejoin path).
    pub fn player_by_name(&self, name: &str) -> Option<&Player> {
        self.players.values().find(|player| player.name == name)
    }

    /// Remove a member, migrating the host flag and closing a round left
    /// without its narrator.
    ///
    /// Removing an id that is not a member is a no-op so clients can retry
    /// a leave safely.
    pub fn remove_player(&mut self, player_id: Uuid) -> Removal {
        let Some(player) = self.players.shift_remove(&player_id) else {
            return Removal::NotMember;
        };

        let mut new_host = None;
        if player.is_host {
            if let Some(next) = self.players.values_mut().next() {
                next.is_host = true;
                new_host = Some(next.id);
            }
        }

        // A round cannot outlive its narrator: close it and fall back to
        // the lobby so the remaining players can start over.
        let mut round_aborted = false;
        if let Some(round) = self.rounds.last_mut() {
            if round.narrator_id == player_id && round.status != RoundStatus::Revealed {
                round.status = RoundStatus::Revealed;
                self.stage = Stage::Lobby;
                round_aborted = true;
            }
        }

        Removal::Removed {
            player,
            new_host,
            round_aborted,
        }
    }

    /// The round with the highest number, if any.
    pub fn current_round(&self) -> Option<&Round> {
        self.rounds.last()
    }

    /// Mutable access to the current round.
    pub fn current_round_mut(&mut self) -> Option<&mut Round> {
        self.rounds.last_mut()
    }

    /// Start a new round: close the previous one, pick a narrator, and move
    /// to the clue stage.
    pub fn start_round(&mut self, policy: NarratorPolicy) -> Result<&Round, SessionError> {
        let next_stage = self.stage.transition(StageEvent::StartRound)?;
        if self.players.is_empty() {
            return Err(SessionError::NoPlayers);
        }

        let narrator_id = self.choose_narrator(policy);

        if let Some(previous) = self.rounds.last_mut() {
            if previous.status != RoundStatus::Revealed {
                previous.status = RoundStatus::Revealed;
            }
        }

        let number = self.rounds.last().map_or(1, |round| round.number + 1);
        self.rounds.push(Round {
            id: Uuid::new_v4(),
            number,
            status: RoundStatus::Pending,
            narrator_id,
            clue: None,
            submissions: IndexMap::new(),
        });
        self.stage = next_stage;

        Ok(self.rounds.last().unwrap_or_else(|| unreachable!()))
    }

    /// Record the narrator's clue and open card submissions.
    pub fn submit_clue(&mut self, player_id: Uuid, clue: String) -> Result<(), SessionError> {
        let next_stage = self.stage.transition(StageEvent::ClueSubmitted)?;
        let round = self
            .rounds
            .last_mut()
            .ok_or(SessionError::NoActiveRound)?;

        if round.narrator_id != player_id {
            return Err(SessionError::NotNarrator);
        }

        round.clue = Some(clue);
        round.status = RoundStatus::ClueSubmitted;
        // A new submission window always starts empty.
        round.submissions.clear();
        self.stage = next_stage;

        Ok(())
    }

    /// Record a card submission and advance to the vote stage once every
    /// non-narrator member has submitted.
    ///
    /// The required count is recomputed here from the current member count,
    /// not cached at round start, so membership changes mid-round move the
    /// threshold.
    pub fn submit_card(
        &mut self,
        player_id: Uuid,
        card_id: String,
    ) -> Result<SubmissionProgress, SessionError> {
        if self.stage != Stage::Submit {
            return Err(SessionError::SubmissionsClosed);
        }
        if !self.players.contains_key(&player_id) {
            return Err(SessionError::UnknownPlayer(player_id));
        }

        let member_count = self.players.len();
        let round = self
            .rounds
            .last_mut()
            .ok_or(SessionError::NoActiveRound)?;

        if round.narrator_id == player_id {
            return Err(SessionError::NarratorCannotSubmit);
        }
        if round.submissions.contains_key(&player_id) {
            return Err(SessionError::DuplicateSubmission(player_id));
        }

        round.submissions.insert(player_id, card_id.clone());

        // Playing a card consumes it from the player's hand.
        if let Some(player) = self.players.get_mut(&player_id) {
            player.hand.retain(|card| card != &card_id);
        }

        Ok(self.complete_submissions(member_count))
    }

    /// Re-run the completion check against the current member count.
    ///
    /// Called after a leave during the submit stage so a departure lowering
    /// the threshold cannot leave the round stalled.
    pub fn recheck_submissions(&mut self) -> Option<SubmissionProgress> {
        if self.stage != Stage::Submit {
            return None;
        }
        let member_count = self.players.len();
        let progress = self.complete_submissions(member_count);
        Some(progress)
    }

    fn complete_submissions(&mut self, member_count: usize) -> SubmissionProgress {
        let round = match self.rounds.last_mut() {
            Some(round) => round,
            None => {
                return SubmissionProgress {
                    submitted: 0,
                    required: 0,
                    advanced: false,
                };
            }
        };

        let required = member_count.saturating_sub(1);
        let submitted = round.submissions.len();

        let advanced = submitted >= required
            && self.stage == Stage::Submit
            && round.status == RoundStatus::ClueSubmitted;
        if advanced {
            round.status = RoundStatus::Voting;
            self.stage = Stage::Vote;
        }

        SubmissionProgress {
            submitted,
            required,
            advanced,
        }
    }

    fn choose_narrator(&self, policy: NarratorPolicy) -> Uuid {
        let ids: Vec<Uuid> = self.players.keys().copied().collect();
        match policy {
            NarratorPolicy::Random => {
                let mut rng = rand::rng();
                *ids.choose(&mut rng).unwrap_or_else(|| unreachable!())
            }
            NarratorPolicy::Rotation => {
                let previous = self.rounds.last().map(|round| round.narrator_id);
                let next_index = previous
                    .and_then(|id| ids.iter().position(|candidate| *candidate == id))
                    .map_or(0, |index| (index + 1) % ids.len());
                ids[next_index]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with(names: &[&str]) -> GameSession {
        let mut session = GameSession::new("A1B2C3".into());
        for name in names {
            session.add_player((*name).into(), vec!["c1".into(), "c2".into()]);
        }
        session
    }

    fn player_id(session: &GameSession, name: &str) -> Uuid {
        session.player_by_name(name).unwrap().id
    }

    #[test]
    fn first_player_becomes_host() {
        let session = session_with(&["Alice", "Bob"]);
        assert!(session.player_by_name("Alice").unwrap().is_host);
        assert!(!session.player_by_name("Bob").unwrap().is_host);
    }

    #[test]
    fn host_migrates_to_first_remaining_player() {
        let mut session = session_with(&["Alice", "Bob", "Carol"]);
        let alice = player_id(&session, "Alice");
        let bob = player_id(&session, "Bob");

        match session.remove_player(alice) {
            Removal::Removed { new_host, .. } => assert_eq!(new_host, Some(bob)),
            other => panic!("unexpected removal outcome: {other:?}"),
        }

        let hosts: Vec<_> = session.players.values().filter(|p| p.is_host).collect();
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].id, bob);
    }

    #[test]
    fn removing_unknown_player_is_noop() {
        let mut session = session_with(&["Alice"]);
        assert!(matches!(
            session.remove_player(Uuid::new_v4()),
            Removal::NotMember
        ));
        assert_eq!(session.players.len(), 1);
    }

    #[test]
    fn start_round_assigns_member_narrator() {
        let mut session = session_with(&["Alice", "Bob"]);
        let round = session.start_round(NarratorPolicy::Random).unwrap();
        let narrator = round.narrator_id;
        assert_eq!(round.number, 1);
        assert_eq!(round.status, RoundStatus::Pending);
        assert!(session.players.contains_key(&narrator));
        assert_eq!(session.stage, Stage::Clue);
    }

    #[test]
    fn start_round_requires_players() {
        let mut session = GameSession::new("A1B2C3".into());
        assert_eq!(
            session.start_round(NarratorPolicy::Random).unwrap_err(),
            SessionError::NoPlayers
        );
    }

    #[test]
    fn rotation_policy_walks_the_roster() {
        let mut session = session_with(&["Alice", "Bob"]);
        let first = session
            .start_round(NarratorPolicy::Rotation)
            .unwrap()
            .narrator_id;
        assert_eq!(first, player_id(&session, "Alice"));

        let narrator = first;
        session.submit_clue(narrator, "clue".into()).unwrap();
        let other = player_id(&session, "Bob");
        session.submit_card(other, "c1".into()).unwrap();
        assert_eq!(session.stage, Stage::Vote);

        let second = session
            .start_round(NarratorPolicy::Rotation)
            .unwrap()
            .narrator_id;
        assert_eq!(second, player_id(&session, "Bob"));
    }

    #[test]
    fn only_narrator_submits_clue() {
        let mut session = session_with(&["Alice", "Bob"]);
        let round = session.start_round(NarratorPolicy::Rotation).unwrap();
        let narrator = round.narrator_id;
        let other = session
            .players
            .keys()
            .copied()
            .find(|id| *id != narrator)
            .unwrap();

        assert_eq!(
            session.submit_clue(other, "it flies".into()).unwrap_err(),
            SessionError::NotNarrator
        );

        session.submit_clue(narrator, "it flies".into()).unwrap();
        assert_eq!(session.stage, Stage::Submit);
        let round = session.current_round().unwrap();
        assert_eq!(round.status, RoundStatus::ClueSubmitted);
        assert_eq!(round.clue.as_deref(), Some("it flies"));
    }

    #[test]
    fn narrator_cannot_submit_card_and_duplicates_conflict() {
        let mut session = session_with(&["Alice", "Bob", "Carol"]);
        let narrator = session
            .start_round(NarratorPolicy::Rotation)
            .unwrap()
            .narrator_id;
        session.submit_clue(narrator, "clue".into()).unwrap();

        assert_eq!(
            session.submit_card(narrator, "c1".into()).unwrap_err(),
            SessionError::NarratorCannotSubmit
        );

        let others: Vec<Uuid> = session
            .players
            .keys()
            .copied()
            .filter(|id| *id != narrator)
            .collect();

        let progress = session.submit_card(others[0], "c1".into()).unwrap();
        assert_eq!(progress.submitted, 1);
        assert_eq!(progress.required, 2);
        assert!(!progress.advanced);

        assert_eq!(
            session.submit_card(others[0], "c2".into()).unwrap_err(),
            SessionError::DuplicateSubmission(others[0])
        );

        let progress = session.submit_card(others[1], "c1".into()).unwrap();
        assert!(progress.advanced);
        assert_eq!(session.stage, Stage::Vote);
        assert_eq!(
            session.current_round().unwrap().status,
            RoundStatus::Voting
        );
    }

    #[test]
    fn submitting_a_card_consumes_it_from_the_hand() {
        let mut session = session_with(&["Alice", "Bob"]);
        let narrator = session
            .start_round(NarratorPolicy::Rotation)
            .unwrap()
            .narrator_id;
        session.submit_clue(narrator, "clue".into()).unwrap();

        let other = player_id(&session, "Bob");
        session.submit_card(other, "c1".into()).unwrap();
        assert_eq!(session.players[&other].hand, vec!["c2".to_string()]);
    }

    #[test]
    fn card_submission_outside_submit_stage_is_rejected() {
        let mut session = session_with(&["Alice", "Bob"]);
        let alice = player_id(&session, "Alice");
        assert_eq!(
            session.submit_card(alice, "c1".into()).unwrap_err(),
            SessionError::SubmissionsClosed
        );
    }

    #[test]
    fn leave_during_submit_can_complete_the_round() {
        let mut session = session_with(&["Alice", "Bob", "Carol"]);
        let narrator = session
            .start_round(NarratorPolicy::Rotation)
            .unwrap()
            .narrator_id;
        session.submit_clue(narrator, "clue".into()).unwrap();

        let others: Vec<Uuid> = session
            .players
            .keys()
            .copied()
            .filter(|id| *id != narrator)
            .collect();
        session.submit_card(others[0], "c1".into()).unwrap();

        // The second non-narrator leaves before submitting; the threshold
        // drops and the recheck must advance the stage.
        session.remove_player(others[1]);
        let progress = session.recheck_submissions().unwrap();
        assert!(progress.advanced);
        assert_eq!(session.stage, Stage::Vote);
    }

    #[test]
    fn narrator_leaving_aborts_the_open_round() {
        let mut session = session_with(&["Alice", "Bob"]);
        let narrator = session
            .start_round(NarratorPolicy::Rotation)
            .unwrap()
            .narrator_id;

        match session.remove_player(narrator) {
            Removal::Removed { round_aborted, .. } => assert!(round_aborted),
            other => panic!("unexpected removal outcome: {other:?}"),
        }
        assert_eq!(session.stage, Stage::Lobby);
        assert_eq!(
            session.current_round().unwrap().status,
            RoundStatus::Revealed
        );
    }

    #[test]
    fn next_round_starts_with_fresh_submissions() {
        let mut session = session_with(&["Alice", "Bob"]);
        let narrator = session
            .start_round(NarratorPolicy::Rotation)
            .unwrap()
            .narrator_id;
        session.submit_clue(narrator, "clue".into()).unwrap();
        let other = player_id(&session, "Bob");
        session.submit_card(other, "c1".into()).unwrap();
        assert_eq!(session.stage, Stage::Vote);

        let round = session.start_round(NarratorPolicy::Rotation).unwrap();
        assert_eq!(round.number, 2);
        assert!(round.submissions.is_empty());
        assert_eq!(session.rounds[0].status, RoundStatus::Revealed);
    }

    #[test]
    fn protection_window_expires() {
        let mut session = GameSession::new("A1B2C3".into());
        assert!(!session.is_protected());

        session.arm_protection(Duration::from_secs(3600));
        assert!(session.is_protected());

        session.arm_protection(Duration::ZERO);
        assert!(!session.is_protected());
    }
}
