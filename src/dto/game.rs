use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::format_system_time,
    state::{
        session::{GameSession, Player, Round},
        state_machine::{RoundStatus, Stage},
    },
};

/// Payload used to create a brand-new session.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateGameRequest {
    /// Display name of the creating player (becomes host).
    #[validate(length(min = 3, max = 15))]
    pub player_name: String,
}

/// Payload used to join an existing session by code.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinGameRequest {
    /// Display name of the joining player.
    #[validate(length(min = 3, max = 15))]
    pub player_name: String,
}

/// Payload carrying the narrator's clue.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitClueRequest {
    /// Clue text for the current round.
    #[validate(length(min = 1, max = 200))]
    pub clue: String,
}

/// Payload carrying a card submission.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitCardRequest {
    /// Opaque identifier of the submitted card.
    #[validate(length(min = 1, max = 64))]
    pub card_id: String,
}

/// Public projection of a player.
///
/// `hand` is only present when the summary is rendered for that player;
/// nobody ever sees another player's hand.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerSummary {
    /// Player identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Current score.
    pub score: i32,
    /// Whether this player is the session host.
    pub is_host: bool,
    /// The viewer's own hand, omitted for everyone else.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hand: Option<Vec<String>>,
}

/// One card submission as exposed once the vote opens.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubmissionSummary {
    /// Submitting player.
    pub player_id: Uuid,
    /// Submitted card identifier.
    pub card_id: String,
}

/// Public projection of a round.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoundSummary {
    /// Round identifier.
    pub id: Uuid,
    /// Sequential round number.
    pub number: u32,
    /// Lifecycle status.
    pub status: RoundStatus,
    /// The round's narrator.
    pub narrator_id: Uuid,
    /// Clue text once the narrator submitted it.
    pub clue: Option<String>,
    /// Number of card submissions recorded so far.
    pub submission_count: usize,
    /// The full submission set, revealed only once the vote is open.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submissions: Option<Vec<SubmissionSummary>>,
}

/// Public projection of a whole session, rendered for one viewer.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameSummary {
    /// Session identifier.
    pub id: Uuid,
    /// Human-shareable session code.
    pub code: String,
    /// Current stage.
    pub stage: Stage,
    /// Creation timestamp (RFC3339).
    pub created_at: String,
    /// Whether the protected-creation window is still active.
    pub protected: bool,
    /// Ordered roster.
    pub players: Vec<PlayerSummary>,
    /// Every round played so far; the last entry is the current round.
    pub rounds: Vec<RoundSummary>,
}

/// Response returned when a session has been created.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateGameResponse {
    /// The freshly created session, rendered for the creating player.
    pub game: GameSummary,
    /// Identifier of the creating player.
    pub player_id: Uuid,
    /// Credential to present on subsequent protected actions.
    pub token: String,
}

/// Response returned when a player has joined a session.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinGameResponse {
    /// The session after the join, rendered for the new player.
    pub game: GameSummary,
    /// Identifier of the new player.
    pub player_id: Uuid,
    /// Credential to present on subsequent protected actions.
    pub token: String,
}

impl PlayerSummary {
    fn render(player: &Player, viewer: Option<Uuid>) -> Self {
        let own = viewer == Some(player.id);
        Self {
            id: player.id,
            name: player.name.clone(),
            score: player.score,
            is_host: player.is_host,
            hand: own.then(|| player.hand.clone()),
        }
    }
}

impl From<&Round> for RoundSummary {
    fn from(round: &Round) -> Self {
        let submissions = matches!(round.status, RoundStatus::Voting | RoundStatus::Revealed)
            .then(|| {
                round
                    .submissions
                    .iter()
                    .map(|(player_id, card_id)| SubmissionSummary {
                        player_id: *player_id,
                        card_id: card_id.clone(),
                    })
                    .collect()
            });

        Self {
            id: round.id,
            number: round.number,
            status: round.status,
            narrator_id: round.narrator_id,
            clue: round.clue.clone(),
            submission_count: round.submissions.len(),
            submissions,
        }
    }
}

impl GameSummary {
    /// Render a session for `viewer`; pass `None` for broadcasts so no hand
    /// is ever leaked to the room.
    pub fn render(session: &GameSession, viewer: Option<Uuid>) -> Self {
        Self {
            id: session.id,
            code: session.code.clone(),
            stage: session.stage,
            created_at: format_system_time(session.created_at),
            protected: session.is_protected(),
            players: session
                .players
                .values()
                .map(|player| PlayerSummary::render(player, viewer))
                .collect(),
            rounds: session.rounds.iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_viewer_sees_their_hand() {
        let mut session = GameSession::new("A1B2C3".into());
        session.add_player("Alice".into(), vec!["c1".into()]);
        session.add_player("Bob".into(), vec!["c2".into()]);
        let alice = session.player_by_name("Alice").unwrap().id;

        let summary = GameSummary::render(&session, Some(alice));
        let hands: Vec<_> = summary
            .players
            .iter()
            .map(|player| player.hand.clone())
            .collect();
        assert_eq!(hands[0], Some(vec!["c1".to_string()]));
        assert_eq!(hands[1], None);

        let broadcast = GameSummary::render(&session, None);
        assert!(broadcast.players.iter().all(|player| player.hand.is_none()));
    }

    #[test]
    fn submissions_hidden_until_vote_opens() {
        use crate::state::session::NarratorPolicy;

        let mut session = GameSession::new("A1B2C3".into());
        session.add_player("Alice".into(), vec!["c1".into()]);
        session.add_player("Bob".into(), vec!["c2".into()]);
        let narrator = session
            .start_round(NarratorPolicy::Rotation)
            .unwrap()
            .narrator_id;
        session.submit_clue(narrator, "clue".into()).unwrap();
        let bob = session.player_by_name("Bob").unwrap().id;

        let summary = GameSummary::render(&session, None);
        assert!(summary.rounds[0].submissions.is_none());

        session.submit_card(bob, "c2".into()).unwrap();
        let summary = GameSummary::render(&session, None);
        let submissions = summary.rounds[0].submissions.as_ref().unwrap();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].card_id, "c2");
    }
}
