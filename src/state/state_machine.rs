use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// High-level stage a session can be in.
///
/// A session starts in [`Stage::Lobby`] and cycles through
/// `Clue -> Submit -> Vote` once per round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Players are gathering; no round has started yet.
    Lobby,
    /// The narrator is composing the clue for the current round.
    Clue,
    /// Non-narrator players are submitting cards.
    Submit,
    /// Everyone is voting on the submitted cards.
    Vote,
}

/// Lifecycle status of a single round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    /// Round created, waiting for the narrator's clue.
    Pending,
    /// Clue recorded; card submissions are open.
    ClueSubmitted,
    /// All cards are in; votes are being cast.
    Voting,
    /// Round is closed and retained for history only.
    Revealed,
}

/// Events that can be applied to a session's stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageEvent {
    /// Begin a new round (from the lobby or after a completed vote).
    StartRound,
    /// The narrator submitted the clue for the current round.
    ClueSubmitted,
    /// Every non-narrator player has submitted a card.
    AllSubmitted,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The stage the session was in when the invalid event was received.
    pub from: Stage,
    /// The event that cannot be applied from this stage.
    pub event: StageEvent,
}

impl Stage {
    /// Compute the stage reached by applying `event`, or reject it.
    ///
    /// Starting a round is legal from the lobby and from a completed vote;
    /// the latter is how the round counter keeps advancing between rounds.
    pub fn transition(self, event: StageEvent) -> Result<Stage, InvalidTransition> {
        let next = match (self, event) {
            (Stage::Lobby, StageEvent::StartRound) => Stage::Clue,
            (Stage::Vote, StageEvent::StartRound) => Stage::Clue,
            (Stage::Clue, StageEvent::ClueSubmitted) => Stage::Submit,
            (Stage::Submit, StageEvent::AllSubmitted) => Stage::Vote,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_happy_path_through_round() {
        assert_eq!(
            Stage::Lobby.transition(StageEvent::StartRound).unwrap(),
            Stage::Clue
        );
        assert_eq!(
            Stage::Clue.transition(StageEvent::ClueSubmitted).unwrap(),
            Stage::Submit
        );
        assert_eq!(
            Stage::Submit.transition(StageEvent::AllSubmitted).unwrap(),
            Stage::Vote
        );
        assert_eq!(
            Stage::Vote.transition(StageEvent::StartRound).unwrap(),
            Stage::Clue
        );
    }

    #[test]
    fn invalid_transition_returns_error() {
        let err = Stage::Lobby
            .transition(StageEvent::AllSubmitted)
            .unwrap_err();
        assert_eq!(err.from, Stage::Lobby);
        assert_eq!(err.event, StageEvent::AllSubmitted);
    }

    #[test]
    fn clue_cannot_be_submitted_twice() {
        let stage = Stage::Clue.transition(StageEvent::ClueSubmitted).unwrap();
        let err = stage.transition(StageEvent::ClueSubmitted).unwrap_err();
        assert_eq!(err.from, Stage::Submit);
    }

    #[test]
    fn round_cannot_start_mid_round() {
        assert!(Stage::Clue.transition(StageEvent::StartRound).is_err());
        assert!(Stage::Submit.transition(StageEvent::StartRound).is_err());
    }

    #[test]
    fn stage_names_serialize_snake_case() {
        assert_eq!(serde_json::to_string(&Stage::Lobby).unwrap(), "\"lobby\"");
        assert_eq!(
            serde_json::to_string(&RoundStatus::ClueSubmitted).unwrap(),
            "\"clue_submitted\""
        );
    }
}
