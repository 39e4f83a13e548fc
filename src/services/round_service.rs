use tracing::info;
use uuid::Uuid;

use crate::{
    dto::game::GameSummary,
    error::ServiceError,
    services::{game_service, room_events},
    state::{SharedState, session::GameSession},
};

/// Start a new round, picking a narrator per the configured policy.
///
/// Legal from the lobby and from the vote stage; the latter is how a game
/// advances from one round to the next.
pub async fn start_round(
    state: &SharedState,
    code: &str,
    actor: Uuid,
) -> Result<GameSummary, ServiceError> {
    let handle = game_service::resolve(state, code)?;
    let mut session = handle.session.lock().await;

    ensure_member(&session, actor)?;
    let round_number = session.start_round(state.config().narrator_policy())?.number;
    game_service::persist_round_and_stage(state, &session).await?;

    room_events::broadcast_game_state(&handle.room, &session);
    info!(%code, round_number, "round started");

    Ok(GameSummary::render(&session, Some(actor)))
}

/// Record the narrator's clue and open card submissions.
pub async fn submit_clue(
    state: &SharedState,
    code: &str,
    actor: Uuid,
    clue: String,
) -> Result<GameSummary, ServiceError> {
    let handle = game_service::resolve(state, code)?;
    let mut session = handle.session.lock().await;

    ensure_member(&session, actor)?;
    session.submit_clue(actor, clue)?;
    game_service::persist_round_and_stage(state, &session).await?;

    room_events::broadcast_game_state(&handle.room, &session);
    info!(%code, narrator = %actor, "clue submitted; submissions open");

    Ok(GameSummary::render(&session, Some(actor)))
}

/// Record a card submission, advancing to the vote stage once every
/// non-narrator member has submitted.
pub async fn submit_card(
    state: &SharedState,
    code: &str,
    actor: Uuid,
    card_id: String,
) -> Result<GameSummary, ServiceError> {
    let handle = game_service::resolve(state, code)?;
    let mut session = handle.session.lock().await;

    let progress = session.submit_card(actor, card_id)?;
    if progress.advanced {
        game_service::persist_round_and_stage(state, &session).await?;
    }

    room_events::broadcast_game_state(&handle.room, &session);
    info!(
        %code,
        player = %actor,
        submitted = progress.submitted,
        required = progress.required,
        advanced = progress.advanced,
        "card submitted"
    );

    Ok(GameSummary::render(&session, Some(actor)))
}

fn ensure_member(session: &GameSession, actor: Uuid) -> Result<(), ServiceError> {
    if session.players.contains_key(&actor) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(
            "player is not a member of this session".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::memory::MemoryStore,
        dto::game::{CreateGameRequest, JoinGameRequest},
        state::{AppState, SharedState, state_machine::{RoundStatus, Stage}},
    };

    fn test_state() -> SharedState {
        AppState::new(AppConfig::default(), Arc::new(MemoryStore::new()))
    }

    async fn two_player_session(state: &SharedState) -> (String, Uuid, Uuid) {
        let created = game_service::create_game(
            state,
            CreateGameRequest {
                player_name: "Alice".into(),
            },
        )
        .await
        .unwrap();
        let code = created.game.code.clone();
        let joined = game_service::join_game(
            state,
            &code,
            JoinGameRequest {
                player_name: "Bob".into(),
            },
        )
        .await
        .unwrap();
        (code, created.player_id, joined.player_id)
    }

    #[tokio::test]
    async fn non_member_cannot_start_a_round() {
        let state = test_state();
        let (code, _, _) = two_player_session(&state).await;

        let result = start_round(&state, &code, Uuid::new_v4()).await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn round_cannot_start_twice() {
        let state = test_state();
        let (code, alice, _) = two_player_session(&state).await;

        start_round(&state, &code, alice).await.unwrap();
        let result = start_round(&state, &code, alice).await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn full_round_flow_reaches_the_vote() {
        let state = test_state();
        let (code, alice, bob) = two_player_session(&state).await;

        let handle = state.registry().resolve(&code).unwrap();
        let mut observer = handle.room.subscribe();

        let summary = start_round(&state, &code, alice).await.unwrap();
        assert_eq!(summary.stage, Stage::Clue);
        let narrator = summary.rounds[0].narrator_id;
        let guesser = if narrator == alice { bob } else { alice };

        // A guesser cannot supply the clue.
        let result = submit_clue(&state, &code, guesser, "it flies".into()).await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));

        let summary = submit_clue(&state, &code, narrator, "it flies".into())
            .await
            .unwrap();
        assert_eq!(summary.stage, Stage::Submit);
        assert_eq!(summary.rounds[0].clue.as_deref(), Some("it flies"));

        // With two members the single guesser completes the set.
        let card = {
            let session = handle.session.lock().await;
            session.players[&guesser].hand[0].clone()
        };
        let summary = submit_card(&state, &code, guesser, card.clone())
            .await
            .unwrap();
        assert_eq!(summary.stage, Stage::Vote);
        assert_eq!(summary.rounds[0].status, RoundStatus::Voting);
        let submissions = summary.rounds[0].submissions.as_ref().unwrap();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].card_id, card);

        // Submissions are closed once the vote is open.
        let result = submit_card(&state, &code, guesser, "another".into()).await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));

        // Every state change was broadcast, in order, with no hands leaked.
        let mut events = Vec::new();
        while let Ok(event) = observer.try_recv() {
            events.push(event);
        }
        assert_eq!(events.len(), 3);
        for event in &events {
            assert_eq!(event.event, "game.state");
            let players = event.data["players"].as_array().unwrap();
            assert!(players.iter().all(|player| player.get("hand").is_none()));
        }
        assert_eq!(events[2].data["stage"], "vote");
    }

    #[tokio::test]
    async fn vote_stage_advances_into_the_next_round() {
        let state = test_state();
        let (code, alice, bob) = two_player_session(&state).await;

        let summary = start_round(&state, &code, alice).await.unwrap();
        let narrator = summary.rounds[0].narrator_id;
        let guesser = if narrator == alice { bob } else { alice };
        submit_clue(&state, &code, narrator, "clue".into())
            .await
            .unwrap();
        let card = {
            let handle = state.registry().resolve(&code).unwrap();
            let session = handle.session.lock().await;
            session.players[&guesser].hand[0].clone()
        };
        submit_card(&state, &code, guesser, card).await.unwrap();

        let summary = start_round(&state, &code, bob).await.unwrap();
        assert_eq!(summary.stage, Stage::Clue);
        assert_eq!(summary.rounds.len(), 2);
        assert_eq!(summary.rounds[0].status, RoundStatus::Revealed);
        assert_eq!(summary.rounds[1].number, 2);
    }
}
