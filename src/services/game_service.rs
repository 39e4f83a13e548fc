use std::sync::Arc;

use tokio::time::sleep;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::models::{GameEntity, PlayerEntity, RoundEntity},
    dto::game::{
        CreateGameRequest, CreateGameResponse, GameSummary, JoinGameRequest, JoinGameResponse,
        PlayerSummary,
    },
    error::ServiceError,
    services::{auth_service, room_events},
    state::{
        SharedState,
        registry::{RetireOutcome, SessionHandle},
        session::{GameSession, Removal},
        state_machine::Stage,
    },
};

/// Outcome of a leave operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The player id was not a member (or the session is already gone);
    /// leave is idempotent, so nothing happened.
    NoOp,
    /// The player left; the session lives on.
    Left,
    /// The player was the last member and the session was retired.
    SessionClosed,
}

/// Create a fresh session with the requesting player as host.
///
/// The protection window is armed before the response is returned so a
/// disconnect racing with the creator's socket join cannot tear the
/// session down.
pub async fn create_game(
    state: &SharedState,
    request: CreateGameRequest,
) -> Result<CreateGameResponse, ServiceError> {
    let handle = state.registry().create_session();
    let store = state.store();

    let mut session = handle.session.lock().await;
    session.arm_protection(state.config().protection_window());

    let hand = state.config().draw_hand();
    let player_id = session.add_player(request.player_name, hand).id;

    let game_entity = GameEntity::from(&*session);
    let player_entity = PlayerEntity::from_player(session.id, &session.players[&player_id]);

    let persisted = async {
        store.save_game(game_entity).await?;
        store.save_player(player_entity).await?;
        Ok::<(), ServiceError>(())
    }
    .await;

    if let Err(err) = persisted {
        // Abort the creation entirely; the code was never shared.
        let code = session.code.clone();
        drop(session);
        state.registry().remove(&code);
        return Err(err);
    }

    let token = auth_service::sign(state.config(), player_id, session.id, &session.code)?;
    let game = GameSummary::render(&session, Some(player_id));

    info!(code = %session.code, %player_id, "session created with host player");
    drop(session);

    spawn_protection_expiry(state.clone(), handle.code.clone());

    Ok(CreateGameResponse {
        game,
        player_id,
        token,
    })
}

/// Join a session by code, always creating a new player record.
///
/// This is the HTTP join path; the socket path with a player name goes
/// through [`join_by_name`] instead and is idempotent.
pub async fn join_game(
    state: &SharedState,
    code: &str,
    request: JoinGameRequest,
) -> Result<JoinGameResponse, ServiceError> {
    let handle = resolve(state, code)?;
    let store = state.store();

    let mut session = handle.session.lock().await;

    let hand = state.config().draw_hand();
    let player_id = session.add_player(request.player_name, hand).id;

    let player_entity = PlayerEntity::from_player(session.id, &session.players[&player_id]);
    if let Err(err) = store.save_player(player_entity).await {
        session.remove_player(player_id);
        return Err(err.into());
    }

    let token = auth_service::sign(state.config(), player_id, session.id, &session.code)?;
    let game = GameSummary::render(&session, Some(player_id));

    room_events::broadcast_player_joined(
        &handle.room,
        player_summary_of(&session, player_id),
    );
    room_events::broadcast_game_state(&handle.room, &session);

    info!(%code, %player_id, "player joined session");

    Ok(JoinGameResponse {
        game,
        player_id,
        token,
    })
}

/// Socket-level membership bind: an existing player with the same display
/// name is treated as an idempotent rejoin, otherwise a new player is
/// created.
pub async fn join_by_name(
    state: &SharedState,
    code: &str,
    player_name: &str,
) -> Result<Uuid, ServiceError> {
    let handle = resolve(state, code)?;
    let store = state.store();

    let mut session = handle.session.lock().await;

    if let Some(existing) = session.player_by_name(player_name) {
        return Ok(existing.id);
    }

    let hand = state.config().draw_hand();
    let player_id = session.add_player(player_name.to_string(), hand).id;

    let player_entity = PlayerEntity::from_player(session.id, &session.players[&player_id]);
    if let Err(err) = store.save_player(player_entity).await {
        session.remove_player(player_id);
        return Err(err.into());
    }

    room_events::broadcast_player_joined(
        &handle.room,
        player_summary_of(&session, player_id),
    );
    room_events::broadcast_game_state(&handle.room, &session);

    info!(%code, %player_id, "player joined session via socket");

    Ok(player_id)
}

/// Fetch the current session state, rendered for `viewer`.
///
/// Each requester sees only their own hand.
pub async fn fetch_game(
    state: &SharedState,
    code: &str,
    viewer: Option<Uuid>,
) -> Result<GameSummary, ServiceError> {
    let handle = resolve(state, code)?;
    let session = handle.session.lock().await;
    Ok(GameSummary::render(&session, viewer))
}

/// Remove a player from a session.
///
/// Handles host migration, the narrator-left round abort, the mid-round
/// completion recheck, and last-player-leaves teardown. Idempotent: an
/// unknown player id or an already-retired session is a no-op.
pub async fn leave_game(
    state: &SharedState,
    code: &str,
    player_id: Uuid,
) -> Result<LeaveOutcome, ServiceError> {
    let Some(handle) = state.registry().resolve(code) else {
        return Ok(LeaveOutcome::NoOp);
    };
    let store = state.store();

    let mut session = handle.session.lock().await;

    // Stage the whole mutation on a copy; a store failure leaves the live
    // session untouched and nothing is broadcast.
    let mut staged = session.clone();
    let (new_host, round_aborted) = match staged.remove_player(player_id) {
        Removal::NotMember => return Ok(LeaveOutcome::NoOp),
        Removal::Removed {
            new_host,
            round_aborted,
            ..
        } => (new_host, round_aborted),
    };

    // A departure during the submit stage lowers the completion threshold;
    // re-run the check so the round cannot stall.
    let mut advanced = false;
    if !staged.players.is_empty() && staged.stage == Stage::Submit {
        if let Some(progress) = staged.recheck_submissions() {
            advanced = progress.advanced;
        }
    }

    store.delete_player(player_id).await?;
    if let Some(host_id) = new_host {
        let entity = PlayerEntity::from_player(staged.id, &staged.players[&host_id]);
        store.save_player(entity).await?;
    }
    if round_aborted || advanced {
        persist_round_and_stage(state, &staged).await?;
    }

    *session = staged;

    if session.players.is_empty() {
        if session.is_protected() {
            // The creator may still be connecting; keep the session alive
            // until the window lapses.
            info!(%code, "last player left but session is protected; retaining");
            return Ok(LeaveOutcome::Left);
        }

        let game_id = session.id;
        state.registry().remove(code);
        store.delete_game(game_id).await?;
        room_events::broadcast_session_closed(&handle.room, code);
        info!(%code, "last player left; session retired");
        return Ok(LeaveOutcome::SessionClosed);
    }

    room_events::broadcast_player_left(&handle.room, player_id, new_host);
    room_events::broadcast_game_state(&handle.room, &session);

    info!(%code, %player_id, "player left session");
    Ok(LeaveOutcome::Left)
}

/// Persist the current round and the session's stage after a transition.
pub(crate) async fn persist_round_and_stage(
    state: &SharedState,
    session: &GameSession,
) -> Result<(), ServiceError> {
    let store = state.store();
    if let Some(round) = session.current_round() {
        store
            .save_round(RoundEntity::from_round(session.id, round))
            .await?;
    }
    store.save_game(GameEntity::from(session)).await?;
    Ok(())
}

/// Resolve a session code, mapping a miss to [`ServiceError::NotFound`].
pub(crate) fn resolve(
    state: &SharedState,
    code: &str,
) -> Result<Arc<SessionHandle>, ServiceError> {
    state
        .registry()
        .resolve(code)
        .ok_or_else(|| ServiceError::NotFound(format!("session `{code}` not found")))
}

fn player_summary_of(session: &GameSession, player_id: Uuid) -> PlayerSummary {
    PlayerSummary {
        id: player_id,
        name: session.players[&player_id].name.clone(),
        score: session.players[&player_id].score,
        is_host: session.players[&player_id].is_host,
        hand: None,
    }
}

/// One-shot task arming empty-session teardown for when the protection
/// window lapses.
fn spawn_protection_expiry(state: SharedState, code: String) {
    let window = state.config().protection_window();
    tokio::spawn(async move {
        sleep(window).await;

        let Some(handle) = state.registry().resolve(&code) else {
            return;
        };
        let game_id = {
            let session = handle.session.lock().await;
            if !session.players.is_empty() {
                return;
            }
            session.id
        };

        // Retire re-checks the protection window; a session that was
        // re-armed or never expired stays registered.
        match state.registry().retire(&code).await {
            RetireOutcome::Retired => {}
            RetireOutcome::Protected | RetireOutcome::NotFound => return,
        }

        if let Err(err) = state.store().delete_game(game_id).await {
            warn!(%code, error = %err, "failed to delete game after protection expiry");
        }
        room_events::broadcast_session_closed(&handle.room, &code);
        info!(%code, "protection window lapsed with no players; session retired");
    });
}
