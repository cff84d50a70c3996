//! Move relay
//!
//! Validates and applies proposed moves against a session's authoritative
//! position, plus reset and undo. Validation happens exactly once, here on
//! the server; clients may preview a move locally but must reconcile with
//! the state this module returns. Every successful mutation is broadcast
//! to the session's room so the non-moving player updates without polling.

use crate::engine::EngineError;
use crate::error::{RelayError, RelayResult};
use crate::notify::Notifier;
use crate::store::SessionStore;
use shared::protocol::{BoardResponse, GameStateResponse, MoveResponse, ServerEvent};
use std::sync::Arc;
use tracing::info;

pub struct MoveRelay {
    store: Arc<SessionStore>,
    notifier: Arc<Notifier>,
}

impl MoveRelay {
    pub fn new(store: Arc<SessionStore>, notifier: Arc<Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Apply `{from, to, promotion}` to the session's position.
    ///
    /// Rejected while the opponent seat is empty, and whenever the rules
    /// engine finds the move illegal; rejection leaves the session
    /// untouched. Game-over positions are not special-cased: a side with
    /// no legal moves simply has every proposal rejected.
    pub async fn propose_move(
        &self,
        session_id: &str,
        from: &str,
        to: &str,
        promotion: Option<&str>,
    ) -> RelayResult<MoveResponse> {
        let (response, snapshot) = {
            let session = self.store.get(session_id)?;
            let mut session = session.lock();
            if session.players_connected() < 2 {
                return Err(RelayError::OpponentPending);
            }
            session
                .engine_mut()
                .apply(from, to, promotion)
                .map_err(engine_error)?;
            session.touch();
            (session.move_view(), session.view())
        };

        info!(session_id, from, to, "move applied");
        self.broadcast(session_id, snapshot).await;
        Ok(response)
    }

    /// Reinitialize the session to the starting position
    pub async fn reset_session(&self, session_id: &str) -> RelayResult<BoardResponse> {
        let (response, snapshot) = {
            let session = self.store.get(session_id)?;
            let mut session = session.lock();
            session.engine_mut().reset();
            session.touch();
            (session.board_view(), session.view())
        };

        info!(session_id, "session reset");
        self.broadcast(session_id, snapshot).await;
        Ok(response)
    }

    /// Pop the last move. No ownership check: either participant may undo
    /// the opponent's move.
    pub async fn undo_last_move(&self, session_id: &str) -> RelayResult<BoardResponse> {
        let (response, snapshot) = {
            let session = self.store.get(session_id)?;
            let mut session = session.lock();
            session.engine_mut().undo().map_err(engine_error)?;
            session.touch();
            (session.board_view(), session.view())
        };

        info!(session_id, "move undone");
        self.broadcast(session_id, snapshot).await;
        Ok(response)
    }

    async fn broadcast(&self, session_id: &str, snapshot: GameStateResponse) {
        self.notifier
            .publish(session_id, &ServerEvent::StateUpdated(snapshot))
            .await;
    }
}

fn engine_error(error: EngineError) -> RelayError {
    match error {
        EngineError::NothingToUndo => RelayError::NoMoveToUndo,
        other => RelayError::IllegalMove {
            reason: other.to_string(),
        },
    }
}
