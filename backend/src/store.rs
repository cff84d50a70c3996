//! Session store and lifecycle
//!
//! In-memory map from session identifier to session state. The store owns
//! every mutation: create-or-join, the derived read view, and the idle
//! expiry sweep. The map lock is held only to look up or insert entries;
//! each session carries its own mutex so mutations on different sessions
//! never contend.

use crate::engine::PositionEngine;
use crate::error::{RelayError, RelayResult};
use parking_lot::{Mutex, RwLock};
use shared::protocol::{
    BoardResponse, GameStateResponse, JoinGameResponse, MoveResponse, SessionStatus, SideToMove,
};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// One two-player game: engine-owned position, seat count, activity clock
pub struct Session {
    engine: PositionEngine,
    players_connected: u8,
    last_activity: Instant,
}

impl Session {
    fn new() -> Self {
        Self {
            engine: PositionEngine::new(),
            players_connected: 1,
            last_activity: Instant::now(),
        }
    }

    pub fn engine_mut(&mut self) -> &mut PositionEngine {
        &mut self.engine
    }

    pub fn players_connected(&self) -> u8 {
        self.players_connected
    }

    /// Record mutating activity, pushing back idle expiry
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    pub fn status(&self) -> SessionStatus {
        if self.players_connected == 2 {
            SessionStatus::Ready
        } else {
            SessionStatus::Waiting
        }
    }

    fn side_to_move(&self) -> SideToMove {
        if self.engine.side_to_move_white() {
            SideToMove::White
        } else {
            SideToMove::Black
        }
    }

    /// Full derived view: position, occupancy, history, terminal flags
    pub fn view(&self) -> GameStateResponse {
        GameStateResponse {
            position: self.engine.fen(),
            players_connected: self.players_connected,
            status: self.status(),
            history: self.engine.history().to_vec(),
            side_to_move: self.side_to_move(),
            is_check: self.engine.is_check(),
            is_checkmate: self.engine.is_checkmate(),
            is_draw: self.engine.is_draw(),
            is_game_over: self.engine.is_game_over(),
        }
    }

    /// Response shape for a successful move
    pub fn move_view(&self) -> MoveResponse {
        MoveResponse {
            success: true,
            position: self.engine.fen(),
            history: self.engine.history().to_vec(),
            side_to_move: self.side_to_move(),
            is_check: self.engine.is_check(),
            is_checkmate: self.engine.is_checkmate(),
            is_draw: self.engine.is_draw(),
            is_game_over: self.engine.is_game_over(),
        }
    }

    /// Response shape for reset and undo
    pub fn board_view(&self) -> BoardResponse {
        BoardResponse {
            success: true,
            position: self.engine.fen(),
            history: self.engine.history().to_vec(),
            side_to_move: self.side_to_move(),
        }
    }
}

/// Process-wide session map. No persistence: restart loses every session.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a session for `session_id` or admit the second player.
    ///
    /// The exists-check and the insert happen under one write lock, so two
    /// near-simultaneous joins for a fresh id cannot both create.
    pub fn create_or_join(&self, session_id: &str) -> RelayResult<JoinGameResponse> {
        let mut sessions = self.sessions.write();
        match sessions.entry(session_id.to_string()) {
            Entry::Vacant(vacant) => {
                let session = Session::new();
                let response = JoinGameResponse {
                    status: session.status(),
                    position: session.engine.fen(),
                    players_connected: session.players_connected,
                };
                vacant.insert(Arc::new(Mutex::new(session)));
                info!(session_id, "session created, waiting for opponent");
                Ok(response)
            }
            Entry::Occupied(occupied) => {
                let mut session = occupied.get().lock();
                if session.players_connected >= 2 {
                    return Err(RelayError::SessionFull);
                }
                session.players_connected = 2;
                session.touch();
                info!(session_id, "second player joined, session ready");
                Ok(JoinGameResponse {
                    status: session.status(),
                    position: session.engine.fen(),
                    players_connected: session.players_connected,
                })
            }
        }
    }

    /// Read-only derived view. Never updates the activity clock, so passive
    /// watchers cannot keep a session alive.
    pub fn query(&self, session_id: &str) -> RelayResult<GameStateResponse> {
        let session = self.get(session_id)?;
        let session = session.lock();
        Ok(session.view())
    }

    /// Handle to one session's record, for serialized mutation
    pub fn get(&self, session_id: &str) -> RelayResult<Arc<Mutex<Session>>> {
        let sessions = self.sessions.read();
        sessions
            .get(session_id)
            .cloned()
            .ok_or(RelayError::SessionNotFound)
    }

    /// Remove every session idle for longer than `threshold`. Removal is
    /// unconditional and silent; lingering clients see `SessionNotFound`
    /// on their next call.
    pub fn expire_idle(&self, threshold: Duration) -> usize {
        let stale: Vec<String> = {
            let sessions = self.sessions.read();
            sessions
                .iter()
                .filter(|(_, session)| session.lock().idle_for() > threshold)
                .map(|(id, _)| id.clone())
                .collect()
        };

        let mut removed = 0;
        let mut sessions = self.sessions.write();
        for id in stale {
            // Re-check under the write lock: the session may have seen
            // activity between the scan and now.
            let still_stale = sessions
                .get(&id)
                .is_some_and(|session| session.lock().idle_for() > threshold);
            if still_stale {
                sessions.remove(&id);
                removed += 1;
                debug!(session_id = %id, "expired idle session");
            }
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::protocol::START_FEN;

    #[test]
    fn first_join_creates_waiting_session() {
        let store = SessionStore::new();
        let response = store.create_or_join("g1").expect("first join succeeds");
        assert_eq!(response.status, SessionStatus::Waiting);
        assert_eq!(response.players_connected, 1);
        assert_eq!(response.position, START_FEN);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn second_join_makes_session_ready() {
        let store = SessionStore::new();
        store.create_or_join("g1").expect("first join succeeds");
        let response = store.create_or_join("g1").expect("second join succeeds");
        assert_eq!(response.status, SessionStatus::Ready);
        assert_eq!(response.players_connected, 2);
        assert_eq!(response.position, START_FEN);
    }

    #[test]
    fn third_join_is_rejected_without_mutation() {
        let store = SessionStore::new();
        store.create_or_join("g1").expect("first join succeeds");
        store.create_or_join("g1").expect("second join succeeds");
        let result = store.create_or_join("g1");
        assert!(matches!(result, Err(RelayError::SessionFull)));

        let view = store.query("g1").expect("session still present");
        assert_eq!(view.players_connected, 2);
    }

    #[test]
    fn query_unknown_session_fails() {
        let store = SessionStore::new();
        assert!(matches!(
            store.query("missing"),
            Err(RelayError::SessionNotFound)
        ));
    }

    #[test]
    fn query_is_idempotent() {
        let store = SessionStore::new();
        store.create_or_join("g1").expect("join succeeds");
        let first = store.query("g1").expect("query succeeds");
        let second = store.query("g1").expect("query succeeds");
        assert_eq!(first, second);
        assert_eq!(first.players_connected, 1);
    }

    #[test]
    fn sessions_are_keyed_independently() {
        let store = SessionStore::new();
        store.create_or_join("g1").expect("join g1");
        store.create_or_join("g2").expect("join g2");
        store.create_or_join("g1").expect("second join g1");

        assert_eq!(store.query("g1").expect("g1").players_connected, 2);
        assert_eq!(store.query("g2").expect("g2").players_connected, 1);
    }

    #[test]
    fn expire_removes_idle_sessions() {
        let store = SessionStore::new();
        store.create_or_join("g1").expect("join succeeds");
        // Zero threshold: any session with measurable age is stale.
        std::thread::sleep(Duration::from_millis(5));
        let removed = store.expire_idle(Duration::ZERO);
        assert_eq!(removed, 1);
        assert!(store.is_empty());
        assert!(matches!(
            store.query("g1"),
            Err(RelayError::SessionNotFound)
        ));
    }

    #[test]
    fn expire_keeps_active_sessions() {
        let store = SessionStore::new();
        store.create_or_join("g1").expect("join succeeds");
        let removed = store.expire_idle(Duration::from_secs(3600));
        assert_eq!(removed, 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn query_does_not_reset_idle_clock() {
        let store = SessionStore::new();
        store.create_or_join("g1").expect("join succeeds");
        std::thread::sleep(Duration::from_millis(20));
        store.query("g1").expect("query succeeds");
        // A query must not have refreshed activity: the session is still
        // older than a 10ms threshold.
        let removed = store.expire_idle(Duration::from_millis(10));
        assert_eq!(removed, 1);
    }

    #[test]
    fn concurrent_joins_create_exactly_one_session() {
        let store = Arc::new(SessionStore::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || store.create_or_join("race")));
        }
        let results: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("thread completes"))
            .collect();

        assert_eq!(store.len(), 1);
        let successes = results.iter().filter(|r| r.is_ok()).count();
        let full = results
            .iter()
            .filter(|r| matches!(r, Err(RelayError::SessionFull)))
            .count();
        // Exactly one creator, one joiner; everyone else bounced.
        assert_eq!(successes, 2);
        assert_eq!(full, 6);
        assert_eq!(
            store.query("race").expect("session exists").players_connected,
            2
        );
    }
}
