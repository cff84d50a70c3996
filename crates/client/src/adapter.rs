//! Optimistic board with server reconciliation.
//!
//! The UI applies a proposed move locally for instant feedback, then
//! submits it to the relay. On success the server's state is adopted
//! wholesale (the server is the single source of truth, even if it
//! disagrees with the local preview); on rejection the board reverts to
//! the pre-move snapshot.

use crate::{ClientError, ClientResult, RelayClient};
use shakmaty::fen::Fen;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Position, Rank, Role, Square};
use shared::protocol::{GameStateResponse, MoveResponse, SideToMove, START_FEN};
use tracing::debug;

/// Pre-move snapshot kept while a submission is in flight
#[derive(Debug, Clone)]
struct Snapshot {
    position: String,
    history: Vec<String>,
    side_to_move: SideToMove,
}

/// Locally tracked board state for one session
#[derive(Debug, Clone)]
pub struct OptimisticBoard {
    position: String,
    history: Vec<String>,
    side_to_move: SideToMove,
    pending: Option<Snapshot>,
}

impl OptimisticBoard {
    pub fn new() -> Self {
        Self {
            position: START_FEN.to_string(),
            history: Vec::new(),
            side_to_move: SideToMove::White,
            pending: None,
        }
    }

    /// Position currently shown to the user (may be an unconfirmed preview)
    pub fn position(&self) -> &str {
        &self.position
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn side_to_move(&self) -> SideToMove {
        self.side_to_move
    }

    pub fn has_pending_move(&self) -> bool {
        self.pending.is_some()
    }

    /// Apply a move locally, keeping a snapshot for rollback. Fails when
    /// the move is not even legal under the local rules, in which case
    /// nothing should be submitted.
    pub fn preview_move(
        &mut self,
        from: &str,
        to: &str,
        promotion: Option<&str>,
    ) -> ClientResult<()> {
        let previewed =
            apply_local(&self.position, from, to, promotion).map_err(ClientError::LocalPreview)?;

        self.pending = Some(Snapshot {
            position: std::mem::replace(&mut self.position, previewed.position),
            history: self.history.clone(),
            side_to_move: self.side_to_move,
        });
        self.history.push(previewed.san);
        self.side_to_move = match self.side_to_move {
            SideToMove::White => SideToMove::Black,
            SideToMove::Black => SideToMove::White,
        };
        Ok(())
    }

    /// Adopt the server's authoritative response, discarding the preview
    pub fn confirm(&mut self, server: &MoveResponse) {
        self.position = server.position.clone();
        self.history = server.history.clone();
        self.side_to_move = server.side_to_move;
        self.pending = None;
    }

    /// Roll back to the pre-move snapshot after a rejection
    pub fn reject(&mut self) {
        if let Some(snapshot) = self.pending.take() {
            self.position = snapshot.position;
            self.history = snapshot.history;
            self.side_to_move = snapshot.side_to_move;
        }
    }

    /// Adopt a polled or pushed snapshot (the poll-fallback path)
    pub fn sync(&mut self, server: &GameStateResponse) {
        self.position = server.position.clone();
        self.history = server.history.clone();
        self.side_to_move = server.side_to_move;
        self.pending = None;
    }
}

impl Default for OptimisticBoard {
    fn default() -> Self {
        Self::new()
    }
}

/// One session as seen from the client: relay access plus optimistic state
pub struct SessionAdapter {
    client: RelayClient,
    session_id: String,
    pub board: OptimisticBoard,
}

impl SessionAdapter {
    pub fn new(client: RelayClient, session_id: impl Into<String>) -> Self {
        Self {
            client,
            session_id: session_id.into(),
            board: OptimisticBoard::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Preview locally, submit, then reconcile with the server's verdict
    pub async fn submit_move(
        &mut self,
        from: &str,
        to: &str,
        promotion: Option<&str>,
    ) -> ClientResult<MoveResponse> {
        self.board.preview_move(from, to, promotion)?;
        match self
            .client
            .send_move(&self.session_id, from, to, promotion)
            .await
        {
            Ok(response) => {
                self.board.confirm(&response);
                Ok(response)
            }
            Err(error) => {
                debug!(session_id = %self.session_id, %error, "move rejected, reverting preview");
                self.board.reject();
                Err(error)
            }
        }
    }

    /// Poll the relay and adopt its state
    pub async fn refresh(&mut self) -> ClientResult<GameStateResponse> {
        let state = self.client.state(&self.session_id).await?;
        self.board.sync(&state);
        Ok(state)
    }
}

struct LocalMove {
    position: String,
    san: String,
}

/// Apply a move against a FEN using the same rules crate the server uses.
/// Only a preview: the server remains authoritative.
fn apply_local(
    fen: &str,
    from: &str,
    to: &str,
    promotion: Option<&str>,
) -> Result<LocalMove, String> {
    let parsed: Fen = fen.parse().map_err(|_| format!("invalid FEN: {fen}"))?;
    let position: Chess = parsed
        .into_position(CastlingMode::Standard)
        .map_err(|_| format!("unreachable position: {fen}"))?;

    let from_sq: Square = from.parse().map_err(|_| format!("invalid square: {from}"))?;
    let to_sq: Square = to.parse().map_err(|_| format!("invalid square: {to}"))?;

    let is_promotion = position.board().role_at(from_sq) == Some(Role::Pawn)
        && (to_sq.rank() == Rank::Eighth || to_sq.rank() == Rank::First);
    let promotion_role = if is_promotion {
        Some(
            promotion
                .and_then(|p| p.chars().next())
                .and_then(|c| Role::from_char(c.to_ascii_lowercase()))
                .unwrap_or(Role::Queen),
        )
    } else {
        None
    };

    let uci = UciMove::Normal {
        from: from_sq,
        to: to_sq,
        promotion: promotion_role,
    };
    let candidate = uci.to_move(&position).map_err(|e| e.to_string())?;
    let san = shakmaty::san::San::from_move(&position, &candidate).to_string();
    let next = position.play(&candidate).map_err(|e| e.to_string())?;

    Ok(LocalMove {
        position: Fen::from_position(next, EnPassantMode::Legal).to_string(),
        san,
    })
}
