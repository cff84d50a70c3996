//! Position engine
//!
//! Wraps `shakmaty` behind the narrow interface the relay needs: apply a
//! move, undo the last one, reset, and report the serialized position plus
//! terminal flags. The engine exclusively owns the position of one session
//! and keeps the full snapshot stack for undo.

use shakmaty::fen::Fen;
use shakmaty::san::San;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Position, Rank, Role, Square};
use thiserror::Error;

/// Errors that can occur while applying moves to a position
#[derive(Error, Debug)]
pub enum EngineError {
    /// Square name is not a valid coordinate like `e2`
    #[error("invalid square: {0}")]
    InvalidSquare(String),

    /// Promotion letter is not one of `q`, `r`, `b`, `n`
    #[error("invalid promotion piece: {0}")]
    InvalidPromotion(String),

    /// The move is not legal in the current position
    #[error("{0}")]
    Illegal(String),

    /// Undo requested with no moves played
    #[error("no move to undo")]
    NothingToUndo,
}

/// Authoritative position of one session.
///
/// Invariant: the serialized position always reflects every applied move;
/// a failed apply leaves position and history untouched.
pub struct PositionEngine {
    current: Chess,
    undo_stack: Vec<Chess>,
    history: Vec<String>,
}

impl PositionEngine {
    /// Create an engine at the standard starting position
    pub fn new() -> Self {
        Self {
            current: Chess::default(),
            undo_stack: Vec::new(),
            history: Vec::new(),
        }
    }

    /// Serialize the current position as FEN
    pub fn fen(&self) -> String {
        Fen::from_position(self.current.clone(), EnPassantMode::Legal).to_string()
    }

    /// Restore a position from its FEN encoding
    pub fn from_fen(fen: &str) -> Result<Self, EngineError> {
        let parsed: Fen = fen
            .parse()
            .map_err(|_| EngineError::Illegal(format!("invalid FEN: {fen}")))?;
        let position: Chess = parsed
            .into_position(CastlingMode::Standard)
            .map_err(|_| EngineError::Illegal(format!("unreachable position: {fen}")))?;
        Ok(Self {
            current: position,
            undo_stack: Vec::new(),
            history: Vec::new(),
        })
    }

    /// Validate and apply a move given as a square pair plus an optional
    /// promotion letter. The promotion hint defaults to queen and is only
    /// honored when the move actually promotes.
    pub fn apply(&mut self, from: &str, to: &str, promotion: Option<&str>) -> Result<(), EngineError> {
        let from_sq: Square = from
            .parse()
            .map_err(|_| EngineError::InvalidSquare(from.to_string()))?;
        let to_sq: Square = to
            .parse()
            .map_err(|_| EngineError::InvalidSquare(to.to_string()))?;

        let promotion_role = if self.is_promotion(from_sq, to_sq) {
            Some(match promotion {
                None => Role::Queen,
                Some(letter) => parse_promotion(letter)?,
            })
        } else {
            None
        };

        let uci = UciMove::Normal {
            from: from_sq,
            to: to_sq,
            promotion: promotion_role,
        };
        let candidate = uci
            .to_move(&self.current)
            .map_err(|e| EngineError::Illegal(e.to_string()))?;
        let san = San::from_move(&self.current, &candidate);
        let next = self
            .current
            .clone()
            .play(&candidate)
            .map_err(|e| EngineError::Illegal(e.to_string()))?;

        self.undo_stack
            .push(std::mem::replace(&mut self.current, next));
        self.history.push(san.to_string());
        Ok(())
    }

    /// Pop the last applied move, restoring the exact prior position
    pub fn undo(&mut self) -> Result<(), EngineError> {
        let previous = self.undo_stack.pop().ok_or(EngineError::NothingToUndo)?;
        self.current = previous;
        self.history.pop();
        Ok(())
    }

    /// Reinitialize to the starting position and clear history
    pub fn reset(&mut self) {
        self.current = Chess::default();
        self.undo_stack.clear();
        self.history.clear();
    }

    /// Moves applied so far, in SAN
    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn side_to_move_white(&self) -> bool {
        self.current.turn() == Color::White
    }

    pub fn is_check(&self) -> bool {
        self.current.is_check()
    }

    pub fn is_checkmate(&self) -> bool {
        self.current.is_checkmate()
    }

    /// Draw by stalemate, insufficient material, the fifty-move rule or
    /// threefold repetition
    pub fn is_draw(&self) -> bool {
        self.current.is_stalemate()
            || self.is_insufficient_material()
            || self.current.halfmoves() >= 100
            || self.is_threefold_repetition()
    }

    pub fn is_game_over(&self) -> bool {
        self.current.is_checkmate() || self.is_draw()
    }

    fn is_insufficient_material(&self) -> bool {
        self.current.has_insufficient_material(Color::White)
            && self.current.has_insufficient_material(Color::Black)
    }

    /// The current position occurred at least three times in this game.
    /// Positions compare on placement, side to move, castling rights and
    /// en-passant target, like the FEN prefix.
    fn is_threefold_repetition(&self) -> bool {
        let key = position_key(&self.current);
        let occurrences = self
            .undo_stack
            .iter()
            .filter(|position| position_key(position) == key)
            .count();
        occurrences + 1 >= 3
    }

    fn is_promotion(&self, from: Square, to: Square) -> bool {
        self.current.board().role_at(from) == Some(Role::Pawn)
            && (to.rank() == Rank::Eighth || to.rank() == Rank::First)
    }
}

impl Default for PositionEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// First four FEN fields: placement, turn, castling, en passant
fn position_key(position: &Chess) -> String {
    let fen = Fen::from_position(position.clone(), EnPassantMode::Legal).to_string();
    fen.split_whitespace().take(4).collect::<Vec<_>>().join(" ")
}

fn parse_promotion(letter: &str) -> Result<Role, EngineError> {
    let role = letter
        .chars()
        .next()
        .and_then(|c| Role::from_char(c.to_ascii_lowercase()));
    match role {
        Some(Role::Queen) => Ok(Role::Queen),
        Some(Role::Rook) => Ok(Role::Rook),
        Some(Role::Bishop) => Ok(Role::Bishop),
        Some(Role::Knight) => Ok(Role::Knight),
        _ => Err(EngineError::InvalidPromotion(letter.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::protocol::START_FEN;

    #[test]
    fn new_engine_is_at_starting_position() {
        let engine = PositionEngine::new();
        assert_eq!(engine.fen(), START_FEN);
        assert!(engine.history().is_empty());
        assert!(engine.side_to_move_white());
    }

    #[test]
    fn legal_move_updates_position_and_history() {
        let mut engine = PositionEngine::new();
        engine.apply("e2", "e4", None).expect("e4 should be legal");
        assert_eq!(engine.history(), ["e4"]);
        assert!(!engine.side_to_move_white());
        assert_ne!(engine.fen(), START_FEN);
    }

    #[test]
    fn illegal_move_leaves_state_unchanged() {
        let mut engine = PositionEngine::new();
        let result = engine.apply("e2", "e5", None);
        assert!(matches!(result, Err(EngineError::Illegal(_))));
        assert_eq!(engine.fen(), START_FEN);
        assert!(engine.history().is_empty());
    }

    #[test]
    fn malformed_square_is_rejected() {
        let mut engine = PositionEngine::new();
        let result = engine.apply("e9", "e4", None);
        assert!(matches!(result, Err(EngineError::InvalidSquare(_))));
    }

    #[test]
    fn undo_restores_exact_prior_fen() {
        let mut engine = PositionEngine::new();
        engine.apply("e2", "e4", None).expect("e4 should be legal");
        engine.apply("e7", "e5", None).expect("e5 should be legal");
        let before = engine.fen();
        engine.apply("g1", "f3", None).expect("Nf3 should be legal");
        engine.undo().expect("one move to undo");
        assert_eq!(engine.fen(), before);
        assert_eq!(engine.history(), ["e4", "e5"]);
    }

    #[test]
    fn undo_on_fresh_game_fails() {
        let mut engine = PositionEngine::new();
        assert!(matches!(engine.undo(), Err(EngineError::NothingToUndo)));
    }

    #[test]
    fn reset_clears_history() {
        let mut engine = PositionEngine::new();
        engine.apply("e2", "e4", None).expect("e4 should be legal");
        engine.reset();
        assert_eq!(engine.fen(), START_FEN);
        assert!(engine.history().is_empty());
    }

    #[test]
    fn fools_mate_is_checkmate() {
        let mut engine = PositionEngine::new();
        engine.apply("f2", "f3", None).expect("f3");
        engine.apply("e7", "e5", None).expect("e5");
        engine.apply("g2", "g4", None).expect("g4");
        engine.apply("d8", "h4", None).expect("Qh4#");
        assert!(engine.is_check());
        assert!(engine.is_checkmate());
        assert!(engine.is_game_over());
        assert!(!engine.is_draw());
        assert_eq!(engine.history().last().map(String::as_str), Some("Qh4#"));
    }

    #[test]
    fn move_after_checkmate_is_illegal() {
        let mut engine = PositionEngine::new();
        engine.apply("f2", "f3", None).expect("f3");
        engine.apply("e7", "e5", None).expect("e5");
        engine.apply("g2", "g4", None).expect("g4");
        engine.apply("d8", "h4", None).expect("Qh4#");
        let result = engine.apply("a2", "a3", None);
        assert!(matches!(result, Err(EngineError::Illegal(_))));
    }

    #[test]
    fn promotion_defaults_to_queen() {
        // White pawn one step from promotion.
        let mut engine = PositionEngine::from_fen("8/P6k/8/8/8/8/8/K7 w - - 0 1")
            .expect("position is valid");
        engine.apply("a7", "a8", None).expect("promotion is legal");
        assert_eq!(engine.history(), ["a8=Q"]);
    }

    #[test]
    fn promotion_hint_is_honored() {
        let mut engine = PositionEngine::from_fen("8/P6k/8/8/8/8/8/K7 w - - 0 1")
            .expect("position is valid");
        engine.apply("a7", "a8", Some("n")).expect("promotion is legal");
        assert_eq!(engine.history(), ["a8=N"]);
    }

    #[test]
    fn bad_promotion_letter_is_rejected() {
        let mut engine = PositionEngine::from_fen("8/P6k/8/8/8/8/8/K7 w - - 0 1")
            .expect("position is valid");
        let result = engine.apply("a7", "a8", Some("k"));
        assert!(matches!(result, Err(EngineError::InvalidPromotion(_))));
    }

    #[test]
    fn stalemate_is_a_draw() {
        // Black to move with no legal moves, not in check.
        let engine = PositionEngine::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1")
            .expect("position is valid");
        assert!(engine.is_draw());
        assert!(engine.is_game_over());
        assert!(!engine.is_checkmate());
    }

    #[test]
    fn bare_kings_are_insufficient_material() {
        let engine =
            PositionEngine::from_fen("8/8/4k3/8/8/4K3/8/8 w - - 0 1").expect("position is valid");
        assert!(engine.is_draw());
    }

    #[test]
    fn exhausted_halfmove_clock_is_a_draw() {
        // Fifty full moves without a capture or pawn move.
        let engine = PositionEngine::from_fen("8/8/4k3/8/8/4K3/4R3/8 w - - 100 80")
            .expect("position is valid");
        assert!(engine.is_draw());
        assert!(engine.is_game_over());
        assert!(!engine.is_checkmate());
    }

    #[test]
    fn threefold_repetition_is_a_draw() {
        let mut engine = PositionEngine::new();
        // Shuffle knights back and forth until the start position repeats
        // a third time.
        for _ in 0..2 {
            engine.apply("g1", "f3", None).expect("Nf3");
            engine.apply("g8", "f6", None).expect("Nf6");
            engine.apply("f3", "g1", None).expect("Ng1");
            engine.apply("f6", "g8", None).expect("Ng8");
        }
        assert!(engine.is_draw());
        assert!(engine.is_game_over());
    }

    #[test]
    fn fen_round_trips_through_the_engine() {
        let mut engine = PositionEngine::new();
        engine.apply("e2", "e4", None).expect("e4");
        engine.apply("c7", "c5", None).expect("c5");
        let fen = engine.fen();
        let restored = PositionEngine::from_fen(&fen).expect("own FEN is valid");
        assert_eq!(restored.fen(), fen);
    }
}
