//! Wire types shared by the relay server and its clients.
//!
//! Request/response bodies for the REST surface and the tagged event
//! enums carried over the push channel. All field names are camelCase
//! on the wire.

use serde::{Deserialize, Serialize};

/// FEN of the standard starting position.
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Occupancy-derived session status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// One seat filled, moves are not accepted yet.
    Waiting,
    /// Both seats filled.
    Ready,
}

/// Side whose turn it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SideToMove {
    White,
    Black,
}

/// Body of `POST /api/joinGame`.
///
/// `session_id` defaults to empty so a missing field is reported as a
/// validation error rather than a deserialization failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGameRequest {
    #[serde(default)]
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGameResponse {
    pub status: SessionStatus,
    pub position: String,
    pub players_connected: u8,
}

/// Full derived view of a session, returned by `GET /api/game/{sessionId}`
/// and carried in `stateUpdated` push events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateResponse {
    pub position: String,
    pub players_connected: u8,
    pub status: SessionStatus,
    pub history: Vec<String>,
    pub side_to_move: SideToMove,
    pub is_check: bool,
    pub is_checkmate: bool,
    pub is_draw: bool,
    pub is_game_over: bool,
}

/// Body of `POST /api/move`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    /// Promotion piece letter (`q`, `r`, `b`, `n`). Queen when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveResponse {
    pub success: bool,
    pub position: String,
    pub history: Vec<String>,
    pub side_to_move: SideToMove,
    pub is_check: bool,
    pub is_checkmate: bool,
    pub is_draw: bool,
    pub is_game_over: bool,
}

/// Body of `POST /api/reset` and `POST /api/undo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    #[serde(default)]
    pub session_id: String,
}

/// Response of reset and undo: position summary without terminal flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardResponse {
    pub success: bool,
    pub position: String,
    pub history: Vec<String>,
    pub side_to_move: SideToMove,
}

/// Error body shared by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Rules-engine rejection reason, when one is available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Messages a push-channel client sends to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Enter the broadcast group for `session_id`. Re-sending with a
    /// different id switches rooms.
    #[serde(rename_all = "camelCase")]
    Subscribe { session_id: String },
}

/// Events the server pushes to subscribed clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Seat occupancy changed.
    #[serde(rename_all = "camelCase")]
    PlayersUpdated { players_connected: u8 },
    /// Authoritative state changed (move, reset or undo).
    StateUpdated(GameStateResponse),
}
