//! Client session adapter for the chess relay.
//!
//! Typed access to the relay's REST surface, a WebSocket subscription for
//! push events, and an optimistic board that previews moves locally before
//! reconciling against the server's authoritative response. Clients that
//! never see a push event still converge by polling [`RelayClient::state`].

pub mod adapter;
pub mod push;

use shared::protocol::{
    BoardResponse, ErrorResponse, GameStateResponse, JoinGameRequest, JoinGameResponse,
    MoveRequest, MoveResponse, SessionRequest,
};
use thiserror::Error;

/// Errors surfaced to the UI layer
#[derive(Error, Debug)]
pub enum ClientError {
    /// Network or protocol failure talking to the relay
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The relay rejected the request
    #[error("{message}")]
    Rejected {
        message: String,
        details: Option<String>,
    },

    /// Push channel failure
    #[error("push channel error: {0}")]
    Push(String),

    /// A locally previewed move was not even locally legal
    #[error("move rejected locally: {0}")]
    LocalPreview(String),
}

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// HTTP client for the relay's REST surface
#[derive(Clone)]
pub struct RelayClient {
    base_url: String,
    http: reqwest::Client,
}

impl RelayClient {
    /// `base_url` without a trailing slash, e.g. `http://localhost:3000`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Create or join the session, returning seat status and position
    pub async fn join(&self, session_id: &str) -> ClientResult<JoinGameResponse> {
        let request = JoinGameRequest {
            session_id: session_id.to_string(),
        };
        self.post("/api/joinGame", &request).await
    }

    /// Poll the full authoritative view
    pub async fn state(&self, session_id: &str) -> ClientResult<GameStateResponse> {
        let response = self
            .http
            .get(format!("{}/api/game/{session_id}", self.base_url))
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Submit a move for server-side validation
    pub async fn send_move(
        &self,
        session_id: &str,
        from: &str,
        to: &str,
        promotion: Option<&str>,
    ) -> ClientResult<MoveResponse> {
        let request = MoveRequest {
            session_id: session_id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            promotion: promotion.map(str::to_string),
        };
        self.post("/api/move", &request).await
    }

    pub async fn reset(&self, session_id: &str) -> ClientResult<BoardResponse> {
        let request = SessionRequest {
            session_id: session_id.to_string(),
        };
        self.post("/api/reset", &request).await
    }

    pub async fn undo(&self, session_id: &str) -> ClientResult<BoardResponse> {
        let request = SessionRequest {
            session_id: session_id.to_string(),
        };
        self.post("/api/undo", &request).await
    }

    /// WebSocket endpoint derived from the base URL
    pub fn push_url(&self) -> String {
        let ws_base = self
            .base_url
            .replacen("https://", "wss://", 1)
            .replacen("http://", "ws://", 1);
        format!("{ws_base}/ws")
    }

    async fn post<Req, Resp>(&self, path: &str, request: &Req) -> ClientResult<Resp>
    where
        Req: serde::Serialize,
        Resp: serde::de::DeserializeOwned,
    {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .json(request)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<Resp>(response: reqwest::Response) -> ClientResult<Resp>
    where
        Resp: serde::de::DeserializeOwned,
    {
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            let error: ErrorResponse = response.json().await?;
            Err(ClientError::Rejected {
                message: error.error,
                details: error.details,
            })
        }
    }
}
