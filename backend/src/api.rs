//! HTTP and WebSocket surface
//!
//! The five JSON endpoints of the relay plus the push-channel upgrade.
//! Both transports read from the same session store, so poll and push can
//! never diverge.

use crate::error::{RelayError, RelayResult};
use crate::notify::{Notifier, Subscriber};
use crate::relay::MoveRelay;
use crate::store::SessionStore;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Json, Path, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use futures::{SinkExt, StreamExt};
use shared::protocol::{
    BoardResponse, ClientEvent, GameStateResponse, JoinGameRequest, JoinGameResponse, MoveRequest,
    MoveResponse, ServerEvent, SessionRequest,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SessionStore>,
    pub notifier: Arc<Notifier>,
    pub relay: Arc<MoveRelay>,
}

impl AppState {
    pub fn new() -> Self {
        let store = Arc::new(SessionStore::new());
        let notifier = Arc::new(Notifier::new());
        let relay = Arc::new(MoveRelay::new(Arc::clone(&store), Arc::clone(&notifier)));
        Self {
            store,
            notifier,
            relay,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/joinGame", post(join_game))
        .route("/api/game/{session_id}", get(get_game))
        .route("/api/move", post(propose_move))
        .route("/api/reset", post(reset_session))
        .route("/api/undo", post(undo_last_move))
        .route("/ws", get(ws_upgrade))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn join_game(
    State(state): State<AppState>,
    Json(payload): Json<JoinGameRequest>,
) -> RelayResult<Json<JoinGameResponse>> {
    if payload.session_id.is_empty() {
        return Err(RelayError::InvalidRequest("Game ID is required"));
    }

    let response = state.store.create_or_join(&payload.session_id)?;
    state
        .notifier
        .publish(
            &payload.session_id,
            &ServerEvent::PlayersUpdated {
                players_connected: response.players_connected,
            },
        )
        .await;
    Ok(Json(response))
}

async fn get_game(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> RelayResult<Json<GameStateResponse>> {
    Ok(Json(state.store.query(&session_id)?))
}

async fn propose_move(
    State(state): State<AppState>,
    Json(payload): Json<MoveRequest>,
) -> RelayResult<Json<MoveResponse>> {
    if payload.session_id.is_empty() || payload.from.is_empty() || payload.to.is_empty() {
        return Err(RelayError::InvalidRequest(
            "GameId, from, and to are required",
        ));
    }

    let response = state
        .relay
        .propose_move(
            &payload.session_id,
            &payload.from,
            &payload.to,
            payload.promotion.as_deref(),
        )
        .await?;
    Ok(Json(response))
}

async fn reset_session(
    State(state): State<AppState>,
    Json(payload): Json<SessionRequest>,
) -> RelayResult<Json<BoardResponse>> {
    if payload.session_id.is_empty() {
        return Err(RelayError::InvalidRequest("Game ID is required"));
    }
    Ok(Json(state.relay.reset_session(&payload.session_id).await?))
}

async fn undo_last_move(
    State(state): State<AppState>,
    Json(payload): Json<SessionRequest>,
) -> RelayResult<Json<BoardResponse>> {
    if payload.session_id.is_empty() {
        return Err(RelayError::InvalidRequest("Game ID is required"));
    }
    Ok(Json(state.relay.undo_last_move(&payload.session_id).await?))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drive one push-channel connection until either side closes it.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4().to_string();
    let (subscriber, mut events) = Subscriber::new(connection_id.clone());
    state.notifier.add(subscriber).await;
    info!(connection_id, "push channel connected");

    let (mut sink, mut stream) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(payload) = events.recv().await {
            if sink
                .send(Message::Text(payload.as_str().to_string().into()))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    let recv_state = state.clone();
    let recv_id = connection_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            match message {
                Message::Text(text) => {
                    handle_client_event(&recv_state, &recv_id, text.as_str()).await;
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Whichever half finishes first tears down the other.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.notifier.remove(&connection_id).await;
    info!(connection_id, "push channel disconnected");
}

async fn handle_client_event(state: &AppState, connection_id: &str, raw: &str) {
    let event: ClientEvent = match serde_json::from_str(raw) {
        Ok(event) => event,
        Err(e) => {
            warn!(connection_id, error = %e, "ignoring malformed client event");
            return;
        }
    };

    match event {
        ClientEvent::Subscribe { session_id } => {
            state.notifier.subscribe(connection_id, &session_id).await;
            debug!(connection_id, session_id, "client subscribed");

            // Let the room learn the current occupancy without waiting for
            // the next join.
            if let Ok(view) = state.store.query(&session_id) {
                state
                    .notifier
                    .publish(
                        &session_id,
                        &ServerEvent::PlayersUpdated {
                            players_connected: view.players_connected,
                        },
                    )
                    .await;
            }
        }
    }
}
