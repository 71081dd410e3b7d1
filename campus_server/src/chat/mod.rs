//! Realtime chat over a websocket at `/ws/chat`.

pub mod events;
pub mod handlers;
pub mod hub;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
    routing::get,
    Router,
};
use campus_core::{auth::Identity, entity::prelude::Presence};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::{
    auth::{token_from_headers, verify},
    error::ApiError,
    state::AppState,
};
use handlers::ChatSession;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws/chat", get(upgrade))
}

#[derive(Debug, Default, Deserialize)]
struct WsAuth {
    token: Option<String>,
}

async fn upgrade(
    State(state): State<AppState>,
    Query(auth): Query<WsAuth>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let token = token_from_headers(&headers)
        .or(auth.token)
        .ok_or_else(|| ApiError::unauthorized("authentication required"))?;
    let identity = verify(&state, &token)?;
    Ok(ws.on_upgrade(move |socket| serve(socket, state, identity)))
}

async fn serve(mut socket: WebSocket, state: AppState, identity: Identity) {
    let user = identity.user_id;
    if let Err(e) = state.core.users.set_presence(user, Presence::Active).await {
        warn!(%user, error = %e, "failed to persist presence");
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let conn = state.hub.connect(user, tx).await;
    info!(%user, connection = conn, "chat connected");
    let session = ChatSession::new(state.clone(), identity, conn);

    loop {
        tokio::select! {
            Some(event) = rx.recv() => {
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(event = event.event, error = %e, "dropping unserializable event");
                        continue;
                    }
                };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => session.handle_text(text.as_str()).await,
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    if state.hub.disconnect(user, conn).await {
        if let Err(e) = state.core.users.set_presence(user, Presence::Offline).await {
            warn!(%user, error = %e, "failed to persist presence");
        }
    }
    info!(%user, connection = conn, "chat disconnected");
}
