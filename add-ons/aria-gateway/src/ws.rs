//! WebSocket endpoint: token check before upgrade, then one session per
//! socket. The read half feeds the core's ingest loop; a single writer task
//! serializes every outbound event, which preserves emission order.

use crate::AppState;
use aria_voice::{run_session, ServerEvent, Transport, VoiceError, VoiceResult, WireProfile};
use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct WsParams {
    /// Bearer token; required.
    pub token: Option<String>,
    /// Optional wire profile override: `telephony` or `web`.
    pub profile: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> Response {
    // Auth happens before the upgrade completes; invalid tokens get 403.
    let token = params.token.unwrap_or_default();
    let user_id = match state.auth.decode(&token).await {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, "refusing session");
            return StatusCode::FORBIDDEN.into_response();
        }
    };
    let profile = params
        .profile
        .as_deref()
        .and_then(|p| p.parse::<WireProfile>().ok())
        .unwrap_or(state.config.profile);

    ws.on_upgrade(move |socket| handle_session(socket, state, user_id, profile))
}

async fn handle_session(socket: WebSocket, state: AppState, user_id: i64, profile: WireProfile) {
    let session_id = uuid::Uuid::new_v4();
    info!(%session_id, user_id, ?profile, "voice session connected");

    let (ws_tx, ws_rx) = socket.split();
    let (event_tx, event_rx) = mpsc::channel::<ServerEvent>(256);
    let writer = tokio::spawn(write_events(ws_tx, event_rx));

    let config = state.config.session_config(profile);
    let result = run_session(
        WsTransport { inner: ws_rx },
        event_tx,
        user_id,
        config,
        state.services.clone(),
    )
    .await;

    match result {
        Ok(()) => info!(%session_id, "voice session ended"),
        Err(e) => warn!(%session_id, error = %e, "voice session failed"),
    }
    let _ = writer.await;
}

/// Single writer for all outbound events.
async fn write_events(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<ServerEvent>,
) {
    while let Some(event) = rx.recv().await {
        let text = match serde_json::to_string(&event) {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, "dropping unserializable event");
                continue;
            }
        };
        if ws_tx.send(Message::Text(text)).await.is_err() {
            break;
        }
    }
    let _ = ws_tx.send(Message::Close(None)).await;
}

/// Read half of the socket as the core's transport.
struct WsTransport {
    inner: SplitStream<WebSocket>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn recv_text(&mut self) -> VoiceResult<Option<String>> {
        loop {
            match self.inner.next().await {
                None => return Ok(None),
                Some(Err(e)) => return Err(VoiceError::Transport(e.to_string())),
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Close(_))) => return Ok(None),
                // Pings are answered by axum; binary frames are not part of
                // the wire contract.
                Some(Ok(_)) => continue,
            }
        }
    }
}
