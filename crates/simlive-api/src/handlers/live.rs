//! /sessions/:id/live — the session's persistent connection.
//!
//! Inbound text frames are control messages; outbound frames are the
//! session's push events. Closing the socket ends the live run.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tracing::{debug, warn};

use simlive_core::protocol::{ControlMessage, PushEvent};
use simlive_core::SessionError;

use super::{ApiError, ApiState};

pub async fn handle_live(
    ws: WebSocketUpgrade,
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Result<Response, ApiError> {
    // Unknown ids are refused before the upgrade.
    let results = state.store.get(&session_id)?.subscribe();
    Ok(ws.on_upgrade(move |socket| live_loop(socket, state, session_id, results)))
}

async fn live_loop(
    socket: WebSocket,
    state: ApiState,
    session_id: String,
    mut results: simlive_services::ResultReceiver,
) {
    debug!(session = %session_id, "live connection opened");
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            frame = ws_rx.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!(session = %session_id, error = %e, "live receive error");
                        break;
                    }
                };
                if let Err(e) = control(&state, &session_id, text.as_str()).await {
                    if send_event(&mut ws_tx, &error_event(&e)).await.is_err() {
                        break;
                    }
                }
            }
            event = results.recv() => {
                let Some(event) = event else { break };
                if send_event(&mut ws_tx, &event).await.is_err() {
                    break;
                }
            }
        }
    }

    // Disconnect is an implicit `end`.
    if let Ok(session) = state.store.get(&session_id) {
        session.end().await;
    }
    debug!(session = %session_id, "live connection closed");
}

async fn control(state: &ApiState, session_id: &str, text: &str) -> Result<(), SessionError> {
    let message: ControlMessage = serde_json::from_str(text)
        .map_err(|e| SessionError::InvalidParameter(format!("invalid control frame: {e}")))?;
    let session = state.store.get(session_id)?;
    let run_state = session.handle(message).await?;
    debug!(session = %session_id, %run_state, "control message applied");
    Ok(())
}

fn error_event(err: &SessionError) -> PushEvent {
    PushEvent::Error {
        kind: err.kind().to_string(),
        message: err.to_string(),
    }
}

async fn send_event(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    event: &PushEvent,
) -> Result<(), ()> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "failed to serialize push event");
            return Err(());
        }
    };
    ws_tx.send(Message::Text(text.into())).await.map_err(|e| {
        debug!(error = %e, "failed to send push event");
    })
}
