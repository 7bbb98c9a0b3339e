//! WebSocket transport: one task pair per connected client.
//!
//! The reader turns frames into hub commands; the writer drains the
//! client's outbound queue onto the socket. Closing the socket, or any read
//! error, becomes a disconnect. The hub holds the only sender of the
//! outbound queue, so when it forgets the client the writer closes the
//! socket.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use proxima_core::{ClientHandle, ClientMessage, ServerEvent};
use proxima_services::HubError;

use crate::frame::{decode_frame, FrameError};
use crate::handlers::ApiState;

/// GET /ws: upgrade and hand the socket to a client session.
pub async fn handle_ws(ws: WebSocketUpgrade, State(state): State<ApiState>) -> impl IntoResponse {
    ws.max_message_size(state.config.limits.max_frame_bytes)
        .on_upgrade(move |socket| client_session(socket, state))
}

async fn client_session(socket: WebSocket, state: ApiState) {
    let depth = state.config.limits.outbound_queue_depth.max(1);
    let (out_tx, mut out_rx) = mpsc::channel::<ServerEvent>(depth);
    // Transport-level rejections, never routed through the hub.
    let (err_tx, mut err_rx) = mpsc::channel::<ServerEvent>(8);

    let handle = match state.hub.connect(out_tx).await {
        Ok(h) => h,
        Err(e) => {
            tracing::warn!(error = %e, "rejecting connection");
            return;
        }
    };

    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                ev = out_rx.recv() => match ev {
                    Some(ev) => ev,
                    None => break,
                },
                Some(ev) = err_rx.recv() => ev,
            };
            let text = match serde_json::to_string(&event) {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(error = %e, event = event.name(), "failed to encode event");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.send(Message::Close(None)).await;
    });

    while let Some(msg) = stream.next().await {
        let result = match msg {
            Ok(Message::Text(text)) => {
                match decode_frame(text.as_str(), &state.config.proximity) {
                    Ok(msg) => dispatch(&state, handle, msg).await,
                    Err(e) => {
                        reject(&err_tx, handle, e);
                        Ok(())
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                reject(&err_tx, handle, FrameError::Binary);
                Ok(())
            }
            Ok(Message::Close(_)) => break,
            // Ping/pong are answered by axum.
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::debug!(client = %handle, error = %e, "socket read failed");
                break;
            }
        };
        if result.is_err() {
            break;
        }
    }

    match state.hub.disconnect(handle).await {
        Ok(()) => {
            drop(err_tx);
            let _ = writer.await;
        }
        Err(e) => {
            // Nobody will drop the outbound sender now; tear the socket down here.
            tracing::warn!(client = %handle, error = %e, "hub gone before disconnect");
            writer.abort();
        }
    }
}

async fn dispatch(
    state: &ApiState,
    handle: ClientHandle,
    msg: ClientMessage,
) -> Result<(), HubError> {
    match msg {
        ClientMessage::UpdateLocation { location, radius } => {
            state.hub.update_location(handle, location, radius).await
        }
        other => match other.into_signal() {
            Some((kind, env)) => state.hub.relay(handle, kind, env.to, env.payload).await,
            None => Ok(()),
        },
    }
}

fn reject(err_tx: &mpsc::Sender<ServerEvent>, handle: ClientHandle, error: FrameError) {
    tracing::warn!(client = %handle, error = %error, "frame rejected");
    let _ = err_tx.try_send(ServerEvent::Error {
        message: error.to_string(),
    });
}
