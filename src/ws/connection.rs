//! WebSocket connection lifecycle: registration, reader/writer tasks,
//! disconnect cleanup.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::http::routes::AppState;
use crate::room::RoomHandle;
use crate::room::hub::HubHandle;
use crate::room::protocol::{ClientMessage, ServerMessage};
use crate::room::session::{Session, SessionFeeds, SessionId};

#[derive(Deserialize)]
pub struct WsParams {
    pub token: String,
    pub name: String,
}

pub async fn ws_handler(
    State(state): State<AppState>,
    Query(WsParams { token, name }): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    if name.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "name required").into_response();
    }
    if !state.hub.room_exists(&token) {
        return (StatusCode::NOT_FOUND, "no such room").into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub, token, name))
}

async fn handle_socket(socket: WebSocket, hub: HubHandle, token: String, name: String) {
    let (session, feeds) = Session::connect(&name);
    let session_id = session.id();

    let room = match hub.register(&token, session).await {
        Ok(room) => room,
        Err(e) => {
            tracing::info!(%token, %name, error = %e, "rejecting connection");
            return;
        }
    };

    let (sink, stream) = socket.split();
    let mut write_task = tokio::spawn(write_loop(sink, feeds));
    let mut read_task = tokio::spawn(read_loop(stream, room, session_id));

    // Either side ending (socket closed, feeds closed, protocol error) takes
    // the other down with it.
    tokio::select! {
        _ = &mut write_task => read_task.abort(),
        _ = &mut read_task => write_task.abort(),
    }

    hub.unregister(&token, session_id);
    tracing::debug!(%token, session = %session_id, "connection closed");
}

/// Parse inbound messages and forward them as room commands. Unparseable
/// input is a protocol error: the loop ends and disconnect cleanup runs.
async fn read_loop(mut stream: SplitStream<WebSocket>, room: RoomHandle, session_id: SessionId) {
    while let Some(msg) = stream.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(session = %session_id, error = %e, "websocket read failed");
                break;
            }
        };
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::SubmitValue { value, group }) => {
                    room.set_value(session_id, value, group);
                }
                Ok(ClientMessage::RequestShuffle) => room.request_shuffle(),
                Err(e) => {
                    tracing::warn!(session = %session_id, error = %e, "unparseable message, closing");
                    break;
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }
}

/// Drain both delivery feeds onto the socket. Ends when the socket dies or
/// the room drops the session (both feeds close).
async fn write_loop(mut sink: SplitSink<WebSocket, Message>, mut feeds: SessionFeeds) {
    loop {
        let msg: ServerMessage = tokio::select! {
            snapshot = feeds.state_rx.recv() => match snapshot {
                Some(snapshot) => snapshot.into(),
                None => break,
            },
            outcome = feeds.result_rx.recv() => match outcome {
                Some(outcome) => outcome.into(),
                None => break,
            },
        };
        let text = match serde_json::to_string(&msg) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode outbound message");
                continue;
            }
        };
        if sink.send(Message::Text(text)).await.is_err() {
            break;
        }
    }
}
