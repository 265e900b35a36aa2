//! WebSocket upgrade handler — runs one relay session per connection on top
//! of the `RoomManager`.

use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::http::header::ORIGIN;
use axum::response::{IntoResponse, Response};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::api::errors::ApiError;
use crate::api::state::SharedState;

use super::manager::ClientId;
use super::messages::{WsCommand, WsEvent};

type WsSink = SplitSink<WebSocket, Message>;

/// GET /ws — upgrade to WebSocket.
///
/// Requests carrying an `Origin` other than the configured one are refused.
/// Non-browser clients that send no `Origin` are let through.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<SharedState>,
) -> Response {
    if let Some(origin) = headers.get(ORIGIN) {
        let origin = origin.to_str().unwrap_or_default();
        if !state.config.origin_allowed(origin) {
            debug!(origin, "refusing WS upgrade from foreign origin");
            return ApiError::OriginNotAllowed(origin.to_string()).into_response();
        }
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Core WebSocket session logic.
///
/// One loop multiplexes three sources: frames from the client, frames the
/// manager queued for it, and a heartbeat tick. Every tick sends a Ping; a
/// client that has sent nothing (Pong included) for `client_timeout` is
/// dropped, and so is one whose socket stops accepting writes.
async fn handle_socket(socket: WebSocket, state: SharedState) {
    let (client_id, mut rx) = state.rooms.connect().await;
    let (mut sink, mut stream) = socket.split();
    info!(client_id, "client connected");

    let period = state.config.heartbeat_interval;
    let client_timeout = state.config.client_timeout;
    let mut heartbeat = time::interval_at(time::Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_heartbeat = Instant::now();

    // Tell the client which id the relay assigned.
    let hello = Message::Text(WsEvent::connected(client_id).to_frame());
    let reason = if send_within(&mut sink, hello, client_timeout).await {
        loop {
            tokio::select! {
                msg = stream.next() => match msg {
                    Some(Ok(msg)) => {
                        last_heartbeat = Instant::now();
                        match msg {
                            Message::Text(text) => {
                                handle_client_message(&state, client_id, &text).await;
                            }
                            Message::Close(_) => break "closed by client",
                            _ => {} // Binary ignored; Ping answered by Axum
                        }
                    }
                    Some(Err(e)) => {
                        debug!(client_id, "WS read error: {e}");
                        break "transport error";
                    }
                    None => break "stream ended",
                },

                frame = rx.recv() => match frame {
                    Some(frame) => {
                        if !send_within(&mut sink, Message::Text(frame), client_timeout).await {
                            break "write stalled";
                        }
                    }
                    None => break "dropped by relay",
                },

                _ = heartbeat.tick() => {
                    if last_heartbeat.elapsed() > client_timeout {
                        break "heartbeat timeout";
                    }
                    if !send_within(&mut sink, Message::Ping(Bytes::new()), client_timeout).await {
                        break "write stalled";
                    }
                }
            }
        }
    } else {
        "write stalled"
    };

    // Try to close gracefully, without waiting on a dead peer.
    let _ = time::timeout(client_timeout, sink.close()).await;
    cleanup(&state, client_id, reason).await;
}

/// Send one message, giving up after `deadline`. False means the
/// connection is unusable.
async fn send_within(sink: &mut WsSink, msg: Message, deadline: Duration) -> bool {
    matches!(time::timeout(deadline, sink.send(msg)).await, Ok(Ok(())))
}

/// Process a client-sent text message. Anything that does not decode is
/// dropped without telling anyone.
pub(crate) async fn handle_client_message(state: &SharedState, client_id: ClientId, text: &str) {
    let cmd = match WsCommand::decode(text) {
        Ok(c) => c,
        Err(e) => {
            debug!(client_id, "ignoring WS frame: {e}");
            return;
        }
    };

    match cmd {
        WsCommand::JoinRoom(room) => {
            state.rooms.join(client_id, &room).await;
        }
        WsCommand::LeaveRoom(room) => {
            if state.config.honor_leave {
                state.rooms.leave(client_id, &room).await;
            } else {
                debug!(room, client_id, "leaveRoom accepted, membership kept");
            }
        }
        WsCommand::SendData { room, payload } => {
            let frame = WsEvent::receive_data(payload).to_frame();
            state.rooms.broadcast(&room, frame).await;
        }
        WsCommand::Ping => {
            state
                .rooms
                .send_to(client_id, WsEvent::pong().to_frame())
                .await;
        }
    }
}

/// Remove client from every room it joined.
async fn cleanup(state: &SharedState, client_id: ClientId, reason: &str) {
    let rooms = state.rooms.disconnect(client_id).await;
    info!(client_id, reason, ?rooms, "client disconnected");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::state::AppState;
    use crate::config::AppConfig;

    /// Verify the handler function signature compiles as an Axum handler.
    #[tokio::test]
    async fn handler_type_check() {
        fn assert_handler<F, Fut, R>(_: F)
        where
            F: FnOnce(WebSocketUpgrade, HeaderMap, State<SharedState>) -> Fut,
            Fut: std::future::Future<Output = R>,
            R: IntoResponse,
        {
        }
        assert_handler(ws_handler);
    }

    #[tokio::test]
    async fn join_then_send_data_reaches_room() {
        let state = AppState::new(AppConfig::default());
        let (a, mut rx_a) = state.rooms.connect().await;
        let (b, mut rx_b) = state.rooms.connect().await;

        handle_client_message(&state, a, r#"{"event":"joinRoom","data":"masa1"}"#).await;
        handle_client_message(&state, b, r#"{"event":"joinRoom","data":"masa1"}"#).await;
        handle_client_message(
            &state,
            a,
            r#"{"event":"sendData","data":{"room":"masa1","data":[]}}"#,
        )
        .await;

        let expected = r#"{"event":"receiveData","data":{"room":"masa1","data":[]}}"#;
        assert_eq!(rx_a.recv().await.unwrap().as_str(), expected);
        assert_eq!(rx_b.recv().await.unwrap().as_str(), expected);
    }

    #[tokio::test]
    async fn leave_is_honored_by_default() {
        let state = AppState::new(AppConfig::default());
        let (a, _rx_a) = state.rooms.connect().await;

        handle_client_message(&state, a, r#"{"event":"joinRoom","data":"masa1"}"#).await;
        handle_client_message(&state, a, r#"{"event":"leaveRoom","data":"masa1"}"#).await;
        assert_eq!(state.rooms.room_size("masa1").await, 0);
    }

    #[tokio::test]
    async fn leave_can_be_ignored() {
        let config = AppConfig {
            honor_leave: false,
            ..AppConfig::default()
        };
        let state = AppState::new(config);
        let (a, _rx_a) = state.rooms.connect().await;

        handle_client_message(&state, a, r#"{"event":"joinRoom","data":"masa1"}"#).await;
        handle_client_message(&state, a, r#"{"event":"leaveRoom","data":"masa1"}"#).await;
        assert_eq!(state.rooms.room_size("masa1").await, 1);
    }

    #[tokio::test]
    async fn malformed_frames_are_ignored() {
        let state = AppState::new(AppConfig::default());
        let (a, mut rx_a) = state.rooms.connect().await;
        handle_client_message(&state, a, r#"{"event":"joinRoom","data":"masa1"}"#).await;

        handle_client_message(&state, a, "nonsense").await;
        handle_client_message(&state, a, r#"{"event":"sendData","data":{"data":[]}}"#).await;
        handle_client_message(&state, a, r#"{"event":"whatever"}"#).await;

        assert!(rx_a.try_recv().is_err());
        assert_eq!(state.rooms.room_size("masa1").await, 1);
    }

    #[tokio::test]
    async fn ping_answers_only_the_sender() {
        let state = AppState::new(AppConfig::default());
        let (a, mut rx_a) = state.rooms.connect().await;
        let (b, mut rx_b) = state.rooms.connect().await;
        handle_client_message(&state, a, r#"{"event":"joinRoom","data":"masa1"}"#).await;
        handle_client_message(&state, b, r#"{"event":"joinRoom","data":"masa1"}"#).await;

        handle_client_message(&state, a, r#"{"event":"ping"}"#).await;

        let frame = rx_a.recv().await.unwrap();
        let pong: serde_json::Value = serde_json::from_str(frame.as_str()).unwrap();
        assert_eq!(pong["event"], "pong");
        assert!(rx_b.try_recv().is_err());
    }
}
