//! Wire format for the relay: every text frame is a JSON object
//! `{"event": <name>, "data": <payload>}`.

use axum::extract::ws::Utf8Bytes;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// A serialized server → client frame. Clones share one buffer, so a
/// broadcast serializes once no matter how many members the room has.
pub type Frame = Utf8Bytes;

// ---------------------------------------------------------------------------
// Server → Client events
// ---------------------------------------------------------------------------

/// Envelope sent from server to clients.
#[derive(Debug, Clone, Serialize)]
pub struct WsEvent {
    /// Event name clients dispatch on.
    pub event: WsEventType,
    /// Event-specific payload.
    pub data: WsPayload,
}

/// Event name discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WsEventType {
    Connected,
    ReceiveData,
    Pong,
}

/// Event payload variants.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum WsPayload {
    Connected(ConnectedPayload),
    /// Opaque `sendData` payload, re-emitted byte for byte.
    ReceiveData(Box<RawValue>),
    Pong(PongPayload),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedPayload {
    pub id: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PongPayload {
    pub timestamp: u64,
}

impl WsEvent {
    pub fn connected(id: u64) -> Self {
        WsEvent {
            event: WsEventType::Connected,
            data: WsPayload::Connected(ConnectedPayload { id }),
        }
    }

    pub fn receive_data(payload: Box<RawValue>) -> Self {
        WsEvent {
            event: WsEventType::ReceiveData,
            data: WsPayload::ReceiveData(payload),
        }
    }

    pub fn pong() -> Self {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        WsEvent {
            event: WsEventType::Pong,
            data: WsPayload::Pong(PongPayload { timestamp: ts }),
        }
    }

    /// Serialize to JSON text for sending over WebSocket.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"event":"error","data":{"message":"serialization failed"}}"#.to_string()
        })
    }

    /// Serialize once into a frame that can be handed to many recipients.
    pub fn to_frame(&self) -> Frame {
        Utf8Bytes::from(self.to_json())
    }
}

// ---------------------------------------------------------------------------
// Client → Server commands
// ---------------------------------------------------------------------------

/// Why an inbound frame was dropped. None of these reach the client.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown event: {0}")]
    UnknownEvent(String),

    #[error("{event} requires a string room name")]
    InvalidRoom { event: &'static str },

    #[error("sendData payload has no string `room` field")]
    MissingRoom,
}

/// Commands sent from client to server over WebSocket.
#[derive(Debug, Clone)]
pub enum WsCommand {
    JoinRoom(String),
    LeaveRoom(String),
    /// Broadcast request. `payload` is the complete `{room, data, ...}`
    /// object exactly as the client sent it.
    SendData { room: String, payload: Box<RawValue> },
    Ping,
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Option<Box<RawValue>>,
}

#[derive(Deserialize)]
struct RoomField {
    room: String,
}

impl WsCommand {
    /// Decode a client text frame. Only the room name is inspected; the rest
    /// of a `sendData` payload is kept as raw JSON.
    pub fn decode(text: &str) -> Result<Self, FrameError> {
        let envelope: Envelope = serde_json::from_str(text)?;
        match envelope.event.as_str() {
            "joinRoom" => room_name(envelope.data.as_deref(), "joinRoom").map(WsCommand::JoinRoom),
            "leaveRoom" => {
                room_name(envelope.data.as_deref(), "leaveRoom").map(WsCommand::LeaveRoom)
            }
            "sendData" => {
                let payload = envelope.data.ok_or(FrameError::MissingRoom)?;
                let RoomField { room } =
                    serde_json::from_str(payload.get()).map_err(|_| FrameError::MissingRoom)?;
                Ok(WsCommand::SendData { room, payload })
            }
            "ping" => Ok(WsCommand::Ping),
            _ => Err(FrameError::UnknownEvent(envelope.event)),
        }
    }
}

fn room_name(data: Option<&RawValue>, event: &'static str) -> Result<String, FrameError> {
    data.and_then(|raw| serde_json::from_str::<String>(raw.get()).ok())
        .ok_or(FrameError::InvalidRoom { event })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
