//! WebSocket module — the room relay.
//!
//! - [`messages`]: Event envelopes and inbound frame decoding.
//! - [`manager`]: Room membership tracking and broadcast.
//! - [`handler`]: Axum WebSocket upgrade handler.

pub mod handler;
pub mod manager;
pub mod messages;

pub use handler::ws_handler;
pub use manager::RoomManager;
pub use messages::WsEvent;
