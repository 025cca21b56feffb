//! WebSocket layer: connection handling, action dispatch, room membership.
//!
//! The WebSocket endpoint at `/ws` authenticates once at upgrade time,
//! then lets the client join rooms and receive the deliveries addressed to
//! them.

pub mod connection;
pub mod dispatch;
pub mod handler;
pub mod session;
pub mod subscription;

pub use dispatch::{ActionError, Denial, dispatch};
pub use session::ConnectionSession;
pub use subscription::RoomMembership;
