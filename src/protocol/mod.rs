//! Wire protocol shared by the gateway and its clients.
//!
//! Every WebSocket text message is a JSON [`WsFrame`]:
//!
//! ```json
//! { "event": "join-ticket", "data": { "ticketId": "ck9x..." } }
//! ```
//!
//! Inbound frames are parsed into the closed [`ClientAction`] enum and
//! outbound frames are built from [`ServerEvent`], so both directions are
//! matched exhaustively instead of by string lookup.

pub mod action;
pub mod frame;

pub use action::{ClientAction, FrameError};
pub use frame::{EventName, ServerEvent, WsFrame};
