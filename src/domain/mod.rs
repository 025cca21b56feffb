//! Domain layer: rooms, identities, and the room-scoped event bus.
//!
//! Rooms have no storage of their own: a connection's membership set is
//! the only record of who listens where, and the [`EventBus`] carries
//! `(room, event)` deliveries that each connection filters against it.

pub mod event_bus;
pub mod identity;
pub mod room;
pub mod ticket_ref;

pub use event_bus::{EventBus, RoomEvent};
pub use identity::Identity;
pub use room::Room;
pub use ticket_ref::TicketRef;
