//! Broadcast channel for room-scoped deliveries.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. Every fan-out
//! publishes one [`RoomEvent`] per target room, and every WebSocket
//! connection subscribes and forwards the deliveries whose room it has
//! joined.

use tokio::sync::broadcast;

use super::Room;
use crate::protocol::ServerEvent;

/// One event addressed to one room.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomEvent {
    /// Target room.
    pub room: Room,
    /// Event to deliver to the room's members.
    pub event: ServerEvent,
}

/// Broadcast bus for [`RoomEvent`]s.
///
/// Backed by a `tokio::broadcast` channel with a configurable capacity
/// (default 10 000). When the ring buffer is full, the oldest deliveries
/// are dropped for lagging receivers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RoomEvent>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to a room.
    ///
    /// Returns the number of receivers that got the delivery. If there are
    /// no active receivers, the delivery is silently dropped.
    pub fn publish(&self, room: Room, event: ServerEvent) -> usize {
        tracing::trace!(%room, event = %event.name, "publishing room event");
        self.sender.send(RoomEvent { room, event }).unwrap_or(0)
    }

    /// Creates a new receiver that will receive all future deliveries.
    ///
    /// Each WebSocket connection should call this once on connect.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
