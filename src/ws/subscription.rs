//! Per-connection room membership.
//!
//! Tracks which rooms a WebSocket client has joined and provides
//! server-side delivery filtering.

use std::collections::HashSet;

use crate::domain::Room;

/// The set of rooms a single WebSocket connection belongs to.
///
/// Mutated only by the owning connection's own action handlers; dropped
/// with the connection.
#[derive(Debug, Default)]
pub struct RoomMembership {
    rooms: HashSet<Room>,
}

impl RoomMembership {
    /// Creates an empty membership set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins a room. Returns `false` if already a member.
    pub fn join(&mut self, room: Room) -> bool {
        self.rooms.insert(room)
    }

    /// Leaves a room. Returns `false` if not a member.
    pub fn leave(&mut self, room: &Room) -> bool {
        self.rooms.remove(room)
    }

    /// Returns `true` if a delivery to `room` should reach this connection.
    #[must_use]
    pub fn matches(&self, room: &Room) -> bool {
        self.rooms.contains(room)
    }

    /// Returns the number of joined rooms.
    #[must_use]
    pub fn count(&self) -> usize {
        self.rooms.len()
    }

    /// Iterates over the joined rooms.
    pub fn iter(&self) -> impl Iterator<Item = &Room> {
        self.rooms.iter()
    }
}
