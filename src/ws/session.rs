//! State of one live WebSocket connection.

use super::subscription::RoomMembership;
use crate::domain::Identity;

/// A live connection: its id, who is behind it, and which rooms it joined.
#[derive(Debug)]
pub struct ConnectionSession {
    id: String,
    identity: Option<Identity>,
    rooms: RoomMembership,
}

impl ConnectionSession {
    /// Creates a session with a fresh random id.
    #[must_use]
    pub fn new(identity: Option<Identity>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), identity)
    }

    /// Creates a session with a known id.
    #[must_use]
    pub fn with_id(id: impl Into<String>, identity: Option<Identity>) -> Self {
        Self {
            id: id.into(),
            identity,
            rooms: RoomMembership::new(),
        }
    }

    /// Opaque connection id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Authenticated identity, `None` for anonymous connections.
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Joined rooms.
    #[must_use]
    pub fn rooms(&self) -> &RoomMembership {
        &self.rooms
    }

    /// Joined rooms, mutably.
    pub fn rooms_mut(&mut self) -> &mut RoomMembership {
        &mut self.rooms
    }
}
