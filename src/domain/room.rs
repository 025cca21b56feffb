//! Named broadcast groups.

use std::fmt;
use std::str::FromStr;

/// A broadcast group a connection can belong to.
///
/// The string form is part of the wire contract and must stay
/// `ticket:<ticketId>`, `user:<userId>` or `admin`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Room {
    /// Parties interested in one ticket.
    Ticket(String),
    /// A single user's private channel.
    User(String),
    /// All privileged staff.
    Admin,
}

impl Room {
    /// Room for a ticket.
    #[must_use]
    pub fn ticket(ticket_id: impl Into<String>) -> Self {
        Self::Ticket(ticket_id.into())
    }

    /// Private room for a user.
    #[must_use]
    pub fn user(user_id: impl Into<String>) -> Self {
        Self::User(user_id.into())
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ticket(id) => write!(f, "ticket:{id}"),
            Self::User(id) => write!(f, "user:{id}"),
            Self::Admin => f.write_str("admin"),
        }
    }
}

/// Error returned when a string is not a valid room name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid room name: {0}")]
pub struct ParseRoomError(String);

impl FromStr for Room {
    type Err = ParseRoomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "admin" {
            return Ok(Self::Admin);
        }
        match s.split_once(':') {
            Some(("ticket", id)) if !id.is_empty() => Ok(Self::ticket(id)),
            Some(("user", id)) if !id.is_empty() => Ok(Self::user(id)),
            _ => Err(ParseRoomError(s.to_string())),
        }
    }
}
