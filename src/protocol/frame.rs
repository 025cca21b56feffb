//! Frame envelope and the server → client event catalogue.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level WebSocket message envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsFrame {
    /// Event name (e.g. `"join-ticket"`, `"ticket:update"`).
    pub event: String,
    /// Event payload. Omitted on the wire when null.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

/// Every event name the gateway can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventName {
    /// Reply to `ping`.
    #[serde(rename = "pong")]
    Pong,
    /// Denial or failure of a client action.
    #[serde(rename = "error")]
    Error,
    /// Acknowledges a `test:notification` request.
    #[serde(rename = "test:notification:sent")]
    TestNotificationSent,
    /// A ticket was created.
    #[serde(rename = "ticket:created")]
    TicketCreated,
    /// A ticket changed (ticket and customer rooms).
    #[serde(rename = "ticket:update")]
    TicketUpdate,
    /// A ticket changed (admin room alias).
    #[serde(rename = "ticket:updated")]
    TicketUpdated,
    /// A ticket was deleted.
    #[serde(rename = "ticket:deleted")]
    TicketDeleted,
    /// A new message was posted on a ticket.
    #[serde(rename = "ticket:message")]
    TicketMessage,
    /// A remote support session changed on a ticket.
    #[serde(rename = "ticket:session")]
    TicketSession,
    /// An appointment was created or changed (admin room).
    #[serde(rename = "appointment:upsert")]
    AppointmentUpsert,
    /// An appointment was created or changed (customer room).
    #[serde(rename = "appointment:update")]
    AppointmentUpdate,
    /// A notification was created.
    #[serde(rename = "notification:new")]
    NotificationNew,
}

impl EventName {
    /// Returns the wire name of the event.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pong => "pong",
            Self::Error => "error",
            Self::TestNotificationSent => "test:notification:sent",
            Self::TicketCreated => "ticket:created",
            Self::TicketUpdate => "ticket:update",
            Self::TicketUpdated => "ticket:updated",
            Self::TicketDeleted => "ticket:deleted",
            Self::TicketMessage => "ticket:message",
            Self::TicketSession => "ticket:session",
            Self::AppointmentUpsert => "appointment:upsert",
            Self::AppointmentUpdate => "appointment:update",
            Self::NotificationNew => "notification:new",
        }
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A server → client event: name plus opaque payload.
///
/// Serializes to the same shape as [`WsFrame`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEvent {
    /// Event name.
    #[serde(rename = "event")]
    pub name: EventName,
    /// Event payload.
    #[serde(default)]
    pub data: Value,
}

impl ServerEvent {
    /// Creates an event with the given name and payload.
    #[must_use]
    pub fn new(name: EventName, data: Value) -> Self {
        Self { name, data }
    }

    /// Builds an `error{message}` event.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(
            EventName::Error,
            serde_json::json!({ "message": message.into() }),
        )
    }

    /// Serializes the event into a JSON text frame.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
