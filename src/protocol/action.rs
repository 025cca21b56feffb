//! Client → server actions.

use serde_json::{Map, Value};

use super::WsFrame;

/// Reasons an inbound text message could not be turned into an action.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The message is not a JSON frame.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The frame names an event the gateway does not accept.
    #[error("unknown event {0}")]
    UnknownEvent(String),
}

/// An action a connected client may request.
///
/// Id fields are optional because clients may omit them; handlers treat a
/// missing id according to the action's own rules.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientAction {
    /// `ping`: echoed back to the sender.
    Ping(Value),
    /// `ticket:created:client{id}`: client notice that it created a ticket.
    TicketCreatedClient {
        /// Id of the created ticket.
        id: Option<String>,
    },
    /// `test:notification{userId?, message?}`.
    TestNotification {
        /// Target user, defaults to the requester.
        user_id: Option<String>,
        /// Notification text.
        message: Option<String>,
    },
    /// `join-ticket{ticketId}`.
    JoinTicket {
        /// Ticket whose room to join.
        ticket_id: Option<String>,
    },
    /// `leave-ticket{ticketId}`.
    LeaveTicket {
        /// Ticket whose room to leave.
        ticket_id: Option<String>,
    },
    /// `join-admin`.
    JoinAdmin,
    /// `leave-admin`.
    LeaveAdmin,
    /// `join-user{userId}`.
    JoinUser {
        /// User whose private room to join.
        user_id: Option<String>,
    },
    /// `leave-user{userId}`.
    LeaveUser {
        /// User whose private room to leave.
        user_id: Option<String>,
    },
}

impl ClientAction {
    /// Returns the wire name of the action.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ping(_) => "ping",
            Self::TicketCreatedClient { .. } => "ticket:created:client",
            Self::TestNotification { .. } => "test:notification",
            Self::JoinTicket { .. } => "join-ticket",
            Self::LeaveTicket { .. } => "leave-ticket",
            Self::JoinAdmin => "join-admin",
            Self::LeaveAdmin => "leave-admin",
            Self::JoinUser { .. } => "join-user",
            Self::LeaveUser { .. } => "leave-user",
        }
    }

    /// Parses a JSON text message into an action.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Malformed`] if the text is not a frame, or
    /// [`FrameError::UnknownEvent`] if the event name is not an action.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let frame: WsFrame = serde_json::from_str(text)?;
        Self::from_frame(frame)
    }

    /// Converts a decoded frame into an action.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::UnknownEvent`] if the event name is not an
    /// action.
    pub fn from_frame(frame: WsFrame) -> Result<Self, FrameError> {
        let data = &frame.data;
        let action = match frame.event.as_str() {
            "ping" => Self::Ping(frame.data.clone()),
            "ticket:created:client" => Self::TicketCreatedClient {
                id: string_field(data, "id"),
            },
            "test:notification" => Self::TestNotification {
                user_id: string_field(data, "userId"),
                message: string_field(data, "message"),
            },
            "join-ticket" => Self::JoinTicket {
                ticket_id: string_field(data, "ticketId"),
            },
            "leave-ticket" => Self::LeaveTicket {
                ticket_id: string_field(data, "ticketId"),
            },
            "join-admin" => Self::JoinAdmin,
            "leave-admin" => Self::LeaveAdmin,
            "join-user" => Self::JoinUser {
                user_id: string_field(data, "userId"),
            },
            "leave-user" => Self::LeaveUser {
                user_id: string_field(data, "userId"),
            },
            _ => return Err(FrameError::UnknownEvent(frame.event)),
        };
        Ok(action)
    }

    /// Builds the wire frame for this action.
    #[must_use]
    pub fn to_frame(&self) -> WsFrame {
        let data = match self {
            Self::Ping(payload) => payload.clone(),
            Self::TicketCreatedClient { id } => object([("id", id.as_deref())]),
            Self::TestNotification { user_id, message } => object([
                ("userId", user_id.as_deref()),
                ("message", message.as_deref()),
            ]),
            Self::JoinTicket { ticket_id } | Self::LeaveTicket { ticket_id } => {
                object([("ticketId", ticket_id.as_deref())])
            }
            Self::JoinUser { user_id } | Self::LeaveUser { user_id } => {
                object([("userId", user_id.as_deref())])
            }
            Self::JoinAdmin | Self::LeaveAdmin => Value::Null,
        };
        WsFrame {
            event: self.name().to_string(),
            data,
        }
    }

    /// Serializes the action into a JSON text frame.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.to_frame()).unwrap_or_default()
    }
}

/// Reads a non-empty string field from an object payload.
pub(crate) fn string_field(data: &Value, key: &str) -> Option<String> {
    data.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn object<const N: usize>(fields: [(&str, Option<&str>); N]) -> Value {
    let map: Map<String, Value> = fields
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k.to_string(), Value::String(v.to_string()))))
        .collect();
    Value::Object(map)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_join_ticket() {
        let action = ClientAction::parse(r#"{"event":"join-ticket","data":{"ticketId":"t1"}}"#);
        let Ok(action) = action else {
            panic!("expected action");
        };
        assert_eq!(
            action,
            ClientAction::JoinTicket {
                ticket_id: Some("t1".to_string())
            }
        );
    }

    #[test]
    fn unit_actions_ignore_data() {
        let with_data = ClientAction::parse(r#"{"event":"join-admin","data":{}}"#);
        let without = ClientAction::parse(r#"{"event":"join-admin"}"#);
        assert!(matches!(with_data, Ok(ClientAction::JoinAdmin)));
        assert!(matches!(without, Ok(ClientAction::JoinAdmin)));
    }

    #[test]
    fn empty_ids_are_treated_as_missing() {
        let action = ClientAction::parse(r#"{"event":"join-user","data":{"userId":""}}"#);
        assert!(matches!(action, Ok(ClientAction::JoinUser { user_id: None })));
    }

    #[test]
    fn unknown_event_is_rejected() {
        let result = ClientAction::parse(r#"{"event":"drop-tables"}"#);
        assert!(matches!(result, Err(FrameError::UnknownEvent(name)) if name == "drop-tables"));
    }

    #[test]
    fn malformed_json_is_rejected() {
        let result = ClientAction::parse("{not json");
        assert!(matches!(result, Err(FrameError::Malformed(_))));
    }

    #[test]
    fn to_frame_round_trips_through_parse() {
        let action = ClientAction::TestNotification {
            user_id: Some("u1".to_string()),
            message: None,
        };
        let frame = action.to_frame();
        assert_eq!(frame.data, json!({ "userId": "u1" }));
        let Ok(parsed) = ClientAction::from_frame(frame) else {
            panic!("expected action");
        };
        assert_eq!(parsed, action);
    }

    #[test]
    fn ping_keeps_arbitrary_payload() {
        let Ok(action) = ClientAction::parse(r#"{"event":"ping","data":[1,2,3]}"#) else {
            panic!("expected action");
        };
        assert_eq!(action, ClientAction::Ping(json!([1, 2, 3])));
    }
}
