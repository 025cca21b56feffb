//! Inbound action dispatch and authorization.
//!
//! Every [`ClientAction`] is validated before it takes effect. Handlers
//! never fail towards the transport: a rejected or failed action turns
//! into a single `error` event for the requesting connection.

use chrono::{SecondsFormat, Utc};
use serde_json::{Value, json};

use super::session::ConnectionSession;
use crate::domain::{Identity, Room};
use crate::error::GatewayError;
use crate::protocol::{ClientAction, EventName, ServerEvent};
use crate::service::RealtimeService;

/// Why an inbound action was refused. The `Display` text is what the
/// client receives in `error{message}`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Denial {
    /// The connection has no identity.
    #[error("Authentication required for {0}")]
    AuthenticationRequired(&'static str),

    /// `ticket:created:client` without a ticket id.
    #[error("Invalid ticket data")]
    InvalidTicketData,

    /// `ticket:created:client` for an id the store does not know.
    #[error("Ticket {0} not found in database")]
    TicketNotInDatabase(String),

    /// `join-ticket` for an id the store does not know.
    #[error("Ticket not found")]
    TicketNotFound,

    /// A customer tried to announce someone else's ticket.
    #[error("Not authorized to broadcast this ticket event")]
    BroadcastForbidden,

    /// A customer tried to notify another user.
    #[error("Not authorized to send notifications for other users")]
    NotificationForbidden,

    /// The user neither owns nor is assigned to the ticket.
    #[error("Access denied for ticket {0}")]
    TicketAccessDenied(String),

    /// A non-staff user tried to join `admin`.
    #[error("Admin role required to join admin room")]
    AdminRoleRequired,

    /// A user tried to join another user's private room.
    #[error("Cannot join room for user {0}")]
    UserRoomForbidden(String),
}

/// Outcome of a failed action.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// Expected refusal (authorization or missing target).
    #[error(transparent)]
    Denied(#[from] Denial),

    /// Unexpected failure while processing.
    #[error(transparent)]
    Failed(#[from] GatewayError),
}

/// Runs one inbound action and returns the events addressed to the sender.
///
/// Room fan-out caused by the action goes through the service's event bus;
/// the returned events are for the requesting connection only.
pub async fn dispatch(
    service: &RealtimeService,
    session: &mut ConnectionSession,
    action: ClientAction,
) -> Vec<ServerEvent> {
    let action_name = action.name();
    tracing::debug!(conn_id = session.id(), action = action_name, "inbound action");

    match handle(service, session, action).await {
        Ok(replies) => replies,
        Err(ActionError::Denied(denial)) => {
            tracing::warn!(
                conn_id = session.id(),
                action = action_name,
                reason = %denial,
                "unauthorized socket access"
            );
            vec![ServerEvent::error(denial.to_string())]
        }
        Err(ActionError::Failed(err)) => {
            tracing::error!(
                conn_id = session.id(),
                action = action_name,
                error = %err,
                "failed to process socket action"
            );
            vec![ServerEvent::error(format!(
                "Failed to process {action_name} event"
            ))]
        }
    }
}

async fn handle(
    service: &RealtimeService,
    session: &mut ConnectionSession,
    action: ClientAction,
) -> Result<Vec<ServerEvent>, ActionError> {
    match action {
        ClientAction::Ping(payload) => Ok(vec![pong(session, payload)]),
        ClientAction::TicketCreatedClient { id } => {
            ticket_created_client(service, session, id).await
        }
        ClientAction::TestNotification { user_id, message } => {
            test_notification(service, session, user_id, message)
        }
        ClientAction::JoinTicket { ticket_id } => join_ticket(service, session, ticket_id).await,
        ClientAction::LeaveTicket { ticket_id } => {
            if let Some(ticket_id) = ticket_id {
                session.rooms_mut().leave(&Room::ticket(ticket_id));
            }
            Ok(Vec::new())
        }
        ClientAction::JoinAdmin => {
            let identity = require_identity(session, "admin room")?;
            if !identity.is_privileged() {
                return Err(Denial::AdminRoleRequired.into());
            }
            join(session, Room::Admin);
            Ok(Vec::new())
        }
        ClientAction::LeaveAdmin => {
            session.rooms_mut().leave(&Room::Admin);
            Ok(Vec::new())
        }
        ClientAction::JoinUser { user_id } => {
            let Some(user_id) = user_id else {
                return Ok(Vec::new());
            };
            let identity = require_identity(session, "user room")?;
            if !identity.is_user(&user_id) && !identity.is_privileged() {
                return Err(Denial::UserRoomForbidden(user_id).into());
            }
            join(session, Room::user(user_id));
            Ok(Vec::new())
        }
        ClientAction::LeaveUser { user_id } => {
            if let Some(user_id) = user_id {
                session.rooms_mut().leave(&Room::user(user_id));
            }
            Ok(Vec::new())
        }
    }
}

fn pong(session: &ConnectionSession, payload: Value) -> ServerEvent {
    ServerEvent::new(
        EventName::Pong,
        json!({
            "received": payload,
            "serverTime": iso_now(),
            "clientId": session.id(),
        }),
    )
}

async fn ticket_created_client(
    service: &RealtimeService,
    session: &ConnectionSession,
    ticket_id: Option<String>,
) -> Result<Vec<ServerEvent>, ActionError> {
    let identity = require_identity(session, "ticket creation events")?;
    let ticket_id = ticket_id.ok_or(Denial::InvalidTicketData)?;

    let record = service
        .find_ticket(&ticket_id)
        .await?
        .ok_or_else(|| Denial::TicketNotInDatabase(ticket_id.clone()))?;

    if !identity.is_privileged() && record.customer_id.as_deref() != Some(identity.sub.as_str()) {
        return Err(Denial::BroadcastForbidden.into());
    }

    let payload = serde_json::to_value(&record)
        .map_err(|e| GatewayError::Internal(format!("ticket serialization failed: {e}")))?;
    service.emit_ticket_created(payload);
    Ok(Vec::new())
}

fn test_notification(
    service: &RealtimeService,
    session: &ConnectionSession,
    user_id: Option<String>,
    message: Option<String>,
) -> Result<Vec<ServerEvent>, ActionError> {
    let identity = require_identity(session, "test notifications")?;
    let target = user_id.unwrap_or_else(|| identity.sub.clone());
    if !identity.is_privileged() && !identity.is_user(&target) {
        return Err(Denial::NotificationForbidden.into());
    }

    let notification = json!({
        "id": format!("test-{}", Utc::now().timestamp_millis()),
        "userId": target,
        "type": "TEST_NOTIFICATION",
        "message": message.unwrap_or_else(|| "This is a test notification".to_string()),
        "createdAt": iso_now(),
        "read": false,
    });
    service.emit_notification(&notification);

    Ok(vec![ServerEvent::new(
        EventName::TestNotificationSent,
        json!({ "success": true, "notification": notification }),
    )])
}

async fn join_ticket(
    service: &RealtimeService,
    session: &mut ConnectionSession,
    ticket_id: Option<String>,
) -> Result<Vec<ServerEvent>, ActionError> {
    let Some(ticket_id) = ticket_id else {
        return Ok(Vec::new());
    };
    let identity = require_identity(session, "ticket rooms")?;

    // Staff may watch any ticket without a lookup.
    if !identity.is_privileged() {
        let record = service
            .find_ticket(&ticket_id)
            .await?
            .ok_or(Denial::TicketNotFound)?;
        if !record.involves(&identity.sub) {
            return Err(Denial::TicketAccessDenied(ticket_id).into());
        }
    }

    join(session, Room::ticket(ticket_id));
    Ok(Vec::new())
}

fn require_identity<'a>(
    session: &'a ConnectionSession,
    what: &'static str,
) -> Result<&'a Identity, Denial> {
    session
        .identity()
        .ok_or(Denial::AuthenticationRequired(what))
}

fn join(session: &mut ConnectionSession, room: Room) {
    tracing::debug!(conn_id = session.id(), %room, "joined room");
    session.rooms_mut().join(room);
}

fn iso_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
