//! Event ingress handlers: other backend services trigger fan-out here.
//!
//! Bodies are opaque JSON forwarded to the realtime service unchanged. An
//! empty body counts as no payload.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;

use crate::api::dto::DeliveryResponse;
use crate::app_state::AppState;
use crate::domain::TicketRef;
use crate::error::{ErrorResponse, GatewayError};

/// `POST /tickets/{id}/messages`: Broadcast a ticket message.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] when the body is not JSON.
#[utoipa::path(
    post,
    path = "/internal/v1/tickets/{id}/messages",
    tag = "Events",
    summary = "Broadcast a ticket message",
    description = "Sends `ticket:message` with the JSON body to room `ticket:<id>`.",
    params(("id" = String, Path, description = "Ticket id")),
    request_body(content = Object, content_type = "application/json", description = "Message payload, forwarded unchanged"),
    responses(
        (status = 202, description = "Event routed", body = DeliveryResponse),
        (status = 400, description = "Body is not JSON", body = ErrorResponse),
        (status = 401, description = "Missing or invalid internal key", body = ErrorResponse),
    )
)]
pub async fn ticket_message(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, GatewayError> {
    let message = parse_body(&body)?;
    let deliveries = state.realtime.emit_ticket_message(&ticket_id, message);
    Ok(accepted(deliveries))
}

/// `POST /tickets/{id}/updates`: Broadcast a ticket change.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] when the body is not JSON.
#[utoipa::path(
    post,
    path = "/internal/v1/tickets/{id}/updates",
    tag = "Events",
    summary = "Broadcast a ticket update",
    description = "Sends `{ticketId, ...body}` as `ticket:update` to the ticket room and the customer's room (when the body has `customerId`), and as `ticket:updated` to `admin`.",
    params(("id" = String, Path, description = "Ticket id")),
    request_body(content = Object, content_type = "application/json", description = "Payload merged after `ticketId`"),
    responses(
        (status = 202, description = "Event routed", body = DeliveryResponse),
        (status = 400, description = "Body is not JSON", body = ErrorResponse),
        (status = 401, description = "Missing or invalid internal key", body = ErrorResponse),
    )
)]
pub async fn ticket_update(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, GatewayError> {
    let payload = parse_body(&body)?;
    let deliveries = state.realtime.emit_ticket_update(&ticket_id, payload);
    Ok(accepted(deliveries))
}

/// `POST /tickets/{id}/sessions`: Broadcast a remote-session change.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] when the body is not JSON.
#[utoipa::path(
    post,
    path = "/internal/v1/tickets/{id}/sessions",
    tag = "Events",
    summary = "Broadcast a ticket session change",
    description = "Sends `ticket:session` to room `ticket:<id>`; an empty body is sent as `{}`.",
    params(("id" = String, Path, description = "Ticket id")),
    request_body(content = Object, content_type = "application/json", description = "Session payload; may be empty"),
    responses(
        (status = 202, description = "Event routed", body = DeliveryResponse),
        (status = 400, description = "Body is not JSON", body = ErrorResponse),
        (status = 401, description = "Missing or invalid internal key", body = ErrorResponse),
    )
)]
pub async fn ticket_session(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, GatewayError> {
    let payload = parse_body(&body)?;
    let deliveries = state.realtime.emit_ticket_session(&ticket_id, payload);
    Ok(accepted(deliveries))
}

/// `POST /tickets/{id}/deleted`: Broadcast a ticket deletion.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] when the body is not JSON.
#[utoipa::path(
    post,
    path = "/internal/v1/tickets/{id}/deleted",
    tag = "Events",
    summary = "Broadcast a ticket deletion",
    description = "Sends `{ticketId, ...body}` as `ticket:deleted` to the ticket room, `admin`, and the customer's room when the body has `customerId`.",
    params(("id" = String, Path, description = "Ticket id")),
    request_body(content = Object, content_type = "application/json", description = "Payload merged after `ticketId`"),
    responses(
        (status = 202, description = "Event routed", body = DeliveryResponse),
        (status = 400, description = "Body is not JSON", body = ErrorResponse),
        (status = 401, description = "Missing or invalid internal key", body = ErrorResponse),
    )
)]
pub async fn ticket_deleted(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, GatewayError> {
    let payload = parse_body(&body)?;
    let deliveries = state.realtime.emit_ticket_deleted(&ticket_id, payload);
    Ok(accepted(deliveries))
}

/// `POST /tickets/created`: Announce a new ticket.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] when the body is not JSON.
#[utoipa::path(
    post,
    path = "/internal/v1/tickets/created",
    tag = "Events",
    summary = "Announce a created ticket",
    description = "Body is either a JSON string (bare ticket id) or a ticket object. Sends `ticket:created` to `admin` and, for objects with `customerId`, to the customer's room.",
    request_body(content = Object, content_type = "application/json", description = "Ticket object, or a JSON string holding a bare ticket id"),
    responses(
        (status = 202, description = "Event routed", body = DeliveryResponse),
        (status = 400, description = "Body is not JSON", body = ErrorResponse),
        (status = 401, description = "Missing or invalid internal key", body = ErrorResponse),
    )
)]
pub async fn ticket_created(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, GatewayError> {
    let ticket = TicketRef::from(parse_body(&body)?);
    let deliveries = state.realtime.emit_ticket_created(ticket);
    Ok(accepted(deliveries))
}

/// `POST /appointments`: Broadcast an appointment upsert.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] when the body is not JSON.
#[utoipa::path(
    post,
    path = "/internal/v1/appointments",
    tag = "Events",
    summary = "Broadcast an appointment",
    description = "Sends `appointment:upsert` to `admin` and `appointment:update` to the customer of `ticket.customerId`.",
    request_body(content = Object, content_type = "application/json", description = "Appointment object"),
    responses(
        (status = 202, description = "Event routed", body = DeliveryResponse),
        (status = 400, description = "Body is not JSON", body = ErrorResponse),
        (status = 401, description = "Missing or invalid internal key", body = ErrorResponse),
    )
)]
pub async fn appointment_upsert(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, GatewayError> {
    let appointment = parse_body(&body)?;
    let deliveries = state.realtime.emit_appointment_upsert(&appointment);
    Ok(accepted(deliveries))
}

/// `POST /notifications`: Deliver a notification.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] when the body is not JSON.
#[utoipa::path(
    post,
    path = "/internal/v1/notifications",
    tag = "Events",
    summary = "Deliver a notification",
    description = "Sends `notification:new` to `user:<userId>`, or to `admin` when the body has no `userId`.",
    request_body(content = Object, content_type = "application/json", description = "Notification object"),
    responses(
        (status = 202, description = "Event routed", body = DeliveryResponse),
        (status = 400, description = "Body is not JSON", body = ErrorResponse),
        (status = 401, description = "Missing or invalid internal key", body = ErrorResponse),
    )
)]
pub async fn notification(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, GatewayError> {
    let notification = parse_body(&body)?;
    let deliveries = state.realtime.emit_notification(&notification);
    Ok(accepted(deliveries))
}

/// Event ingress routes, mounted under `/internal/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tickets/created", post(ticket_created))
        .route("/tickets/{id}/messages", post(ticket_message))
        .route("/tickets/{id}/updates", post(ticket_update))
        .route("/tickets/{id}/sessions", post(ticket_session))
        .route("/tickets/{id}/deleted", post(ticket_deleted))
        .route("/appointments", post(appointment_upsert))
        .route("/notifications", post(notification))
}

fn parse_body(body: &Bytes) -> Result<Value, GatewayError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body)
        .map_err(|e| GatewayError::InvalidRequest(format!("body is not valid JSON: {e}")))
}

fn accepted(deliveries: usize) -> impl IntoResponse {
    (StatusCode::ACCEPTED, Json(DeliveryResponse { deliveries }))
}
