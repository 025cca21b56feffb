//! OpenAPI document for the HTTP surface.

use utoipa::OpenApi;

use crate::api::dto::DeliveryResponse;
use crate::api::handlers::{events, system};
use crate::error::{ErrorBody, ErrorResponse};

/// Generated OpenAPI description served by Swagger UI.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "ticket-realtime-gateway",
        description = "Room-based realtime fan-out for the ticketing system."
    ),
    paths(
        system::health_handler,
        events::ticket_created,
        events::ticket_message,
        events::ticket_update,
        events::ticket_session,
        events::ticket_deleted,
        events::appointment_upsert,
        events::notification,
    ),
    components(schemas(DeliveryResponse, ErrorResponse, ErrorBody, system::HealthResponse)),
    tags(
        (name = "System", description = "Liveness"),
        (name = "Events", description = "Internal event ingress"),
    )
)]
pub struct ApiDoc;
