//! Event ingress DTOs.

use serde::Serialize;
use utoipa::ToSchema;

/// Response body for every event ingress endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeliveryResponse {
    /// Number of room deliveries the event produced.
    pub deliveries: usize,
}
