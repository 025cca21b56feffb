//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::auth::JwtVerifier;
use crate::service::RealtimeService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Realtime fan-out and ticket lookups.
    pub realtime: RealtimeService,
    /// Access-token verifier for WebSocket upgrades.
    pub jwt: JwtVerifier,
    /// Shared key required on the internal event ingress, if any.
    pub internal_api_key: Option<Arc<str>>,
}
