//! Request guards for the internal event ingress.

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::app_state::AppState;
use crate::error::GatewayError;

/// Header carrying the shared key of internal callers.
pub const INTERNAL_KEY_HEADER: &str = "x-internal-key";

/// Rejects ingress calls whose `x-internal-key` does not match the
/// configured key. Without a configured key every call passes.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthorized`] when the header is missing or
/// differs from the configured key.
pub async fn require_internal_key(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, GatewayError> {
    if let Some(expected) = state.internal_api_key.as_deref() {
        let provided = req
            .headers()
            .get(INTERNAL_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided != Some(expected) {
            tracing::warn!(path = %req.uri().path(), "rejected ingress call with bad internal key");
            return Err(GatewayError::Unauthorized(
                "missing or invalid internal key".to_string(),
            ));
        }
    }
    Ok(next.run(req).await)
}
