//! Axum WebSocket upgrade handler.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use serde::Deserialize;

use super::connection::run_connection;
use super::session::ConnectionSession;
use crate::app_state::AppState;
use crate::auth::authenticate;

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    /// Access token, for clients that cannot set headers.
    #[serde(default)]
    pub token: Option<String>,
}

/// `GET /ws`: Upgrade HTTP connection to WebSocket.
///
/// The access token is verified here, once; a connection without a valid
/// token is still accepted but every gated action will be denied.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let identity = authenticate(&state.jwt, &headers, params.token.as_deref());
    let session = ConnectionSession::new(identity);
    let event_rx = state.realtime.event_bus().subscribe();
    let service = state.realtime.clone();

    ws.on_upgrade(move |socket| run_connection(socket, event_rx, service, session))
}
