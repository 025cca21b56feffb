//! HTTP layer: health, internal event ingress, and API docs.
//!
//! Ingress endpoints are mounted under `/internal/v1` behind
//! [`middleware::require_internal_key`].

pub mod doc;
pub mod dto;
pub mod handlers;
pub mod middleware;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// Builds the complete application: HTTP routes, `/ws`, and the tracing
/// and CORS layers, bound to `state`.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(build_router(&state))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Builds the HTTP router without the WebSocket route.
pub fn build_router(state: &AppState) -> Router<AppState> {
    let ingress = handlers::events::routes().route_layer(axum::middleware::from_fn_with_state(
        state.clone(),
        middleware::require_internal_key,
    ));

    let router = Router::new()
        .nest("/internal/v1", ingress)
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = {
        use utoipa::OpenApi;
        router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", doc::ApiDoc::openapi()),
        )
    };

    router
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::auth::JwtVerifier;
    use crate::domain::{EventBus, Room};
    use crate::persistence::InMemoryTicketStore;
    use crate::protocol::EventName;
    use crate::service::RealtimeService;

    fn state(key: Option<&str>) -> AppState {
        AppState {
            realtime: RealtimeService::new(
                EventBus::new(64),
                Arc::new(InMemoryTicketStore::new()),
            ),
            jwt: JwtVerifier::new("secret"),
            internal_api_key: key.map(Arc::from),
        }
    }

    fn app(state: &AppState) -> Router {
        build_router(state).with_state(state.clone())
    }

    fn post(uri: &str, key: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(key) = key {
            builder = builder.header(middleware::INTERNAL_KEY_HEADER, key);
        }
        let Ok(req) = builder.body(Body::from(body.to_string())) else {
            panic!("request should build");
        };
        req
    }

    async fn json_body(resp: axum::response::Response) -> Value {
        let Ok(bytes) = to_bytes(resp.into_body(), usize::MAX).await else {
            panic!("body should read");
        };
        let Ok(value) = serde_json::from_slice(&bytes) else {
            panic!("body should be JSON");
        };
        value
    }

    #[tokio::test]
    async fn health_is_ok() {
        let state = state(None);
        let Ok(req) = Request::builder().uri("/health").body(Body::empty()) else {
            panic!("request should build");
        };
        let Ok(resp) = app(&state).oneshot(req).await else {
            panic!("router should respond");
        };
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["status"], "healthy");
    }

    #[tokio::test]
    async fn ticket_update_routes_to_three_rooms() {
        let state = state(None);
        let mut rx = state.realtime.event_bus().subscribe();
        let req = post(
            "/internal/v1/tickets/t1/updates",
            None,
            r#"{"status":"OPEN","customerId":"c9"}"#,
        );
        let Ok(resp) = app(&state).oneshot(req).await else {
            panic!("router should respond");
        };
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        let mut rooms = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if event.room == Room::Admin {
                assert_eq!(event.event.name, EventName::TicketUpdated);
            } else {
                assert_eq!(event.event.name, EventName::TicketUpdate);
            }
            assert_eq!(event.event.data["ticketId"], "t1");
            rooms.push(event.room);
        }
        assert_eq!(
            rooms,
            vec![Room::ticket("t1"), Room::Admin, Room::user("c9")]
        );
    }

    #[tokio::test]
    async fn created_accepts_bare_id_string() {
        let state = state(None);
        let mut rx = state.realtime.event_bus().subscribe();
        let req = post("/internal/v1/tickets/created", None, r#""t42""#);
        let Ok(resp) = app(&state).oneshot(req).await else {
            panic!("router should respond");
        };
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        let Ok(event) = rx.try_recv() else {
            panic!("expected one event");
        };
        assert_eq!(event.room, Room::Admin);
        assert_eq!(event.event.data, json!({ "ticketId": "t42" }));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn session_with_empty_body_sends_empty_object() {
        let state = state(None);
        let mut rx = state.realtime.event_bus().subscribe();
        let req = post("/internal/v1/tickets/t1/sessions", None, "");
        let Ok(resp) = app(&state).oneshot(req).await else {
            panic!("router should respond");
        };
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        let Ok(event) = rx.try_recv() else {
            panic!("expected one event");
        };
        assert_eq!(event.event.data, json!({}));
    }

    #[tokio::test]
    async fn invalid_json_is_rejected() {
        let state = state(None);
        let req = post("/internal/v1/notifications", None, "{not json");
        let Ok(resp) = app(&state).oneshot(req).await else {
            panic!("router should respond");
        };
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["error"]["code"], 1001);
    }

    #[tokio::test]
    async fn ingress_requires_configured_key() {
        let state = state(Some("k1"));
        let Ok(resp) = app(&state)
            .oneshot(post("/internal/v1/notifications", Some("wrong"), "{}"))
            .await
        else {
            panic!("router should respond");
        };
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let Ok(resp) = app(&state)
            .oneshot(post("/internal/v1/notifications", Some("k1"), "{}"))
            .await
        else {
            panic!("router should respond");
        };
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(json_body(resp).await["deliveries"], 1);
    }

    #[tokio::test]
    async fn health_skips_internal_key() {
        let state = state(Some("k1"));
        let Ok(req) = Request::builder().uri("/health").body(Body::empty()) else {
            panic!("request should build");
        };
        let Ok(resp) = app(&state).oneshot(req).await else {
            panic!("router should respond");
        };
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[test]
    fn openapi_documents_ingress_bodies() {
        use utoipa::OpenApi;

        let Ok(spec) = serde_json::to_value(doc::ApiDoc::openapi()) else {
            panic!("openapi document should serialize");
        };
        for path in [
            "/internal/v1/tickets/created",
            "/internal/v1/tickets/{id}/messages",
            "/internal/v1/tickets/{id}/updates",
            "/internal/v1/tickets/{id}/sessions",
            "/internal/v1/tickets/{id}/deleted",
            "/internal/v1/appointments",
            "/internal/v1/notifications",
        ] {
            let body = &spec["paths"][path]["post"]["requestBody"];
            assert!(
                body["content"]["application/json"].is_object(),
                "{path} has no JSON request body"
            );
        }
    }
}
