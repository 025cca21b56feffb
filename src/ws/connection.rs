//! WebSocket connection loop.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! dispatching incoming actions and forwarding room deliveries.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::dispatch::dispatch;
use super::session::ConnectionSession;
use crate::domain::RoomEvent;
use crate::protocol::{ClientAction, FrameError, ServerEvent};
use crate::service::RealtimeService;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads actions from the client and dispatches them in arrival order.
/// - Forwards deliveries from the [`broadcast::Receiver`] whose room the
///   connection has joined.
///
/// The loop ends when the client closes, the socket errors, or the bus
/// shuts down; the session and its memberships are dropped with it.
pub async fn run_connection(
    socket: WebSocket,
    mut event_rx: broadcast::Receiver<RoomEvent>,
    service: RealtimeService,
    mut session: ConnectionSession,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    tracing::info!(
        conn_id = session.id(),
        user = session.identity().map(|i| i.sub.as_str()),
        "ws connection opened"
    );

    loop {
        tokio::select! {
            // Incoming message from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let replies = handle_text_message(&text, &service, &mut session).await;
                        if send_all(&mut ws_tx, &replies).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!(conn_id = session.id(), error = %err, "ws read error");
                        break;
                    }
                    _ => {}
                }
            }
            // Delivery from EventBus
            delivery = event_rx.recv() => {
                match delivery {
                    Ok(RoomEvent { room, event }) => {
                        if session.rooms().matches(&room)
                            && ws_tx.send(Message::text(event.to_json())).await.is_err()
                        {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(conn_id = session.id(), lagged = n, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::info!(
        conn_id = session.id(),
        rooms = session.rooms().count(),
        "ws connection closed"
    );
}

/// Handles a text message from the client, returning the events for the
/// sender.
async fn handle_text_message(
    text: &str,
    service: &RealtimeService,
    session: &mut ConnectionSession,
) -> Vec<ServerEvent> {
    match ClientAction::parse(text) {
        Ok(action) => dispatch(service, session, action).await,
        Err(FrameError::Malformed(err)) => {
            tracing::debug!(conn_id = session.id(), error = %err, "malformed ws frame");
            vec![ServerEvent::error("Malformed frame")]
        }
        Err(FrameError::UnknownEvent(name)) => {
            tracing::debug!(conn_id = session.id(), event = %name, "unknown ws event");
            vec![ServerEvent::error(format!("Unknown event {name}"))]
        }
    }
}

async fn send_all<S>(ws_tx: &mut S, events: &[ServerEvent]) -> Result<(), axum::Error>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    for event in events {
        ws_tx.send(Message::text(event.to_json())).await?;
    }
    Ok(())
}
