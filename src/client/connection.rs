//! WebSocket client for the realtime gateway.
//!
//! [`RealtimeClient`] is constructed explicitly and shared by reference;
//! views observe its [`ConnectionState`] and subscribe to inbound events
//! instead of polling for a socket.

use std::fmt;

use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::error::ClientError;
use crate::protocol::{ClientAction, ServerEvent};

/// Capacity of the inbound event channel per client.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Observable state of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Handshake in progress.
    Connecting,
    /// Frames flow in both directions.
    Connected,
    /// No connection; initial and final state.
    Disconnected,
}

#[derive(Debug)]
struct Link {
    outbound: mpsc::UnboundedSender<Message>,
    task: JoinHandle<()>,
}

/// Client side of the realtime gateway.
pub struct RealtimeClient {
    ws_url: Url,
    access_token: Option<String>,
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<ServerEvent>,
    link: Mutex<Option<Link>>,
}

impl RealtimeClient {
    /// Creates a disconnected client for the gateway at `ws_url`
    /// (e.g. `ws://host:3000/ws`).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] if `ws_url` does not parse.
    pub fn new(ws_url: &str, access_token: Option<String>) -> Result<Self, ClientError> {
        let ws_url =
            Url::parse(ws_url).map_err(|e| ClientError::InvalidUrl(format!("{ws_url}: {e}")))?;
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            ws_url,
            access_token: access_token.filter(|t| !t.is_empty()),
            state,
            events,
            link: Mutex::new(None),
        })
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Receiver of every server event that arrives after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }

    /// Opens the connection. Does nothing when already connected.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Connection`] when the handshake fails; the
    /// state falls back to [`ConnectionState::Disconnected`].
    pub async fn connect(&self) -> Result<(), ClientError> {
        let mut link = self.link.lock().await;
        if link.as_ref().is_some_and(|l| !l.task.is_finished()) {
            return Ok(());
        }

        self.state.send_replace(ConnectionState::Connecting);
        let (ws, _response) = match connect_async(self.request_url().as_str()).await {
            Ok(pair) => pair,
            Err(err) => {
                self.state.send_replace(ConnectionState::Disconnected);
                return Err(ClientError::Connection(format!(
                    "failed to connect to {}: {err}",
                    self.ws_url
                )));
            }
        };
        tracing::info!(url = %self.ws_url, "connected to realtime gateway");

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        self.state.send_replace(ConnectionState::Connected);
        let task = tokio::spawn(run_link(
            ws,
            outbound_rx,
            self.events.clone(),
            self.state.clone(),
        ));
        *link = Some(Link { outbound, task });
        Ok(())
    }

    /// Closes the connection and waits for it to wind down.
    pub async fn disconnect(&self) {
        let link = self.link.lock().await.take();
        if let Some(Link { outbound, task }) = link {
            drop(outbound);
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "realtime connection task failed");
            }
        }
        self.state.send_replace(ConnectionState::Disconnected);
    }

    /// Sends a client action.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] when no connection is open.
    pub async fn emit(&self, action: &ClientAction) -> Result<(), ClientError> {
        let link = self.link.lock().await;
        let Some(link) = link.as_ref() else {
            return Err(ClientError::NotConnected);
        };
        tracing::debug!(action = action.name(), "emitting client action");
        link.outbound
            .send(Message::text(action.to_json()))
            .map_err(|_| ClientError::NotConnected)
    }

    /// Joins the staff room.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] when no connection is open.
    pub async fn join_admin(&self) -> Result<(), ClientError> {
        self.emit(&ClientAction::JoinAdmin).await
    }

    /// Joins the private room of `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] when no connection is open.
    pub async fn join_user(&self, user_id: &str) -> Result<(), ClientError> {
        self.emit(&ClientAction::JoinUser {
            user_id: Some(user_id.to_string()),
        })
        .await
    }

    /// Joins the room of one ticket.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] when no connection is open.
    pub async fn join_ticket(&self, ticket_id: &str) -> Result<(), ClientError> {
        self.emit(&ClientAction::JoinTicket {
            ticket_id: Some(ticket_id.to_string()),
        })
        .await
    }

    /// Leaves the room of one ticket.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] when no connection is open.
    pub async fn leave_ticket(&self, ticket_id: &str) -> Result<(), ClientError> {
        self.emit(&ClientAction::LeaveTicket {
            ticket_id: Some(ticket_id.to_string()),
        })
        .await
    }

    /// Joins the rooms a signed-in user listens on: `admin` for staff and
    /// the user's own room when `user_id` is known.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] when no connection is open.
    pub async fn join_personal_rooms(&self, user_id: Option<&str>, staff: bool) -> Result<(), ClientError> {
        if staff {
            self.join_admin().await?;
        }
        if let Some(user_id) = user_id.filter(|id| !id.is_empty()) {
            self.join_user(user_id).await?;
        }
        Ok(())
    }

    /// Leaves the rooms joined by [`RealtimeClient::join_personal_rooms`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] when no connection is open.
    pub async fn leave_personal_rooms(&self, user_id: Option<&str>, staff: bool) -> Result<(), ClientError> {
        if staff {
            self.emit(&ClientAction::LeaveAdmin).await?;
        }
        if let Some(user_id) = user_id.filter(|id| !id.is_empty()) {
            self.emit(&ClientAction::LeaveUser {
                user_id: Some(user_id.to_string()),
            })
            .await?;
        }
        Ok(())
    }

    fn request_url(&self) -> Url {
        let mut url = self.ws_url.clone();
        if let Some(token) = &self.access_token {
            url.query_pairs_mut().append_pair("token", token);
        }
        url
    }
}

impl fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("ws_url", &self.ws_url.as_str())
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Pumps outbound actions to the socket and inbound events to subscribers
/// until either side closes.
async fn run_link(
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut outbound_rx: mpsc::UnboundedReceiver<Message>,
    events: broadcast::Sender<ServerEvent>,
    state: watch::Sender<ConnectionState>,
) {
    let (mut write, mut read) = ws.split();

    loop {
        tokio::select! {
            outgoing = outbound_rx.recv() => match outgoing {
                Some(message) => {
                    if let Err(err) = write.send(message).await {
                        tracing::warn!(error = %err, "realtime send failed");
                        break;
                    }
                }
                None => {
                    write.send(Message::Close(None)).await.ok();
                    break;
                }
            },
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ServerEvent>(text.as_str()) {
                        Ok(event) => {
                            events.send(event).ok();
                        }
                        Err(err) => {
                            tracing::debug!(error = %err, "ignoring unrecognized server frame");
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!("realtime gateway closed the connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    tracing::warn!(error = %err, "realtime read failed");
                    break;
                }
            },
        }
    }

    state.send_replace(ConnectionState::Disconnected);
}
