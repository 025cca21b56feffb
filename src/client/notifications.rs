//! Notification inbox fed by `notification:new`.
//!
//! [`NotificationCenter`] owns the inbox and the REST calls behind it.
//! [`run_notification_feed`] joins the personal rooms on every connect,
//! applies pushed notifications and runs the ping/pong heartbeat that marks
//! the socket unhealthy when pongs stop. The REST list is re-read on every
//! heartbeat as a backup for missed pushes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast};
use tokio::time::{Instant, MissedTickBehavior, sleep_until};

use super::connection::{ConnectionState, RealtimeClient};
use super::error::ClientError;
use crate::protocol::{ClientAction, EventName, ServerEvent};

/// Time between two heartbeats.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// How long a heartbeat waits for its pong.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(15);

/// A notification as the API and the gateway deliver it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Notification id. Empty when the payload carried none.
    #[serde(default)]
    pub id: String,
    /// Recipient.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Notification type (`TICKET_UPDATE`, `TEST_NOTIFICATION`, ...).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Text shown to the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Whether the user has read it.
    #[serde(default)]
    pub read: bool,
    /// Every other field.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response of the notification list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPage {
    /// Notifications, newest first.
    #[serde(default)]
    pub items: Vec<Notification>,
    /// Server-side unread count; defaults to the unread items of the page.
    #[serde(default)]
    pub unread_count: Option<u64>,
}

/// Which notification endpoints a user reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationScope {
    /// Staff endpoints under `admin/`.
    Staff,
    /// Customer endpoints under `customer/`.
    Customer,
}

impl NotificationScope {
    /// Path segment of the scope.
    #[must_use]
    pub const fn segment(self) -> &'static str {
        match self {
            Self::Staff => "admin",
            Self::Customer => "customer",
        }
    }
}

/// Notification endpoints of the REST API.
#[async_trait]
pub trait NotificationApi: Send + Sync + std::fmt::Debug {
    /// Lists the caller's notifications.
    ///
    /// # Errors
    ///
    /// Any transport failure or non-success status.
    async fn list_notifications(&self, scope: NotificationScope) -> Result<NotificationPage, ClientError>;

    /// Marks one notification as read.
    ///
    /// # Errors
    ///
    /// Any transport failure or non-success status.
    async fn mark_notification_read(
        &self,
        scope: NotificationScope,
        notification_id: &str,
    ) -> Result<(), ClientError>;
}

/// Notifications shown to one user, plus socket health.
#[derive(Debug, Clone)]
pub struct NotificationInbox {
    items: Vec<Notification>,
    unread: u64,
    last_updated: Option<DateTime<Utc>>,
    healthy: bool,
    last_heartbeat: Option<DateTime<Utc>>,
}

impl Default for NotificationInbox {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            unread: 0,
            last_updated: None,
            healthy: true,
            last_heartbeat: None,
        }
    }
}

impl NotificationInbox {
    /// Creates an empty inbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications, newest first.
    #[must_use]
    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    /// Unread count.
    #[must_use]
    pub fn unread_count(&self) -> u64 {
        self.unread
    }

    /// When the inbox last changed.
    #[must_use]
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    /// `false` once a heartbeat went unanswered or found no connection.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    /// When the last pong arrived.
    #[must_use]
    pub fn last_heartbeat(&self) -> Option<DateTime<Utc>> {
        self.last_heartbeat
    }

    /// Replaces the contents with a fetched page.
    pub fn replace(&mut self, page: NotificationPage) {
        let unread = page.items.iter().filter(|n| !n.read).count() as u64;
        self.unread = page.unread_count.unwrap_or(unread);
        self.items = page.items;
        self.last_updated = Some(Utc::now());
    }

    /// Adds a pushed notification on top. Returns `false` for an id that
    /// is already shown.
    pub fn push(&mut self, notification: Notification) -> bool {
        if !notification.id.is_empty() && self.items.iter().any(|n| n.id == notification.id) {
            return false;
        }
        if !notification.read {
            self.unread += 1;
        }
        self.items.insert(0, notification);
        self.last_updated = Some(Utc::now());
        true
    }

    /// Marks `notification_id` read. Returns `true` when it was unread.
    pub fn mark_read(&mut self, notification_id: &str) -> bool {
        let Some(notification) = self.items.iter_mut().find(|n| n.id == notification_id) else {
            return false;
        };
        if notification.read {
            return false;
        }
        notification.read = true;
        self.unread = self.unread.saturating_sub(1);
        true
    }

    /// Records an answered heartbeat.
    pub fn record_heartbeat(&mut self) {
        self.healthy = true;
        self.last_heartbeat = Some(Utc::now());
    }

    /// Records a heartbeat that went unanswered or could not be sent.
    pub fn mark_unhealthy(&mut self) {
        self.healthy = false;
    }
}

/// Keeps a [`NotificationInbox`] in sync for one user.
#[derive(Debug)]
pub struct NotificationCenter {
    api: Arc<dyn NotificationApi>,
    scope: NotificationScope,
    user_id: Option<String>,
    inbox: Arc<Mutex<NotificationInbox>>,
}

impl NotificationCenter {
    /// Creates a center for `user_id` reading the `scope` endpoints. Staff
    /// also listen on the `admin` room.
    pub fn new(api: Arc<dyn NotificationApi>, scope: NotificationScope, user_id: Option<String>) -> Self {
        Self {
            api,
            scope,
            user_id: user_id.filter(|id| !id.is_empty()),
            inbox: Arc::new(Mutex::new(NotificationInbox::new())),
        }
    }

    /// Shared handle to the inbox.
    #[must_use]
    pub fn inbox(&self) -> Arc<Mutex<NotificationInbox>> {
        Arc::clone(&self.inbox)
    }

    /// Re-reads the inbox from the API.
    ///
    /// # Errors
    ///
    /// Returns the failed list request; the inbox keeps its contents.
    pub async fn refresh(&self) -> Result<(), ClientError> {
        let page = self.api.list_notifications(self.scope).await?;
        let mut inbox = self.inbox.lock().await;
        inbox.replace(page);
        tracing::debug!(
            items = inbox.items().len(),
            unread = inbox.unread_count(),
            "refreshed notifications"
        );
        Ok(())
    }

    /// Marks a notification read, first on the server, then locally.
    ///
    /// # Errors
    ///
    /// Returns the failed request; the inbox is left unchanged.
    pub async fn mark_read(&self, notification_id: &str) -> Result<bool, ClientError> {
        self.api.mark_notification_read(self.scope, notification_id).await?;
        Ok(self.inbox.lock().await.mark_read(notification_id))
    }

    /// Applies a `notification:new` payload. Payloads that are not a
    /// notification object are ignored.
    pub async fn receive(&self, data: Value) -> bool {
        match serde_json::from_value::<Notification>(data) {
            Ok(notification) => self.inbox.lock().await.push(notification),
            Err(err) => {
                tracing::debug!(error = %err, "ignoring malformed notification");
                false
            }
        }
    }

    /// Joins `admin` for staff and the user's own room.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] when no connection is open.
    pub async fn join_rooms(&self, client: &RealtimeClient) -> Result<(), ClientError> {
        client
            .join_personal_rooms(self.user_id.as_deref(), self.scope == NotificationScope::Staff)
            .await
    }

    async fn refresh_logged(&self) {
        if let Err(err) = self.refresh().await {
            tracing::warn!(error = %err, "notification refresh failed");
        }
    }

    async fn join_logged(&self, client: &RealtimeClient) {
        if let Err(err) = self.join_rooms(client).await {
            tracing::warn!(error = %err, "joining notification rooms failed");
        }
    }
}

/// Runs the notification side of `client` until `events` closes or the
/// client is dropped.
///
/// The first heartbeat fires at once, so the inbox is loaded on start.
pub async fn run_notification_feed(
    center: Arc<NotificationCenter>,
    client: Arc<RealtimeClient>,
    mut events: broadcast::Receiver<ServerEvent>,
) {
    let mut state = client.watch_state();
    let connected_at_start = *state.borrow_and_update() == ConnectionState::Connected;
    if connected_at_start {
        center.join_logged(&client).await;
    }

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut awaiting_pong: Option<Instant> = None;

    loop {
        let deadline = awaiting_pong;
        let pong_overdue = async move {
            match deadline {
                Some(at) => sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => match event.name {
                    EventName::NotificationNew => {
                        center.receive(event.data).await;
                    }
                    EventName::Pong => {
                        awaiting_pong = None;
                        center.inbox.lock().await.record_heartbeat();
                    }
                    _ => {}
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "notification feed lagged, refreshing");
                    center.refresh_logged().await;
                }
                Err(RecvError::Closed) => break,
            },
            _ = heartbeat.tick() => {
                center.refresh_logged().await;
                if client.state() != ConnectionState::Connected {
                    center.inbox.lock().await.mark_unhealthy();
                    continue;
                }
                let ping = ClientAction::Ping(json!({ "ts": Utc::now().timestamp_millis() }));
                match client.emit(&ping).await {
                    Ok(()) => awaiting_pong = Some(Instant::now() + HEARTBEAT_TIMEOUT),
                    Err(err) => {
                        tracing::debug!(error = %err, "heartbeat not sent");
                        center.inbox.lock().await.mark_unhealthy();
                    }
                }
            },
            () = pong_overdue => {
                tracing::warn!("heartbeat unanswered, refreshing notifications");
                awaiting_pong = None;
                center.inbox.lock().await.mark_unhealthy();
                center.refresh_logged().await;
            },
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let now = *state.borrow_and_update();
                if now == ConnectionState::Connected {
                    center.join_logged(&client).await;
                }
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::time::advance;

    use super::*;

    #[derive(Debug, Default)]
    struct StubNotifications {
        list_calls: AtomicUsize,
    }

    #[async_trait]
    impl NotificationApi for StubNotifications {
        async fn list_notifications(
            &self,
            _scope: NotificationScope,
        ) -> Result<NotificationPage, ClientError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            Ok(NotificationPage {
                items: vec![note("n0", false)],
                unread_count: Some(4),
            })
        }

        async fn mark_notification_read(
            &self,
            _scope: NotificationScope,
            _notification_id: &str,
        ) -> Result<(), ClientError> {
            Ok(())
        }
    }

    fn note(id: &str, read: bool) -> Notification {
        Notification {
            id: id.to_string(),
            message: Some(format!("message {id}")),
            read,
            ..Notification::default()
        }
    }

    #[test]
    fn push_dedups_and_counts_unread() {
        let mut inbox = NotificationInbox::new();
        assert!(inbox.push(note("a", false)));
        assert!(inbox.push(note("b", true)));
        assert!(!inbox.push(note("a", false)));
        assert_eq!(inbox.unread_count(), 1);
        let ids: Vec<&str> = inbox.items().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn mark_read_floors_at_zero() {
        let mut inbox = NotificationInbox::new();
        inbox.push(note("a", false));
        assert!(inbox.mark_read("a"));
        assert!(!inbox.mark_read("a"));
        assert!(!inbox.mark_read("missing"));
        assert_eq!(inbox.unread_count(), 0);
    }

    #[test]
    fn replace_prefers_server_unread_count() {
        let mut inbox = NotificationInbox::new();
        inbox.replace(NotificationPage {
            items: vec![note("a", false), note("b", false), note("c", true)],
            unread_count: None,
        });
        assert_eq!(inbox.unread_count(), 2);
        inbox.replace(NotificationPage {
            items: vec![note("a", false)],
            unread_count: Some(9),
        });
        assert_eq!(inbox.unread_count(), 9);
        assert!(inbox.last_updated().is_some());
    }

    #[tokio::test]
    async fn malformed_push_is_ignored() {
        let center = NotificationCenter::new(
            Arc::new(StubNotifications::default()),
            NotificationScope::Customer,
            Some("u1".into()),
        );
        assert!(!center.receive(json!("not an object")).await);
        assert!(center.receive(json!({ "id": "n1", "message": "hi" })).await);
        assert_eq!(center.inbox().lock().await.unread_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_without_connection_marks_unhealthy_until_pong() {
        let api = Arc::new(StubNotifications::default());
        let center = Arc::new(NotificationCenter::new(
            Arc::clone(&api) as Arc<dyn NotificationApi>,
            NotificationScope::Staff,
            None,
        ));
        let Ok(client) = RealtimeClient::new("ws://127.0.0.1:9/ws", None) else {
            panic!("url should parse");
        };
        let (tx, rx) = broadcast::channel(16);
        let feed = tokio::spawn(run_notification_feed(
            Arc::clone(&center),
            Arc::new(client),
            rx,
        ));

        for _ in 0..20 {
            if api.list_calls.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        advance(Duration::from_millis(1)).await;
        {
            let inbox = center.inbox();
            let inbox = inbox.lock().await;
            assert!(!inbox.is_healthy());
            assert_eq!(inbox.unread_count(), 4);
        }
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 1);

        assert!(tx.send(ServerEvent::new(EventName::Pong, json!({}))).is_ok());
        assert!(
            tx.send(ServerEvent::new(
                EventName::NotificationNew,
                json!({ "id": "n1", "message": "pushed" })
            ))
            .is_ok()
        );
        drop(tx);
        assert!(feed.await.is_ok());

        let inbox = center.inbox();
        let inbox = inbox.lock().await;
        assert!(inbox.is_healthy());
        assert!(inbox.last_heartbeat().is_some());
        assert_eq!(inbox.unread_count(), 5);
    }
}
