//! Live view of a single ticket.
//!
//! The detail screen joins `ticket:<id>`. Messages pushed to the room are
//! appended in arrival order; update and session notices re-fetch the
//! record.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast};

use super::api::TicketApi;
use super::connection::RealtimeClient;
use super::error::ClientError;
use super::freshness::FreshnessGuard;
use super::reconciler::{ReconcileOutcome, ViewPhase};
use super::ticket::Ticket;
use crate::protocol::{EventName, ServerEvent};

/// Field of the ticket record holding its message thread.
const MESSAGES_FIELD: &str = "messages";

/// State of one ticket's detail view.
#[derive(Debug, Clone)]
pub struct TicketDetail {
    ticket_id: String,
    phase: ViewPhase,
    ticket: Option<Ticket>,
    deleted: bool,
    freshness: FreshnessGuard,
}

impl TicketDetail {
    /// Creates an empty view of `ticket_id` in [`ViewPhase::Loading`].
    #[must_use]
    pub fn new(ticket_id: impl Into<String>) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            phase: ViewPhase::Loading,
            ticket: None,
            deleted: false,
            freshness: FreshnessGuard::new(),
        }
    }

    /// Id of the shown ticket.
    #[must_use]
    pub fn ticket_id(&self) -> &str {
        &self.ticket_id
    }

    /// Current load phase.
    #[must_use]
    pub fn phase(&self) -> ViewPhase {
        self.phase
    }

    /// The record, once loaded.
    #[must_use]
    pub fn ticket(&self) -> Option<&Ticket> {
        self.ticket.as_ref()
    }

    /// `true` after a `ticket:deleted` for this ticket.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Messages of the thread in arrival order.
    #[must_use]
    pub fn messages(&self) -> &[Value] {
        self.ticket
            .as_ref()
            .and_then(|t| t.extra.get(MESSAGES_FIELD))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether an event payload concerns this ticket. Payloads without a
    /// `ticketId` are taken as room-scoped.
    #[must_use]
    pub fn concerns(&self, data: &Value) -> bool {
        data.get("ticketId")
            .and_then(Value::as_str)
            .is_none_or(|id| id == self.ticket_id)
    }

    /// Replaces the shown record with a fetched one.
    pub fn apply_record(&mut self, ticket: Ticket) -> ReconcileOutcome {
        if ticket.id != self.ticket_id {
            return ReconcileOutcome::Ignored;
        }
        if !self.freshness.admit(&ticket) {
            tracing::debug!(ticket_id = %ticket.id, "discarding stale ticket record");
            return ReconcileOutcome::Stale;
        }
        self.phase = ViewPhase::Ready;
        match self.ticket.replace(ticket) {
            Some(_) => ReconcileOutcome::Merged,
            None => ReconcileOutcome::Inserted,
        }
    }

    /// Appends a pushed message to the thread. Messages whose `id` is
    /// already in the thread are skipped; nothing happens before the record
    /// has loaded.
    pub fn apply_message(&mut self, message: Value) -> ReconcileOutcome {
        let Some(ticket) = self.ticket.as_mut() else {
            return ReconcileOutcome::Unchanged;
        };
        let thread = ticket
            .extra
            .entry(MESSAGES_FIELD)
            .or_insert_with(|| Value::Array(Vec::new()));
        if !thread.is_array() {
            *thread = Value::Array(Vec::new());
        }
        let Some(thread) = thread.as_array_mut() else {
            return ReconcileOutcome::Unchanged;
        };

        let message_id = message.get("id").and_then(Value::as_str);
        if message_id.is_some() && thread.iter().any(|m| m.get("id").and_then(Value::as_str) == message_id) {
            return ReconcileOutcome::Unchanged;
        }
        thread.push(message);
        ReconcileOutcome::Merged
    }

    /// Drops the record after a deletion.
    pub fn apply_deleted(&mut self) -> ReconcileOutcome {
        self.deleted = true;
        self.phase = ViewPhase::Ready;
        if self.ticket.take().is_some() {
            ReconcileOutcome::Removed
        } else {
            ReconcileOutcome::Unchanged
        }
    }
}

/// Keeps a shared [`TicketDetail`] in sync with its ticket room.
#[derive(Debug)]
pub struct TicketDetailFeed {
    api: Arc<dyn TicketApi>,
    ticket_id: String,
    view: Arc<Mutex<TicketDetail>>,
}

impl TicketDetailFeed {
    /// Creates a feed for `ticket_id`.
    pub fn new(api: Arc<dyn TicketApi>, ticket_id: &str) -> Self {
        Self {
            api,
            ticket_id: ticket_id.to_string(),
            view: Arc::new(Mutex::new(TicketDetail::new(ticket_id))),
        }
    }

    /// Shared handle to the view.
    #[must_use]
    pub fn view(&self) -> Arc<Mutex<TicketDetail>> {
        Arc::clone(&self.view)
    }

    /// Fetches the record and shows it.
    ///
    /// # Errors
    ///
    /// Returns the failed request; the view keeps its contents.
    pub async fn reload(&self) -> Result<ReconcileOutcome, ClientError> {
        match self.api.fetch_ticket(&self.ticket_id).await? {
            Some(ticket) => Ok(self.view.lock().await.apply_record(ticket)),
            None => Ok(ReconcileOutcome::Unchanged),
        }
    }

    /// Joins the ticket room.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] when no connection is open.
    pub async fn attach(&self, client: &RealtimeClient) -> Result<(), ClientError> {
        client.join_ticket(&self.ticket_id).await
    }

    /// Leaves the ticket room.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] when no connection is open.
    pub async fn detach(&self, client: &RealtimeClient) -> Result<(), ClientError> {
        client.leave_ticket(&self.ticket_id).await
    }

    /// Applies one realtime event to the view.
    pub async fn handle_event(&self, event: &ServerEvent) -> ReconcileOutcome {
        if !self.view.lock().await.concerns(&event.data) {
            return ReconcileOutcome::Ignored;
        }
        match event.name {
            EventName::TicketMessage => self.view.lock().await.apply_message(event.data.clone()),
            EventName::TicketUpdate | EventName::TicketSession => match self.reload().await {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::warn!(ticket_id = %self.ticket_id, error = %err, "ticket detail refresh failed");
                    ReconcileOutcome::Unchanged
                }
            },
            EventName::TicketDeleted => self.view.lock().await.apply_deleted(),
            EventName::Pong
            | EventName::Error
            | EventName::TestNotificationSent
            | EventName::TicketCreated
            | EventName::TicketUpdated
            | EventName::AppointmentUpsert
            | EventName::AppointmentUpdate
            | EventName::NotificationNew => ReconcileOutcome::Ignored,
        }
    }
}

/// Applies the events of `events` to `feed`'s view until the stream closes.
///
/// Events are applied one at a time so messages keep their order. A lagging
/// receiver triggers a reload.
pub async fn run_ticket_detail_feed(
    feed: Arc<TicketDetailFeed>,
    mut events: broadcast::Receiver<ServerEvent>,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                feed.handle_event(&event).await;
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "ticket detail feed lagged, reloading");
                if let Err(err) = feed.reload().await {
                    tracing::warn!(error = %err, "ticket detail reload failed");
                }
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::client::reconciler::tests::{StubApi, ticket};

    fn loaded(id: &str) -> TicketDetail {
        let mut detail = TicketDetail::new(id);
        let mut record = ticket(id, "OPEN", "2024-01-01T00:00:00Z");
        record.extra.insert("messages".into(), json!([{ "id": "m0" }]));
        detail.apply_record(record);
        detail
    }

    #[test]
    fn message_is_appended_once() {
        let mut detail = loaded("t1");
        let message = json!({ "id": "m1", "ticketId": "t1", "body": "hello" });
        assert_eq!(detail.apply_message(message.clone()), ReconcileOutcome::Merged);
        assert_eq!(detail.apply_message(message), ReconcileOutcome::Unchanged);
        assert_eq!(detail.messages().len(), 2);
        assert_eq!(detail.messages().last().and_then(|m| m.get("body")), Some(&json!("hello")));
    }

    #[test]
    fn message_before_load_is_dropped() {
        let mut detail = TicketDetail::new("t1");
        assert_eq!(detail.apply_message(json!({ "id": "m1" })), ReconcileOutcome::Unchanged);
        assert!(detail.messages().is_empty());
    }

    #[test]
    fn other_ticket_payloads_are_not_ours() {
        let detail = loaded("t1");
        assert!(detail.concerns(&json!({ "ticketId": "t1" })));
        assert!(detail.concerns(&json!({ "tool": "ANYDESK" })));
        assert!(!detail.concerns(&json!({ "ticketId": "t2" })));
    }

    #[tokio::test]
    async fn update_and_session_refetch_the_record() {
        let api = Arc::new(StubApi::default());
        api.put(ticket("t1", "OPEN", "2024-01-01T00:00:00Z")).await;
        let feed = TicketDetailFeed::new(Arc::clone(&api) as Arc<dyn TicketApi>, "t1");
        assert_eq!(tokio_test::assert_ok!(feed.reload().await), ReconcileOutcome::Inserted);

        api.put(ticket("t1", "ON_HOLD", "2024-01-01T00:00:00Z")).await;
        let update = ServerEvent::new(EventName::TicketUpdate, json!({ "ticketId": "t1" }));
        assert_eq!(feed.handle_event(&update).await, ReconcileOutcome::Merged);

        let session = ServerEvent::new(EventName::TicketSession, json!({ "tool": "ANYDESK" }));
        assert_eq!(feed.handle_event(&session).await, ReconcileOutcome::Merged);

        let view = feed.view();
        let view = view.lock().await;
        assert_eq!(view.ticket().and_then(|t| t.status.as_deref()), Some("ON_HOLD"));
    }

    #[tokio::test]
    async fn feed_applies_messages_in_order_then_deletion() {
        let api = Arc::new(StubApi::default());
        api.put(ticket("t1", "OPEN", "2024-01-01T00:00:00Z")).await;
        let feed = Arc::new(TicketDetailFeed::new(api as Arc<dyn TicketApi>, "t1"));
        tokio_test::assert_ok!(feed.reload().await);

        let (tx, rx) = broadcast::channel(16);
        let task = tokio::spawn(run_ticket_detail_feed(Arc::clone(&feed), rx));
        for (name, data) in [
            (EventName::TicketMessage, json!({ "id": "m1", "ticketId": "t1" })),
            (EventName::TicketMessage, json!({ "id": "x", "ticketId": "t2" })),
            (EventName::TicketMessage, json!({ "id": "m2", "ticketId": "t1" })),
        ] {
            assert!(tx.send(ServerEvent::new(name, data)).is_ok());
        }
        drop(tx);
        assert!(task.await.is_ok());

        let view = feed.view();
        let mut view = view.lock().await;
        let ids: Vec<&str> = view
            .messages()
            .iter()
            .filter_map(|m| m.get("id").and_then(Value::as_str))
            .collect();
        assert_eq!(ids, vec!["m1", "m2"]);

        assert_eq!(view.apply_deleted(), ReconcileOutcome::Removed);
        assert!(view.is_deleted());
        assert!(view.ticket().is_none());
    }
}
