//! Drives a ticket view from realtime events.
//!
//! A realtime event only names a ticket. [`Reconciler`] fetches the full
//! record outside the view lock, then applies it under the lock. A failed
//! fetch falls back to a silent reload of the whole view.

use std::sync::Arc;

use futures_util::future::try_join_all;
use serde_json::Value;
use tokio::sync::Mutex;

use super::api::{TicketApi, TicketPage};
use super::error::ClientError;
use super::filters::TicketFilters;
use super::ticket::Ticket;
use crate::protocol::{EventName, ServerEvent};

/// Load phase of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewPhase {
    /// No load has finished yet.
    Loading,
    /// Items are shown; realtime events mutate them in place.
    Ready,
}

/// What a realtime event did to a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The ticket was added.
    Inserted,
    /// The ticket was already shown and got refreshed.
    Merged,
    /// The ticket left the view.
    Removed,
    /// Nothing changed.
    Unchanged,
    /// The fetched record was older than one already applied.
    Stale,
    /// The record could not be fetched; the view was reloaded.
    Reloaded,
    /// The event does not concern ticket views.
    Ignored,
}

/// A ticket view that a [`Reconciler`] can keep in sync.
pub trait TicketView: Send + Sync + 'static {
    /// Queries a full load issues, one list request each.
    fn load_queries(&self) -> Vec<TicketFilters>;

    /// Marks a load as started. A non-silent load on a ready view shows
    /// the reload spinner.
    fn begin_load(&mut self, silent: bool);

    /// Replaces the contents with the pages of a full load, in
    /// [`TicketView::load_queries`] order. A page record older than the
    /// applied one is kept out. A non-silent load clears highlights.
    fn finish_load(&mut self, pages: Vec<TicketPage>, silent: bool);

    /// Ends a load that failed, keeping the current contents.
    fn fail_load(&mut self);

    /// Replaces the active filters and drops the items that no longer
    /// match, with their highlights.
    fn set_filters(&mut self, filters: TicketFilters);

    /// Applies a freshly fetched record.
    fn apply_fetched(&mut self, ticket: Ticket) -> ReconcileOutcome;

    /// Removes a deleted ticket.
    fn apply_deleted(&mut self, ticket_id: &str) -> ReconcileOutcome;
}

/// Keeps a shared [`TicketView`] in sync with the ticket API.
#[derive(Debug)]
pub struct Reconciler<V> {
    api: Arc<dyn TicketApi>,
    view: Arc<Mutex<V>>,
}

impl<V: TicketView> Reconciler<V> {
    /// Creates a reconciler around `view`.
    pub fn new(api: Arc<dyn TicketApi>, view: V) -> Self {
        Self {
            api,
            view: Arc::new(Mutex::new(view)),
        }
    }

    /// Shared handle to the view.
    #[must_use]
    pub fn view(&self) -> Arc<Mutex<V>> {
        Arc::clone(&self.view)
    }

    /// Explicit full load, showing the reload spinner.
    ///
    /// # Errors
    ///
    /// Returns the first failed list request; the view keeps its contents.
    pub async fn reload(&self) -> Result<(), ClientError> {
        self.load(false).await
    }

    /// Full load without spinner that keeps highlights. Failures are
    /// logged only.
    pub async fn reload_silently(&self) {
        if let Err(err) = self.load(true).await {
            tracing::warn!(error = %err, "silent ticket reload failed");
        }
    }

    /// Replaces the filters and reloads. Items that no longer match leave
    /// the view before the reload starts.
    ///
    /// # Errors
    ///
    /// Returns the first failed list request of the reload.
    pub async fn set_filters(&self, filters: TicketFilters) -> Result<(), ClientError> {
        self.view.lock().await.set_filters(filters);
        self.reload().await
    }

    /// Applies one realtime event to the view.
    pub async fn handle_event(&self, event: &ServerEvent) -> ReconcileOutcome {
        match event.name {
            EventName::TicketCreated | EventName::TicketUpdate | EventName::TicketUpdated => {
                let Some(ticket_id) = event_ticket_id(&event.data) else {
                    return ReconcileOutcome::Ignored;
                };
                self.refresh_ticket(&ticket_id).await
            }
            EventName::TicketDeleted => match event_ticket_id(&event.data) {
                Some(ticket_id) => self.view.lock().await.apply_deleted(&ticket_id),
                None => ReconcileOutcome::Ignored,
            },
            EventName::Pong
            | EventName::Error
            | EventName::TestNotificationSent
            | EventName::TicketMessage
            | EventName::TicketSession
            | EventName::AppointmentUpsert
            | EventName::AppointmentUpdate
            | EventName::NotificationNew => ReconcileOutcome::Ignored,
        }
    }

    /// Fetches `ticket_id` and applies the record.
    pub async fn refresh_ticket(&self, ticket_id: &str) -> ReconcileOutcome {
        match self.api.fetch_ticket(ticket_id).await {
            Ok(Some(ticket)) => {
                let outcome = self.view.lock().await.apply_fetched(ticket);
                tracing::debug!(ticket_id, ?outcome, "reconciled ticket");
                outcome
            }
            Ok(None) => ReconcileOutcome::Unchanged,
            Err(err) => {
                tracing::warn!(ticket_id, error = %err, "ticket fetch failed, reloading view");
                self.reload_silently().await;
                ReconcileOutcome::Reloaded
            }
        }
    }

    async fn load(&self, silent: bool) -> Result<(), ClientError> {
        let queries = {
            let mut view = self.view.lock().await;
            view.begin_load(silent);
            view.load_queries()
        };

        let pages = try_join_all(queries.iter().map(|q| self.api.list_tickets(q))).await;

        let mut view = self.view.lock().await;
        match pages {
            Ok(pages) => {
                view.finish_load(pages, silent);
                Ok(())
            }
            Err(err) => {
                view.fail_load();
                Err(err)
            }
        }
    }
}

/// Ticket id named by an event payload: `ticketId`, else `id`, else a bare
/// string payload.
fn event_ticket_id(data: &Value) -> Option<String> {
    let id = match data {
        Value::String(id) => Some(id.as_str()),
        Value::Object(map) => ["ticketId", "id"]
            .into_iter()
            .find_map(|key| map.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())),
        _ => None,
    };
    id.filter(|s| !s.is_empty()).map(str::to_string)
}

#[cfg(test)]
#[allow(clippy::panic)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::client::list::TicketList;

    /// In-memory [`TicketApi`] for view tests.
    #[derive(Debug, Default)]
    pub(crate) struct StubApi {
        pub(crate) tickets: Mutex<HashMap<String, Ticket>>,
        pub(crate) pages: Mutex<Vec<Ticket>>,
        pub(crate) fail_fetch: AtomicBool,
        pub(crate) fail_list: AtomicBool,
        pub(crate) list_calls: AtomicUsize,
    }

    impl StubApi {
        pub(crate) async fn put(&self, ticket: Ticket) {
            self.tickets.lock().await.insert(ticket.id.clone(), ticket);
        }
    }

    #[async_trait]
    impl TicketApi for StubApi {
        async fn fetch_ticket(&self, ticket_id: &str) -> Result<Option<Ticket>, ClientError> {
            if self.fail_fetch.load(Ordering::SeqCst) {
                return Err(ClientError::Api {
                    status: 500,
                    body: "boom".into(),
                });
            }
            Ok(self.tickets.lock().await.get(ticket_id).cloned())
        }

        async fn list_tickets(&self, filters: &TicketFilters) -> Result<TicketPage, ClientError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_list.load(Ordering::SeqCst) {
                return Err(ClientError::Api {
                    status: 503,
                    body: "unavailable".into(),
                });
            }
            let items: Vec<Ticket> = self
                .pages
                .lock()
                .await
                .iter()
                .filter(|t| filters.matches(t))
                .cloned()
                .collect();
            Ok(TicketPage {
                total: Some(items.len() as u64),
                items,
            })
        }
    }

    pub(crate) fn ticket(id: &str, status: &str, created: &str) -> Ticket {
        let Ok(ticket) = serde_json::from_value(json!({
            "id": id,
            "status": status,
            "createdAt": created,
        })) else {
            panic!("ticket should deserialize");
        };
        ticket
    }

    fn event(name: EventName, data: Value) -> ServerEvent {
        ServerEvent::new(name, data)
    }

    #[test]
    fn event_ticket_id_prefers_ticket_id() {
        assert_eq!(
            event_ticket_id(&json!({ "ticketId": "a", "id": "b" })),
            Some("a".to_string())
        );
        assert_eq!(event_ticket_id(&json!({ "id": "b" })), Some("b".to_string()));
        assert_eq!(event_ticket_id(&json!("c")), Some("c".to_string()));
        assert_eq!(event_ticket_id(&json!({ "ticketId": "" })), None);
        assert_eq!(event_ticket_id(&Value::Null), None);
    }

    #[tokio::test]
    async fn created_event_fetches_and_inserts() {
        let api = Arc::new(StubApi::default());
        api.put(ticket("t1", "NEW", "2024-01-01T00:00:00Z")).await;
        let reconciler = Reconciler::new(api, TicketList::new(TicketFilters::default()));

        let outcome = reconciler
            .handle_event(&event(EventName::TicketCreated, json!({ "ticketId": "t1" })))
            .await;
        assert_eq!(outcome, ReconcileOutcome::Inserted);

        let view = reconciler.view();
        let view = view.lock().await;
        assert_eq!(view.total(), 1);
        assert!(view.is_highlighted("t1"));
    }

    #[tokio::test]
    async fn null_fetch_is_a_no_op() {
        let api = Arc::new(StubApi::default());
        let reconciler = Reconciler::new(api, TicketList::new(TicketFilters::default()));
        let outcome = reconciler
            .handle_event(&event(EventName::TicketUpdated, json!({ "ticketId": "ghost" })))
            .await;
        assert_eq!(outcome, ReconcileOutcome::Unchanged);
    }

    #[tokio::test]
    async fn fetch_failure_triggers_silent_reload() {
        let api = Arc::new(StubApi::default());
        api.pages
            .lock()
            .await
            .push(ticket("t9", "OPEN", "2024-01-01T00:00:00Z"));
        api.fail_fetch.store(true, Ordering::SeqCst);
        let reconciler = Reconciler::new(
            Arc::clone(&api) as Arc<dyn TicketApi>,
            TicketList::new(TicketFilters::default()),
        );

        let outcome = reconciler
            .handle_event(&event(EventName::TicketUpdate, json!({ "ticketId": "t1" })))
            .await;
        assert_eq!(outcome, ReconcileOutcome::Reloaded);
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 1);

        let view = reconciler.view();
        let view = view.lock().await;
        assert_eq!(view.items().len(), 1);
        assert!(!view.is_reloading());
    }

    #[tokio::test]
    async fn deleted_event_needs_no_fetch() {
        let api = Arc::new(StubApi::default());
        api.fail_fetch.store(true, Ordering::SeqCst);
        let reconciler = Reconciler::new(
            Arc::clone(&api) as Arc<dyn TicketApi>,
            TicketList::new(TicketFilters::default()),
        );
        reconciler
            .view()
            .lock()
            .await
            .finish_load(
                vec![TicketPage {
                    items: vec![ticket("t1", "OPEN", "2024-01-01T00:00:00Z")],
                    total: Some(3),
                }],
                false,
            );

        let outcome = reconciler
            .handle_event(&event(EventName::TicketDeleted, json!({ "ticketId": "t1" })))
            .await;
        assert_eq!(outcome, ReconcileOutcome::Removed);
        assert_eq!(reconciler.view().lock().await.total(), 2);
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unrelated_events_are_ignored() {
        let reconciler = Reconciler::new(
            Arc::new(StubApi::default()),
            TicketList::new(TicketFilters::default()),
        );
        let outcome = reconciler
            .handle_event(&event(EventName::TicketMessage, json!({ "ticketId": "t1" })))
            .await;
        assert_eq!(outcome, ReconcileOutcome::Ignored);
    }

    #[tokio::test]
    async fn set_filters_reloads_with_new_filters() {
        let api = Arc::new(StubApi::default());
        {
            let mut pages = api.pages.lock().await;
            pages.push(ticket("a", "OPEN", "2024-01-01T00:00:00Z"));
            pages.push(ticket("b", "CLOSED", "2024-01-02T00:00:00Z"));
        }
        let reconciler = Reconciler::new(
            Arc::clone(&api) as Arc<dyn TicketApi>,
            TicketList::new(TicketFilters::default()),
        );
        let filters = TicketFilters {
            status: Some("OPEN".into()),
            ..TicketFilters::default()
        };
        tokio_test::assert_ok!(reconciler.set_filters(filters).await);

        let view = reconciler.view();
        let view = view.lock().await;
        let ids: Vec<&str> = view.items().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
        assert_eq!(view.phase(), ViewPhase::Ready);
    }

    #[tokio::test]
    async fn failed_reload_after_filter_change_keeps_only_matches() {
        let api = Arc::new(StubApi::default());
        {
            let mut pages = api.pages.lock().await;
            pages.push(ticket("a", "OPEN", "2024-01-01T00:00:00Z"));
            pages.push(ticket("b", "CLOSED", "2024-01-02T00:00:00Z"));
        }
        let reconciler = Reconciler::new(
            Arc::clone(&api) as Arc<dyn TicketApi>,
            TicketList::new(TicketFilters::default()),
        );
        tokio_test::assert_ok!(reconciler.reload().await);

        api.fail_list.store(true, Ordering::SeqCst);
        let filters = TicketFilters {
            status: Some("OPEN".into()),
            ..TicketFilters::default()
        };
        tokio_test::assert_err!(reconciler.set_filters(filters).await);

        let view = reconciler.view();
        let view = view.lock().await;
        let ids: Vec<&str> = view.items().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
        assert!(!view.is_reloading());
    }
}
