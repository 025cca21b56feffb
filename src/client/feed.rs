//! Feeds realtime events into a reconciled view.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinSet;

use super::reconciler::{Reconciler, TicketView};
use crate::protocol::{EventName, ServerEvent};

/// Events that change ticket views.
fn is_ticket_event(name: EventName) -> bool {
    matches!(
        name,
        EventName::TicketCreated
            | EventName::TicketUpdate
            | EventName::TicketUpdated
            | EventName::TicketDeleted
    )
}

/// Applies every ticket event of `events` to `reconciler`'s view until the
/// stream closes.
///
/// Each event is handled on its own task, so a slow fetch for one ticket
/// never holds back another. A lagging receiver triggers a silent reload.
/// Returns once the stream has closed and all pending events are applied.
pub async fn run_ticket_feed<V: TicketView>(
    reconciler: Arc<Reconciler<V>>,
    mut events: broadcast::Receiver<ServerEvent>,
) {
    let mut tasks = JoinSet::new();

    loop {
        match events.recv().await {
            Ok(event) if is_ticket_event(event.name) => {
                let reconciler = Arc::clone(&reconciler);
                tasks.spawn(async move {
                    reconciler.handle_event(&event).await;
                });
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "ticket feed lagged, reloading view");
                let reconciler = Arc::clone(&reconciler);
                tasks.spawn(async move {
                    reconciler.reload_silently().await;
                });
            }
            Err(RecvError::Closed) => break,
        }
        while tasks.try_join_next().is_some() {}
    }

    while tasks.join_next().await.is_some() {}
}
