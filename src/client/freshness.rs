//! Out-of-order guard for fetched ticket records.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use super::ticket::Ticket;

/// Remembers the newest `updatedAt` applied per ticket id.
///
/// Two realtime events for the same ticket fetch concurrently; the slower
/// fetch may carry the older record. Such records are rejected. The same
/// holds for a bulk page fetched before a newer record was applied.
#[derive(Debug, Clone, Default)]
pub struct FreshnessGuard {
    newest: HashMap<String, DateTime<Utc>>,
}

impl FreshnessGuard {
    /// Creates an empty guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` when `ticket` is strictly older than the newest applied
    /// record of the same id.
    #[must_use]
    pub fn is_stale(&self, ticket: &Ticket) -> bool {
        match (ticket.updated_at, self.newest.get(&ticket.id)) {
            (Some(updated_at), Some(newest)) => updated_at < *newest,
            _ => false,
        }
    }

    /// Records `ticket` and returns `true` unless it is stale. Records
    /// without `updatedAt` are always admitted.
    pub fn admit(&mut self, ticket: &Ticket) -> bool {
        if self.is_stale(ticket) {
            return false;
        }
        if let Some(updated_at) = ticket.updated_at {
            self.newest.insert(ticket.id.clone(), updated_at);
        }
        true
    }

    /// Merges the records of a full load with the records currently shown.
    ///
    /// A page record older than what was already applied is replaced by the
    /// shown record, or dropped when nothing is shown under its id. History
    /// is kept across loads. Duplicate ids keep their first occurrence.
    pub fn settle(
        &mut self,
        page: impl IntoIterator<Item = Ticket>,
        shown: impl IntoIterator<Item = Ticket>,
    ) -> Vec<Ticket> {
        let mut shown: HashMap<String, Ticket> =
            shown.into_iter().map(|t| (t.id.clone(), t)).collect();
        let mut seen = HashSet::new();
        let mut settled = Vec::new();

        for ticket in page {
            if !seen.insert(ticket.id.clone()) {
                continue;
            }
            if self.admit(&ticket) {
                settled.push(ticket);
            } else if let Some(current) = shown.remove(&ticket.id) {
                tracing::debug!(ticket_id = %ticket.id, "load returned an older record, keeping the shown one");
                settled.push(current);
            } else {
                tracing::debug!(ticket_id = %ticket.id, "load returned an older record, dropping it");
            }
        }
        settled
    }
}
