//! Filtered, paginated ticket list kept in sync with realtime events.

use super::api::TicketPage;
use super::filters::TicketFilters;
use super::freshness::FreshnessGuard;
use super::highlight::HighlightSet;
use super::reconciler::{ReconcileOutcome, TicketView, ViewPhase};
use super::ticket::{Ticket, sort_tickets};

/// State of a ticket list view.
///
/// `items` is always in display order and every item matches the active
/// filters. `total` is the server-side count and may exceed `items`.
#[derive(Debug, Clone)]
pub struct TicketList {
    phase: ViewPhase,
    reloading: bool,
    items: Vec<Ticket>,
    total: u64,
    filters: TicketFilters,
    highlights: HighlightSet,
    freshness: FreshnessGuard,
}

impl TicketList {
    /// Creates an empty list in [`ViewPhase::Loading`].
    #[must_use]
    pub fn new(filters: TicketFilters) -> Self {
        Self {
            phase: ViewPhase::Loading,
            reloading: false,
            items: Vec::new(),
            total: 0,
            filters,
            highlights: HighlightSet::new(),
            freshness: FreshnessGuard::new(),
        }
    }

    /// Current load phase.
    #[must_use]
    pub fn phase(&self) -> ViewPhase {
        self.phase
    }

    /// `true` while an explicit reload of a ready list runs.
    #[must_use]
    pub fn is_reloading(&self) -> bool {
        self.reloading
    }

    /// Tickets in display order.
    #[must_use]
    pub fn items(&self) -> &[Ticket] {
        &self.items
    }

    /// Server-side total of matching tickets.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Active filters.
    #[must_use]
    pub fn filters(&self) -> &TicketFilters {
        &self.filters
    }

    /// Whether `ticket_id` is inside its highlight window.
    #[must_use]
    pub fn is_highlighted(&self, ticket_id: &str) -> bool {
        self.highlights.contains(ticket_id)
    }

    /// Highlighted ids, sorted.
    #[must_use]
    pub fn highlighted_ids(&self) -> Vec<String> {
        self.highlights.ids()
    }

    fn position(&self, ticket_id: &str) -> Option<usize> {
        self.items.iter().position(|t| t.id == ticket_id)
    }

    fn prune_highlights(&mut self) {
        let items = &self.items;
        self.highlights
            .retain(|id| items.iter().any(|t| t.id == id));
    }

    fn remove_at(&mut self, index: usize) {
        let removed = self.items.remove(index);
        self.highlights.remove(&removed.id);
        self.total = self.total.saturating_sub(1);
    }
}

impl TicketView for TicketList {
    fn load_queries(&self) -> Vec<TicketFilters> {
        vec![self.filters.clone()]
    }

    fn begin_load(&mut self, silent: bool) {
        if !silent && self.phase == ViewPhase::Ready {
            self.reloading = true;
        }
    }

    fn finish_load(&mut self, pages: Vec<TicketPage>, silent: bool) {
        let page = pages.into_iter().next().unwrap_or_default();
        let shown = std::mem::take(&mut self.items);
        let mut items = self.freshness.settle(page.items, shown);
        items.retain(|t| self.filters.matches(t));
        sort_tickets(&mut items);

        self.total = page.total.unwrap_or(items.len() as u64);
        self.items = items;
        if silent {
            self.prune_highlights();
        } else {
            self.highlights.clear();
        }
        self.phase = ViewPhase::Ready;
        self.reloading = false;
    }

    fn fail_load(&mut self) {
        self.phase = ViewPhase::Ready;
        self.reloading = false;
    }

    fn set_filters(&mut self, filters: TicketFilters) {
        self.filters = filters;
        let before = self.items.len();
        let filters = &self.filters;
        self.items.retain(|t| filters.matches(t));
        let dropped = (before - self.items.len()) as u64;
        self.total = self.total.saturating_sub(dropped);
        self.prune_highlights();
    }

    fn apply_fetched(&mut self, ticket: Ticket) -> ReconcileOutcome {
        if !self.freshness.admit(&ticket) {
            tracing::debug!(ticket_id = %ticket.id, "discarding stale ticket record");
            return ReconcileOutcome::Stale;
        }

        let existing = self.position(&ticket.id);
        let matches = self.filters.matches(&ticket);

        match (matches, existing) {
            (false, Some(index)) => {
                self.remove_at(index);
                ReconcileOutcome::Removed
            }
            (false, None) => ReconcileOutcome::Unchanged,
            (true, None) => {
                self.highlights.trigger(&ticket.id);
                self.items.push(ticket);
                self.total += 1;
                sort_tickets(&mut self.items);
                ReconcileOutcome::Inserted
            }
            (true, Some(index)) => {
                if let Some(current) = self.items.get_mut(index) {
                    current.merge_from(ticket);
                }
                sort_tickets(&mut self.items);
                ReconcileOutcome::Merged
            }
        }
    }

    fn apply_deleted(&mut self, ticket_id: &str) -> ReconcileOutcome {
        match self.position(ticket_id) {
            Some(index) => {
                self.remove_at(index);
                ReconcileOutcome::Removed
            }
            None => ReconcileOutcome::Unchanged,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::client::reconciler::tests::ticket;
    use serde_json::json;

    fn ready(items: Vec<Ticket>, total: u64) -> TicketList {
        let mut list = TicketList::new(TicketFilters::default());
        list.finish_load(
            vec![TicketPage {
                items,
                total: Some(total),
            }],
            false,
        );
        list
    }

    fn ids(list: &TicketList) -> Vec<&str> {
        list.items().iter().map(|t| t.id.as_str()).collect()
    }

    fn with_updated(mut t: Ticket, updated: &str) -> Ticket {
        let Ok(at) = updated.parse() else {
            panic!("timestamp should parse");
        };
        t.updated_at = Some(at);
        t
    }

    #[test]
    fn starts_loading_then_ready() {
        let mut list = TicketList::new(TicketFilters::default());
        assert_eq!(list.phase(), ViewPhase::Loading);
        list.begin_load(false);
        assert!(!list.is_reloading(), "first load shows no reload spinner");
        list.finish_load(vec![TicketPage::default()], false);
        assert_eq!(list.phase(), ViewPhase::Ready);

        list.begin_load(false);
        assert!(list.is_reloading());
        list.fail_load();
        assert!(!list.is_reloading());
    }

    #[test]
    fn load_sorts_and_defaults_total_to_len() {
        let mut list = TicketList::new(TicketFilters::default());
        list.finish_load(
            vec![TicketPage {
                items: vec![
                    ticket("old", "NEW", "2024-01-01T00:00:00Z"),
                    ticket("new", "NEW", "2024-03-01T00:00:00Z"),
                ],
                total: None,
            }],
            false,
        );
        assert_eq!(ids(&list), vec!["new", "old"]);
        assert_eq!(list.total(), 2);
    }

    #[tokio::test]
    async fn insert_highlights_and_counts() {
        let mut list = ready(vec![ticket("a", "NEW", "2024-01-01T00:00:00Z")], 10);
        let outcome = list.apply_fetched(ticket("b", "NEW", "2024-02-01T00:00:00Z"));
        assert_eq!(outcome, ReconcileOutcome::Inserted);
        assert_eq!(ids(&list), vec!["b", "a"]);
        assert_eq!(list.total(), 11);
        assert_eq!(list.highlighted_ids(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn applying_same_record_twice_is_idempotent() {
        let mut list = ready(vec![], 0);
        let record = ticket("a", "NEW", "2024-01-01T00:00:00Z");
        list.apply_fetched(record.clone());
        let items = list.items().to_vec();
        let total = list.total();

        assert_eq!(list.apply_fetched(record), ReconcileOutcome::Merged);
        assert_eq!(list.items(), items.as_slice());
        assert_eq!(list.total(), total);
    }

    #[tokio::test]
    async fn merge_keeps_existing_fields() {
        let mut shown = ticket("a", "NEW", "2024-01-01T00:00:00Z");
        shown.extra.insert("notes".into(), json!(2));
        let mut list = ready(vec![shown], 1);

        let outcome = list.apply_fetched(ticket("a", "OPEN", "2024-01-01T00:00:00Z"));
        assert_eq!(outcome, ReconcileOutcome::Merged);
        let Some(first) = list.items().first() else {
            panic!("expected one item");
        };
        assert_eq!(first.status.as_deref(), Some("OPEN"));
        assert_eq!(first.extra.get("notes"), Some(&json!(2)));
        assert!(!list.is_highlighted("a"), "merges do not highlight");
    }

    #[tokio::test]
    async fn no_longer_matching_ticket_leaves_the_list() {
        let filters = TicketFilters {
            status: Some("NEW".into()),
            ..TicketFilters::default()
        };
        let mut list = TicketList::new(filters);
        list.finish_load(vec![TicketPage::default()], false);
        list.apply_fetched(ticket("a", "NEW", "2024-01-01T00:00:00Z"));
        assert!(list.is_highlighted("a"));

        let outcome = list.apply_fetched(ticket("a", "OPEN", "2024-01-01T00:00:00Z"));
        assert_eq!(outcome, ReconcileOutcome::Removed);
        assert!(list.items().is_empty());
        assert_eq!(list.total(), 0);
        assert!(list.highlighted_ids().is_empty());

        let outcome = list.apply_fetched(ticket("z", "CLOSED", "2024-01-01T00:00:00Z"));
        assert_eq!(outcome, ReconcileOutcome::Unchanged);
        assert!(list.items().iter().all(|t| list.filters().matches(t)));
    }

    #[tokio::test]
    async fn add_then_delete_restores_state() {
        let mut list = ready(vec![ticket("a", "NEW", "2024-01-01T00:00:00Z")], 5);
        let before = list.items().to_vec();

        list.apply_fetched(ticket("b", "NEW", "2024-02-01T00:00:00Z"));
        assert_eq!(list.apply_deleted("b"), ReconcileOutcome::Removed);

        assert_eq!(list.items(), before.as_slice());
        assert_eq!(list.total(), 5);
        assert!(!list.is_highlighted("b"));
    }

    #[test]
    fn delete_unknown_and_floor_total() {
        let mut list = ready(vec![ticket("a", "NEW", "2024-01-01T00:00:00Z")], 0);
        assert_eq!(list.apply_deleted("nope"), ReconcileOutcome::Unchanged);
        assert_eq!(list.apply_deleted("a"), ReconcileOutcome::Removed);
        assert_eq!(list.total(), 0);
    }

    #[tokio::test]
    async fn stale_record_does_not_overwrite_newer() {
        let mut list = ready(vec![], 0);
        let newer = with_updated(ticket("a", "OPEN", "2024-01-01T00:00:00Z"), "2024-01-05T00:00:00Z");
        let older = with_updated(ticket("a", "NEW", "2024-01-01T00:00:00Z"), "2024-01-04T00:00:00Z");

        list.apply_fetched(newer);
        assert_eq!(list.apply_fetched(older), ReconcileOutcome::Stale);
        let Some(first) = list.items().first() else {
            panic!("expected one item");
        };
        assert_eq!(first.status.as_deref(), Some("OPEN"));
    }

    #[tokio::test]
    async fn full_load_clears_highlights_but_silent_keeps_them() {
        let mut list = ready(vec![], 0);
        let a = ticket("a", "NEW", "2024-01-01T00:00:00Z");
        list.apply_fetched(a.clone());

        list.finish_load(
            vec![TicketPage {
                items: vec![a.clone()],
                total: None,
            }],
            true,
        );
        assert!(list.is_highlighted("a"));

        list.finish_load(
            vec![TicketPage {
                items: vec![a],
                total: None,
            }],
            false,
        );
        assert!(!list.is_highlighted("a"));
    }

    #[tokio::test]
    async fn filter_change_drops_non_matching_items_at_once() {
        let mut list = ready(
            vec![
                ticket("a", "OPEN", "2024-01-01T00:00:00Z"),
                ticket("b", "CLOSED", "2024-01-02T00:00:00Z"),
            ],
            2,
        );
        list.apply_fetched(ticket("c", "CLOSED", "2024-01-03T00:00:00Z"));

        list.set_filters(TicketFilters {
            status: Some("OPEN".into()),
            ..TicketFilters::default()
        });
        assert_eq!(ids(&list), vec!["a"]);
        assert_eq!(list.total(), 1);
        assert!(list.highlighted_ids().is_empty());

        list.begin_load(false);
        list.fail_load();
        assert!(list.items().iter().all(|t| list.filters().matches(t)));
    }

    #[tokio::test]
    async fn silent_reload_keeps_newer_applied_record() {
        let mut list = ready(vec![], 0);
        let newer = with_updated(ticket("a", "OPEN", "2024-01-01T00:00:00Z"), "2024-01-05T00:00:00Z");
        let older = with_updated(ticket("a", "NEW", "2024-01-01T00:00:00Z"), "2024-01-04T00:00:00Z");
        list.apply_fetched(newer);

        list.finish_load(
            vec![TicketPage {
                items: vec![older.clone()],
                total: Some(1),
            }],
            true,
        );
        let Some(first) = list.items().first() else {
            panic!("expected one item");
        };
        assert_eq!(first.status.as_deref(), Some("OPEN"));
        assert!(list.is_highlighted("a"));

        assert_eq!(list.apply_fetched(older), ReconcileOutcome::Stale);
    }
}
