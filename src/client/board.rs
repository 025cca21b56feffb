//! Kanban board: one column of tickets per workflow status.

use super::api::TicketPage;
use super::filters::TicketFilters;
use super::freshness::FreshnessGuard;
use super::highlight::HighlightSet;
use super::reconciler::{ReconcileOutcome, TicketView, ViewPhase};
use super::ticket::{Ticket, sort_tickets};

/// Board columns, left to right.
pub const BOARD_STATUSES: [&str; 6] = ["NEW", "OPEN", "IN_PROGRESS", "ON_HOLD", "RESOLVED", "CLOSED"];

/// Column length after a realtime insert.
pub const COLUMN_CAP: usize = 40;

/// Tickets fetched per status on a full load.
pub const LOAD_PER_STATUS: u32 = 50;

/// Column a ticket belongs to. Unknown or missing statuses land in `NEW`.
#[must_use]
pub fn column_for(status: Option<&str>) -> &'static str {
    status
        .and_then(|s| BOARD_STATUSES.iter().copied().find(|c| *c == s))
        .unwrap_or("NEW")
}

/// State of a ticket board.
///
/// A ticket lives in at most one column. Every realtime upsert highlights
/// the ticket, moves included.
#[derive(Debug, Clone)]
pub struct TicketBoard {
    phase: ViewPhase,
    reloading: bool,
    columns: Vec<(&'static str, Vec<Ticket>)>,
    filters: TicketFilters,
    highlights: HighlightSet,
    freshness: FreshnessGuard,
}

impl TicketBoard {
    /// Creates an empty board in [`ViewPhase::Loading`]. The status filter
    /// is ignored: columns split by status already.
    #[must_use]
    pub fn new(filters: TicketFilters) -> Self {
        Self {
            phase: ViewPhase::Loading,
            reloading: false,
            columns: BOARD_STATUSES.iter().map(|s| (*s, Vec::new())).collect(),
            filters: without_status(filters),
            highlights: HighlightSet::new(),
            freshness: FreshnessGuard::new(),
        }
    }

    /// Current load phase.
    #[must_use]
    pub fn phase(&self) -> ViewPhase {
        self.phase
    }

    /// `true` while an explicit reload of a ready board runs.
    #[must_use]
    pub fn is_reloading(&self) -> bool {
        self.reloading
    }

    /// Tickets of one status column in display order. Unknown statuses
    /// yield an empty slice.
    #[must_use]
    pub fn column(&self, status: &str) -> &[Ticket] {
        self.columns
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, items)| items.as_slice())
            .unwrap_or_default()
    }

    /// All columns, left to right.
    pub fn columns(&self) -> impl Iterator<Item = (&'static str, &[Ticket])> {
        self.columns.iter().map(|(s, items)| (*s, items.as_slice()))
    }

    /// Status column currently holding `ticket_id`.
    #[must_use]
    pub fn locate(&self, ticket_id: &str) -> Option<&'static str> {
        self.columns
            .iter()
            .find(|(_, items)| items.iter().any(|t| t.id == ticket_id))
            .map(|(s, _)| *s)
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

    /// Removes `ticket_id` from every column; `true` when it was present.
    fn remove_everywhere(&mut self, ticket_id: &str) -> bool {
        let mut removed = false;
        for (_, items) in &mut self.columns {
            let before = items.len();
            items.retain(|t| t.id != ticket_id);
            removed |= items.len() != before;
        }
        removed
    }

    fn contains(&self, ticket_id: &str) -> bool {
        self.locate(ticket_id).is_some()
    }

    /// Drops highlights of tickets no longer on the board.
    fn prune_highlights(&mut self) {
        let columns = &self.columns;
        self.highlights
            .retain(|id| columns.iter().any(|(_, items)| items.iter().any(|t| t.id == id)));
    }
}

impl TicketView for TicketBoard {
    fn load_queries(&self) -> Vec<TicketFilters> {
        BOARD_STATUSES
            .iter()
            .map(|status| TicketFilters {
                status: Some((*status).to_string()),
                take: Some(LOAD_PER_STATUS),
                ..self.filters.clone()
            })
            .collect()
    }

    fn begin_load(&mut self, silent: bool) {
        if !silent && self.phase == ViewPhase::Ready {
            self.reloading = true;
        }
    }

    fn finish_load(&mut self, pages: Vec<TicketPage>, silent: bool) {
        let shown = self
            .columns
            .iter_mut()
            .flat_map(|(_, items)| std::mem::take(items));
        let loaded = self
            .freshness
            .settle(pages.into_iter().flat_map(|page| page.items), shown);

        let filters = &self.filters;
        for ticket in loaded.into_iter().filter(|t| filters.matches(t)) {
            let target = column_for(ticket.status.as_deref());
            if let Some((_, items)) = self.columns.iter_mut().find(|(s, _)| *s == target) {
                items.push(ticket);
            }
        }
        for (_, items) in &mut self.columns {
            sort_tickets(items);
        }

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
        self.filters = without_status(filters);
        let filters = &self.filters;
        for (_, items) in &mut self.columns {
            items.retain(|t| filters.matches(t));
        }
        self.prune_highlights();
    }

    fn apply_fetched(&mut self, ticket: Ticket) -> ReconcileOutcome {
        if !self.freshness.admit(&ticket) {
            tracing::debug!(ticket_id = %ticket.id, "discarding stale ticket record");
            return ReconcileOutcome::Stale;
        }

        let ticket_id = ticket.id.clone();
        let existed = self.remove_everywhere(&ticket_id);

        if !self.filters.matches(&ticket) {
            self.highlights.remove(&ticket_id);
            return if existed {
                ReconcileOutcome::Removed
            } else {
                ReconcileOutcome::Unchanged
            };
        }

        let target = column_for(ticket.status.as_deref());
        if let Some((_, items)) = self.columns.iter_mut().find(|(s, _)| *s == target) {
            items.push(ticket);
            sort_tickets(items);
            items.truncate(COLUMN_CAP);
        }

        if self.contains(&ticket_id) {
            self.highlights.trigger(&ticket_id);
        }
        self.prune_highlights();
        tracing::debug!(ticket_id = %ticket_id, column = target, "board upsert");

        if existed {
            ReconcileOutcome::Merged
        } else {
            ReconcileOutcome::Inserted
        }
    }

    fn apply_deleted(&mut self, ticket_id: &str) -> ReconcileOutcome {
        self.highlights.remove(ticket_id);
        if self.remove_everywhere(ticket_id) {
            ReconcileOutcome::Removed
        } else {
            ReconcileOutcome::Unchanged
        }
    }
}

fn without_status(filters: TicketFilters) -> TicketFilters {
    TicketFilters {
        status: None,
        ..filters
    }
}
