//! Transient "recently changed" markers for ticket views.
//!
//! Each highlight carries a deadline on the tokio clock instead of a
//! timer task, so expiry needs no cancellation and follows a paused clock
//! in tests.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

/// How long a ticket stays highlighted after its last trigger.
pub const HIGHLIGHT_DURATION: Duration = Duration::from_millis(4000);

/// Set of highlighted ids with per-id expiry.
#[derive(Debug, Clone)]
pub struct HighlightSet {
    window: Duration,
    deadlines: HashMap<String, Instant>,
}

impl Default for HighlightSet {
    fn default() -> Self {
        Self::with_window(HIGHLIGHT_DURATION)
    }
}

impl HighlightSet {
    /// Creates an empty set with the [`HIGHLIGHT_DURATION`] window.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty set whose highlights last `window`.
    #[must_use]
    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            deadlines: HashMap::new(),
        }
    }

    /// Highlights `id` for the window from now, resetting any running
    /// window.
    pub fn trigger(&mut self, id: &str) {
        self.purge_expired();
        self.deadlines
            .insert(id.to_string(), Instant::now() + self.window);
    }

    /// Drops the highlight of `id`.
    pub fn remove(&mut self, id: &str) {
        self.deadlines.remove(id);
    }

    /// Drops every highlight.
    pub fn clear(&mut self) {
        self.deadlines.clear();
    }

    /// Keeps only the highlights whose id satisfies `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.deadlines.retain(|id, _| keep(id));
    }

    /// Returns `true` while `id` is inside its highlight window.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.deadlines
            .get(id)
            .is_some_and(|deadline| Instant::now() < *deadline)
    }

    /// Currently highlighted ids, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let now = Instant::now();
        let mut ids: Vec<String> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| now < **deadline)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    fn purge_expired(&mut self) {
        let now = Instant::now();
        self.deadlines.retain(|_, deadline| now < *deadline);
    }
}
