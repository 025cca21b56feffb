//! In-memory ticket store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{TicketRecord, TicketStore};
use crate::error::GatewayError;

/// Ticket store backed by a `HashMap`, keyed by ticket id.
#[derive(Debug, Default)]
pub struct InMemoryTicketStore {
    tickets: RwLock<HashMap<String, TicketRecord>>,
}

impl InMemoryTicketStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a ticket.
    pub async fn insert(&self, record: TicketRecord) {
        self.tickets.write().await.insert(record.id.clone(), record);
    }

    /// Removes a ticket, returning it if it existed.
    pub async fn remove(&self, ticket_id: &str) -> Option<TicketRecord> {
        self.tickets.write().await.remove(ticket_id)
    }

    /// Returns the number of stored tickets.
    pub async fn len(&self) -> usize {
        self.tickets.read().await.len()
    }

    /// Returns `true` if the store holds no tickets.
    pub async fn is_empty(&self) -> bool {
        self.tickets.read().await.is_empty()
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn find_ticket(&self, ticket_id: &str) -> Result<Option<TicketRecord>, GatewayError> {
        Ok(self.tickets.read().await.get(ticket_id).cloned())
    }
}
