//! Persistence layer: ticket lookups used for authorization.
//!
//! The gateway never writes tickets. It reads the routing fields of a
//! ticket through [`TicketStore`] when a client asks to join a ticket room
//! or to broadcast a ticket it claims to have created. The concrete
//! implementation uses `sqlx::PgPool`; [`InMemoryTicketStore`] backs tests
//! and database-less deployments.

pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;

pub use memory::InMemoryTicketStore;
pub use models::TicketRecord;
pub use postgres::PostgresTicketStore;

use crate::error::GatewayError;

/// Read access to the system of record for tickets.
#[async_trait]
pub trait TicketStore: Send + Sync + std::fmt::Debug {
    /// Looks up a ticket by id.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] when the backing store
    /// fails. A missing ticket is `Ok(None)`.
    async fn find_ticket(&self, ticket_id: &str) -> Result<Option<TicketRecord>, GatewayError>;
}
