//! PostgreSQL implementation of the ticket store.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::{TicketRecord, TicketStore};
use crate::config::GatewayConfig;
use crate::error::GatewayError;

/// PostgreSQL-backed ticket store using `sqlx::PgPool`.
///
/// Reads the `"Ticket"` table of the application database. Enum columns
/// are cast to text so the gateway stays independent of their variants.
#[derive(Debug, Clone)]
pub struct PostgresTicketStore {
    pool: PgPool,
}

impl PostgresTicketStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool using the gateway configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] if the database is
    /// unreachable, or [`GatewayError::InvalidRequest`] if no database URL
    /// is configured.
    pub async fn connect(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| GatewayError::InvalidRequest("DATABASE_URL is not set".to_string()))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(url)
            .await?;

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl TicketStore for PostgresTicketStore {
    async fn find_ticket(&self, ticket_id: &str) -> Result<Option<TicketRecord>, GatewayError> {
        let record = sqlx::query_as::<_, TicketRecord>(
            r#"SELECT id, "customerId", "assignedToId", code, title,
                      status::text AS status, type::text AS type, priority::text AS priority
               FROM "Ticket" WHERE id = $1"#,
        )
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }
}
