//! Database models.

use serde::{Deserialize, Serialize};

/// The routing-relevant columns of a ticket row.
///
/// Serialized in camelCase because the record is also the payload of a
/// `ticket:created` broadcast triggered by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TicketRecord {
    /// Ticket id.
    pub id: String,
    /// Owning customer.
    #[sqlx(rename = "customerId")]
    pub customer_id: Option<String>,
    /// Assigned technician.
    #[sqlx(rename = "assignedToId")]
    pub assigned_to_id: Option<String>,
    /// Human-readable ticket code (e.g. `"REM-2024-0042"`).
    pub code: String,
    /// Ticket title.
    pub title: String,
    /// Workflow status (e.g. `"NEW"`).
    pub status: String,
    /// Ticket type (e.g. `"REMOTE"`).
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub ticket_type: String,
    /// Priority (e.g. `"HIGH"`).
    pub priority: String,
}

impl TicketRecord {
    /// Returns `true` if the user owns or is assigned to the ticket.
    #[must_use]
    pub fn involves(&self, user_id: &str) -> bool {
        self.customer_id.as_deref() == Some(user_id)
            || self.assigned_to_id.as_deref() == Some(user_id)
    }
}
