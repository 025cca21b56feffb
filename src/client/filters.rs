//! Ticket list filters and the client-side match predicate.

use serde::{Deserialize, Serialize};

use super::ticket::Ticket;

/// Active filters of a ticket view. Empty fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketFilters {
    /// Exact status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Exact ticket type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ticket_type: Option<String>,
    /// Exact priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    /// Exact billing status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_status: Option<String>,
    /// Exact assignee id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to_id: Option<String>,
    /// Exact customer e-mail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    /// Case-insensitive search over title, description and code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    /// Page size sent to the list endpoint. Not part of matching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take: Option<u32>,
}

impl TicketFilters {
    /// Returns `true` when `ticket` satisfies every non-empty filter.
    #[must_use]
    pub fn matches(&self, ticket: &Ticket) -> bool {
        let customer_email = ticket.customer.as_ref().and_then(|c| c.email.as_deref());
        let exact = [
            (&self.status, ticket.status.as_deref()),
            (&self.ticket_type, ticket.ticket_type.as_deref()),
            (&self.priority, ticket.priority.as_deref()),
            (&self.billing_status, ticket.billing_status.as_deref()),
            (&self.assigned_to_id, ticket.assigned_to_id.as_deref()),
            (&self.customer_email, customer_email),
        ];
        let exact_ok = exact
            .into_iter()
            .all(|(wanted, actual)| match non_empty(wanted) {
                Some(wanted) => actual == Some(wanted),
                None => true,
            });
        if !exact_ok {
            return false;
        }

        match non_empty(&self.q) {
            Some(q) => {
                let needle = q.to_lowercase();
                [&ticket.title, &ticket.description, &ticket.code]
                    .into_iter()
                    .flatten()
                    .any(|hay| hay.to_lowercase().contains(&needle))
            }
            None => true,
        }
    }

    /// Query parameters for the list endpoint, skipping empty fields.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let fields = [
            ("status", &self.status),
            ("type", &self.ticket_type),
            ("priority", &self.priority),
            ("billingStatus", &self.billing_status),
            ("assignedToId", &self.assigned_to_id),
            ("customerEmail", &self.customer_email),
            ("q", &self.q),
        ];
        let mut pairs: Vec<(&'static str, String)> = fields
            .into_iter()
            .filter_map(|(key, value)| non_empty(value).map(|v| (key, v.to_string())))
            .collect();
        if let Some(take) = self.take {
            pairs.push(("take", take.to_string()));
        }
        pairs
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
