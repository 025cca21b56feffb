//! Client-side ticket record as returned by the ticket REST API.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Customer summary embedded in a ticket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketCustomer {
    /// Customer e-mail address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Remaining customer fields, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A ticket as the admin API returns it.
///
/// Only the fields used for filtering and ordering are typed; everything
/// else is carried in `extra` so a merged record loses nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    /// Ticket id.
    pub id: String,
    /// Human-readable ticket code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Workflow status (`NEW`, `OPEN`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Ticket type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ticket_type: Option<String>,
    /// Priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    /// Billing status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_status: Option<String>,
    /// Assigned staff member.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to_id: Option<String>,
    /// Owning customer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    /// Embedded customer summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<TicketCustomer>,
    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last modification time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Every other field of the record.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Ticket {
    /// Creates a ticket with only an id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Shallow-merges `newer` over this record: every field present in
    /// `newer` replaces the current value, absent fields are kept.
    pub fn merge_from(&mut self, newer: Ticket) {
        let (Ok(Value::Object(mut base)), Ok(Value::Object(over))) =
            (serde_json::to_value(&*self), serde_json::to_value(&newer))
        else {
            *self = newer;
            return;
        };
        base.extend(over);
        *self = serde_json::from_value(Value::Object(base)).unwrap_or(newer);
    }

    fn created_key(&self) -> DateTime<Utc> {
        self.created_at.unwrap_or(DateTime::UNIX_EPOCH)
    }
}

/// Display order: newest `createdAt` first, ties by id ascending. A missing
/// `createdAt` sorts as the epoch.
pub(crate) fn display_order(a: &Ticket, b: &Ticket) -> Ordering {
    b.created_key()
        .cmp(&a.created_key())
        .then_with(|| a.id.cmp(&b.id))
}

pub(crate) fn sort_tickets(items: &mut [Ticket]) {
    items.sort_by(display_order);
}
