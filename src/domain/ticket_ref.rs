//! Reference to a ticket as passed to the created-ticket fan-out.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Either a bare ticket id or a full ticket object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TicketRef {
    /// Only the ticket id is known.
    Id(String),
    /// A ticket object carrying at least `id` and possibly `customerId`.
    Record(Value),
}

impl TicketRef {
    /// Returns the ticket id, if one can be resolved.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Id(id) => Some(id.as_str()),
            Self::Record(record) => record.get("id").and_then(Value::as_str),
        }
        .filter(|id| !id.is_empty())
    }

    /// Returns the owning customer, available only on full objects.
    #[must_use]
    pub fn customer_id(&self) -> Option<&str> {
        match self {
            Self::Id(_) => None,
            Self::Record(record) => record
                .get("customerId")
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty()),
        }
    }
}

impl From<&str> for TicketRef {
    fn from(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

impl From<String> for TicketRef {
    fn from(id: String) -> Self {
        Self::Id(id)
    }
}

impl From<Value> for TicketRef {
    fn from(value: Value) -> Self {
        match value {
            Value::String(id) => Self::Id(id),
            other => Self::Record(other),
        }
    }
}
