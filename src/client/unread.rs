//! Unread markers for tickets, ticket chats and appointments.
//!
//! Counts what arrived since the user last looked, per conversation, and
//! briefly highlights the conversation that just changed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast};

use super::highlight::HighlightSet;
use crate::protocol::{EventName, ServerEvent};

/// How long a conversation stays highlighted after new activity.
pub const UNREAD_HIGHLIGHT_DURATION: Duration = Duration::from_millis(6000);

/// Kind of conversation an unread marker belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnreadKind {
    /// Ticket created or changed.
    Tickets,
    /// Appointment created or changed.
    Appointments,
    /// New message on a ticket thread.
    Chats,
}

/// Which kinds a tracker follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnreadOptions {
    /// Follow ticket changes.
    pub tickets: bool,
    /// Follow appointment changes.
    pub appointments: bool,
    /// Follow ticket messages.
    pub chats: bool,
}

impl Default for UnreadOptions {
    fn default() -> Self {
        Self {
            tickets: true,
            appointments: true,
            chats: true,
        }
    }
}

/// Number of conversations with unread activity, per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnreadCounts {
    /// Tickets with unread changes.
    pub tickets: usize,
    /// Appointments with unread changes.
    pub appointments: usize,
    /// Ticket threads with unread messages.
    pub chats: usize,
    /// Sum of the three.
    pub total: usize,
}

#[derive(Debug, Clone)]
struct Bucket {
    unread: HashMap<String, u32>,
    highlights: HighlightSet,
}

impl Bucket {
    fn new() -> Self {
        Self {
            unread: HashMap::new(),
            highlights: HighlightSet::with_window(UNREAD_HIGHLIGHT_DURATION),
        }
    }

    fn bump(&mut self, id: &str, highlight: bool) {
        *self.unread.entry(id.to_string()).or_default() += 1;
        if highlight {
            self.highlights.trigger(id);
        }
    }
}

/// Unread state of one signed-in user.
#[derive(Debug, Clone)]
pub struct UnreadTracker {
    user_id: String,
    staff: bool,
    options: UnreadOptions,
    tickets: Bucket,
    appointments: Bucket,
    chats: Bucket,
}

impl UnreadTracker {
    /// Creates a tracker for `user_id`. Staff see every ticket; customers
    /// only tickets without an owner or owned by them.
    #[must_use]
    pub fn new(user_id: impl Into<String>, staff: bool, options: UnreadOptions) -> Self {
        Self {
            user_id: user_id.into(),
            staff,
            options,
            tickets: Bucket::new(),
            appointments: Bucket::new(),
            chats: Bucket::new(),
        }
    }

    /// Records one realtime event. Returns `true` when a marker changed.
    ///
    /// Staff follow `ticket:updated` from the `admin` room, customers
    /// `ticket:update` from their own room, so no change counts twice.
    pub fn observe(&mut self, event: &ServerEvent) -> bool {
        let data = &event.data;
        match event.name {
            EventName::TicketCreated => {
                let Some(ticket_id) = first_str(data, &["id", "ticketId"]) else {
                    return false;
                };
                let for_user = first_str(data, &["customerId"]).is_none_or(|c| c == self.user_id);
                if !self.options.tickets || !(for_user || self.staff) {
                    return false;
                }
                self.tickets.bump(ticket_id, true);
                true
            }
            EventName::TicketUpdated | EventName::TicketUpdate => {
                let followed = if self.staff {
                    event.name == EventName::TicketUpdated
                } else {
                    event.name == EventName::TicketUpdate
                };
                let Some(ticket_id) = first_str(data, &["id", "ticketId"]) else {
                    return false;
                };
                if !self.options.tickets || !followed {
                    return false;
                }
                self.tickets.bump(ticket_id, true);
                true
            }
            EventName::TicketMessage => {
                let Some(ticket_id) = first_str(data, &["ticketId"]) else {
                    return false;
                };
                let own = first_str(data, &["fromUserId", "userId"]) == Some(self.user_id.as_str());
                if !self.options.chats || own {
                    return false;
                }
                self.chats.bump(ticket_id, true);
                true
            }
            EventName::AppointmentUpsert | EventName::AppointmentUpdate => {
                let mut changed = false;
                if self.options.appointments {
                    if let Some(appointment_id) = first_str(data, &["id", "appointmentId"]) {
                        self.appointments.unread.insert(appointment_id.to_string(), 1);
                        self.appointments.highlights.trigger(appointment_id);
                        changed = true;
                    }
                }
                if self.options.tickets {
                    if let Some(ticket_id) = first_str(data, &["ticketId"]) {
                        self.tickets.bump(ticket_id, false);
                        changed = true;
                    }
                }
                changed
            }
            EventName::Pong
            | EventName::Error
            | EventName::TestNotificationSent
            | EventName::TicketDeleted
            | EventName::TicketSession
            | EventName::NotificationNew => false,
        }
    }

    /// Clears the marker and highlight of one conversation.
    pub fn mark_read(&mut self, kind: UnreadKind, id: &str) -> bool {
        let bucket = self.bucket_mut(kind);
        bucket.highlights.remove(id);
        bucket.unread.remove(id).is_some()
    }

    /// Whether the conversation has unread activity.
    #[must_use]
    pub fn is_unread(&self, kind: UnreadKind, id: &str) -> bool {
        self.bucket(kind).unread.contains_key(id)
    }

    /// Unread events of one conversation.
    #[must_use]
    pub fn unread_count(&self, kind: UnreadKind, id: &str) -> u32 {
        self.bucket(kind).unread.get(id).copied().unwrap_or(0)
    }

    /// Whether the conversation changed within the highlight window.
    #[must_use]
    pub fn is_highlighted(&self, kind: UnreadKind, id: &str) -> bool {
        self.bucket(kind).highlights.contains(id)
    }

    /// Totals for navigation badges.
    #[must_use]
    pub fn counts(&self) -> UnreadCounts {
        let tickets = self.tickets.unread.len();
        let appointments = self.appointments.unread.len();
        let chats = self.chats.unread.len();
        UnreadCounts {
            tickets,
            appointments,
            chats,
            total: tickets + appointments + chats,
        }
    }

    fn bucket(&self, kind: UnreadKind) -> &Bucket {
        match kind {
            UnreadKind::Tickets => &self.tickets,
            UnreadKind::Appointments => &self.appointments,
            UnreadKind::Chats => &self.chats,
        }
    }

    fn bucket_mut(&mut self, kind: UnreadKind) -> &mut Bucket {
        match kind {
            UnreadKind::Tickets => &mut self.tickets,
            UnreadKind::Appointments => &mut self.appointments,
            UnreadKind::Chats => &mut self.chats,
        }
    }
}

/// Feeds `events` into `tracker` until the stream closes.
pub async fn run_unread_feed(
    tracker: Arc<Mutex<UnreadTracker>>,
    mut events: broadcast::Receiver<ServerEvent>,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                tracker.lock().await.observe(&event);
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "unread feed lagged, some markers were missed");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// First non-empty string among `keys` of an object payload.
fn first_str<'a>(data: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| data.get(*key).and_then(Value::as_str).filter(|s| !s.is_empty()))
}
