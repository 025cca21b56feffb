//! Client side of the realtime gateway.
//!
//! [`RealtimeClient`] holds the WebSocket connection. [`TicketList`] and
//! [`TicketBoard`] are views that a [`Reconciler`] keeps in sync: each
//! realtime event names a ticket, the reconciler fetches its full record
//! through [`TicketApi`] and applies it under the view's filters.
//! [`run_ticket_feed`] connects the two.
//!
//! The same event stream drives the single-ticket view
//! ([`run_ticket_detail_feed`]), the notification inbox with its heartbeat
//! ([`run_notification_feed`]) and the unread markers
//! ([`run_unread_feed`]).

pub mod api;
pub mod board;
pub mod connection;
pub mod detail;
pub mod error;
pub mod feed;
pub mod filters;
pub mod freshness;
pub mod highlight;
pub mod list;
pub mod notifications;
pub mod reconciler;
pub mod ticket;
pub mod unread;

pub use api::{HttpTicketApi, TicketApi, TicketPage};
pub use board::TicketBoard;
pub use connection::{ConnectionState, RealtimeClient};
pub use detail::{TicketDetail, TicketDetailFeed, run_ticket_detail_feed};
pub use error::ClientError;
pub use feed::run_ticket_feed;
pub use filters::TicketFilters;
pub use highlight::HighlightSet;
pub use list::TicketList;
pub use notifications::{
    Notification, NotificationApi, NotificationCenter, NotificationInbox, NotificationPage,
    NotificationScope, run_notification_feed,
};
pub use reconciler::{ReconcileOutcome, Reconciler, TicketView, ViewPhase};
pub use ticket::Ticket;
pub use unread::{UnreadCounts, UnreadKind, UnreadOptions, UnreadTracker, run_unread_feed};
