//! # ticket-realtime-gateway
//!
//! Room-based realtime fan-out for a ticketing system, plus the client-side
//! reconciliation that keeps ticket lists and boards in sync with it.
//!
//! Clients connect over WebSocket, authenticate once with an access token,
//! and join rooms (`ticket:<id>`, `user:<id>`, `admin`). Backend services
//! push domain events through the internal HTTP ingress; the gateway routes
//! each event to the rooms that should see it. The [`client`] module holds
//! the consumer side: a WebSocket client and the list/board reconcilers.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket)          Backend services (HTTP)
//!     │                                │
//!     ├── WS Handler (ws/)             ├── Event ingress (api/)
//!     │     └── dispatch               │
//!     │                                │
//!     └──────── RealtimeService (service/) ───┘
//!                   │             │
//!               EventBus      TicketStore (persistence/)
//!              (domain/)          └── PostgreSQL / in-memory
//! ```

pub mod api;
pub mod app_state;
pub mod auth;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod protocol;
pub mod service;
pub mod ws;
