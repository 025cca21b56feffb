//! Data Transfer Objects for REST request/response serialization.
//!
//! Event payloads themselves are opaque JSON and are passed through
//! untouched; only the envelopes live here.

pub mod event_dto;

pub use event_dto::*;
