//! HTTP endpoint handlers.

pub mod events;
pub mod system;
