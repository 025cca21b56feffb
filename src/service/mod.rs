//! Service layer: realtime fan-out orchestration.

pub mod realtime_service;

pub use realtime_service::RealtimeService;
