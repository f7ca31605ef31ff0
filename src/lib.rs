//! `TunnelWatch` - crowdsourced traffic status for a road tunnel
//!
//! This library provides geofence verification of submitted reports,
//! time-decayed scoring of recent reports per tunnel entrance, and the
//! storage and HTTP adapters around them.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod store;
pub mod telemetry;
pub mod traffic;
pub mod web;

// Re-export core types for public API
pub use config::TunnelWatchConfig;
pub use error::TunnelWatchError;
pub use models::{
    Direction, Point, ReportSubmission, StatusLevel, TrafficReport, TrafficStatus, Tunnel,
    TunnelTrafficStatus,
};
pub use store::{FjallStore, MemoryStore, ReportStore, Stores, TunnelRepository};
pub use traffic::{
    GeofenceVerifier, RejectionReason, ReportIngestCoordinator, SubmissionOutcome, TrafficScorer,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, TunnelWatchError>;
