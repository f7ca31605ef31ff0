//! Traffic core
//!
//! This module provides the report ingestion and status logic:
//! - Geofence verification of a submitter's position against an entrance
//! - Half-life decayed scoring of recent reports
//! - Orchestration of submissions and status queries over the stores
//! - An optional per-submitter cooldown

pub mod cooldown;
pub mod coordinator;
pub mod geofence;
pub mod scorer;

pub use cooldown::{InMemoryCooldown, SubmissionCooldown};
pub use coordinator::{RejectionReason, ReportIngestCoordinator, SubmissionOutcome};
pub use geofence::{GeofenceVerifier, distance_meters};
pub use scorer::{StatusThresholds, TrafficScorer};
