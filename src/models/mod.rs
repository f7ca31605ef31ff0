//! Data models for the TunnelWatch service
//!
//! This module contains the core domain models organized by concern:
//! - Point: validated geographic coordinates
//! - Tunnel: the tunnel and its two entrances
//! - Report: crowdsourced traffic observations
//! - Status: derived per-entrance traffic status

pub mod point;
pub mod report;
pub mod status;
pub mod tunnel;

// Re-export all public types for convenient access
pub use point::Point;
pub use report::{NewTrafficReport, ReportSubmission, TrafficReport};
pub use status::{StatusLevel, TrafficStatus, TunnelTrafficStatus};
pub use tunnel::{Direction, Tunnel};
