//! Derived traffic status values

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Traffic state of one entrance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    Clear,
    Traffic,
    Unknown,
}

/// Status and score (0-10) for one tunnel entrance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrafficStatus {
    pub status: StatusLevel,
    pub score: f64,
}

impl TrafficStatus {
    /// Status reported when there is no evidence at all
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            status: StatusLevel::Unknown,
            score: 0.0,
        }
    }
}

/// Combined status for both entrances of a tunnel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TunnelTrafficStatus {
    pub tunnel_id: Uuid,
    pub north: TrafficStatus,
    pub south: TrafficStatus,
    pub last_updated: DateTime<Utc>,
}
