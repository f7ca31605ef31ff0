//! Crowdsourced traffic reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Direction, Point};
use crate::TunnelWatchError;

/// Longest accepted submitter identifier
pub const MAX_USER_ID_LEN: usize = 128;

/// An accepted and stored traffic observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficReport {
    pub id: Uuid,
    pub tunnel_id: Uuid,
    pub direction: Direction,
    /// Opaque submitter identifier
    pub user_id: String,
    /// Assigned by the server when the report was accepted
    pub timestamp: DateTime<Utc>,
    pub geolocation_verified: bool,
    pub has_traffic: bool,
    pub coordinates: Option<Point>,
}

/// An accepted report that has not been assigned an identifier yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrafficReport {
    pub tunnel_id: Uuid,
    pub direction: Direction,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub geolocation_verified: bool,
    pub has_traffic: bool,
    pub coordinates: Point,
}

impl NewTrafficReport {
    /// Attach the identifier assigned by the store
    #[must_use]
    pub fn with_id(self, id: Uuid) -> TrafficReport {
        TrafficReport {
            id,
            tunnel_id: self.tunnel_id,
            direction: self.direction,
            user_id: self.user_id,
            timestamp: self.timestamp,
            geolocation_verified: self.geolocation_verified,
            has_traffic: self.has_traffic,
            coordinates: Some(self.coordinates),
        }
    }
}

/// Candidate report fields as claimed by a client.
///
/// Carries no verification flag; verification is decided server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSubmission {
    pub tunnel_id: Uuid,
    pub direction: Direction,
    pub user_id: String,
    pub has_traffic: bool,
    pub coordinates: Point,
}

impl ReportSubmission {
    /// Check the fields that are not already guaranteed by their types
    pub fn validate(&self) -> crate::Result<()> {
        let user_id = self.user_id.trim();
        if user_id.is_empty() {
            return Err(TunnelWatchError::validation("userId cannot be empty"));
        }
        if user_id.len() > MAX_USER_ID_LEN {
            return Err(TunnelWatchError::validation(format!(
                "userId cannot exceed {MAX_USER_ID_LEN} characters"
            )));
        }
        Ok(())
    }
}
