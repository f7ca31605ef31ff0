//! Orchestration of report submission and status queries

use std::fmt::Display;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::cooldown::SubmissionCooldown;
use super::geofence::{GeofenceVerifier, distance_meters};
use super::scorer::TrafficScorer;
use crate::models::{
    Direction, NewTrafficReport, ReportSubmission, TrafficStatus, Tunnel, TunnelTrafficStatus,
};
use crate::store::{ReportStore, Stores, TunnelRepository};
use crate::{Result, TunnelWatchError};

/// Why a submission was turned away without being stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectionReason {
    /// The referenced tunnel does not exist
    NotFound,
    /// The submitter is too far from the claimed entrance
    OutOfGeofence,
    /// The submitter reported this entrance too recently
    Cooldown,
}

impl Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            RejectionReason::NotFound => "not-found",
            RejectionReason::OutOfGeofence => "out-of-geofence",
            RejectionReason::Cooldown => "cooldown",
        };
        f.write_str(text)
    }
}

/// Result of a single submission
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    Accepted {
        report_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    Rejected {
        reason: RejectionReason,
    },
}

impl SubmissionOutcome {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmissionOutcome::Accepted { .. })
    }
}

/// Accepts reports through the geofence and scores recent reports per entrance
pub struct ReportIngestCoordinator {
    tunnels: Arc<dyn TunnelRepository>,
    reports: Arc<dyn ReportStore>,
    geofence: GeofenceVerifier,
    scorer: TrafficScorer,
    window: Duration,
    cooldown: Option<Arc<dyn SubmissionCooldown>>,
}

impl ReportIngestCoordinator {
    /// Coordinator with the default geofence, scorer and a two hour window
    #[must_use]
    pub fn new(stores: Stores) -> Self {
        Self {
            tunnels: stores.tunnels,
            reports: stores.reports,
            geofence: GeofenceVerifier::default(),
            scorer: TrafficScorer::default(),
            window: Duration::hours(2),
            cooldown: None,
        }
    }

    #[must_use]
    pub fn with_geofence(mut self, geofence: GeofenceVerifier) -> Self {
        self.geofence = geofence;
        self
    }

    #[must_use]
    pub fn with_scorer(mut self, scorer: TrafficScorer) -> Self {
        self.scorer = scorer;
        self
    }

    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    #[must_use]
    pub fn with_cooldown(mut self, cooldown: Arc<dyn SubmissionCooldown>) -> Self {
        self.cooldown = Some(cooldown);
        self
    }

    /// Look up a tunnel, failing with `NotFound` when it does not exist
    pub async fn get_tunnel(&self, tunnel_id: Uuid) -> Result<Tunnel> {
        self.tunnels
            .get_tunnel(tunnel_id)
            .await?
            .ok_or_else(|| TunnelWatchError::not_found("Tunnel not found"))
    }

    /// Submit a report stamped with the current wall-clock time
    pub async fn submit_report(&self, submission: ReportSubmission) -> Result<SubmissionOutcome> {
        self.submit_report_at(submission, Utc::now()).await
    }

    /// Submit a report as if received at `now`
    #[instrument(
        skip(self, submission),
        fields(tunnel_id = %submission.tunnel_id, direction = %submission.direction)
    )]
    pub async fn submit_report_at(
        &self,
        submission: ReportSubmission,
        now: DateTime<Utc>,
    ) -> Result<SubmissionOutcome> {
        submission.validate()?;

        let Some(tunnel) = self.tunnels.get_tunnel(submission.tunnel_id).await? else {
            debug!("Rejecting report for unknown tunnel");
            return Ok(SubmissionOutcome::Rejected {
                reason: RejectionReason::NotFound,
            });
        };

        let entrance = tunnel.entrance(submission.direction);
        if !self.geofence.is_admissible(&submission.coordinates, entrance) {
            warn!(
                position = %submission.coordinates.format_coordinates(),
                distance_m = distance_meters(&submission.coordinates, entrance),
                radius_m = self.geofence.radius_meters(),
                "Rejecting report outside the entrance geofence"
            );
            return Ok(SubmissionOutcome::Rejected {
                reason: RejectionReason::OutOfGeofence,
            });
        }

        if let Some(cooldown) = &self.cooldown {
            if !cooldown
                .try_acquire(&submission.user_id, tunnel.id, submission.direction, now)
                .await
            {
                debug!("Rejecting report during submitter cooldown");
                return Ok(SubmissionOutcome::Rejected {
                    reason: RejectionReason::Cooldown,
                });
            }
        }

        let report = NewTrafficReport {
            tunnel_id: tunnel.id,
            direction: submission.direction,
            user_id: submission.user_id,
            timestamp: now,
            geolocation_verified: true,
            has_traffic: submission.has_traffic,
            coordinates: submission.coordinates,
        };
        let user_id = report.user_id.clone();

        let report_id = match self.reports.create_report(report).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!("Failed to store traffic report: {e}");
                if let Some(cooldown) = &self.cooldown {
                    cooldown
                        .release(&user_id, tunnel.id, submission.direction, now)
                        .await;
                }
                return Err(e);
            }
        };

        info!(%report_id, has_traffic = submission.has_traffic, "Accepted traffic report");
        Ok(SubmissionOutcome::Accepted {
            report_id,
            timestamp: now,
        })
    }

    /// Current status of both entrances
    pub async fn get_status(&self, tunnel_id: Uuid) -> Result<TunnelTrafficStatus> {
        self.get_status_at(tunnel_id, Utc::now()).await
    }

    /// Status of both entrances as of `now`
    #[instrument(skip(self))]
    pub async fn get_status_at(
        &self,
        tunnel_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<TunnelTrafficStatus> {
        let tunnel = self.get_tunnel(tunnel_id).await?;

        let (north, south) = futures::try_join!(
            self.direction_status(tunnel.id, Direction::North, now),
            self.direction_status(tunnel.id, Direction::South, now),
        )?;

        Ok(TunnelTrafficStatus {
            tunnel_id: tunnel.id,
            north,
            south,
            last_updated: now,
        })
    }

    async fn direction_status(
        &self,
        tunnel_id: Uuid,
        direction: Direction,
        now: DateTime<Utc>,
    ) -> Result<TrafficStatus> {
        let since = now - self.window;
        let reports = self
            .reports
            .get_recent_reports(tunnel_id, direction, since)
            .await?;
        let status = self.scorer.score(&reports, now);
        debug!(
            %direction,
            reports = reports.len(),
            score = status.score,
            "Scored entrance"
        );
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Point, StatusLevel};
    use crate::store::MemoryStore;
    use crate::traffic::cooldown::InMemoryCooldown;

    const NORTH: (f64, f64) = (64.1375, -21.8952);
    const SOUTH: (f64, f64) = (64.3620, -21.7800);

    fn point(coords: (f64, f64)) -> Point {
        Point::new(coords.0, coords.1).unwrap()
    }

    async fn setup() -> (Arc<MemoryStore>, ReportIngestCoordinator, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let tunnel = Tunnel::new(
            Uuid::from_u128(1),
            "Sample Tunnel",
            point(NORTH),
            point(SOUTH),
            Utc::now(),
        )
        .unwrap();
        store.put_tunnel(tunnel.clone()).await.unwrap();
        let coordinator = ReportIngestCoordinator::new(Stores::shared(store.clone()));
        (store, coordinator, tunnel.id)
    }

    fn submission(tunnel_id: Uuid, direction: Direction, at: (f64, f64), has_traffic: bool) -> ReportSubmission {
        ReportSubmission {
            tunnel_id,
            direction,
            user_id: "3f1c2a8e-0b4d-4e55-9a43-1c2d3e4f5a6b".to_string(),
            has_traffic,
            coordinates: point(at),
        }
    }

    #[tokio::test]
    async fn test_accepts_report_at_entrance() {
        let (store, coordinator, tunnel_id) = setup().await;
        let now = Utc::now();

        let outcome = coordinator
            .submit_report_at(submission(tunnel_id, Direction::North, NORTH, true), now)
            .await
            .unwrap();

        let SubmissionOutcome::Accepted { report_id, timestamp } = outcome else {
            panic!("expected acceptance, got {outcome:?}");
        };
        assert_eq!(timestamp, now);

        let stored = store
            .get_recent_reports(tunnel_id, Direction::North, now - Duration::hours(2))
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, report_id);
        assert!(stored[0].geolocation_verified);
        assert_eq!(stored[0].timestamp, now);
    }

    #[tokio::test]
    async fn test_rejects_report_outside_geofence() {
        let (store, coordinator, tunnel_id) = setup().await;

        let outcome = coordinator
            .submit_report(submission(tunnel_id, Direction::North, (64.1500, -21.9000), true))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            SubmissionOutcome::Rejected {
                reason: RejectionReason::OutOfGeofence
            }
        );
        assert_eq!(store.report_count().await, 0);
    }

    #[tokio::test]
    async fn test_entrance_must_match_direction() {
        let (store, coordinator, tunnel_id) = setup().await;

        // standing at the north entrance but claiming the south one
        let outcome = coordinator
            .submit_report(submission(tunnel_id, Direction::South, NORTH, false))
            .await
            .unwrap();

        assert!(!outcome.is_accepted());
        assert_eq!(store.report_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_tunnel_is_distinct_rejection() {
        let (store, coordinator, _) = setup().await;

        let outcome = coordinator
            .submit_report(submission(Uuid::from_u128(99), Direction::North, NORTH, true))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            SubmissionOutcome::Rejected {
                reason: RejectionReason::NotFound
            }
        );
        assert_eq!(store.report_count().await, 0);
    }

    #[tokio::test]
    async fn test_invalid_submission_is_validation_error() {
        let (store, coordinator, tunnel_id) = setup().await;
        let mut bad = submission(tunnel_id, Direction::North, NORTH, true);
        bad.user_id = String::new();

        let err = coordinator.submit_report(bad).await.unwrap_err();
        assert!(matches!(err, TunnelWatchError::Validation { .. }));
        assert_eq!(store.report_count().await, 0);
    }

    #[tokio::test]
    async fn test_cooldown_rejects_repeat_submission() {
        let (store, coordinator, tunnel_id) = setup().await;
        let coordinator = coordinator.with_cooldown(Arc::new(InMemoryCooldown::default()));
        let now = Utc::now();

        let first = coordinator
            .submit_report_at(submission(tunnel_id, Direction::North, NORTH, true), now)
            .await
            .unwrap();
        assert!(first.is_accepted());

        let second = coordinator
            .submit_report_at(
                submission(tunnel_id, Direction::North, NORTH, true),
                now + Duration::minutes(5),
            )
            .await
            .unwrap();
        assert_eq!(
            second,
            SubmissionOutcome::Rejected {
                reason: RejectionReason::Cooldown
            }
        );

        let other_entrance = coordinator
            .submit_report_at(
                submission(tunnel_id, Direction::South, SOUTH, true),
                now + Duration::minutes(5),
            )
            .await
            .unwrap();
        assert!(other_entrance.is_accepted());
        assert_eq!(store.report_count().await, 2);
    }

    /// Fails the first insert, then delegates to a memory store
    struct FlakyReports {
        inner: MemoryStore,
        failed: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl ReportStore for FlakyReports {
        async fn create_report(&self, report: NewTrafficReport) -> Result<Uuid> {
            if !self.failed.swap(true, std::sync::atomic::Ordering::SeqCst) {
                return Err(TunnelWatchError::store("write stalled"));
            }
            self.inner.create_report(report).await
        }

        async fn get_recent_reports(
            &self,
            tunnel_id: Uuid,
            direction: Direction,
            since: DateTime<Utc>,
        ) -> Result<Vec<crate::models::TrafficReport>> {
            self.inner.get_recent_reports(tunnel_id, direction, since).await
        }
    }

    #[tokio::test]
    async fn test_failed_store_releases_cooldown() {
        let (tunnels, _, tunnel_id) = setup().await;
        let stores = Stores {
            tunnels,
            reports: Arc::new(FlakyReports {
                inner: MemoryStore::new(),
                failed: std::sync::atomic::AtomicBool::new(false),
            }),
        };
        let coordinator = ReportIngestCoordinator::new(stores)
            .with_cooldown(Arc::new(InMemoryCooldown::default()));
        let now = Utc::now();

        let err = coordinator
            .submit_report_at(submission(tunnel_id, Direction::North, NORTH, true), now)
            .await
            .unwrap_err();
        assert!(matches!(err, TunnelWatchError::Store { .. }));

        let retry = coordinator
            .submit_report_at(
                submission(tunnel_id, Direction::North, NORTH, true),
                now + Duration::seconds(1),
            )
            .await
            .unwrap();
        assert!(retry.is_accepted());
    }

    #[tokio::test]
    async fn test_status_without_reports_is_unknown() {
        let (_, coordinator, tunnel_id) = setup().await;
        let now = Utc::now();

        let status = coordinator.get_status_at(tunnel_id, now).await.unwrap();
        assert_eq!(status.tunnel_id, tunnel_id);
        assert_eq!(status.north, TrafficStatus::unknown());
        assert_eq!(status.south, TrafficStatus::unknown());
        assert_eq!(status.last_updated, now);
    }

    #[tokio::test]
    async fn test_status_scores_each_direction() {
        let (_, coordinator, tunnel_id) = setup().await;
        let now = Utc::now();

        for minutes in [20, 10, 0] {
            coordinator
                .submit_report_at(
                    submission(tunnel_id, Direction::North, NORTH, true),
                    now - Duration::minutes(minutes),
                )
                .await
                .unwrap();
        }
        coordinator
            .submit_report_at(submission(tunnel_id, Direction::South, SOUTH, false), now)
            .await
            .unwrap();

        let status = coordinator.get_status_at(tunnel_id, now).await.unwrap();
        assert_eq!(status.north.status, StatusLevel::Traffic);
        assert_eq!(status.north.score, 10.0);
        assert_eq!(status.south.status, StatusLevel::Clear);
        assert_eq!(status.south.score, 0.0);

        assert_eq!(coordinator.get_status_at(tunnel_id, now).await.unwrap(), status);
    }

    #[tokio::test]
    async fn test_reports_outside_window_are_ignored() {
        let (_, coordinator, tunnel_id) = setup().await;
        let now = Utc::now();

        coordinator
            .submit_report_at(
                submission(tunnel_id, Direction::North, NORTH, true),
                now - Duration::hours(3),
            )
            .await
            .unwrap();

        let status = coordinator.get_status_at(tunnel_id, now).await.unwrap();
        assert_eq!(status.north, TrafficStatus::unknown());
    }

    #[tokio::test]
    async fn test_status_for_unknown_tunnel_is_not_found() {
        let (_, coordinator, _) = setup().await;
        let err = coordinator.get_status(Uuid::from_u128(42)).await.unwrap_err();
        assert!(matches!(err, TunnelWatchError::NotFound { .. }));
    }
}
