//! Time-decayed aggregation of traffic reports into a status

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::TunnelWatchError;
use crate::models::{StatusLevel, TrafficReport, TrafficStatus};

/// Maximum score on the status scale
pub const MAX_SCORE: f64 = 10.0;

/// Score bands separating clear / unknown / traffic
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusThresholds {
    /// Scores strictly below this are `clear`
    pub clear_below: f64,
    /// Scores at or above this are `traffic`
    pub traffic_at: f64,
}

impl Default for StatusThresholds {
    fn default() -> Self {
        Self {
            clear_below: 1.5,
            traffic_at: 3.0,
        }
    }
}

impl StatusThresholds {
    /// Map a score to exactly one status level
    #[must_use]
    pub fn classify(&self, score: f64) -> StatusLevel {
        if score >= self.traffic_at {
            StatusLevel::Traffic
        } else if score < self.clear_below {
            StatusLevel::Clear
        } else {
            StatusLevel::Unknown
        }
    }
}

/// Aggregates a window of reports with exponential half-life decay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrafficScorer {
    half_life: Duration,
    thresholds: StatusThresholds,
}

impl Default for TrafficScorer {
    fn default() -> Self {
        Self {
            half_life: Duration::minutes(30),
            thresholds: StatusThresholds::default(),
        }
    }
}

impl TrafficScorer {
    /// Scorer with the given decay and score bands.
    ///
    /// The half-life must be positive and the thresholds finite with
    /// `clear_below <= traffic_at`.
    pub fn new(half_life: Duration, thresholds: StatusThresholds) -> crate::Result<Self> {
        if half_life <= Duration::zero() {
            return Err(TunnelWatchError::validation(format!(
                "Half-life must be positive, got {half_life}"
            )));
        }
        let StatusThresholds {
            clear_below,
            traffic_at,
        } = thresholds;
        if !clear_below.is_finite() || !traffic_at.is_finite() || clear_below > traffic_at {
            return Err(TunnelWatchError::validation(format!(
                "Invalid status thresholds: clear below {clear_below}, traffic at {traffic_at}"
            )));
        }
        Ok(Self {
            half_life,
            thresholds,
        })
    }

    #[must_use]
    pub fn half_life(&self) -> Duration {
        self.half_life
    }

    /// Decay weight of a report observed `age` ago.
    ///
    /// Negative ages (reports stamped after `now`) are clamped to zero.
    #[must_use]
    pub fn weight(&self, age: Duration) -> f64 {
        let age_ms = age.num_milliseconds().max(0) as f64;
        let half_life_ms = self.half_life.num_milliseconds() as f64;
        0.5_f64.powf(age_ms / half_life_ms)
    }

    /// Score the given reports as of `now`.
    ///
    /// The caller is expected to have restricted `reports` to one
    /// tunnel/direction and to the lookback window.
    #[must_use]
    pub fn score(&self, reports: &[TrafficReport], now: DateTime<Utc>) -> TrafficStatus {
        if reports.is_empty() {
            return TrafficStatus::unknown();
        }

        let ages: Vec<Duration> = reports
            .iter()
            .map(|report| {
                let age = now - report.timestamp;
                if age < Duration::zero() {
                    warn!(
                        report_id = %report.id,
                        ahead_ms = -age.num_milliseconds(),
                        "Report timestamp is ahead of scoring time, treating it as fresh"
                    );
                    return Duration::zero();
                }
                age
            })
            .collect();

        // weights relative to the freshest report: same ratios, total >= 1
        let freshest = ages.iter().min().copied().unwrap_or_else(Duration::zero);

        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;
        for (report, age) in reports.iter().zip(ages) {
            let weight = self.weight(age - freshest);
            weight_sum += weight;
            if report.has_traffic {
                weighted_sum += weight;
            }
        }

        let score = if weight_sum > 0.0 {
            (weighted_sum / weight_sum * MAX_SCORE).clamp(0.0, MAX_SCORE)
        } else {
            0.0
        };

        TrafficStatus {
            status: self.thresholds.classify(score),
            score,
        }
    }
}
