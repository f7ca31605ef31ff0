//! Best-effort per-submitter cooldown between reports

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::models::Direction;

/// Default wait between two reports from one submitter for one entrance
pub const DEFAULT_COOLDOWN_MINUTES: i64 = 15;

/// Throttle consulted by the coordinator before persisting a report.
///
/// `try_acquire` checks and claims the slot in one step, so concurrent
/// submissions for the same key cannot both pass.
#[async_trait]
pub trait SubmissionCooldown: Send + Sync {
    /// Claim the slot for `now`; false while a previous claim is still cooling down
    async fn try_acquire(
        &self,
        user_id: &str,
        tunnel_id: Uuid,
        direction: Direction,
        now: DateTime<Utc>,
    ) -> bool;

    /// Drop the claim made at `acquired_at`, e.g. when the report was not stored
    async fn release(
        &self,
        user_id: &str,
        tunnel_id: Uuid,
        direction: Direction,
        acquired_at: DateTime<Utc>,
    );
}

type CooldownKey = (String, Uuid, Direction);

/// Process-local cooldown; forgets everything on restart
#[derive(Debug)]
pub struct InMemoryCooldown {
    cooldown: Duration,
    last_reports: Mutex<HashMap<CooldownKey, DateTime<Utc>>>,
}

impl Default for InMemoryCooldown {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_COOLDOWN_MINUTES))
    }
}

impl InMemoryCooldown {
    #[must_use]
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_reports: Mutex::new(HashMap::new()),
        }
    }

    fn key(user_id: &str, tunnel_id: Uuid, direction: Direction) -> CooldownKey {
        (user_id.to_string(), tunnel_id, direction)
    }
}

#[async_trait]
impl SubmissionCooldown for InMemoryCooldown {
    async fn try_acquire(
        &self,
        user_id: &str,
        tunnel_id: Uuid,
        direction: Direction,
        now: DateTime<Utc>,
    ) -> bool {
        let Ok(mut last_reports) = self.last_reports.lock() else {
            return true;
        };
        let key = Self::key(user_id, tunnel_id, direction);
        if last_reports
            .get(&key)
            .is_some_and(|last| now - *last < self.cooldown)
        {
            return false;
        }
        last_reports.retain(|_, last| now - *last < self.cooldown);
        last_reports.insert(key, now);
        true
    }

    async fn release(
        &self,
        user_id: &str,
        tunnel_id: Uuid,
        direction: Direction,
        acquired_at: DateTime<Utc>,
    ) {
        if let Ok(mut last_reports) = self.last_reports.lock() {
            let key = Self::key(user_id, tunnel_id, direction);
            if last_reports.get(&key) == Some(&acquired_at) {
                last_reports.remove(&key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_cooldown_window() {
        let cooldown = InMemoryCooldown::default();
        let tunnel = Uuid::nil();
        let start = Utc::now();

        assert!(cooldown.try_acquire("u1", tunnel, Direction::North, start).await);
        assert!(
            !cooldown
                .try_acquire("u1", tunnel, Direction::North, start + Duration::minutes(14))
                .await
        );
        assert!(
            cooldown
                .try_acquire("u1", tunnel, Direction::North, start + Duration::minutes(15))
                .await
        );
    }

    #[tokio::test]
    async fn test_cooldown_is_per_entrance_and_user() {
        let cooldown = InMemoryCooldown::default();
        let tunnel = Uuid::nil();
        let now = Utc::now();

        assert!(cooldown.try_acquire("u1", tunnel, Direction::North, now).await);
        assert!(cooldown.try_acquire("u1", tunnel, Direction::South, now).await);
        assert!(cooldown.try_acquire("u2", tunnel, Direction::North, now).await);
    }

    #[tokio::test]
    async fn test_release_frees_the_slot() {
        let cooldown = InMemoryCooldown::default();
        let tunnel = Uuid::nil();
        let now = Utc::now();

        assert!(cooldown.try_acquire("u1", tunnel, Direction::North, now).await);
        cooldown.release("u1", tunnel, Direction::North, now).await;
        assert!(cooldown.try_acquire("u1", tunnel, Direction::North, now).await);

        // a stale release does not drop a newer claim
        cooldown
            .release("u1", tunnel, Direction::North, now - Duration::minutes(1))
            .await;
        assert!(!cooldown.try_acquire("u1", tunnel, Direction::North, now).await);
    }

    #[tokio::test]
    async fn test_concurrent_claims_admit_one() {
        let cooldown = Arc::new(InMemoryCooldown::default());
        let now = Utc::now();

        let claims = (0..16).map(|_| {
            let cooldown = cooldown.clone();
            tokio::spawn(async move {
                cooldown
                    .try_acquire("u1", Uuid::nil(), Direction::North, now)
                    .await
            })
        });
        let granted = futures::future::join_all(claims)
            .await
            .into_iter()
            .filter(|claim| matches!(claim, Ok(true)))
            .count();
        assert_eq!(granted, 1);
    }
}
