use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use fjall::Keyspace;
use tokio::sync::Mutex;
use tokio::task;
use uuid::Uuid;

use super::{ReportStore, TunnelRepository};
use crate::Result;
use crate::models::{Direction, NewTrafficReport, TrafficReport, Tunnel};

/// fjall-backed store.
///
/// Tunnels are keyed by their UUID bytes. Reports are kept as one postcard
/// encoded list per entrance (`"{tunnel_id}:{direction}"`), pruned to the
/// retention period whenever a report is appended.
pub struct FjallStore {
    tunnels: Keyspace,
    reports: Keyspace,
    retention: Duration,
    // serializes the read-modify-write in `create_report`
    append_lock: Mutex<()>,
}

fn get_from_store(store: Keyspace, key: Vec<u8>) -> anyhow::Result<Option<Vec<u8>>> {
    Ok(store.get(key)?.map(|v| v.to_vec()))
}

fn report_key(tunnel_id: Uuid, direction: Direction) -> Vec<u8> {
    format!("{tunnel_id}:{direction}").into_bytes()
}

async fn read(store: &Keyspace, key: Vec<u8>) -> anyhow::Result<Option<Vec<u8>>> {
    let store = store.clone();
    task::spawn_blocking(move || get_from_store(store, key)).await?
}

async fn write(store: &Keyspace, key: Vec<u8>, value: Vec<u8>) -> anyhow::Result<()> {
    let store = store.clone();
    task::spawn_blocking(move || store.insert(key, value)).await??;
    Ok(())
}

impl FjallStore {
    /// Open (or create) the database at `path`
    pub fn open(path: impl AsRef<Path>, retention: Duration) -> Result<Self> {
        let path = path.as_ref();
        let db = fjall::Database::builder(path)
            .open()
            .with_context(|| format!("Failed to open store at {}", path.display()))?;
        let tunnels = db
            .keyspace("tunnels", fjall::KeyspaceCreateOptions::default)
            .context("Failed to open tunnels keyspace")?;
        let reports = db
            .keyspace("reports", fjall::KeyspaceCreateOptions::default)
            .context("Failed to open reports keyspace")?;

        tracing::info!("Opened report store at {}", path.display());

        Ok(Self {
            tunnels,
            reports,
            retention,
            append_lock: Mutex::new(()),
        })
    }

    async fn load_reports(&self, key: Vec<u8>) -> anyhow::Result<Vec<TrafficReport>> {
        match read(&self.reports, key).await? {
            Some(bytes) => Ok(postcard::from_bytes(&bytes)?),
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl TunnelRepository for FjallStore {
    #[tracing::instrument(name = "get_tunnel", level = "debug", skip(self))]
    async fn get_tunnel(&self, id: Uuid) -> Result<Option<Tunnel>> {
        let Some(bytes) = read(&self.tunnels, id.as_bytes().to_vec()).await? else {
            tracing::debug!("Tunnel not found");
            return Ok(None);
        };
        let tunnel: Tunnel = postcard::from_bytes(&bytes)
            .with_context(|| format!("Corrupt tunnel record {id}"))?;
        Ok(Some(tunnel))
    }

    #[tracing::instrument(name = "put_tunnel", level = "debug", skip(self, tunnel), fields(tunnel_id = %tunnel.id))]
    async fn put_tunnel(&self, tunnel: Tunnel) -> Result<()> {
        let bytes = postcard::to_stdvec(&tunnel).context("Failed to encode tunnel")?;
        write(&self.tunnels, tunnel.id.as_bytes().to_vec(), bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl ReportStore for FjallStore {
    #[tracing::instrument(
        name = "create_report",
        level = "debug",
        skip(self, report),
        fields(tunnel_id = %report.tunnel_id, direction = %report.direction)
    )]
    async fn create_report(&self, report: NewTrafficReport) -> Result<Uuid> {
        let key = report_key(report.tunnel_id, report.direction);
        let id = Uuid::new_v4();
        let cutoff = report.timestamp - self.retention;

        let _guard = self.append_lock.lock().await;
        let mut reports = self.load_reports(key.clone()).await?;
        let before = reports.len();
        reports.retain(|r| r.timestamp > cutoff);
        if reports.len() < before {
            tracing::debug!("Pruned {} expired reports", before - reports.len());
        }
        reports.push(report.with_id(id));

        let bytes = postcard::to_stdvec(&reports).context("Failed to encode reports")?;
        write(&self.reports, key, bytes).await?;
        Ok(id)
    }

    #[tracing::instrument(name = "get_recent_reports", level = "debug", skip(self))]
    async fn get_recent_reports(
        &self,
        tunnel_id: Uuid,
        direction: Direction,
        since: DateTime<Utc>,
    ) -> Result<Vec<TrafficReport>> {
        let mut reports = self.load_reports(report_key(tunnel_id, direction)).await?;
        reports.retain(|r| r.timestamp > since);
        reports.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        tracing::debug!("Found {} recent reports", reports.len());
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Point;
    use tempfile::TempDir;

    fn entrance() -> Point {
        Point::new(64.1375, -21.8952).unwrap()
    }

    fn new_report(timestamp: DateTime<Utc>, has_traffic: bool) -> NewTrafficReport {
        NewTrafficReport {
            tunnel_id: Uuid::nil(),
            direction: Direction::North,
            user_id: "user-1".to_string(),
            timestamp,
            geolocation_verified: true,
            has_traffic,
            coordinates: entrance(),
        }
    }

    #[tokio::test]
    async fn test_tunnel_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FjallStore::open(dir.path(), Duration::hours(24)).unwrap();
        let tunnel = Tunnel::new(Uuid::nil(), "Sample Tunnel", entrance(), entrance(), Utc::now())
            .unwrap();

        assert!(store.get_tunnel(tunnel.id).await.unwrap().is_none());
        store.put_tunnel(tunnel.clone()).await.unwrap();
        assert_eq!(store.get_tunnel(tunnel.id).await.unwrap(), Some(tunnel));
    }

    #[tokio::test]
    async fn test_reports_are_windowed_and_pruned() {
        let dir = TempDir::new().unwrap();
        let store = FjallStore::open(dir.path(), Duration::hours(24)).unwrap();
        let now = Utc::now();

        store.create_report(new_report(now - Duration::hours(30), true)).await.unwrap();
        store.create_report(new_report(now - Duration::hours(3), true)).await.unwrap();
        let id = store.create_report(new_report(now - Duration::minutes(5), false)).await.unwrap();

        let all = store
            .get_recent_reports(Uuid::nil(), Direction::North, now - Duration::hours(48))
            .await
            .unwrap();
        assert_eq!(all.len(), 2, "report older than retention should be pruned");

        let recent = store
            .get_recent_reports(Uuid::nil(), Direction::North, now - Duration::hours(2))
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, id);
        assert!(!recent[0].has_traffic);
        assert_eq!(recent[0].coordinates, Some(entrance()));

        let south = store
            .get_recent_reports(Uuid::nil(), Direction::South, now - Duration::hours(2))
            .await
            .unwrap();
        assert!(south.is_empty());
    }
}
