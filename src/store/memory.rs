use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ReportStore, TunnelRepository};
use crate::Result;
use crate::models::{Direction, NewTrafficReport, TrafficReport, Tunnel};

/// Volatile store for tests and `backend = "memory"`
#[derive(Debug, Default)]
pub struct MemoryStore {
    tunnels: RwLock<HashMap<Uuid, Tunnel>>,
    reports: RwLock<Vec<TrafficReport>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored reports across all tunnels
    pub async fn report_count(&self) -> usize {
        self.reports.read().await.len()
    }
}

#[async_trait]
impl TunnelRepository for MemoryStore {
    async fn get_tunnel(&self, id: Uuid) -> Result<Option<Tunnel>> {
        Ok(self.tunnels.read().await.get(&id).cloned())
    }

    async fn put_tunnel(&self, tunnel: Tunnel) -> Result<()> {
        self.tunnels.write().await.insert(tunnel.id, tunnel);
        Ok(())
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn create_report(&self, report: NewTrafficReport) -> Result<Uuid> {
        let id = Uuid::new_v4();
        self.reports.write().await.push(report.with_id(id));
        Ok(id)
    }

    async fn get_recent_reports(
        &self,
        tunnel_id: Uuid,
        direction: Direction,
        since: DateTime<Utc>,
    ) -> Result<Vec<TrafficReport>> {
        let reports = self.reports.read().await;
        let mut recent: Vec<TrafficReport> = reports
            .iter()
            .filter(|r| r.tunnel_id == tunnel_id && r.direction == direction && r.timestamp > since)
            .cloned()
            .collect();
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(recent)
    }
}
