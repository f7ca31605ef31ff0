//! Storage capabilities consumed by the traffic core
//!
//! The coordinator only sees the [`TunnelRepository`] and [`ReportStore`]
//! traits; which implementation backs them is chosen at startup.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::models::{Direction, NewTrafficReport, TrafficReport, Tunnel};
use crate::{Result, TunnelWatchError};

pub mod memory;
pub mod persistent;

pub use memory::MemoryStore;
pub use persistent::FjallStore;

/// Read access to tunnel geometry
#[async_trait]
pub trait TunnelRepository: Send + Sync {
    /// Fetch a tunnel; `Ok(None)` when it does not exist
    async fn get_tunnel(&self, id: Uuid) -> Result<Option<Tunnel>>;

    /// Insert or replace a tunnel
    async fn put_tunnel(&self, tunnel: Tunnel) -> Result<()>;
}

/// Durable storage of accepted reports
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Store an accepted report and return its new identifier
    async fn create_report(&self, report: NewTrafficReport) -> Result<Uuid>;

    /// Reports for one entrance with `timestamp > since`
    async fn get_recent_reports(
        &self,
        tunnel_id: Uuid,
        direction: Direction,
        since: DateTime<Utc>,
    ) -> Result<Vec<TrafficReport>>;
}

/// The pair of capabilities handed to the coordinator
#[derive(Clone)]
pub struct Stores {
    pub tunnels: Arc<dyn TunnelRepository>,
    pub reports: Arc<dyn ReportStore>,
}

impl Stores {
    /// Back both capabilities by the same store value
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: TunnelRepository + ReportStore + 'static,
    {
        Self {
            tunnels: store.clone(),
            reports: store,
        }
    }

    /// Build the backend named in the configuration
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        match config.backend.as_str() {
            "memory" => Ok(Self::shared(Arc::new(MemoryStore::new()))),
            "fjall" => {
                let store = FjallStore::open(config.expanded_path(), config.retention())?;
                Ok(Self::shared(Arc::new(store)))
            }
            other => Err(TunnelWatchError::config(format!(
                "Unknown store backend '{other}'"
            ))),
        }
    }
}

/// Insert `tunnel` unless a tunnel with the same id already exists
pub async fn seed_tunnel(tunnels: &dyn TunnelRepository, tunnel: Tunnel) -> Result<bool> {
    if tunnels.get_tunnel(tunnel.id).await?.is_some() {
        return Ok(false);
    }
    tracing::info!(tunnel_id = %tunnel.id, name = %tunnel.name, "Seeding tunnel");
    tunnels.put_tunnel(tunnel).await?;
    Ok(true)
}
