//! Configuration management for the `TunnelWatch` service
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::TunnelWatchError;
use crate::models::{Point, Tunnel};
use crate::traffic::{GeofenceVerifier, StatusThresholds, TrafficScorer};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Root configuration structure for the `TunnelWatch` service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TunnelWatchConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Report storage settings
    #[serde(default)]
    pub store: StoreConfig,
    /// Geofence settings
    #[serde(default)]
    pub geofence: GeofenceConfig,
    /// Traffic scoring settings
    #[serde(default)]
    pub scoring: ScoringConfig,
    /// Submission cooldown settings
    #[serde(default)]
    pub cooldown: CooldownConfig,
    /// The tunnel seeded at startup
    #[serde(default)]
    pub tunnel: TunnelConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u32,
    /// Maximum accepted request body size
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Directory of static frontend files served as fallback
    pub static_dir: Option<String>,
    /// PEM certificate chain, enables TLS together with `tls_key_path`
    pub tls_cert_path: Option<String>,
    /// PEM private key
    pub tls_key_path: Option<String>,
}

/// Report storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Storage backend (fjall or memory)
    #[serde(default = "default_store_backend")]
    pub backend: String,
    /// Database directory for the fjall backend
    #[serde(default = "default_store_path")]
    pub path: String,
    /// How long reports are kept, in hours
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u32,
}

/// Geofence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeofenceConfig {
    /// Admissible distance from an entrance in meters
    #[serde(default = "default_radius_meters")]
    pub radius_meters: f64,
}

/// Traffic scoring settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Lookback window in hours
    #[serde(default = "default_window_hours")]
    pub window_hours: u32,
    /// Report weight half-life in minutes
    #[serde(default = "default_half_life_minutes")]
    pub half_life_minutes: u32,
    /// Scores at or above this are reported as traffic
    #[serde(default = "default_traffic_threshold")]
    pub traffic_threshold: f64,
    /// Scores below this are reported as clear
    #[serde(default = "default_clear_threshold")]
    pub clear_threshold: f64,
}

/// Submission cooldown settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CooldownConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_cooldown_minutes")]
    pub minutes: u32,
}

/// The tunnel seeded into the store at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunnelConfig {
    #[serde(default = "default_tunnel_id")]
    pub id: Uuid,
    #[serde(default = "default_tunnel_name")]
    pub name: String,
    #[serde(default = "default_north_lat")]
    pub north_lat: f64,
    #[serde(default = "default_north_lng")]
    pub north_lng: f64,
    #[serde(default = "default_south_lat")]
    pub south_lat: f64,
    #[serde(default = "default_south_lng")]
    pub south_lng: f64,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// OTLP/HTTP collector endpoint for trace export
    pub otlp_endpoint: Option<String>,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_request_timeout() -> u32 {
    10
}

fn default_max_body_bytes() -> usize {
    16 * 1024
}

fn default_store_backend() -> String {
    "fjall".to_string()
}

fn default_store_path() -> String {
    "~/.local/share/tunnelwatch".to_string()
}

fn default_retention_hours() -> u32 {
    24
}

fn default_radius_meters() -> f64 {
    200.0
}

fn default_window_hours() -> u32 {
    2
}

fn default_half_life_minutes() -> u32 {
    30
}

fn default_traffic_threshold() -> f64 {
    3.0
}

fn default_clear_threshold() -> f64 {
    1.5
}

fn default_cooldown_minutes() -> u32 {
    15
}

fn default_tunnel_id() -> Uuid {
    Uuid::from_u128(1)
}

fn default_tunnel_name() -> String {
    "Sample Tunnel".to_string()
}

fn default_north_lat() -> f64 {
    64.1375
}

fn default_north_lng() -> f64 {
    -21.8952
}

fn default_south_lat() -> f64 {
    64.3620
}

fn default_south_lng() -> f64 {
    -21.7800
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
            static_dir: None,
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: default_store_path(),
            retention_hours: default_retention_hours(),
        }
    }
}

impl Default for GeofenceConfig {
    fn default() -> Self {
        Self {
            radius_meters: default_radius_meters(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            window_hours: default_window_hours(),
            half_life_minutes: default_half_life_minutes(),
            traffic_threshold: default_traffic_threshold(),
            clear_threshold: default_clear_threshold(),
        }
    }
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            minutes: default_cooldown_minutes(),
        }
    }
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            id: default_tunnel_id(),
            name: default_tunnel_name(),
            north_lat: default_north_lat(),
            north_lng: default_north_lng(),
            south_lat: default_south_lat(),
            south_lng: default_south_lng(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            otlp_endpoint: None,
        }
    }
}

impl ServerConfig {
    /// Address the listener binds to
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl StoreConfig {
    /// Store path with a leading `~/` expanded to the home directory
    #[must_use]
    pub fn expanded_path(&self) -> PathBuf {
        match (self.path.strip_prefix("~/"), dirs::home_dir()) {
            (Some(rest), Some(home)) => home.join(rest),
            _ => PathBuf::from(&self.path),
        }
    }

    #[must_use]
    pub fn retention(&self) -> Duration {
        Duration::hours(i64::from(self.retention_hours))
    }
}

impl GeofenceConfig {
    pub fn verifier(&self) -> crate::Result<GeofenceVerifier> {
        GeofenceVerifier::new(self.radius_meters)
    }
}

impl ScoringConfig {
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::hours(i64::from(self.window_hours))
    }

    pub fn scorer(&self) -> crate::Result<TrafficScorer> {
        TrafficScorer::new(
            Duration::minutes(i64::from(self.half_life_minutes)),
            StatusThresholds {
                clear_below: self.clear_threshold,
                traffic_at: self.traffic_threshold,
            },
        )
    }
}

impl CooldownConfig {
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.minutes))
    }
}

impl TunnelConfig {
    /// Build the configured tunnel, validating both entrance coordinates
    pub fn to_tunnel(&self, created_at: DateTime<Utc>) -> crate::Result<Tunnel> {
        Tunnel::new(
            self.id,
            self.name.clone(),
            Point::new(self.north_lat, self.north_lng)?,
            Point::new(self.south_lat, self.south_lng)?,
            created_at,
        )
    }
}

impl TunnelWatchConfig {
    /// Load configuration from `config_path` (or the default location) and the environment
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path()
                .filter(|path| path.exists())
                .unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Environment overrides, e.g. TUNNELWATCH_SERVER__PORT=8080
        builder = builder.add_source(
            Environment::with_prefix("TUNNELWATCH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: TunnelWatchConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        // Apply defaults for missing values
        config.apply_defaults();

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tunnelwatch").join("config.toml"))
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.server.host.is_empty() {
            self.server.host = default_host();
        }
        if self.server.request_timeout_seconds == 0 {
            self.server.request_timeout_seconds = default_request_timeout();
        }
        if self.server.max_body_bytes == 0 {
            self.server.max_body_bytes = default_max_body_bytes();
        }
        if self.store.backend.is_empty() {
            self.store.backend = default_store_backend();
        }
        if self.store.path.is_empty() {
            self.store.path = default_store_path();
        }
        if self.store.retention_hours == 0 {
            self.store.retention_hours = default_retention_hours();
        }
        if self.scoring.window_hours == 0 {
            self.scoring.window_hours = default_window_hours();
        }
        if self.scoring.half_life_minutes == 0 {
            self.scoring.half_life_minutes = default_half_life_minutes();
        }
        if self.cooldown.minutes == 0 {
            self.cooldown.minutes = default_cooldown_minutes();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        self.validate_tunnel()?;
        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(TunnelWatchError::config("Server port cannot be 0").into());
        }

        if self.server.request_timeout_seconds > 300 {
            return Err(
                TunnelWatchError::config("Request timeout cannot exceed 300 seconds").into(),
            );
        }

        if !(1.0..=5_000.0).contains(&self.geofence.radius_meters) {
            return Err(TunnelWatchError::config(
                "Geofence radius must be between 1 and 5000 meters",
            )
            .into());
        }

        if self.scoring.window_hours > 24 {
            return Err(TunnelWatchError::config("Scoring window cannot exceed 24 hours").into());
        }

        if self.scoring.half_life_minutes > 720 {
            return Err(
                TunnelWatchError::config("Half-life cannot exceed 720 minutes (12 hours)").into(),
            );
        }

        let scoring = &self.scoring;
        if !(0.0 <= scoring.clear_threshold
            && scoring.clear_threshold < scoring.traffic_threshold
            && scoring.traffic_threshold <= 10.0)
        {
            return Err(TunnelWatchError::config(
                "Thresholds must satisfy 0 <= clear_threshold < traffic_threshold <= 10",
            )
            .into());
        }

        if self.store.retention_hours < self.scoring.window_hours {
            return Err(TunnelWatchError::config(
                "Store retention cannot be shorter than the scoring window",
            )
            .into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(TunnelWatchError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(TunnelWatchError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        let valid_backends = ["fjall", "memory"];
        if !valid_backends.contains(&self.store.backend.as_str()) {
            return Err(TunnelWatchError::config(format!(
                "Invalid store backend '{}'. Must be one of: {}",
                self.store.backend,
                valid_backends.join(", ")
            ))
            .into());
        }

        if let Some(endpoint) = &self.logging.otlp_endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(TunnelWatchError::config(
                    "OTLP endpoint must be a valid HTTP or HTTPS URL",
                )
                .into());
            }
        }

        if self.server.tls_cert_path.is_some() != self.server.tls_key_path.is_some() {
            return Err(TunnelWatchError::config(
                "TLS needs both tls_cert_path and tls_key_path",
            )
            .into());
        }

        Ok(())
    }

    /// Validate the seeded tunnel definition
    fn validate_tunnel(&self) -> Result<()> {
        self.tunnel
            .to_tunnel(Utc::now())
            .map_err(|e| TunnelWatchError::config(format!("Invalid tunnel definition: {e}")))?;
        Ok(())
    }
}
