/// Run configuration loader - parses run.toml
///
/// Keeps boundary vertices, date range, provider parameter selections,
/// and rate/retry limits out of code, so a run can be rescoped without
/// recompiling the service.

use crate::ingest::nwis::NwisService;
use crate::model::{DateRange, UnitSystem};
use crate::retry::RetryPolicy;
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// TOML structure
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    pub run: RunSection,
    pub boundary: BoundarySection,
    #[serde(default)]
    pub limits: LimitsSection,
    #[serde(default)]
    pub nwis: NwisSection,
    #[serde(default)]
    pub coops: CoopsSection,
    #[serde(default)]
    pub wqp: WqpSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunSection {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default = "default_units")]
    pub units: UnitSystem,
}

fn default_units() -> UnitSystem {
    UnitSystem::English
}

/// Boundary polygon vertices as [lat, lon] pairs, in ring order. The
/// closing vertex may be repeated or omitted.
#[derive(Debug, Clone, Deserialize)]
pub struct BoundarySection {
    pub vertices: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsSection {
    pub workers_per_provider: usize,
    pub request_timeout_secs: u64,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_secs: u64,
    pub retry_max_total_wait_secs: u64,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            workers_per_provider: 4,
            request_timeout_secs: 30,
            retry_max_attempts: 3,
            retry_base_delay_ms: 500,
            retry_max_delay_secs: 10,
            retry_max_total_wait_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NwisSection {
    pub enabled: bool,
    /// USGS parameter codes, e.g. "00060" discharge, "00065" stage.
    pub parameters: Vec<String>,
    /// Observation service: "iv" instantaneous or "dv" daily values.
    pub service: NwisService,
    pub rate_per_sec: f64,
    pub burst: u32,
}

impl Default for NwisSection {
    fn default() -> Self {
        Self {
            enabled: true,
            parameters: vec!["00060".to_string(), "00065".to_string()],
            service: NwisService::Iv,
            rate_per_sec: 2.0,
            burst: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoopsSection {
    pub enabled: bool,
    /// Data API products, e.g. "water_level", "water_temperature".
    pub products: Vec<String>,
    pub datum: String,
    pub interval: String,
    pub rate_per_sec: f64,
    pub burst: u32,
}

impl Default for CoopsSection {
    fn default() -> Self {
        Self {
            enabled: true,
            products: vec!["water_level".to_string()],
            datum: "MLLW".to_string(),
            interval: "h".to_string(),
            rate_per_sec: 1.0,
            burst: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WqpSection {
    pub enabled: bool,
    /// WQP characteristic names, e.g. "Temperature, water".
    pub characteristics: Vec<String>,
    pub site_types: Vec<String>,
    pub sample_media: Vec<String>,
    /// Source systems within the portal ("NWIS", "STORET").
    pub providers: Vec<String>,
    pub rate_per_sec: f64,
    pub burst: u32,
}

impl Default for WqpSection {
    fn default() -> Self {
        Self {
            enabled: true,
            characteristics: vec!["Temperature, water".to_string()],
            site_types: vec!["Stream".to_string()],
            sample_media: vec!["Water".to_string()],
            providers: vec!["NWIS".to_string(), "STORET".to_string()],
            rate_per_sec: 0.5,
            burst: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading and validation
// ---------------------------------------------------------------------------

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: RunConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: "<inline>".to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.run.start_date > self.run.end_date {
            return Err(ConfigError::Invalid(format!(
                "start_date {} is after end_date {}",
                self.run.start_date, self.run.end_date
            )));
        }
        if self.boundary.vertices.len() < 3 {
            return Err(ConfigError::Invalid(
                "boundary needs at least 3 vertices".to_string(),
            ));
        }
        if self.limits.workers_per_provider == 0 {
            return Err(ConfigError::Invalid(
                "workers_per_provider must be at least 1".to_string(),
            ));
        }
        if self.limits.retry_max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry_max_attempts must be at least 1".to_string(),
            ));
        }
        for (name, rate, burst, enabled) in [
            ("nwis", self.nwis.rate_per_sec, self.nwis.burst, self.nwis.enabled),
            ("coops", self.coops.rate_per_sec, self.coops.burst, self.coops.enabled),
            ("wqp", self.wqp.rate_per_sec, self.wqp.burst, self.wqp.enabled),
        ] {
            if enabled && (!(rate > 0.0) || burst == 0) {
                return Err(ConfigError::Invalid(format!(
                    "{}: rate_per_sec must be positive and burst at least 1",
                    name
                )));
            }
        }
        if !self.nwis.enabled && !self.coops.enabled && !self.wqp.enabled {
            return Err(ConfigError::Invalid(
                "at least one provider must be enabled".to_string(),
            ));
        }
        Ok(())
    }

    pub fn date_range(&self) -> DateRange {
        DateRange::new(self.run.start_date, self.run.end_date)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.limits.request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.limits.retry_max_attempts,
            base_delay: Duration::from_millis(self.limits.retry_base_delay_ms),
            max_delay: Duration::from_secs(self.limits.retry_max_delay_secs),
            max_total_wait: Duration::from_secs(self.limits.retry_max_total_wait_secs),
        }
    }

    /// Boundary vertices as (lat, lon) tuples for `BoundaryPolygon::new`.
    pub fn boundary_vertices(&self) -> Vec<(f64, f64)> {
        self.boundary.vertices.iter().map(|v| (v[0], v[1])).collect()
    }
}
