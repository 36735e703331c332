/// Core data types for the water data acquisition engine.
///
/// This module defines the shared domain model imported by all other
/// modules. It contains no network I/O and no provider-specific parsing —
/// only types and the error enum.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Parameter codes
// ---------------------------------------------------------------------------

/// USGS parameter code for discharge (streamflow), in cubic feet per second.
pub const PARAM_DISCHARGE: &str = "00060";

/// USGS parameter code for gage height (stage), in feet.
pub const PARAM_STAGE: &str = "00065";

/// USGS parameter code for water temperature, in degrees Celsius.
pub const PARAM_WATER_TEMP: &str = "00010";

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// The closed set of supported data providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ProviderId {
    /// USGS National Water Information System (stream gauges).
    Nwis,
    /// NOAA CO-OPS Tides and Currents (tide and meteorological stations).
    Coops,
    /// EPA Water Quality Portal (STORET/NWIS water quality results).
    Wqp,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [ProviderId::Nwis, ProviderId::Coops, ProviderId::Wqp];
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderId::Nwis => write!(f, "NWIS"),
            ProviderId::Coops => write!(f, "CO-OPS"),
            ProviderId::Wqp => write!(f, "WQP"),
        }
    }
}

// ---------------------------------------------------------------------------
// Stations and date ranges
// ---------------------------------------------------------------------------

/// A fixed monitoring location owned by one provider.
///
/// Coordinates are optional because provider catalogs occasionally carry
/// rows without usable locations; `discovery` excludes (and counts) those
/// before anything downstream sees them, so every station that survives
/// discovery has finite coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub provider: ProviderId,
    /// Provider-native identifier (USGS site number, CO-OPS station id,
    /// WQP MonitoringLocationIdentifier).
    pub id: String,
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Parameter codes this station is expected to report.
    pub parameter_codes: Vec<String>,
}

impl Station {
    /// True if both coordinates are present and finite.
    pub fn has_coordinates(&self) -> bool {
        matches!((self.latitude, self.longitude), (Some(lat), Some(lon))
            if lat.is_finite() && lon.is_finite())
    }
}

/// Inclusive UTC date range for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

// ---------------------------------------------------------------------------
// Observations
// ---------------------------------------------------------------------------

/// Output unit system for the run. Temperatures are always reported in
/// degrees Celsius regardless of the choice; see `normalize::UNIT_RULES`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    /// cfs, feet.
    English,
    /// cms, meters.
    Metric,
}

/// Quality flag attached to each normalized observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QualityFlag {
    /// Reviewed/approved value.
    Ok,
    /// Value estimated by the provider.
    Estimated,
    /// Provisional value subject to revision.
    Provisional,
    /// Provider reported a timestamp but no usable value.
    Missing,
}

/// One normalized measurement in the common schema all providers converge to.
///
/// Timestamps are UTC; units are canonical for the run's output unit system
/// (see `normalize`). A `Missing` record carries `value: None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationRecord {
    pub station_id: String,
    pub parameter_code: String,
    pub timestamp: DateTime<Utc>,
    pub value: Option<f64>,
    pub unit: &'static str,
    pub quality: QualityFlag,
}

// ---------------------------------------------------------------------------
// Fetch tasks and results
// ---------------------------------------------------------------------------

/// One unit of retrievable work: one station, one parameter, one date range.
#[derive(Debug, Clone)]
pub struct FetchTask {
    pub station: Arc<Station>,
    pub parameter_code: String,
    pub range: DateRange,
}

/// Terminal outcome of a fetch task.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// Records in timestamp order. `NotFound` from a provider resolves here
    /// with an empty sequence — no data in range is not a failure.
    Success(Vec<ObservationRecord>),
    Failed(AcquireError),
    /// Task never started because the run was cancelled first.
    Skipped,
}

/// A resolved fetch task, produced exactly once per task.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub task: FetchTask,
    pub outcome: FetchOutcome,
    /// Network attempts spent (0 for skipped tasks).
    pub attempts: u32,
}

/// Emitted once per resolved task so a consumer can render live status.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub provider: ProviderId,
    pub station_id: String,
    pub parameter_code: String,
    pub kind: ProgressKind,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum ProgressKind {
    Succeeded { records: usize },
    Failed { reason: String },
    Skipped,
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Run-scoped cooperative cancellation signal.
///
/// Cloned into every worker; checked before a task is issued and between
/// retry attempts, never mid-request. Once set it stays set.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<std::sync::atomic::AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(std::sync::atomic::Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Run summary
// ---------------------------------------------------------------------------

/// Per-provider task counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// One failed task with its terminal reason, for the consumer-visible list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskFailure {
    pub provider: ProviderId,
    pub station_id: String,
    pub parameter_code: String,
    pub reason: String,
}

/// Run-level accounting, built incrementally as results arrive.
///
/// Invariant: `attempted = succeeded + failed`; skipped tasks were never
/// attempted. A cancelled or partially failed run still produces a complete,
/// consumable summary with `partial = true`.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub per_provider: std::collections::BTreeMap<ProviderId, TaskCounts>,
    pub total_records: usize,
    pub elapsed: Duration,
    pub partial: bool,
    pub failures: Vec<TaskFailure>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can arise while acquiring or normalizing provider data.
///
/// `Network`, `RateLimited`, and `Server` are transient and retried by
/// `retry::RetryPolicy`; the rest are terminal for the affected task
/// (`InvalidGeometry` is terminal for the whole run and can only occur at
/// construction time).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AcquireError {
    /// The boundary polygon is unusable (fewer than 3 distinct vertices).
    #[error("invalid boundary geometry: {0}")]
    InvalidGeometry(String),

    /// Timeout, connection failure, or other transport-level error.
    #[error("network error: {0}")]
    Network(String),

    /// HTTP 429 or a provider-specific throttling signal.
    #[error("rate limited by provider")]
    RateLimited { retry_after: Option<Duration> },

    /// Station/parameter has no data in range. Not a run failure — resolves
    /// to a successful empty series.
    #[error("no data available")]
    NotFound,

    /// The payload does not parse as expected, or mandatory fields are absent.
    #[error("schema error: {0}")]
    Schema(String),

    /// HTTP 5xx from the provider.
    #[error("server error: HTTP {0}")]
    Server(u16),

    /// The run-level cancellation signal fired.
    #[error("run cancelled")]
    Cancelled,
}

impl AcquireError {
    /// True for error kinds worth retrying; `NotFound` and `Schema` would
    /// return the same answer again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AcquireError::Network(_) | AcquireError::RateLimited { .. } | AcquireError::Server(_)
        )
    }
}
