/// Provider clients for the three supported networks.
///
/// Each submodule owns one provider's URL construction and payload parsing:
///   nwis  — USGS NWIS site inventory (RDB) + instantaneous values (JSON)
///   coops — NOAA CO-OPS station catalog + datagetter products (JSON)
///   wqp   — EPA Water Quality Portal station/result searches (CSV)
///
/// Clients perform one logical request per call and never retry internally;
/// retry/backoff is layered on top by `retry::RetryPolicy` and request
/// pacing by `limiter::RateLimiter`.

use crate::model::{AcquireError, DateRange, ProviderId, Station};
use std::time::Duration;

pub mod coops;
pub mod nwis;
pub mod wqp;

#[cfg(test)]
pub(crate) mod fixtures;

// ---------------------------------------------------------------------------
// Provider abstraction
// ---------------------------------------------------------------------------

/// Provider-specific decoded response, consumed immediately by
/// `normalize::normalize`. A closed set — adding a provider means adding a
/// variant and its mapping table, checked at startup.
#[derive(Debug, Clone)]
pub enum RawPayload {
    Nwis(nwis::NwisPayload),
    Coops(coops::CoopsPayload),
    Wqp(wqp::WqpPayload),
}

/// One external data source: station catalog listing plus observation
/// retrieval for a single station/parameter/date-range.
pub trait ProviderClient: Send + Sync {
    fn provider(&self) -> ProviderId;

    /// Fetches the provider's station catalog scoped to the engine's
    /// bounding box, draining the complete catalog before returning.
    /// Stations may arrive without coordinates; `discovery` filters those.
    fn list_stations(&self, parameter_codes: &[String]) -> Result<Vec<Station>, AcquireError>;

    /// One logical observation request. `NotFound` means the
    /// station/parameter has no data in range — a valid empty result, not
    /// a failure.
    fn fetch_observations(
        &self,
        station: &Station,
        parameter_code: &str,
        range: &DateRange,
    ) -> Result<RawPayload, AcquireError>;
}

// ---------------------------------------------------------------------------
// Shared HTTP transport
// ---------------------------------------------------------------------------

/// Blocking HTTP transport shared by all provider clients, mapping HTTP
/// status classes onto the engine's error kinds.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, AcquireError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("waterhub_service/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AcquireError::Network(e.to_string()))?;
        Ok(Self { client })
    }

    /// GET the URL and return the response body.
    ///
    /// Status mapping: 429 → `RateLimited` (with the Retry-After header as
    /// the hint when parseable), 404 → `NotFound`, 5xx → `Server`, other
    /// non-2xx → `Schema`; transport failures (timeout, connection reset,
    /// DNS) → `Network`.
    pub fn get_text(&self, url: &str) -> Result<String, AcquireError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json, text/plain, text/csv, */*")
            .send()
            .map_err(|e| AcquireError::Network(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(AcquireError::RateLimited { retry_after });
        }
        if status.as_u16() == 404 {
            return Err(AcquireError::NotFound);
        }
        if status.is_server_error() {
            return Err(AcquireError::Server(status.as_u16()));
        }
        if !status.is_success() {
            return Err(AcquireError::Schema(format!(
                "unexpected HTTP {} from {}",
                status.as_u16(),
                url
            )));
        }

        response
            .text()
            .map_err(|e| AcquireError::Network(e.to_string()))
    }
}
