/// NOAA CO-OPS (Tides and Currents) client.
///
/// Station catalog from the metadata API:
///   https://api.tidesandcurrents.noaa.gov/mdapi/prod/webapi/stations.json
/// Observations from the data API ("datagetter"):
///   https://api.tidesandcurrents.noaa.gov/api/prod/datagetter
///
/// The data API is always queried with `time_zone=gmt&units=metric`, so
/// timestamps are UTC and source units are fixed by construction; output
/// unit conversion happens in the normalizer. The API caps the length of
/// one request's date range per interval, so long ranges are windowed and
/// concatenated — still one logical request from the caller's perspective.

use crate::ingest::{HttpTransport, ProviderClient, RawPayload};
use crate::model::{AcquireError, DateRange, ProviderId, Station};
use chrono::Days;
use serde::Deserialize;
use std::sync::Arc;

const MDAPI_BASE_URL: &str = "https://api.tidesandcurrents.noaa.gov/mdapi/prod/webapi/stations.json";
const DATAGETTER_BASE_URL: &str = "https://api.tidesandcurrents.noaa.gov/api/prod/datagetter";

/// Data products the engine supports, as accepted by the data API.
pub const PRODUCTS: [&str; 10] = [
    "water_level",
    "predictions",
    "water_temperature",
    "air_temperature",
    "wind",
    "air_pressure",
    "humidity",
    "visibility",
    "conductivity",
    "salinity",
];

/// Vertical datums accepted for water-level products.
pub const DATUMS: [&str; 11] = [
    "CRD", "IGLD", "LWD", "MHHW", "MHW", "MTL", "MSL", "MLW", "MLLW", "NAVD", "STND",
];

/// Maps a data product to the metadata API station-type filter.
fn station_type_for(product: &str) -> Option<&'static str> {
    match product {
        "water_level" => Some("waterlevels"),
        "predictions" => Some("tidepredictions"),
        "water_temperature" => Some("watertemp"),
        "air_temperature" => Some("airtemp"),
        "wind" => Some("wind"),
        "air_pressure" => Some("airpress"),
        "humidity" => Some("humidity"),
        "visibility" => Some("visibility"),
        "conductivity" => Some("conductivity"),
        "salinity" => Some("salinity"),
        _ => None,
    }
}

/// Longest date range one datagetter request accepts for an interval.
fn window_days(interval: &str) -> u64 {
    match interval {
        "6" | "6min" => 31,
        "daily" | "monthly" => 3650,
        // "h", "hourly", "hilo"
        _ => 365,
    }
}

// ---------------------------------------------------------------------------
// Serde structures
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct MdapiResponse {
    stations: Vec<MdapiStation>,
}

#[derive(Deserialize)]
struct MdapiStation {
    id: String,
    name: String,
    lat: Option<f64>,
    lng: Option<f64>,
}

#[derive(Deserialize)]
struct DatagetterResponse {
    error: Option<DatagetterError>,
    data: Option<Vec<DatagetterPoint>>,
    /// The predictions product returns its points under this key instead
    /// of `data`.
    predictions: Option<Vec<DatagetterPoint>>,
}

#[derive(Deserialize)]
struct DatagetterError {
    message: String,
}

#[derive(Deserialize)]
struct DatagetterPoint {
    /// "YYYY-MM-DD HH:MM" in the requested time zone (always GMT here).
    t: String,
    /// Measurement as a string; empty when the sensor reported nothing.
    #[serde(default)]
    v: String,
    /// Quality: "p" preliminary, "v" verified. Absent for met products.
    #[serde(default)]
    q: Option<String>,
}

// ---------------------------------------------------------------------------
// Decoded payload handed to the normalizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CoopsPayload {
    pub station_id: String,
    pub product: String,
    pub points: Vec<CoopsPoint>,
}

#[derive(Debug, Clone)]
pub struct CoopsPoint {
    pub timestamp: String,
    pub value: String,
    pub quality: Option<String>,
}

// ---------------------------------------------------------------------------
// URL construction
// ---------------------------------------------------------------------------

pub fn build_catalog_url(station_type: &str) -> String {
    format!("{}?type={}", MDAPI_BASE_URL, station_type)
}

/// Builds one datagetter window request. Dates are YYYYMMDD; the range is
/// inclusive on both ends.
pub fn build_datagetter_url(
    station_id: &str,
    product: &str,
    datum: &str,
    interval: &str,
    window: &DateRange,
) -> String {
    format!(
        "{}?begin_date={}&end_date={}&station={}&product={}&datum={}\
         &time_zone=gmt&units=metric&interval={}&application=waterhub_service&format=json",
        DATAGETTER_BASE_URL,
        window.start.format("%Y%m%d"),
        window.end.format("%Y%m%d"),
        urlencoding::encode(station_id),
        product,
        datum,
        interval
    )
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

pub fn parse_catalog_response(json: &str, product: &str) -> Result<Vec<Station>, AcquireError> {
    let response: MdapiResponse = serde_json::from_str(json)
        .map_err(|e| AcquireError::Schema(format!("station catalog JSON failed: {}", e)))?;

    Ok(response
        .stations
        .into_iter()
        .map(|s| Station {
            provider: ProviderId::Coops,
            id: s.id,
            name: s.name,
            latitude: s.lat,
            longitude: s.lng,
            parameter_codes: vec![product.to_string()],
        })
        .collect())
}

/// Parses one datagetter window body into points.
///
/// The API signals "no data in range" with a 200 response carrying an
/// error envelope whose message starts with "No data was found" — a valid
/// empty result, not a failure. Any other error envelope is a schema error.
pub fn parse_datagetter_response(json: &str) -> Result<Vec<CoopsPoint>, AcquireError> {
    let response: DatagetterResponse = serde_json::from_str(json)
        .map_err(|e| AcquireError::Schema(format!("datagetter JSON failed: {}", e)))?;

    if let Some(error) = response.error {
        if error.message.contains("No data was found") {
            return Ok(Vec::new());
        }
        return Err(AcquireError::Schema(format!(
            "datagetter error: {}",
            error.message
        )));
    }

    let data = response
        .data
        .or(response.predictions)
        .ok_or_else(|| AcquireError::Schema("datagetter response has no data array".to_string()))?;

    Ok(data
        .into_iter()
        .map(|p| CoopsPoint {
            timestamp: p.t,
            value: p.v,
            quality: p.q,
        })
        .collect())
}

/// Splits an inclusive range into windows no longer than `max_days`.
fn split_range(range: &DateRange, max_days: u64) -> Vec<DateRange> {
    let mut windows = Vec::new();
    let mut start = range.start;
    while start <= range.end {
        let window_end = start
            .checked_add_days(Days::new(max_days - 1))
            .unwrap_or(range.end)
            .min(range.end);
        windows.push(DateRange::new(start, window_end));
        match window_end.checked_add_days(Days::new(1)) {
            Some(next) => start = next,
            None => break,
        }
    }
    windows
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Request knobs for tide-type data, from the run configuration.
#[derive(Debug, Clone)]
pub struct CoopsRequestSettings {
    /// Vertical datum for water-level products (e.g. "MLLW").
    pub datum: String,
    /// Sampling interval ("h" hourly, "6" six-minute, "daily", "monthly").
    pub interval: String,
}

pub struct CoopsClient {
    transport: Arc<HttpTransport>,
    settings: CoopsRequestSettings,
}

impl CoopsClient {
    pub fn new(transport: Arc<HttpTransport>, settings: CoopsRequestSettings) -> Self {
        Self {
            transport,
            settings,
        }
    }
}

impl ProviderClient for CoopsClient {
    fn provider(&self) -> ProviderId {
        ProviderId::Coops
    }

    /// Queries the metadata API once per requested product type and merges
    /// stations that serve several products.
    fn list_stations(&self, parameter_codes: &[String]) -> Result<Vec<Station>, AcquireError> {
        let mut merged: Vec<Station> = Vec::new();
        for product in parameter_codes {
            let Some(station_type) = station_type_for(product) else {
                return Err(AcquireError::Schema(format!(
                    "unknown CO-OPS product: {}",
                    product
                )));
            };
            let body = self.transport.get_text(&build_catalog_url(station_type))?;
            for station in parse_catalog_response(&body, product)? {
                match merged.iter_mut().find(|s| s.id == station.id) {
                    Some(existing) => existing.parameter_codes.push(product.clone()),
                    None => merged.push(station),
                }
            }
        }
        Ok(merged)
    }

    fn fetch_observations(
        &self,
        station: &Station,
        parameter_code: &str,
        range: &DateRange,
    ) -> Result<RawPayload, AcquireError> {
        let mut points = Vec::new();
        for window in split_range(range, window_days(&self.settings.interval)) {
            let url = build_datagetter_url(
                &station.id,
                parameter_code,
                &self.settings.datum,
                &self.settings.interval,
                &window,
            );
            let body = self.transport.get_text(&url)?;
            points.extend(parse_datagetter_response(&body)?);
        }
        Ok(RawPayload::Coops(CoopsPayload {
            station_id: station.id.clone(),
            product: parameter_code.to_string(),
            points,
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
