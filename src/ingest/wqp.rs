/// EPA Water Quality Portal (WQP) client.
///
/// Both endpoints return CSV:
///   https://www.waterqualitydata.us/data/Station/search — monitoring
///     locations inside a bounding box, filtered by site type / sample
///     media / source system.
///   https://www.waterqualitydata.us/data/Result/search — analytical
///     results for one site and characteristic over a date range.
///
/// WQP identifies measurements by characteristic name ("Temperature,
/// water", "Dissolved oxygen (DO)", ...) rather than numeric codes, and
/// reports timestamps as local date plus an optional time and zone code;
/// the normalizer resolves those to UTC.

use crate::geometry::BoundingBox;
use crate::ingest::{HttpTransport, ProviderClient, RawPayload};
use crate::model::{AcquireError, DateRange, ProviderId, Station};
use std::sync::Arc;

const STATION_BASE_URL: &str = "https://www.waterqualitydata.us/data/Station/search";
const RESULT_BASE_URL: &str = "https://www.waterqualitydata.us/data/Result/search";

// ---------------------------------------------------------------------------
// Decoded payload handed to the normalizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct WqpPayload {
    pub station_id: String,
    pub characteristic: String,
    pub rows: Vec<WqpRow>,
}

/// One result row, kept as raw strings. Units vary per row in WQP, so the
/// unit travels with the row instead of the payload.
#[derive(Debug, Clone)]
pub struct WqpRow {
    /// ActivityStartDate, "YYYY-MM-DD".
    pub date: String,
    /// ActivityStartTime/Time, "HH:MM:SS", often absent.
    pub time: Option<String>,
    /// ActivityStartTime/TimeZoneCode ("EST", "CDT", ...), often absent.
    pub timezone: Option<String>,
    pub value_raw: String,
    pub unit_raw: String,
    /// ResultStatusIdentifier ("Final", "Provisional", ...).
    pub status: Option<String>,
    /// ResultDetectionConditionText; non-empty means no numeric value
    /// (e.g. "Not Detected").
    pub detection_condition: Option<String>,
}

// ---------------------------------------------------------------------------
// URL construction
// ---------------------------------------------------------------------------

/// Search filters shared by both endpoints, from the run configuration.
#[derive(Debug, Clone)]
pub struct WqpSearchFilters {
    /// Site types ("Stream", "Lake, Reservoir, Impoundment", ...).
    pub site_types: Vec<String>,
    /// Sample media, normally just "Water".
    pub sample_media: Vec<String>,
    /// Source systems ("NWIS", "STORET").
    pub providers: Vec<String>,
}

fn push_repeated(query: &mut String, key: &str, values: &[String]) {
    for value in values {
        query.push('&');
        query.push_str(key);
        query.push('=');
        query.push_str(&urlencoding::encode(value));
    }
}

/// Station search scoped to the bounding box. bBox order is
/// west,south,east,north; dates are MM-DD-YYYY.
pub fn build_station_url(
    bbox: &BoundingBox,
    filters: &WqpSearchFilters,
    characteristics: &[String],
    range: &DateRange,
) -> String {
    let mut url = format!(
        "{}?bBox={},{},{},{}&startDateLo={}&startDateHi={}&mimeType=csv&zip=no",
        STATION_BASE_URL,
        bbox.west,
        bbox.south,
        bbox.east,
        bbox.north,
        range.start.format("%m-%d-%Y"),
        range.end.format("%m-%d-%Y"),
    );
    push_repeated(&mut url, "siteType", &filters.site_types);
    push_repeated(&mut url, "sampleMedia", &filters.sample_media);
    push_repeated(&mut url, "providers", &filters.providers);
    push_repeated(&mut url, "characteristicName", characteristics);
    url
}

/// Result search for one site and characteristic.
pub fn build_result_url(site_id: &str, characteristic: &str, range: &DateRange) -> String {
    format!(
        "{}?siteid={}&characteristicName={}&startDateLo={}&startDateHi={}&mimeType=csv&zip=no",
        RESULT_BASE_URL,
        urlencoding::encode(site_id),
        urlencoding::encode(characteristic),
        range.start.format("%m-%d-%Y"),
        range.end.format("%m-%d-%Y"),
    )
}

// ---------------------------------------------------------------------------
// CSV parsing
// ---------------------------------------------------------------------------

/// Column positions resolved from a CSV header row. WQP column order is not
/// contractual, so columns are located by name; a missing mandatory column
/// is a schema error.
struct ColumnMap {
    indices: std::collections::HashMap<String, usize>,
}

impl ColumnMap {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let indices = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .collect();
        Self { indices }
    }

    fn require(&self, name: &str) -> Result<usize, AcquireError> {
        self.indices
            .get(name)
            .copied()
            .ok_or_else(|| AcquireError::Schema(format!("CSV missing column {}", name)))
    }

    fn optional<'r>(&self, record: &'r csv::StringRecord, name: &str) -> Option<&'r str> {
        self.indices
            .get(name)
            .and_then(|&i| record.get(i))
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

pub fn parse_station_csv(
    body: &str,
    characteristics: &[String],
) -> Result<Vec<Station>, AcquireError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(body.as_bytes());
    let columns = ColumnMap::from_headers(
        reader
            .headers()
            .map_err(|e| AcquireError::Schema(format!("station CSV header failed: {}", e)))?,
    );

    let id_col = columns.require("MonitoringLocationIdentifier")?;
    let name_col = columns.require("MonitoringLocationName")?;

    let mut stations = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| AcquireError::Schema(format!("station CSV row failed: {}", e)))?;
        let Some(id) = record.get(id_col).map(str::trim).filter(|s| !s.is_empty()) else {
            continue;
        };
        stations.push(Station {
            provider: ProviderId::Wqp,
            id: id.to_string(),
            name: record.get(name_col).unwrap_or("").trim().to_string(),
            latitude: columns
                .optional(&record, "LatitudeMeasure")
                .and_then(|s| s.parse().ok()),
            longitude: columns
                .optional(&record, "LongitudeMeasure")
                .and_then(|s| s.parse().ok()),
            parameter_codes: characteristics.to_vec(),
        });
    }
    Ok(stations)
}

pub fn parse_result_csv(
    body: &str,
    station_id: &str,
    characteristic: &str,
) -> Result<WqpPayload, AcquireError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(body.as_bytes());
    let columns = ColumnMap::from_headers(
        reader
            .headers()
            .map_err(|e| AcquireError::Schema(format!("result CSV header failed: {}", e)))?,
    );

    let date_col = columns.require("ActivityStartDate")?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| AcquireError::Schema(format!("result CSV row failed: {}", e)))?;
        let Some(date) = record.get(date_col).map(str::trim).filter(|s| !s.is_empty()) else {
            continue;
        };
        rows.push(WqpRow {
            date: date.to_string(),
            time: columns
                .optional(&record, "ActivityStartTime/Time")
                .map(str::to_string),
            timezone: columns
                .optional(&record, "ActivityStartTime/TimeZoneCode")
                .map(str::to_string),
            value_raw: columns
                .optional(&record, "ResultMeasureValue")
                .unwrap_or("")
                .to_string(),
            unit_raw: columns
                .optional(&record, "ResultMeasure/MeasureUnitCode")
                .unwrap_or("")
                .to_string(),
            status: columns
                .optional(&record, "ResultStatusIdentifier")
                .map(str::to_string),
            detection_condition: columns
                .optional(&record, "ResultDetectionConditionText")
                .map(str::to_string),
        });
    }

    Ok(WqpPayload {
        station_id: station_id.to_string(),
        characteristic: characteristic.to_string(),
        rows,
    })
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct WqpClient {
    transport: Arc<HttpTransport>,
    bbox: BoundingBox,
    filters: WqpSearchFilters,
    range: DateRange,
}

impl WqpClient {
    pub fn new(
        transport: Arc<HttpTransport>,
        bbox: BoundingBox,
        filters: WqpSearchFilters,
        range: DateRange,
    ) -> Self {
        Self {
            transport,
            bbox,
            filters,
            range,
        }
    }
}

impl ProviderClient for WqpClient {
    fn provider(&self) -> ProviderId {
        ProviderId::Wqp
    }

    fn list_stations(&self, parameter_codes: &[String]) -> Result<Vec<Station>, AcquireError> {
        let url = build_station_url(&self.bbox, &self.filters, parameter_codes, &self.range);
        let body = self.transport.get_text(&url)?;
        parse_station_csv(&body, parameter_codes)
    }

    fn fetch_observations(
        &self,
        station: &Station,
        parameter_code: &str,
        range: &DateRange,
    ) -> Result<RawPayload, AcquireError> {
        let url = build_result_url(&station.id, parameter_code, range);
        let body = self.transport.get_text(&url)?;
        Ok(RawPayload::Wqp(parse_result_csv(
            &body,
            &station.id,
            parameter_code,
        )?))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
