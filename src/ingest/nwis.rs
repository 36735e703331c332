/// USGS NWIS client: site inventory + observation retrieval.
///
/// Station discovery uses the NWIS inventory service with a lat/lon
/// bounding box and RDB (tab-delimited) output:
///   https://nwis.waterdata.usgs.gov/nwis/inventory
///
/// Observations come from either the Instantaneous Values (IV) or the
/// Daily Values (DV) service, selected per run; both return WaterML
/// rendered as JSON with the same envelope:
///   https://nwis.waterservices.usgs.gov/nwis/iv/
///   https://nwis.waterservices.usgs.gov/nwis/dv/
///
/// See `fixtures.rs` for annotated examples of both response shapes.

use crate::geometry::BoundingBox;
use crate::ingest::{HttpTransport, ProviderClient, RawPayload};
use crate::model::{AcquireError, DateRange, ProviderId, Station};
use serde::Deserialize;
use std::sync::Arc;

const INVENTORY_BASE_URL: &str = "https://nwis.waterdata.usgs.gov/nwis/inventory";
const IV_BASE_URL: &str = "https://nwis.waterservices.usgs.gov/nwis/iv/";
const DV_BASE_URL: &str = "https://nwis.waterservices.usgs.gov/nwis/dv/";

/// Which NWIS observation service a run queries: instantaneous values
/// (typically 15-minute) or daily values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NwisService {
    Iv,
    Dv,
}

impl NwisService {
    fn base_url(self) -> &'static str {
        match self {
            NwisService::Iv => IV_BASE_URL,
            NwisService::Dv => DV_BASE_URL,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde structures for WaterML JSON deserialization
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct IvResponse {
    value: ValueWrapper,
}

#[derive(Deserialize)]
struct ValueWrapper {
    #[serde(rename = "timeSeries")]
    time_series: Vec<TimeSeries>,
}

#[derive(Deserialize)]
struct TimeSeries {
    #[serde(rename = "sourceInfo")]
    source_info: SourceInfo,
    variable: Variable,
    values: Vec<Values>,
}

#[derive(Deserialize)]
struct SourceInfo {
    #[serde(rename = "siteCode")]
    site_code: Vec<SiteCode>,
}

#[derive(Deserialize)]
struct SiteCode {
    value: String,
}

#[derive(Deserialize)]
struct Variable {
    #[serde(rename = "variableCode")]
    variable_code: Vec<VariableCode>,
    unit: Unit,
    #[serde(rename = "noDataValue")]
    no_data_value: f64,
}

#[derive(Deserialize)]
struct VariableCode {
    value: String,
}

#[derive(Deserialize)]
struct Unit {
    #[serde(rename = "unitCode")]
    unit_code: String,
}

#[derive(Deserialize)]
struct Values {
    value: Vec<ValueEntry>,
}

#[derive(Deserialize)]
struct ValueEntry {
    value: String, // USGS returns measurements as strings
    #[serde(default)]
    qualifiers: Vec<String>,
    #[serde(rename = "dateTime")]
    date_time: String,
}

// ---------------------------------------------------------------------------
// Decoded payload handed to the normalizer
// ---------------------------------------------------------------------------

/// All timeSeries entries from one IV response, still in provider terms
/// (string values, native units, offset timestamps, per-series sentinel).
#[derive(Debug, Clone)]
pub struct NwisPayload {
    pub series: Vec<NwisSeries>,
}

#[derive(Debug, Clone)]
pub struct NwisSeries {
    pub site_code: String,
    pub parameter_code: String,
    pub unit: String,
    pub no_data_value: f64,
    pub points: Vec<NwisPoint>,
}

#[derive(Debug, Clone)]
pub struct NwisPoint {
    /// ISO 8601 with UTC offset, e.g. "2024-05-01T12:00:00.000-05:00".
    pub datetime: String,
    /// Measurement as the API sent it — a string, possibly the sentinel.
    pub value: String,
    /// e.g. ["P"] provisional, ["A"] approved, ["e"] estimated.
    pub qualifiers: Vec<String>,
}

// ---------------------------------------------------------------------------
// URL construction
// ---------------------------------------------------------------------------

/// Builds the inventory URL for a bounding box, requesting the RDB sitefile
/// with the columns the parser consumes.
pub fn build_inventory_url(bbox: &BoundingBox) -> String {
    format!(
        "{}?nw_longitude_va={}&nw_latitude_va={}\
         &se_longitude_va={}&se_latitude_va={}\
         &coordinate_format=decimal_degrees&group_key=NONE&format=sitefile_output\
         &sitefile_output_format=rdb&column_name=agency_cd&column_name=site_no\
         &column_name=station_nm&column_name=site_tp_cd&column_name=dec_lat_va\
         &column_name=dec_long_va&list_of_search_criteria=lat_long_bounding_box",
        INVENTORY_BASE_URL, bbox.west, bbox.north, bbox.east, bbox.south
    )
}

/// Builds an observation URL for one site, one parameter, and an inclusive
/// date range, against the selected service.
pub fn build_data_url(
    service: NwisService,
    site: &str,
    parameter_code: &str,
    range: &DateRange,
) -> String {
    format!(
        "{}?sites={}&parameterCd={}&startDT={}&endDT={}&siteStatus=all&format=json",
        service.base_url(),
        site,
        parameter_code,
        range.start,
        range.end
    )
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Parses the inventory RDB body into stations.
///
/// RDB format: `#`-prefixed comment lines, one tab-delimited header line,
/// one column-format line (e.g. "5s\t15s\t..."), then data rows. Rows with
/// unparseable coordinates are kept with `None` coordinates; discovery
/// excludes and counts them.
pub fn parse_inventory_rdb(
    body: &str,
    parameter_codes: &[String],
) -> Result<Vec<Station>, AcquireError> {
    let mut lines = body.lines().filter(|l| !l.starts_with('#'));

    let header = lines
        .next()
        .ok_or_else(|| AcquireError::Schema("inventory RDB has no header line".to_string()))?;
    let columns: Vec<&str> = header.split('\t').collect();
    let idx = |name: &str| {
        columns
            .iter()
            .position(|c| *c == name)
            .ok_or_else(|| AcquireError::Schema(format!("inventory RDB missing column {}", name)))
    };
    let site_no = idx("site_no")?;
    let station_nm = idx("station_nm")?;
    let lat = idx("dec_lat_va")?;
    let lon = idx("dec_long_va")?;

    // Column-format line ("5s\t15s\t...") follows the header.
    let _ = lines.next();

    let mut stations = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let field = |i: usize| fields.get(i).map(|s| s.trim()).unwrap_or("");

        let id = field(site_no);
        if id.is_empty() {
            continue;
        }
        stations.push(Station {
            provider: ProviderId::Nwis,
            id: id.to_string(),
            name: field(station_nm).to_string(),
            latitude: field(lat).parse::<f64>().ok(),
            longitude: field(lon).parse::<f64>().ok(),
            parameter_codes: parameter_codes.to_vec(),
        });
    }
    Ok(stations)
}

/// Parses an IV JSON response into an `NwisPayload`.
///
/// An empty `timeSeries` array is a valid empty payload — the station has
/// no data for the requested parameter/range.
pub fn parse_iv_response(json: &str) -> Result<NwisPayload, AcquireError> {
    let response: IvResponse = serde_json::from_str(json)
        .map_err(|e| AcquireError::Schema(format!("IV JSON deserialization failed: {}", e)))?;

    let mut series = Vec::new();
    for entry in response.value.time_series {
        let site_code = entry
            .source_info
            .site_code
            .first()
            .ok_or_else(|| AcquireError::Schema("IV timeSeries missing siteCode".to_string()))?
            .value
            .clone();
        let parameter_code = entry
            .variable
            .variable_code
            .first()
            .ok_or_else(|| AcquireError::Schema("IV timeSeries missing variableCode".to_string()))?
            .value
            .clone();

        let points = entry
            .values
            .first()
            .map(|v| {
                v.value
                    .iter()
                    .map(|p| NwisPoint {
                        datetime: p.date_time.clone(),
                        value: p.value.clone(),
                        qualifiers: p.qualifiers.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        series.push(NwisSeries {
            site_code,
            parameter_code,
            unit: entry.variable.unit.unit_code,
            no_data_value: entry.variable.no_data_value,
            points,
        });
    }
    Ok(NwisPayload { series })
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct NwisClient {
    transport: Arc<HttpTransport>,
    bbox: BoundingBox,
    service: NwisService,
}

impl NwisClient {
    pub fn new(transport: Arc<HttpTransport>, bbox: BoundingBox, service: NwisService) -> Self {
        Self {
            transport,
            bbox,
            service,
        }
    }
}

impl ProviderClient for NwisClient {
    fn provider(&self) -> ProviderId {
        ProviderId::Nwis
    }

    fn list_stations(&self, parameter_codes: &[String]) -> Result<Vec<Station>, AcquireError> {
        let url = build_inventory_url(&self.bbox);
        let body = self.transport.get_text(&url)?;
        parse_inventory_rdb(&body, parameter_codes)
    }

    fn fetch_observations(
        &self,
        station: &Station,
        parameter_code: &str,
        range: &DateRange,
    ) -> Result<RawPayload, AcquireError> {
        let url = build_data_url(self.service, &station.id, parameter_code, range);
        let body = self.transport.get_text(&url)?;
        Ok(RawPayload::Nwis(parse_iv_response(&body)?))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
