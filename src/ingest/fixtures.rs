/// Test fixtures: representative payloads from the three provider APIs.
///
/// These fixtures are structurally complete but truncated to the minimum
/// needed to exercise the parsers. Each reflects the real response shape
/// of its endpoint.
///
/// NWIS IV response shape (WaterML rendered as JSON):
///   response.value.timeSeries[]
///     .sourceInfo.siteCode[0].value   — site number (string)
///     .variable.variableCode[0].value — parameter code (string)
///     .variable.unit.unitCode
///     .variable.noDataValue           — sentinel for missing data (-999999)
///     .values[0].value[]
///       .value     — the measurement as a STRING (not a number)
///       .dateTime  — ISO 8601 with offset
///       .qualifiers[] — e.g. ["P"] or ["A"]
///
/// Note: measurement values are strings in both the NWIS and CO-OPS
/// responses even though they represent numbers. Parsers must handle this.

// ---------------------------------------------------------------------------
// USGS NWIS
// ---------------------------------------------------------------------------

/// Inventory RDB body: comment block, header, column-format line, then
/// three sites. The last site has blank coordinates — real catalogs carry
/// such rows and discovery must count them as excluded.
pub(crate) fn fixture_nwis_inventory_rdb() -> &'static str {
    "#\n\
     # US Geological Survey\n\
     # retrieved: 2025-04-01 12:00:00 EDT\n\
     #\n\
     # The Site File stores location and general information about groundwater,\n\
     # surface water, and meteorological sites.\n\
     #\n\
     agency_cd\tsite_no\tstation_nm\tsite_tp_cd\tdec_lat_va\tdec_long_va\n\
     5s\t15s\t50s\t7s\t16s\t16s\n\
     USGS\t05568500\tIllinois River at Kingston Mines, IL\tST\t40.5614\t-89.9956\n\
     USGS\t05568000\tIllinois River at Chillicothe, IL\tST\t40.9200\t-89.4854\n\
     USGS\t05999999\tUnlocated Test Site\tST\t\t\n"
}

/// Single site (Kingston Mines 05568500) discharge series with three
/// points spanning an hour. First point is provisional ("P").
pub(crate) fn fixture_nwis_iv_json() -> &'static str {
    r#"{
      "value": {
        "timeSeries": [
          {
            "sourceInfo": {
              "siteName": "Illinois River at Kingston Mines, IL",
              "siteCode": [{ "value": "05568500", "network": "NWIS", "agencyCode": "USGS" }],
              "geoLocation": {
                "geogLocation": { "srs": "EPSG:4326", "latitude": 40.5614, "longitude": -89.9956 }
              }
            },
            "variable": {
              "variableCode": [{ "value": "00060", "network": "NWIS" }],
              "variableName": "Streamflow, ft&#179;/s",
              "unit": { "unitCode": "ft3/s" },
              "noDataValue": -999999.0
            },
            "values": [{
              "value": [
                { "value": "42300", "qualifiers": ["P"], "dateTime": "2024-05-01T12:00:00.000-05:00" },
                { "value": "42100", "qualifiers": ["A"], "dateTime": "2024-05-01T12:30:00.000-05:00" },
                { "value": "41900", "qualifiers": ["e"], "dateTime": "2024-05-01T13:00:00.000-05:00" }
              ],
              "qualifier": [{ "qualifierCode": "P", "qualifierDescription": "Provisional data subject to revision." }]
            }]
          }
        ]
      }
    }"#
}

/// Kingston Mines series where the middle point carries the USGS sentinel
/// -999999 — a timestamp is present but the measurement is explicitly
/// missing. The client keeps it verbatim; normalization turns it into a
/// `Missing` record, never a reading of -999999 cfs.
pub(crate) fn fixture_nwis_iv_sentinel_json() -> &'static str {
    r#"{
      "value": {
        "timeSeries": [
          {
            "sourceInfo": {
              "siteName": "Illinois River at Kingston Mines, IL",
              "siteCode": [{ "value": "05568500", "network": "NWIS", "agencyCode": "USGS" }],
              "geoLocation": {
                "geogLocation": { "srs": "EPSG:4326", "latitude": 40.5614, "longitude": -89.9956 }
              }
            },
            "variable": {
              "variableCode": [{ "value": "00060", "network": "NWIS" }],
              "variableName": "Streamflow, ft&#179;/s",
              "unit": { "unitCode": "ft3/s" },
              "noDataValue": -999999.0
            },
            "values": [{
              "value": [
                { "value": "42300", "qualifiers": ["P"], "dateTime": "2024-05-01T12:00:00.000-05:00" },
                { "value": "-999999", "qualifiers": ["P"], "dateTime": "2024-05-01T12:30:00.000-05:00" },
                { "value": "41900", "qualifiers": ["P"], "dateTime": "2024-05-01T13:00:00.000-05:00" }
              ],
              "qualifier": []
            }]
          }
        ]
      }
    }"#
}

// ---------------------------------------------------------------------------
// NOAA CO-OPS
// ---------------------------------------------------------------------------

/// Metadata API station catalog, truncated to three water-level stations.
/// Real responses carry dozens of extra fields per station; the parser
/// reads only id/name/lat/lng.
pub(crate) fn fixture_coops_catalog_json() -> &'static str {
    r#"{
      "count": 3,
      "units": null,
      "stations": [
        {
          "id": "8454000",
          "name": "Providence",
          "lat": 41.8071,
          "lng": -71.4012,
          "state": "RI",
          "affiliations": "NWLON",
          "tidal": true
        },
        {
          "id": "8452660",
          "name": "Newport",
          "lat": 41.5043,
          "lng": -71.3261,
          "state": "RI",
          "affiliations": "NWLON",
          "tidal": true
        },
        {
          "id": "8447930",
          "name": "Woods Hole",
          "lat": 41.5236,
          "lng": -70.6711,
          "state": "MA",
          "affiliations": "NWLON",
          "tidal": true
        }
      ]
    }"#
}

/// Hourly water-level window (GMT, metric) with a verified point, a
/// preliminary point, and a gap point whose "v" is the empty string.
pub(crate) fn fixture_coops_water_level_json() -> &'static str {
    r#"{
      "metadata": { "id": "8454000", "name": "Providence", "lat": "41.8071", "lon": "-71.4012" },
      "data": [
        { "t": "2025-04-01 13:00", "v": "1.236", "s": "0.012", "f": "0,0,0,0", "q": "v" },
        { "t": "2025-04-01 14:00", "v": "1.104", "s": "0.015", "f": "0,0,0,0", "q": "p" },
        { "t": "2025-04-01 15:00", "v": "", "s": "", "f": "0,0,0,1", "q": "p" }
      ]
    }"#
}

/// The data API's "nothing in range" envelope — a 200 response, not an
/// HTTP error. Treated as a valid empty window.
pub(crate) fn fixture_coops_no_data_json() -> &'static str {
    r#"{
      "error": {
        "message": "No data was found. This product may not be offered at this station at the requested time."
      }
    }"#
}

// ---------------------------------------------------------------------------
// EPA Water Quality Portal
// ---------------------------------------------------------------------------

/// Station/search CSV, truncated to the columns the parser reads plus the
/// organization column that precedes them in real output. STORET-XX999 has
/// blank coordinates.
pub(crate) fn fixture_wqp_station_csv() -> &'static str {
    "OrganizationIdentifier,MonitoringLocationIdentifier,MonitoringLocationName,MonitoringLocationTypeName,LatitudeMeasure,LongitudeMeasure\n\
     USGS-IL,USGS-05568500,\"ILLINOIS RIVER AT KINGSTON MINES, IL\",Stream,40.5614,-89.9956\n\
     USGS-IL,USGS-05568000,\"ILLINOIS RIVER AT CHILLICOTHE, IL\",Stream,40.9200,-89.4854\n\
     STORET,STORET-XX999,Legacy Site Without Location,Stream,,\n"
}

/// Result/search CSV with four rows: a final timed sample, a provisional
/// sample, a date-only sample (no time or zone), and a non-detect row
/// whose ResultMeasureValue is empty.
pub(crate) fn fixture_wqp_result_csv() -> &'static str {
    "ActivityStartDate,ActivityStartTime/Time,ActivityStartTime/TimeZoneCode,CharacteristicName,ResultMeasureValue,ResultMeasure/MeasureUnitCode,ResultStatusIdentifier,ResultDetectionConditionText\n\
     2024-06-10,10:30:00,CDT,\"Temperature, water\",24.5,deg C,Final,\n\
     2024-06-11,09:15:00,CDT,\"Temperature, water\",23.9,deg C,Provisional,\n\
     2024-06-12,,,\"Temperature, water\",25.1,deg C,Final,\n\
     2024-06-13,11:00:00,CDT,Atrazine,,ug/l,Final,Not Detected\n"
}
