/// Converts provider payloads into the common observation schema.
///
/// All providers converge here: timestamps become UTC, units become
/// canonical for the run's output system, provider sentinels and empty
/// values become `Missing` records, and quality codes map onto the shared
/// `QualityFlag` set. Normalization is a pure function of the payload and
/// unit system; running it twice yields identical output.
///
/// Unit policy: temperature is always degrees Celsius; flow and level
/// follow the selected system (cfs/ft english, cms/m metric);
/// concentrations are always mg/L.

use crate::ingest::coops::CoopsPayload;
use crate::ingest::nwis::NwisPayload;
use crate::ingest::wqp::WqpPayload;
use crate::ingest::RawPayload;
use crate::model::{AcquireError, ObservationRecord, QualityFlag, UnitSystem};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// Tolerance when comparing a parsed value to a provider's numeric
/// no-data sentinel.
const SENTINEL_TOLERANCE: f64 = 0.1;

// ---------------------------------------------------------------------------
// Unit mapping table
// ---------------------------------------------------------------------------

/// Linear conversion into a canonical unit: canonical = value × factor + offset.
#[derive(Debug, Clone, Copy)]
struct Conversion {
    unit: &'static str,
    factor: f64,
    offset: f64,
}

const fn identity(unit: &'static str) -> Conversion {
    Conversion {
        unit,
        factor: 1.0,
        offset: 0.0,
    }
}

/// One source unit as providers spell it, with its conversion per output
/// system. Matching is case-insensitive on the trimmed source string.
#[derive(Debug, Clone, Copy)]
struct UnitRule {
    source: &'static str,
    english: Conversion,
    metric: Conversion,
}

static UNIT_RULES: &[UnitRule] = &[
    // Flow
    UnitRule {
        source: "ft3/s",
        english: identity("cfs"),
        metric: Conversion {
            unit: "cms",
            factor: 0.0283168,
            offset: 0.0,
        },
    },
    // Level / height
    UnitRule {
        source: "ft",
        english: identity("ft"),
        metric: Conversion {
            unit: "m",
            factor: 0.3048,
            offset: 0.0,
        },
    },
    UnitRule {
        source: "m",
        english: Conversion {
            unit: "ft",
            factor: 3.28084,
            offset: 0.0,
        },
        metric: identity("m"),
    },
    // Temperature: always Celsius on output
    UnitRule {
        source: "deg c",
        english: identity("degC"),
        metric: identity("degC"),
    },
    UnitRule {
        source: "deg f",
        english: Conversion {
            unit: "degC",
            factor: 5.0 / 9.0,
            offset: -160.0 / 9.0,
        },
        metric: Conversion {
            unit: "degC",
            factor: 5.0 / 9.0,
            offset: -160.0 / 9.0,
        },
    },
    // Wind, pressure, humidity, visibility (CO-OPS metric query units)
    UnitRule {
        source: "m/s",
        english: identity("m/s"),
        metric: identity("m/s"),
    },
    UnitRule {
        source: "mb",
        english: identity("mb"),
        metric: identity("mb"),
    },
    UnitRule {
        source: "percent",
        english: identity("percent"),
        metric: identity("percent"),
    },
    UnitRule {
        source: "km",
        english: Conversion {
            unit: "nmi",
            factor: 0.539957,
            offset: 0.0,
        },
        metric: identity("km"),
    },
    // Conductivity and salinity
    UnitRule {
        source: "ms/cm",
        english: identity("mS/cm"),
        metric: identity("mS/cm"),
    },
    UnitRule {
        source: "psu",
        english: identity("PSU"),
        metric: identity("PSU"),
    },
    UnitRule {
        source: "us/cm",
        english: identity("uS/cm"),
        metric: identity("uS/cm"),
    },
    // Concentrations: always mg/L on output
    UnitRule {
        source: "mg/l",
        english: identity("mg/L"),
        metric: identity("mg/L"),
    },
    UnitRule {
        source: "ug/l",
        english: Conversion {
            unit: "mg/L",
            factor: 0.001,
            offset: 0.0,
        },
        metric: Conversion {
            unit: "mg/L",
            factor: 0.001,
            offset: 0.0,
        },
    },
    // pH is dimensionless
    UnitRule {
        source: "std units",
        english: identity("std units"),
        metric: identity("std units"),
    },
    UnitRule {
        source: "none",
        english: identity("std units"),
        metric: identity("std units"),
    },
];

fn lookup_unit(source: &str) -> Option<&'static UnitRule> {
    let needle = source.trim().to_ascii_lowercase();
    UNIT_RULES.iter().find(|r| r.source == needle)
}

impl UnitRule {
    fn conversion(&self, system: UnitSystem) -> Conversion {
        match system {
            UnitSystem::English => self.english,
            UnitSystem::Metric => self.metric,
        }
    }
}

/// Startup check on the mapping table: sources are unique and lowercase,
/// and every conversion factor is finite and non-zero. A table defect is a
/// deployment error, caught before any task runs.
pub fn validate_mappings() -> Result<(), AcquireError> {
    for (i, rule) in UNIT_RULES.iter().enumerate() {
        if rule.source != rule.source.to_ascii_lowercase() {
            return Err(AcquireError::Schema(format!(
                "unit rule {:?} is not lowercase",
                rule.source
            )));
        }
        if UNIT_RULES[..i].iter().any(|r| r.source == rule.source) {
            return Err(AcquireError::Schema(format!(
                "duplicate unit rule {:?}",
                rule.source
            )));
        }
        for conv in [rule.english, rule.metric] {
            if !conv.factor.is_finite() || conv.factor == 0.0 || !conv.offset.is_finite() {
                return Err(AcquireError::Schema(format!(
                    "unusable conversion for {:?}",
                    rule.source
                )));
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Normalizes one provider payload. Individually malformed points are
/// skipped with a warning; structural problems (an unknown unit on a
/// fixed-unit provider) fail the task with `Schema`.
pub fn normalize(
    payload: &RawPayload,
    system: UnitSystem,
) -> Result<Vec<ObservationRecord>, AcquireError> {
    let mut records = match payload {
        RawPayload::Nwis(p) => normalize_nwis(p, system)?,
        RawPayload::Coops(p) => normalize_coops(p, system)?,
        RawPayload::Wqp(p) => normalize_wqp(p, system),
    };
    records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    Ok(records)
}

// ---------------------------------------------------------------------------
// NWIS
// ---------------------------------------------------------------------------

fn nwis_quality(qualifiers: &[String]) -> QualityFlag {
    if qualifiers.iter().any(|q| q == "A") {
        QualityFlag::Ok
    } else if qualifiers.iter().any(|q| q == "e" || q == "E") {
        QualityFlag::Estimated
    } else {
        QualityFlag::Provisional
    }
}

fn normalize_nwis(
    payload: &NwisPayload,
    system: UnitSystem,
) -> Result<Vec<ObservationRecord>, AcquireError> {
    let mut records = Vec::new();
    for series in &payload.series {
        let rule = lookup_unit(&series.unit).ok_or_else(|| {
            AcquireError::Schema(format!("unrecognized NWIS unit {:?}", series.unit))
        })?;
        let conv = rule.conversion(system);

        for point in &series.points {
            // IV timestamps carry a UTC offset; DV timestamps are bare
            // dates rendered at local midnight with no offset — take
            // those as UTC.
            let timestamp = match DateTime::parse_from_rfc3339(&point.datetime) {
                Ok(t) => t.with_timezone(&Utc),
                Err(_) => match NaiveDateTime::parse_from_str(
                    &point.datetime,
                    "%Y-%m-%dT%H:%M:%S%.f",
                ) {
                    Ok(t) => t.and_utc(),
                    Err(_) => {
                        tracing::warn!(
                            site = %series.site_code,
                            datetime = %point.datetime,
                            "skipping NWIS point with unparseable timestamp"
                        );
                        continue;
                    }
                },
            };

            let raw = point.value.trim();
            let (value, quality) = if raw.is_empty() {
                (None, QualityFlag::Missing)
            } else {
                match raw.parse::<f64>() {
                    Ok(v) if (v - series.no_data_value).abs() < SENTINEL_TOLERANCE => {
                        (None, QualityFlag::Missing)
                    }
                    Ok(v) => (
                        Some(v * conv.factor + conv.offset),
                        nwis_quality(&point.qualifiers),
                    ),
                    Err(_) => {
                        tracing::warn!(
                            site = %series.site_code,
                            value = %raw,
                            "skipping NWIS point with non-numeric value"
                        );
                        continue;
                    }
                }
            };

            records.push(ObservationRecord {
                station_id: series.site_code.clone(),
                parameter_code: series.parameter_code.clone(),
                timestamp,
                value,
                unit: conv.unit,
                quality,
            });
        }
    }
    Ok(records)
}

// ---------------------------------------------------------------------------
// CO-OPS
// ---------------------------------------------------------------------------

/// Source unit per product, fixed because every request is `units=metric`.
fn coops_source_unit(product: &str) -> Result<&'static str, AcquireError> {
    match product {
        "water_level" | "predictions" => Ok("m"),
        "water_temperature" | "air_temperature" => Ok("deg c"),
        "wind" => Ok("m/s"),
        "air_pressure" => Ok("mb"),
        "humidity" => Ok("percent"),
        "visibility" => Ok("km"),
        "conductivity" => Ok("ms/cm"),
        "salinity" => Ok("psu"),
        other => Err(AcquireError::Schema(format!(
            "unrecognized CO-OPS product {:?}",
            other
        ))),
    }
}

fn normalize_coops(
    payload: &CoopsPayload,
    system: UnitSystem,
) -> Result<Vec<ObservationRecord>, AcquireError> {
    let source_unit = coops_source_unit(&payload.product)?;
    // Fixed-unit provider, so a table miss here is a table defect.
    let rule = lookup_unit(source_unit).ok_or_else(|| {
        AcquireError::Schema(format!("no unit rule for CO-OPS unit {:?}", source_unit))
    })?;
    let conv = rule.conversion(system);

    let mut records = Vec::new();
    for point in &payload.points {
        // Timestamps are GMT by request; no offset handling needed.
        let timestamp = match NaiveDateTime::parse_from_str(&point.timestamp, "%Y-%m-%d %H:%M") {
            Ok(t) => t.and_utc(),
            Err(_) => {
                tracing::warn!(
                    station = %payload.station_id,
                    timestamp = %point.timestamp,
                    "skipping CO-OPS point with unparseable timestamp"
                );
                continue;
            }
        };

        let raw = point.value.trim();
        let (value, quality) = if raw.is_empty() {
            (None, QualityFlag::Missing)
        } else {
            match raw.parse::<f64>() {
                Ok(v) => {
                    let quality = match point.quality.as_deref() {
                        Some("p") => QualityFlag::Provisional,
                        _ => QualityFlag::Ok,
                    };
                    (Some(v * conv.factor + conv.offset), quality)
                }
                Err(_) => {
                    tracing::warn!(
                        station = %payload.station_id,
                        value = %raw,
                        "skipping CO-OPS point with non-numeric value"
                    );
                    continue;
                }
            }
        };

        records.push(ObservationRecord {
            station_id: payload.station_id.clone(),
            parameter_code: payload.product.clone(),
            timestamp,
            value,
            unit: conv.unit,
            quality,
        });
    }
    Ok(records)
}

// ---------------------------------------------------------------------------
// WQP
// ---------------------------------------------------------------------------

/// UTC offset hours for the zone codes WQP emits. Fixed offsets by code:
/// the code already encodes daylight-saving state.
fn wqp_zone_offset_hours(code: &str) -> Option<i64> {
    match code {
        "EST" => Some(-5),
        "EDT" => Some(-4),
        "CST" => Some(-6),
        "CDT" => Some(-5),
        "MST" => Some(-7),
        "MDT" => Some(-6),
        "PST" => Some(-8),
        "PDT" => Some(-7),
        "AKST" => Some(-9),
        "AKDT" => Some(-8),
        "HST" => Some(-10),
        "UTC" | "GMT" => Some(0),
        _ => None,
    }
}

fn wqp_quality(status: Option<&str>) -> QualityFlag {
    match status {
        Some("Final") | Some("Accepted") | Some("Historical") | None => QualityFlag::Ok,
        _ => QualityFlag::Provisional,
    }
}

fn wqp_timestamp(date: &str, time: Option<&str>, zone: Option<&str>) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    let time = match time {
        Some(t) => NaiveTime::parse_from_str(t, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(t, "%H:%M"))
            .ok()?,
        // Date-only samples resolve to midnight.
        None => NaiveTime::from_hms_opt(0, 0, 0)?,
    };
    let offset_hours = match zone {
        Some(code) => wqp_zone_offset_hours(code)?,
        None => 0,
    };
    Some((date.and_time(time) - Duration::hours(offset_hours)).and_utc())
}

/// Canonical unit for a characteristic when a row carries no usable unit
/// code. Only `Missing` records need this: non-detect rows routinely omit
/// the unit along with the value.
fn wqp_fallback_unit(characteristic: &str) -> &'static str {
    let name = characteristic.to_ascii_lowercase();
    if name.contains("temperature") {
        "degC"
    } else if name == "ph" {
        "std units"
    } else if name.contains("conductance") || name.contains("conductivity") {
        "uS/cm"
    } else {
        "mg/L"
    }
}

/// WQP rows carry their own unit and vary within one response, so unit
/// problems are per-row skips rather than task failures. Missing-value
/// rows (detection condition set, or no measured value) are kept even
/// without a unit code.
fn normalize_wqp(payload: &WqpPayload, system: UnitSystem) -> Vec<ObservationRecord> {
    let mut records = Vec::new();
    for row in &payload.rows {
        let Some(timestamp) =
            wqp_timestamp(&row.date, row.time.as_deref(), row.timezone.as_deref())
        else {
            tracing::warn!(
                station = %payload.station_id,
                date = %row.date,
                "skipping WQP row with unparseable timestamp"
            );
            continue;
        };

        let missing = row.detection_condition.is_some() || row.value_raw.trim().is_empty();
        if missing {
            let unit = match lookup_unit(&row.unit_raw) {
                Some(rule) => rule.conversion(system).unit,
                None => wqp_fallback_unit(&payload.characteristic),
            };
            records.push(ObservationRecord {
                station_id: payload.station_id.clone(),
                parameter_code: payload.characteristic.clone(),
                timestamp,
                value: None,
                unit,
                quality: QualityFlag::Missing,
            });
            continue;
        }

        let Some(rule) = lookup_unit(&row.unit_raw) else {
            tracing::warn!(
                station = %payload.station_id,
                unit = %row.unit_raw,
                "skipping WQP row with unrecognized unit"
            );
            continue;
        };
        let conv = rule.conversion(system);

        let (value, quality) = match row.value_raw.trim().parse::<f64>() {
            Ok(v) => (
                Some(v * conv.factor + conv.offset),
                wqp_quality(row.status.as_deref()),
            ),
            Err(_) => {
                tracing::warn!(
                    station = %payload.station_id,
                    value = %row.value_raw,
                    "skipping WQP row with non-numeric value"
                );
                continue;
            }
        };

        records.push(ObservationRecord {
            station_id: payload.station_id.clone(),
            parameter_code: payload.characteristic.clone(),
            timestamp,
            value,
            unit: conv.unit,
            quality,
        });
    }
    records
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::coops::{parse_datagetter_response, CoopsPayload};
    use crate::ingest::fixtures::*;
    use crate::ingest::nwis::parse_iv_response;
    use crate::ingest::wqp::parse_result_csv;
    use chrono::TimeZone;

    fn nwis_payload(json: &str) -> RawPayload {
        RawPayload::Nwis(parse_iv_response(json).unwrap())
    }

    fn coops_water_level_payload() -> RawPayload {
        RawPayload::Coops(CoopsPayload {
            station_id: "8454000".to_string(),
            product: "water_level".to_string(),
            points: parse_datagetter_response(fixture_coops_water_level_json()).unwrap(),
        })
    }

    fn wqp_payload() -> RawPayload {
        RawPayload::Wqp(
            parse_result_csv(fixture_wqp_result_csv(), "USGS-05568500", "Temperature, water")
                .unwrap(),
        )
    }

    #[test]
    fn test_mapping_table_passes_startup_validation() {
        validate_mappings().expect("shipped table must validate");
    }

    // --- NWIS ---------------------------------------------------------------

    #[test]
    fn test_nwis_english_units_pass_through() {
        let records = normalize(&nwis_payload(fixture_nwis_iv_json()), UnitSystem::English).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].unit, "cfs");
        assert_eq!(records[0].value, Some(42300.0));
        assert_eq!(records[0].quality, QualityFlag::Provisional);
        assert_eq!(records[1].quality, QualityFlag::Ok, "qualifier A is reviewed");
        assert_eq!(records[2].quality, QualityFlag::Estimated);
    }

    #[test]
    fn test_nwis_metric_discharge_conversion() {
        let records = normalize(&nwis_payload(fixture_nwis_iv_json()), UnitSystem::Metric).unwrap();
        assert_eq!(records[0].unit, "cms");
        let cms = records[0].value.unwrap();
        assert!((cms - 42300.0 * 0.0283168).abs() < 0.01);
    }

    #[test]
    fn test_nwis_offset_timestamps_become_utc() {
        let records = normalize(&nwis_payload(fixture_nwis_iv_json()), UnitSystem::English).unwrap();
        // 2024-05-01T12:00:00-05:00 == 17:00 UTC
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 17, 0, 0).unwrap();
        assert_eq!(records[0].timestamp, expected);
    }

    #[test]
    fn test_nwis_daily_value_timestamps_without_offset_parse_as_utc() {
        let mut payload = parse_iv_response(fixture_nwis_iv_json()).unwrap();
        payload.series[0].points = vec![crate::ingest::nwis::NwisPoint {
            datetime: "2024-05-01T00:00:00.000".to_string(),
            value: "41800".to_string(),
            qualifiers: vec!["A".to_string()],
        }];
        let records = normalize(&RawPayload::Nwis(payload), UnitSystem::English).unwrap();
        assert_eq!(records.len(), 1, "zoneless daily timestamps must not be dropped");
        assert_eq!(
            records[0].timestamp,
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_nwis_sentinel_becomes_missing_record() {
        let records =
            normalize(&nwis_payload(fixture_nwis_iv_sentinel_json()), UnitSystem::English).unwrap();
        assert_eq!(records.len(), 3, "sentinel point keeps its timestamp slot");
        assert_eq!(records[1].value, None);
        assert_eq!(records[1].quality, QualityFlag::Missing);
        assert_eq!(records[0].value, Some(42300.0));
    }

    #[test]
    fn test_nwis_unknown_unit_is_schema_error() {
        let mut payload = parse_iv_response(fixture_nwis_iv_json()).unwrap();
        payload.series[0].unit = "furlongs/fortnight".to_string();
        let result = normalize(&RawPayload::Nwis(payload), UnitSystem::English);
        assert!(matches!(result, Err(AcquireError::Schema(_))));
    }

    #[test]
    fn test_records_are_sorted_by_timestamp() {
        let mut payload = parse_iv_response(fixture_nwis_iv_json()).unwrap();
        payload.series[0].points.reverse();
        let records = normalize(&RawPayload::Nwis(payload), UnitSystem::English).unwrap();
        for pair in records.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    // --- CO-OPS -------------------------------------------------------------

    #[test]
    fn test_coops_water_level_metric_passes_through() {
        let records = normalize(&coops_water_level_payload(), UnitSystem::Metric).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].unit, "m");
        assert_eq!(records[0].value, Some(1.236));
        assert_eq!(records[0].quality, QualityFlag::Ok, "verified maps to Ok");
        assert_eq!(records[1].quality, QualityFlag::Provisional);
    }

    #[test]
    fn test_coops_water_level_english_converts_to_feet() {
        let records = normalize(&coops_water_level_payload(), UnitSystem::English).unwrap();
        assert_eq!(records[0].unit, "ft");
        assert!((records[0].value.unwrap() - 1.236 * 3.28084).abs() < 1e-6);
    }

    #[test]
    fn test_coops_empty_value_becomes_missing() {
        let records = normalize(&coops_water_level_payload(), UnitSystem::Metric).unwrap();
        assert_eq!(records[2].value, None);
        assert_eq!(records[2].quality, QualityFlag::Missing);
    }

    #[test]
    fn test_coops_gmt_timestamps_are_utc() {
        let records = normalize(&coops_water_level_payload(), UnitSystem::Metric).unwrap();
        let expected = Utc.with_ymd_and_hms(2025, 4, 1, 13, 0, 0).unwrap();
        assert_eq!(records[0].timestamp, expected);
    }

    #[test]
    fn test_coops_temperature_is_celsius_in_both_systems() {
        let payload = RawPayload::Coops(CoopsPayload {
            station_id: "8454000".to_string(),
            product: "water_temperature".to_string(),
            points: vec![crate::ingest::coops::CoopsPoint {
                timestamp: "2025-04-01 13:00".to_string(),
                value: "18.4".to_string(),
                quality: None,
            }],
        });
        for system in [UnitSystem::English, UnitSystem::Metric] {
            let records = normalize(&payload, system).unwrap();
            assert_eq!(records[0].unit, "degC");
            assert_eq!(records[0].value, Some(18.4));
        }
    }

    #[test]
    fn test_coops_visibility_converts_to_nautical_miles() {
        let payload = RawPayload::Coops(CoopsPayload {
            station_id: "8454000".to_string(),
            product: "visibility".to_string(),
            points: vec![crate::ingest::coops::CoopsPoint {
                timestamp: "2025-04-01 13:00".to_string(),
                value: "10.0".to_string(),
                quality: None,
            }],
        });
        let english = normalize(&payload, UnitSystem::English).unwrap();
        assert_eq!(english[0].unit, "nmi");
        assert!((english[0].value.unwrap() - 5.39957).abs() < 1e-6);
        let metric = normalize(&payload, UnitSystem::Metric).unwrap();
        assert_eq!(metric[0].unit, "km");
        assert_eq!(metric[0].value, Some(10.0));
    }

    #[test]
    fn test_coops_salinity_and_humidity_pass_through() {
        for (product, raw, unit) in [("salinity", "31.2", "PSU"), ("humidity", "84", "percent")] {
            let payload = RawPayload::Coops(CoopsPayload {
                station_id: "8454000".to_string(),
                product: product.to_string(),
                points: vec![crate::ingest::coops::CoopsPoint {
                    timestamp: "2025-04-01 13:00".to_string(),
                    value: raw.to_string(),
                    quality: None,
                }],
            });
            for system in [UnitSystem::English, UnitSystem::Metric] {
                let records = normalize(&payload, system).unwrap();
                assert_eq!(records[0].unit, unit);
            }
        }
    }

    #[test]
    fn test_coops_predictions_use_water_level_units() {
        let payload = RawPayload::Coops(CoopsPayload {
            station_id: "8454000".to_string(),
            product: "predictions".to_string(),
            points: vec![crate::ingest::coops::CoopsPoint {
                timestamp: "2025-04-01 13:00".to_string(),
                value: "1.102".to_string(),
                quality: None,
            }],
        });
        let records = normalize(&payload, UnitSystem::English).unwrap();
        assert_eq!(records[0].unit, "ft");
        assert!((records[0].value.unwrap() - 1.102 * 3.28084).abs() < 1e-6);
    }

    // --- WQP ----------------------------------------------------------------

    #[test]
    fn test_wqp_local_timestamps_resolve_to_utc() {
        let records = normalize(&wqp_payload(), UnitSystem::Metric).unwrap();
        // 2024-06-10 10:30 CDT (UTC-5) == 15:30 UTC
        let expected = Utc.with_ymd_and_hms(2024, 6, 10, 15, 30, 0).unwrap();
        assert_eq!(records[0].timestamp, expected);
    }

    #[test]
    fn test_wqp_date_only_sample_is_midnight_utc() {
        let records = normalize(&wqp_payload(), UnitSystem::Metric).unwrap();
        let midnight = Utc.with_ymd_and_hms(2024, 6, 12, 0, 0, 0).unwrap();
        assert!(records.iter().any(|r| r.timestamp == midnight));
    }

    #[test]
    fn test_wqp_temperature_stays_celsius() {
        let records = normalize(&wqp_payload(), UnitSystem::English).unwrap();
        assert_eq!(records[0].unit, "degC");
        assert_eq!(records[0].value, Some(24.5));
        assert_eq!(records[0].quality, QualityFlag::Ok);
        assert!(records
            .iter()
            .any(|r| r.quality == QualityFlag::Provisional));
    }

    #[test]
    fn test_wqp_non_detect_becomes_missing_in_mg_per_l() {
        let records = normalize(&wqp_payload(), UnitSystem::Metric).unwrap();
        let nondetect = records.iter().find(|r| r.value.is_none()).unwrap();
        assert_eq!(nondetect.quality, QualityFlag::Missing);
        assert_eq!(nondetect.unit, "mg/L", "ug/l maps onto the mg/L canon");
    }

    #[test]
    fn test_wqp_micrograms_convert_to_milligrams() {
        let payload = parse_result_csv(
            "ActivityStartDate,ResultMeasureValue,ResultMeasure/MeasureUnitCode\n\
             2024-06-13,125,ug/l\n",
            "USGS-1",
            "Atrazine",
        )
        .unwrap();
        let records = normalize(&RawPayload::Wqp(payload), UnitSystem::Metric).unwrap();
        assert_eq!(records[0].unit, "mg/L");
        assert!((records[0].value.unwrap() - 0.125).abs() < 1e-12);
    }

    #[test]
    fn test_wqp_nondetect_without_unit_still_yields_missing_record() {
        // Non-detect rows routinely carry no unit code at all; the record
        // must survive with the characteristic's canonical unit.
        let payload = parse_result_csv(
            "ActivityStartDate,ResultMeasureValue,ResultMeasure/MeasureUnitCode,ResultDetectionConditionText\n\
             2024-06-13,,,Not Detected\n",
            "USGS-1",
            "Atrazine",
        )
        .unwrap();
        let records = normalize(&RawPayload::Wqp(payload), UnitSystem::Metric).unwrap();
        assert_eq!(records.len(), 1, "the non-detect row must not be dropped");
        assert_eq!(records[0].value, None);
        assert_eq!(records[0].quality, QualityFlag::Missing);
        assert_eq!(records[0].unit, "mg/L");
    }

    #[test]
    fn test_wqp_empty_value_without_unit_is_kept_as_missing() {
        let payload = parse_result_csv(
            "ActivityStartDate,ResultMeasureValue,ResultMeasure/MeasureUnitCode\n\
             2024-06-14,,\n",
            "USGS-1",
            "Temperature, water",
        )
        .unwrap();
        let records = normalize(&RawPayload::Wqp(payload), UnitSystem::English).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].quality, QualityFlag::Missing);
        assert_eq!(records[0].unit, "degC", "temperature canon applies even without a value");
    }

    #[test]
    fn test_wqp_unknown_unit_row_is_skipped_not_fatal() {
        let payload = parse_result_csv(
            "ActivityStartDate,ResultMeasureValue,ResultMeasure/MeasureUnitCode\n\
             2024-06-13,7.2,std units\n\
             2024-06-14,3.0,cubits\n",
            "USGS-1",
            "pH",
        )
        .unwrap();
        let records = normalize(&RawPayload::Wqp(payload), UnitSystem::Metric).unwrap();
        assert_eq!(records.len(), 1, "the cubits row is dropped");
        assert_eq!(records[0].value, Some(7.2));
    }

    // --- Idempotence --------------------------------------------------------

    #[test]
    fn test_normalization_is_deterministic() {
        let payload = nwis_payload(fixture_nwis_iv_json());
        let first = normalize(&payload, UnitSystem::Metric).unwrap();
        let second = normalize(&payload, UnitSystem::Metric).unwrap();
        assert_eq!(first, second);
    }
}
