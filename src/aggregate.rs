/// Result aggregation: folds per-task results into the run output.
///
/// The aggregator tolerates partial runs by construction — every pushed
/// result lands in exactly one of succeeded/failed/skipped, and `finalize`
/// always yields a complete, consumable `RunOutput` whatever mix arrived.

use crate::model::{FetchOutcome, FetchResult, ObservationRecord, RunSummary, TaskFailure};
use std::collections::BTreeMap;
use std::time::Instant;

/// Completed run: the accounting plus the combined series keyed by
/// parameter code, each merging every successful station's records.
/// Series are ordered by (timestamp, station id) so output is
/// deterministic for a given set of results.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub summary: RunSummary,
    pub series: BTreeMap<String, Vec<ObservationRecord>>,
}

pub struct ResultAggregator {
    started: Instant,
    summary: RunSummary,
    series: BTreeMap<String, Vec<ObservationRecord>>,
    cancelled: bool,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            summary: RunSummary::default(),
            series: BTreeMap::new(),
            cancelled: false,
        }
    }

    /// Marks the run as cancelled; the summary then reports partial even
    /// if every issued task happened to succeed.
    pub fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    pub fn push(&mut self, result: FetchResult) {
        let provider = result.task.station.provider;
        let counts = self.summary.per_provider.entry(provider).or_default();

        match result.outcome {
            FetchOutcome::Success(records) => {
                self.summary.attempted += 1;
                self.summary.succeeded += 1;
                counts.attempted += 1;
                counts.succeeded += 1;
                self.summary.total_records += records.len();
                if !records.is_empty() {
                    self.series
                        .entry(result.task.parameter_code.clone())
                        .or_default()
                        .extend(records);
                }
            }
            FetchOutcome::Failed(err) => {
                self.summary.attempted += 1;
                self.summary.failed += 1;
                counts.attempted += 1;
                counts.failed += 1;
                self.summary.failures.push(TaskFailure {
                    provider,
                    station_id: result.task.station.id.clone(),
                    parameter_code: result.task.parameter_code.clone(),
                    reason: err.to_string(),
                });
            }
            FetchOutcome::Skipped => {
                self.summary.skipped += 1;
                counts.skipped += 1;
            }
        }
    }

    pub fn finalize(mut self) -> RunOutput {
        for records in self.series.values_mut() {
            records.sort_by(|a, b| {
                a.timestamp
                    .cmp(&b.timestamp)
                    .then_with(|| a.station_id.cmp(&b.station_id))
            });
        }
        self.summary.elapsed = self.started.elapsed();
        self.summary.partial = self.cancelled || self.summary.skipped > 0 || self.summary.failed > 0;
        RunOutput {
            summary: self.summary,
            series: self.series,
        }
    }
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AcquireError, DateRange, FetchTask, ProviderId, QualityFlag, Station, TaskCounts,
    };
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::sync::Arc;

    fn task(provider: ProviderId, station_id: &str) -> FetchTask {
        FetchTask {
            station: Arc::new(Station {
                provider,
                id: station_id.to_string(),
                name: String::new(),
                latitude: Some(40.0),
                longitude: Some(-89.0),
                parameter_codes: vec!["00060".to_string()],
            }),
            parameter_code: "00060".to_string(),
            range: DateRange::new(
                NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(),
            ),
        }
    }

    fn record(station_id: &str, hour: u32) -> ObservationRecord {
        ObservationRecord {
            station_id: station_id.to_string(),
            parameter_code: "00060".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap(),
            value: Some(1000.0),
            unit: "cfs",
            quality: QualityFlag::Ok,
        }
    }

    fn success(provider: ProviderId, station_id: &str, records: Vec<ObservationRecord>) -> FetchResult {
        FetchResult {
            task: task(provider, station_id),
            outcome: FetchOutcome::Success(records),
            attempts: 1,
        }
    }

    #[test]
    fn test_counts_reconcile() {
        let mut agg = ResultAggregator::new();
        agg.push(success(ProviderId::Nwis, "a", vec![record("a", 1)]));
        agg.push(success(ProviderId::Nwis, "b", Vec::new()));
        agg.push(FetchResult {
            task: task(ProviderId::Coops, "c"),
            outcome: FetchOutcome::Failed(AcquireError::Server(503)),
            attempts: 3,
        });
        agg.push(FetchResult {
            task: task(ProviderId::Wqp, "d"),
            outcome: FetchOutcome::Skipped,
            attempts: 0,
        });

        let output = agg.finalize();
        let s = &output.summary;
        assert_eq!(s.attempted, 3);
        assert_eq!(s.succeeded, 2);
        assert_eq!(s.failed, 1);
        assert_eq!(s.skipped, 1);
        assert_eq!(s.attempted, s.succeeded + s.failed, "skips are not attempts");
        assert_eq!(s.total_records, 1);
    }

    #[test]
    fn test_per_provider_counters() {
        let mut agg = ResultAggregator::new();
        agg.push(success(ProviderId::Nwis, "a", vec![record("a", 1)]));
        agg.push(FetchResult {
            task: task(ProviderId::Coops, "c"),
            outcome: FetchOutcome::Failed(AcquireError::NotFound),
            attempts: 1,
        });

        let output = agg.finalize();
        assert_eq!(
            output.summary.per_provider[&ProviderId::Nwis],
            TaskCounts {
                attempted: 1,
                succeeded: 1,
                failed: 0,
                skipped: 0
            }
        );
        assert_eq!(output.summary.per_provider[&ProviderId::Coops].failed, 1);
    }

    #[test]
    fn test_failures_are_listed_with_reasons() {
        let mut agg = ResultAggregator::new();
        agg.push(FetchResult {
            task: task(ProviderId::Nwis, "broken"),
            outcome: FetchOutcome::Failed(AcquireError::Schema("missing siteCode".to_string())),
            attempts: 1,
        });
        let output = agg.finalize();
        assert_eq!(output.summary.failures.len(), 1);
        let failure = &output.summary.failures[0];
        assert_eq!(failure.station_id, "broken");
        assert!(failure.reason.contains("missing siteCode"));
    }

    #[test]
    fn test_series_merge_stations_per_parameter() {
        let mut agg = ResultAggregator::new();
        // Two stations' tasks for the same parameter arrive out of order.
        agg.push(success(ProviderId::Nwis, "b", vec![record("b", 5), record("b", 3)]));
        agg.push(success(ProviderId::Nwis, "a", vec![record("a", 3), record("a", 1)]));

        let output = agg.finalize();
        assert_eq!(output.series.len(), 1, "one combined series per parameter");
        let series = &output.series["00060"];
        assert_eq!(series.len(), 4);
        for pair in series.windows(2) {
            assert!(
                (pair[0].timestamp, &pair[0].station_id)
                    <= (pair[1].timestamp, &pair[1].station_id),
                "ordered by timestamp, then station id"
            );
        }
        // Equal timestamps (hour 3) resolve by station id.
        let hour3: Vec<&str> = series
            .iter()
            .filter(|r| r.timestamp.format("%H").to_string() == "03")
            .map(|r| r.station_id.as_str())
            .collect();
        assert_eq!(hour3, vec!["a", "b"]);
    }

    #[test]
    fn test_clean_run_is_not_partial() {
        let mut agg = ResultAggregator::new();
        agg.push(success(ProviderId::Nwis, "a", vec![record("a", 1)]));
        assert!(!agg.finalize().summary.partial);
    }

    #[test]
    fn test_failed_or_skipped_tasks_mark_run_partial() {
        let mut agg = ResultAggregator::new();
        agg.push(success(ProviderId::Nwis, "a", vec![record("a", 1)]));
        agg.push(FetchResult {
            task: task(ProviderId::Nwis, "b"),
            outcome: FetchOutcome::Skipped,
            attempts: 0,
        });
        assert!(agg.finalize().summary.partial);
    }

    #[test]
    fn test_cancellation_marks_run_partial_even_if_all_succeeded() {
        let mut agg = ResultAggregator::new();
        agg.push(success(ProviderId::Nwis, "a", vec![record("a", 1)]));
        agg.mark_cancelled();
        assert!(agg.finalize().summary.partial);
    }

    #[test]
    fn test_empty_run_finalizes_cleanly() {
        let output = ResultAggregator::new().finalize();
        assert_eq!(output.summary.attempted, 0);
        assert!(output.series.is_empty());
        assert!(!output.summary.partial);
    }
}
