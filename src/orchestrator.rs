/// Concurrent fetch orchestration: bounded worker pools feeding one
/// result channel.
///
/// Each provider gets its own pool sized by configuration, so a slow
/// provider cannot starve the others, and its own rate limiter shared by
/// that pool's workers. Workers resolve one task each: acquire a limiter
/// token, call the provider through the retry policy, normalize, and send
/// exactly one `FetchResult` down the channel. Cancellation is checked
/// before a task issues its first request; tasks already in flight run to
/// completion.

use crate::ingest::ProviderClient;
use crate::limiter::RateLimiter;
use crate::model::{
    AcquireError, CancelToken, DateRange, FetchOutcome, FetchResult, FetchTask, ProgressEvent,
    ProgressKind, Station, UnitSystem,
};
use crate::normalize;
use crate::retry::RetryPolicy;
use std::sync::mpsc;
use std::sync::Arc;
use threadpool::ThreadPool;

/// Everything one provider needs to participate in a run.
pub struct ProviderRuntime {
    pub client: Arc<dyn ProviderClient>,
    pub limiter: Arc<RateLimiter>,
    /// Worker pool size for this provider.
    pub workers: usize,
    /// Stations retained by discovery, already boundary-filtered.
    pub stations: Vec<Arc<Station>>,
    /// Parameter codes requested for this provider.
    pub parameter_codes: Vec<String>,
}

pub struct FetchOrchestrator {
    pub retry: RetryPolicy,
    pub unit_system: UnitSystem,
}

impl FetchOrchestrator {
    pub fn new(retry: RetryPolicy, unit_system: UnitSystem) -> Self {
        Self { retry, unit_system }
    }

    /// Expands stations × parameters into tasks. A task is only created
    /// for parameters the station actually advertises.
    fn build_tasks(runtime: &ProviderRuntime, range: DateRange) -> Vec<FetchTask> {
        let mut tasks = Vec::new();
        for station in &runtime.stations {
            for code in &runtime.parameter_codes {
                if station.parameter_codes.iter().any(|c| c == code) {
                    tasks.push(FetchTask {
                        station: Arc::clone(station),
                        parameter_code: code.clone(),
                        range,
                    });
                }
            }
        }
        tasks
    }

    /// Runs every task across all providers and drains the shared channel
    /// until each task has produced exactly one result. Always returns the
    /// full result set, cancelled or not.
    pub fn execute(
        &self,
        providers: &[ProviderRuntime],
        range: DateRange,
        cancel: &CancelToken,
        progress: Option<mpsc::Sender<ProgressEvent>>,
    ) -> Vec<FetchResult> {
        let (tx, rx) = mpsc::channel::<FetchResult>();
        let mut pools = Vec::new();
        let mut task_total = 0usize;

        for runtime in providers {
            let tasks = Self::build_tasks(runtime, range);
            task_total += tasks.len();
            tracing::info!(
                provider = %runtime.client.provider(),
                tasks = tasks.len(),
                workers = runtime.workers,
                "dispatching fetch tasks"
            );

            let pool = ThreadPool::new(runtime.workers.max(1));
            for task in tasks {
                let tx = tx.clone();
                let client = Arc::clone(&runtime.client);
                let limiter = Arc::clone(&runtime.limiter);
                let cancel = cancel.clone();
                let retry = self.retry;
                let unit_system = self.unit_system;

                pool.execute(move || {
                    let result = resolve_task(
                        &*client,
                        &limiter,
                        &retry,
                        unit_system,
                        &cancel,
                        task,
                    );
                    // Receiver outlives all workers; a send failure means
                    // the run was torn down and the result has no consumer.
                    let _ = tx.send(result);
                });
            }
            pools.push(pool);
        }
        drop(tx);

        let mut results = Vec::with_capacity(task_total);
        for result in rx {
            if let Some(progress) = &progress {
                let _ = progress.send(progress_event(&result));
            }
            results.push(result);
        }
        for pool in pools {
            pool.join();
        }
        results
    }
}

/// Resolves one task to its terminal outcome.
fn resolve_task(
    client: &dyn ProviderClient,
    limiter: &RateLimiter,
    retry: &RetryPolicy,
    unit_system: UnitSystem,
    cancel: &CancelToken,
    task: FetchTask,
) -> FetchResult {
    let (fetched, attempts) = retry.run(cancel, || {
        // Every attempt pays for a token, so retries are paced too.
        limiter.acquire();
        client.fetch_observations(&task.station, &task.parameter_code, &task.range)
    });

    let outcome = match fetched {
        Ok(payload) => match normalize::normalize(&payload, unit_system) {
            Ok(records) => FetchOutcome::Success(records),
            Err(err) => FetchOutcome::Failed(err),
        },
        // No data in range resolves successfully with an empty series.
        Err(AcquireError::NotFound) => FetchOutcome::Success(Vec::new()),
        Err(AcquireError::Cancelled) if attempts == 0 => FetchOutcome::Skipped,
        Err(err) => FetchOutcome::Failed(err),
    };

    if let FetchOutcome::Failed(err) = &outcome {
        tracing::warn!(
            provider = %client.provider(),
            station = %task.station.id,
            parameter = %task.parameter_code,
            attempts,
            error = %err,
            "fetch task failed"
        );
    }

    FetchResult {
        task,
        outcome,
        attempts,
    }
}

fn progress_event(result: &FetchResult) -> ProgressEvent {
    let kind = match &result.outcome {
        FetchOutcome::Success(records) => ProgressKind::Succeeded {
            records: records.len(),
        },
        FetchOutcome::Failed(err) => ProgressKind::Failed {
            reason: err.to_string(),
        },
        FetchOutcome::Skipped => ProgressKind::Skipped,
    };
    ProgressEvent {
        provider: result.task.station.provider,
        station_id: result.task.station.id.clone(),
        parameter_code: result.task.parameter_code.clone(),
        kind,
        at: chrono::Utc::now(),
    }
}
