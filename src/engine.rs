/// Engine assembly: wires configuration into clients, discovery, the
/// orchestrator, and aggregation for one acquisition run.
///
/// Construction validates everything that can fail before the network is
/// touched: the unit mapping table, the boundary polygon, and the HTTP
/// transport. `run` then performs discovery per enabled provider, executes
/// every fetch task, and folds results into a `RunOutput`. A provider whose
/// discovery fails contributes no tasks and marks the run partial; the
/// other providers proceed.

use crate::aggregate::{ResultAggregator, RunOutput};
use crate::config::RunConfig;
use crate::discovery::{self, DiscoveryReport};
use crate::geometry::BoundaryPolygon;
use crate::ingest::coops::{CoopsClient, CoopsRequestSettings};
use crate::ingest::nwis::NwisClient;
use crate::ingest::wqp::{WqpClient, WqpSearchFilters};
use crate::ingest::{HttpTransport, ProviderClient};
use crate::limiter::RateLimiter;
use crate::model::{AcquireError, CancelToken, ProgressEvent, ProviderId};
use crate::normalize;
use crate::orchestrator::{FetchOrchestrator, ProviderRuntime};
use std::sync::mpsc;
use std::sync::Arc;

/// What discovery found (or why it failed) for one provider.
#[derive(Debug, Clone)]
pub struct DiscoveryNote {
    pub provider: ProviderId,
    pub stations: usize,
    pub missing_coordinates: usize,
    pub error: Option<String>,
}

/// A finished run: the aggregated output plus per-provider discovery notes.
#[derive(Debug)]
pub struct EngineReport {
    pub output: RunOutput,
    pub discovery: Vec<DiscoveryNote>,
}

pub struct Engine {
    config: RunConfig,
    boundary: BoundaryPolygon,
    transport: Arc<HttpTransport>,
}

impl Engine {
    pub fn new(config: RunConfig) -> Result<Self, AcquireError> {
        // A defective mapping table should stop a deployment, not a task.
        normalize::validate_mappings()?;
        let boundary = BoundaryPolygon::new(config.boundary_vertices())?;
        let transport = Arc::new(HttpTransport::new(config.request_timeout())?);
        Ok(Self {
            config,
            boundary,
            transport,
        })
    }

    /// One provider's client plus its requested parameter codes and limits.
    fn provider_setups(&self) -> Vec<(Arc<dyn ProviderClient>, Vec<String>, f64, u32)> {
        let mut setups: Vec<(Arc<dyn ProviderClient>, Vec<String>, f64, u32)> = Vec::new();
        let bbox = self.boundary.bounding_box();

        if self.config.nwis.enabled {
            setups.push((
                Arc::new(NwisClient::new(
                    Arc::clone(&self.transport),
                    bbox,
                    self.config.nwis.service,
                )),
                self.config.nwis.parameters.clone(),
                self.config.nwis.rate_per_sec,
                self.config.nwis.burst,
            ));
        }
        if self.config.coops.enabled {
            let settings = CoopsRequestSettings {
                datum: self.config.coops.datum.clone(),
                interval: self.config.coops.interval.clone(),
            };
            setups.push((
                Arc::new(CoopsClient::new(Arc::clone(&self.transport), settings)),
                self.config.coops.products.clone(),
                self.config.coops.rate_per_sec,
                self.config.coops.burst,
            ));
        }
        if self.config.wqp.enabled {
            let filters = WqpSearchFilters {
                site_types: self.config.wqp.site_types.clone(),
                sample_media: self.config.wqp.sample_media.clone(),
                providers: self.config.wqp.providers.clone(),
            };
            setups.push((
                Arc::new(WqpClient::new(
                    Arc::clone(&self.transport),
                    bbox,
                    filters,
                    self.config.date_range(),
                )),
                self.config.wqp.characteristics.clone(),
                self.config.wqp.rate_per_sec,
                self.config.wqp.burst,
            ));
        }
        setups
    }

    pub fn run(
        &self,
        cancel: &CancelToken,
        progress: Option<mpsc::Sender<ProgressEvent>>,
    ) -> EngineReport {
        let mut notes = Vec::new();
        let mut runtimes = Vec::new();

        for (client, parameter_codes, rate, burst) in self.provider_setups() {
            if cancel.is_cancelled() {
                notes.push(DiscoveryNote {
                    provider: client.provider(),
                    stations: 0,
                    missing_coordinates: 0,
                    error: Some(AcquireError::Cancelled.to_string()),
                });
                continue;
            }
            match discovery::discover(&*client, &self.boundary, &parameter_codes) {
                Ok(DiscoveryReport {
                    stations,
                    missing_coordinates,
                }) => {
                    notes.push(DiscoveryNote {
                        provider: client.provider(),
                        stations: stations.len(),
                        missing_coordinates,
                        error: None,
                    });
                    runtimes.push(ProviderRuntime {
                        client,
                        limiter: Arc::new(RateLimiter::new(rate, burst)),
                        workers: self.config.limits.workers_per_provider,
                        stations,
                        parameter_codes,
                    });
                }
                Err(err) => {
                    tracing::error!(
                        provider = %client.provider(),
                        error = %err,
                        "station discovery failed, provider contributes nothing"
                    );
                    notes.push(DiscoveryNote {
                        provider: client.provider(),
                        stations: 0,
                        missing_coordinates: 0,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        let orchestrator =
            FetchOrchestrator::new(self.config.retry_policy(), self.config.run.units);
        let results = orchestrator.execute(&runtimes, self.config.date_range(), cancel, progress);

        let mut aggregator = ResultAggregator::new();
        for result in results {
            aggregator.push(result);
        }
        if cancel.is_cancelled() {
            aggregator.mark_cancelled();
        }

        let mut output = aggregator.finalize();
        if notes.iter().any(|n| n.error.is_some()) {
            output.summary.partial = true;
        }

        tracing::info!(
            attempted = output.summary.attempted,
            succeeded = output.summary.succeeded,
            failed = output.summary.failed,
            skipped = output.summary.skipped,
            records = output.summary.total_records,
            partial = output.summary.partial,
            "acquisition run complete"
        );
        EngineReport {
            output,
            discovery: notes,
        }
    }
}
