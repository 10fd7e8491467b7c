use std::{sync::Arc, time::Duration};

use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::{
    config::{BenchConfig, Mode},
    models::{BenchResult, Endpoint, LatencyStats, Outcome},
    unlock::{LocationLookup, UnlockProber},
};

use super::{
    latency::LatencySampler,
    throughput::{self, Direction},
    transport::{Transport, TransportFactory},
};

/// Upper bound for the location lookup; the per-request timeout caps it
/// further when shorter.
pub const LOCATION_TIMEOUT: Duration = Duration::from_secs(3);

/// Where an endpoint goes once its latency is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    FastModeDone,
    Unreachable,
    Unlock { concurrency: usize, risk: bool },
    Throughput,
}

impl Phase {
    pub fn after_latency(mode: Mode, stats: &LatencyStats) -> Phase {
        match mode {
            Mode::Fast => Phase::FastModeDone,
            _ if !stats.is_reachable() => Phase::Unreachable,
            Mode::Unlock { concurrency, risk } => Phase::Unlock { concurrency, risk },
            Mode::Full => Phase::Throughput,
        }
    }
}

/// Benchmarks one endpoint: latency first, then unlock detection or
/// throughput depending on the mode. Never fails; problems end up as
/// empty fields in the result.
pub struct Orchestrator {
    config: Arc<BenchConfig>,
    factory: Arc<dyn TransportFactory>,
    sampler: LatencySampler,
    prober: Arc<dyn UnlockProber>,
    locator: Arc<dyn LocationLookup>,
}

impl Orchestrator {
    pub fn new(
        config: Arc<BenchConfig>,
        factory: Arc<dyn TransportFactory>,
        prober: Arc<dyn UnlockProber>,
        locator: Arc<dyn LocationLookup>,
    ) -> Self {
        Self {
            config,
            factory,
            sampler: LatencySampler::default(),
            prober,
            locator,
        }
    }

    #[instrument(skip_all, fields(endpoint = %endpoint.name))]
    pub async fn benchmark(&self, endpoint: &Endpoint) -> BenchResult {
        let (stats, transport) = match self.factory.connect(endpoint) {
            Ok(transport) => (self.sampler.sample(transport.as_ref()).await, Some(transport)),
            Err(e) => {
                warn!(error = %e, "cannot build a client for endpoint");
                (LatencyStats::unreachable(), None)
            }
        };
        debug!(?stats, "latency measured");

        let outcome = match (Phase::after_latency(self.config.mode, &stats), transport) {
            (Phase::FastModeDone, _) => Outcome::LatencyOnly {
                latency: stats.latency,
            },
            (Phase::Unlock { concurrency, risk }, Some(transport)) => {
                self.unlock_phase(stats, transport.as_ref(), concurrency, risk)
                    .await
            }
            (Phase::Throughput, Some(transport)) => {
                self.throughput_phase(stats, &transport).await
            }
            _ => Outcome::Unreachable(stats),
        };

        record_metrics(&stats, &outcome);

        BenchResult {
            name: endpoint.name.clone(),
            protocol: endpoint.protocol().to_string(),
            raw: endpoint.raw.clone(),
            outcome,
        }
    }

    async fn unlock_phase(
        &self,
        stats: LatencyStats,
        transport: &dyn Transport,
        concurrency: usize,
        risk: bool,
    ) -> Outcome {
        let deadline = Instant::now() + LOCATION_TIMEOUT.min(self.config.timeout);
        let client = transport.http();

        let (location, unlock) = tokio::join!(
            self.locator.locate(client, risk, deadline),
            self.prober.probe(client, concurrency, self.config.debug),
        );
        if location.is_none() {
            debug!("location unavailable");
        }

        Outcome::Unlocked {
            stats,
            location,
            unlock,
        }
    }

    async fn throughput_phase(
        &self,
        stats: LatencyStats,
        transport: &Arc<dyn Transport>,
    ) -> Outcome {
        let concurrency = self.config.concurrency;

        let download = throughput::run(
            transport,
            Direction::Download,
            self.config.download_chunk_size(),
            concurrency,
        )
        .await;
        let upload = throughput::run(
            transport,
            Direction::Upload,
            self.config.upload_chunk_size(),
            concurrency,
        )
        .await;

        Outcome::FullThroughput {
            stats,
            download,
            upload,
        }
    }
}

fn record_metrics(stats: &LatencyStats, outcome: &Outcome) {
    metrics::counter!("proxybench_endpoints_total", "outcome" => outcome.label())
        .increment(1);
    if !stats.latency.is_zero() {
        metrics::histogram!("proxybench_latency_ms")
            .record(stats.latency.as_secs_f64() * 1000.0);
    }
    if let Outcome::FullThroughput {
        download, upload, ..
    } = outcome
    {
        if let Some(download) = download {
            metrics::histogram!("proxybench_download_bytes_per_sec").record(download.speed);
        }
        if let Some(upload) = upload {
            metrics::histogram!("proxybench_upload_bytes_per_sec").record(upload.speed);
        }
    }
}
