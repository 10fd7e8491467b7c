use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::debug;

use crate::models::LatencyStats;

use super::transport::Transport;

pub const PROBE_COUNT: usize = 6;
pub const PROBE_INTERVAL: Duration = Duration::from_millis(100);

/// Issues a fixed number of sequential zero byte probes. A failed probe is
/// counted as lost and never retried.
#[derive(Debug, Clone, Copy)]
pub struct LatencySampler {
    probes: usize,
    interval: Duration,
}

impl Default for LatencySampler {
    fn default() -> Self {
        Self {
            probes: PROBE_COUNT,
            interval: PROBE_INTERVAL,
        }
    }
}

impl LatencySampler {
    pub async fn sample(&self, transport: &dyn Transport) -> LatencyStats {
        let mut samples = Vec::with_capacity(self.probes);

        for attempt in 0..self.probes {
            time::sleep(self.interval).await;

            let start = Instant::now();
            match transport.probe().await {
                Ok(()) => samples.push(start.elapsed()),
                Err(e) => {
                    metrics::counter!("proxybench_probe_failures_total").increment(1);
                    debug!(attempt, error = %e, "latency probe failed");
                }
            }
        }

        LatencyStats::from_samples(&samples, self.probes)
    }
}
