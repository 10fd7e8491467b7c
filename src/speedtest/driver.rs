use tracing::info;

use crate::models::{BenchResult, EndpointSet};

use super::orchestrator::Orchestrator;

/// Benchmarks endpoints one at a time, in set order, handing each result
/// to the sink as soon as it is complete.
pub struct Driver {
    orchestrator: Orchestrator,
}

impl Driver {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }

    /// Returns the number of results emitted, always `endpoints.len()`.
    pub async fn run<F>(&self, endpoints: &EndpointSet, mut on_result: F) -> usize
    where
        F: FnMut(BenchResult),
    {
        let total = endpoints.len();
        let mut emitted = 0;

        for endpoint in endpoints {
            let result = self.orchestrator.benchmark(endpoint).await;
            emitted += 1;
            info!(
                "[{}/{}] {} latency {}",
                emitted,
                total,
                result.name,
                result.format_latency()
            );
            on_result(result);
        }

        emitted
    }
}
