use std::sync::Arc;

use futures::future::join_all;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::models::{Throughput, ThroughputSample};

use super::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Download,
    Upload,
}

/// One download chunk; `None` on any transport failure.
pub async fn download_chunk(
    transport: &dyn Transport,
    bytes: u64,
) -> Option<ThroughputSample> {
    let start = Instant::now();
    match transport.download(bytes).await {
        Ok(received) => Some(ThroughputSample {
            bytes: received,
            elapsed: start.elapsed(),
        }),
        Err(e) => {
            debug!(bytes, error = %e, "download chunk failed");
            None
        }
    }
}

/// One upload chunk; elapsed runs until the response arrives.
pub async fn upload_chunk(
    transport: &dyn Transport,
    bytes: u64,
) -> Option<ThroughputSample> {
    let start = Instant::now();
    match transport.upload(bytes).await {
        Ok(written) => Some(ThroughputSample {
            bytes: written,
            elapsed: start.elapsed(),
        }),
        Err(e) => {
            debug!(bytes, error = %e, "upload chunk failed");
            None
        }
    }
}

/// Runs `concurrency` chunks of `chunk_size` bytes as parallel tasks and
/// waits for all of them. Each task hands its sample back; the summation
/// happens here once every task has finished.
pub async fn run(
    transport: &Arc<dyn Transport>,
    direction: Direction,
    chunk_size: u64,
    concurrency: usize,
) -> Option<Throughput> {
    let tasks = (0..concurrency.max(1)).map(|_| {
        let transport = Arc::clone(transport);
        tokio::spawn(async move {
            match direction {
                Direction::Download => {
                    download_chunk(transport.as_ref(), chunk_size).await
                }
                Direction::Upload => {
                    upload_chunk(transport.as_ref(), chunk_size).await
                }
            }
        })
    });

    let samples: Vec<ThroughputSample> = join_all(tasks)
        .await
        .into_iter()
        .filter_map(|joined| match joined {
            Ok(sample) => sample,
            Err(e) => {
                warn!(?direction, error = %e, "chunk task aborted");
                None
            }
        })
        .collect();

    debug!(
        ?direction,
        succeeded = samples.len(),
        attempted = concurrency,
        "chunks finished"
    );
    Throughput::aggregate(&samples)
}
