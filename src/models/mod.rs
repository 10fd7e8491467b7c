pub mod endpoint;
pub mod result;

pub use endpoint::{Endpoint, EndpointSet, RawConfig};
pub use result::{
    format_speed, BenchResult, LatencyStats, Outcome, Throughput,
    ThroughputSample, NOT_AVAILABLE,
};
