pub mod driver;
pub mod latency;
pub mod orchestrator;
pub mod throughput;
pub mod transport;

pub use driver::Driver;
pub use latency::LatencySampler;
pub use orchestrator::{Orchestrator, Phase};
pub use transport::{HttpTransportFactory, Transport, TransportFactory};
