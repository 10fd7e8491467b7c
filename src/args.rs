use std::{net::SocketAddr, path::PathBuf, time::Duration};

use clap::Parser;

pub const DEFAULT_SERVER_URL: &str = "https://speed.cloudflare.com";
pub const DEFAULT_DOWNLOAD_SIZE: u64 = 50 * 1024 * 1024;
pub const DEFAULT_UPLOAD_SIZE: u64 = 20 * 1024 * 1024;
pub const DEFAULT_TIMEOUT: &str = "5s";
pub const DEFAULT_CONCURRENT: usize = 4;
pub const DEFAULT_UNLOCK_CONCURRENT: usize = 5;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Benchmark proxy endpoints: latency, jitter, loss, throughput and streaming unlock", long_about = None)]
pub struct Args {
    /// Configuration sources, comma separated; local paths or http(s) links
    #[arg(short = 'c', long = "config", env = "PROXYBENCH_CONFIG")]
    pub config: String,

    /// Only test endpoints whose name matches this regex (e.g. 'HK|SG')
    #[arg(short = 'f', long = "filter", default_value = ".+", env = "PROXYBENCH_FILTER")]
    pub filter: String,

    /// Skip endpoints whose name contains any of these keywords, separated by '|'
    #[arg(short = 'b', long = "block", default_value = "", env = "PROXYBENCH_BLOCK")]
    pub block: String,

    /// Speed test server
    #[arg(long, default_value = DEFAULT_SERVER_URL, env = "PROXYBENCH_SERVER_URL")]
    pub server_url: String,

    /// Total bytes downloaded per endpoint
    #[arg(long, default_value_t = DEFAULT_DOWNLOAD_SIZE)]
    pub download_size: u64,

    /// Total bytes uploaded per endpoint
    #[arg(long, default_value_t = DEFAULT_UPLOAD_SIZE)]
    pub upload_size: u64,

    /// Per request timeout
    #[arg(long, default_value = DEFAULT_TIMEOUT, value_parser = humantime::parse_duration, env = "PROXYBENCH_TIMEOUT")]
    pub timeout: Duration,

    /// Parallel chunks used for download and upload
    #[arg(long, default_value_t = DEFAULT_CONCURRENT)]
    pub concurrent: usize,

    /// Write the endpoints that pass the filters to this YAML file
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Drop endpoints at or above this latency when writing --output (e.g. 800ms)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub max_latency: Option<Duration>,

    /// Drop endpoints below this download speed in MB/s when writing --output
    #[arg(long, default_value_t = 0.0)]
    pub min_speed: f64,

    /// Detect streaming unlock instead of measuring throughput
    #[arg(long, default_value_t = false)]
    pub unlock: bool,

    /// Parallel requests for unlock detection
    #[arg(long, default_value_t = DEFAULT_UNLOCK_CONCURRENT)]
    pub unlock_concurrent: usize,

    /// Add the IP risk score to the location (unlock mode only)
    #[arg(long, default_value_t = false)]
    pub risk: bool,

    /// Verbose output for blocking and unlock detection
    #[arg(long, default_value_t = false)]
    pub debug: bool,

    /// Write a live HTML report to this path
    #[arg(long)]
    pub html: Option<PathBuf>,

    /// Latency only
    #[arg(long, default_value_t = false)]
    pub fast: bool,

    /// Serve the live report on this address (e.g. 127.0.0.1:8080)
    #[arg(long, env = "PROXYBENCH_REPORT_ADDR")]
    pub report_addr: Option<SocketAddr>,

    /// Expose Prometheus metrics on this address
    #[arg(long, env = "PROXYBENCH_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}
