use std::{net::SocketAddr, path::PathBuf, time::Duration};

use regex::Regex;

use crate::{
    args::{
        Args, DEFAULT_CONCURRENT, DEFAULT_DOWNLOAD_SIZE, DEFAULT_SERVER_URL,
        DEFAULT_UNLOCK_CONCURRENT, DEFAULT_UPLOAD_SIZE,
    },
    error::{BenchError, Result},
};

/// Fallbacks applied when a size of zero is requested.
const FALLBACK_DOWNLOAD_SIZE: u64 = 100 * 1024 * 1024;
const FALLBACK_UPLOAD_SIZE: u64 = 10 * 1024 * 1024;

/// Which phases run after the latency probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Latency only.
    Fast,
    /// Location lookup plus streaming unlock detection, no throughput.
    Unlock { concurrency: usize, risk: bool },
    /// Download then upload.
    Full,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Fast => "fast",
            Mode::Unlock { .. } => "unlock",
            Mode::Full => "full",
        }
    }
}

/// Settings for benchmarking one endpoint. Immutable for the whole run.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub server_url: String,
    pub download_size: u64,
    pub upload_size: u64,
    pub timeout: Duration,
    pub concurrency: usize,
    pub mode: Mode,
    pub debug: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        BenchConfig {
            server_url: DEFAULT_SERVER_URL.to_string(),
            download_size: DEFAULT_DOWNLOAD_SIZE,
            upload_size: DEFAULT_UPLOAD_SIZE,
            timeout: Duration::from_secs(5),
            concurrency: DEFAULT_CONCURRENT,
            mode: Mode::Full,
            debug: false,
        }
    }
}

impl BenchConfig {
    pub fn normalized(mut self) -> Self {
        self.concurrency = self.concurrency.max(1);
        if self.download_size == 0 {
            self.download_size = FALLBACK_DOWNLOAD_SIZE;
        }
        if self.upload_size == 0 {
            self.upload_size = FALLBACK_UPLOAD_SIZE;
        }
        if let Mode::Unlock { concurrency, risk } = self.mode {
            self.mode = Mode::Unlock {
                concurrency: concurrency.max(1),
                risk,
            };
        }
        self.server_url = self.server_url.trim_end_matches('/').to_string();
        self
    }

    pub fn download_chunk_size(&self) -> u64 {
        self.download_size / self.concurrency.max(1) as u64
    }

    pub fn upload_chunk_size(&self) -> u64 {
        self.upload_size / self.concurrency.max(1) as u64
    }
}

/// Where endpoints come from and which of them to keep.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub locations: Vec<String>,
    pub filter: Regex,
    /// Lower-cased keywords; a name containing any of them is skipped.
    pub block: Vec<String>,
    pub debug: bool,
}

impl SourceConfig {
    pub fn new(locations: &str, filter: &str, block: &str) -> Result<Self> {
        let locations: Vec<String> = locations
            .split(',')
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        if locations.is_empty() {
            return Err(BenchError::ConfigError(
                "please specify the configuration file".into(),
            ));
        }

        Ok(SourceConfig {
            locations,
            filter: Regex::new(filter)?,
            block: parse_block_keywords(block),
            debug: false,
        })
    }
}

fn parse_block_keywords(block: &str) -> Vec<String> {
    block
        .split('|')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Thresholds for persisting endpoints to a filtered configuration file.
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    pub path: Option<PathBuf>,
    pub max_latency: Option<Duration>,
    /// MB/s; zero disables the check.
    pub min_speed: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ReportConfig {
    pub html: Option<PathBuf>,
    pub addr: Option<SocketAddr>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bench: BenchConfig,
    pub sources: SourceConfig,
    pub output: OutputConfig,
    pub report: ReportConfig,
    pub metrics_addr: Option<SocketAddr>,
}

impl TryFrom<Args> for AppConfig {
    type Error = BenchError;

    fn try_from(args: Args) -> Result<Self> {
        if args.debug && !args.unlock && args.block.trim().is_empty() {
            return Err(BenchError::ConfigError(
                "debug mode can only be used with unlock testing or blocking enabled"
                    .into(),
            ));
        }

        let mode = if args.fast {
            Mode::Fast
        } else if args.unlock {
            Mode::Unlock {
                concurrency: if args.unlock_concurrent == 0 {
                    DEFAULT_UNLOCK_CONCURRENT
                } else {
                    args.unlock_concurrent
                },
                risk: args.risk,
            }
        } else {
            Mode::Full
        };

        let bench = BenchConfig {
            server_url: args.server_url,
            download_size: args.download_size,
            upload_size: args.upload_size,
            timeout: args.timeout,
            concurrency: args.concurrent,
            mode,
            debug: args.debug,
        }
        .normalized();

        let mut sources = SourceConfig::new(&args.config, &args.filter, &args.block)?;
        sources.debug = args.debug;

        Ok(AppConfig {
            bench,
            sources,
            output: OutputConfig {
                path: args.output,
                max_latency: args.max_latency.filter(|d| !d.is_zero()),
                min_speed: args.min_speed.max(0.0),
            },
            report: ReportConfig {
                html: args.html,
                addr: args.report_addr,
            },
            metrics_addr: args.metrics_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn parse(argv: &[&str]) -> Result<AppConfig> {
        let mut full = vec!["proxybench"];
        full.extend_from_slice(argv);
        AppConfig::try_from(Args::parse_from(full))
    }

    #[test]
    fn defaults_follow_the_full_mode() {
        let config = parse(&["-c", "a.yaml, https://x/sub"]).unwrap();

        assert_eq!(config.sources.locations, vec!["a.yaml", "https://x/sub"]);
        assert_eq!(config.bench.mode, Mode::Full);
        assert_eq!(config.bench.concurrency, 4);
        assert_eq!(config.bench.timeout, Duration::from_secs(5));
        assert_eq!(
            config.bench.download_chunk_size(),
            crate::args::DEFAULT_DOWNLOAD_SIZE / 4
        );
    }

    #[test]
    fn fast_wins_over_unlock() {
        let config = parse(&["-c", "a.yaml", "--fast", "--unlock"]).unwrap();
        assert_eq!(config.bench.mode, Mode::Fast);
    }

    #[test]
    fn unlock_mode_carries_risk() {
        let config = parse(&["-c", "a.yaml", "--unlock", "--risk", "--unlock-concurrent", "0"])
            .unwrap();
        assert_eq!(
            config.bench.mode,
            Mode::Unlock { concurrency: 5, risk: true }
        );
    }

    #[test]
    fn debug_requires_unlock_or_block() {
        assert!(matches!(
            parse(&["-c", "a.yaml", "--debug"]),
            Err(BenchError::ConfigError(_))
        ));
        assert!(parse(&["-c", "a.yaml", "--debug", "-b", "trial|x0.5"]).is_ok());
    }

    #[test]
    fn zero_sizes_fall_back() {
        let config = parse(&[
            "-c", "a.yaml", "--concurrent", "0", "--download-size", "0", "--upload-size", "0",
            "--server-url", "http://127.0.0.1:9/",
        ])
        .unwrap();

        assert_eq!(config.bench.concurrency, 1);
        assert_eq!(config.bench.download_size, FALLBACK_DOWNLOAD_SIZE);
        assert_eq!(config.bench.upload_size, FALLBACK_UPLOAD_SIZE);
        assert_eq!(config.bench.server_url, "http://127.0.0.1:9");
    }

    #[test]
    fn block_keywords_are_lowercased() {
        let sources = SourceConfig::new("a.yaml", ".+", " Trial | X1 ||").unwrap();
        assert_eq!(sources.block, vec!["trial", "x1"]);
    }

    #[test]
    fn invalid_filter_is_rejected() {
        assert!(matches!(
            SourceConfig::new("a.yaml", "(", ""),
            Err(BenchError::RegexError(_))
        ));
    }
}
