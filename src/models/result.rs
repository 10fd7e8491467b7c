use std::time::Duration;

use super::endpoint::RawConfig;

/// Latency, jitter and loss over one round of probes.
///
/// A zero `latency` means no probe succeeded; that endpoint is treated as
/// unreachable everywhere downstream.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LatencyStats {
    pub latency: Duration,
    pub jitter: Duration,
    /// Percentage in `0.0..=100.0`.
    pub packet_loss: f64,
}

impl LatencyStats {
    pub fn unreachable() -> Self {
        Self {
            latency: Duration::ZERO,
            jitter: Duration::ZERO,
            packet_loss: 100.0,
        }
    }

    /// Builds the statistics from the durations of the successful probes
    /// out of `total` issued. Jitter is the population standard deviation.
    pub fn from_samples(samples: &[Duration], total: usize) -> Self {
        if samples.is_empty() || total == 0 {
            return Self::unreachable();
        }

        let failed = total.saturating_sub(samples.len());
        let packet_loss = failed as f64 / total as f64 * 100.0;

        let sum: Duration = samples.iter().sum();
        let latency = sum / samples.len() as u32;

        let mean = latency.as_nanos() as f64;
        let variance = samples
            .iter()
            .map(|sample| {
                let diff = sample.as_nanos() as f64 - mean;
                diff * diff
            })
            .sum::<f64>()
            / samples.len() as f64;

        Self {
            latency,
            jitter: Duration::from_nanos(variance.sqrt() as u64),
            packet_loss,
        }
    }

    pub fn is_reachable(&self) -> bool {
        !self.latency.is_zero() && self.packet_loss < 100.0
    }
}

/// One chunk of a download or upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThroughputSample {
    pub bytes: u64,
    pub elapsed: Duration,
}

/// Aggregate of the successful chunks in one direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throughput {
    pub bytes: u64,
    /// Average per-chunk duration.
    pub elapsed: Duration,
    /// Bytes per second.
    pub speed: f64,
}

impl Throughput {
    /// `None` when no chunk succeeded.
    pub fn aggregate<'a, I>(samples: I) -> Option<Throughput>
    where
        I: IntoIterator<Item = &'a ThroughputSample>,
    {
        let mut bytes = 0u64;
        let mut total = Duration::ZERO;
        let mut count = 0u32;
        for sample in samples {
            bytes += sample.bytes;
            total += sample.elapsed;
            count += 1;
        }

        if count == 0 {
            return None;
        }

        let elapsed = total / count;
        let speed = if elapsed.is_zero() {
            0.0
        } else {
            bytes as f64 / elapsed.as_secs_f64()
        };

        Some(Throughput {
            bytes,
            elapsed,
            speed,
        })
    }
}

/// What was measured for an endpoint. Each variant only carries the fields
/// that were actually computed in that mode.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Fast mode: latency only, whether or not the endpoint answered.
    LatencyOnly { latency: Duration },
    /// Every probe failed; nothing beyond latency was attempted.
    Unreachable(LatencyStats),
    Unlocked {
        stats: LatencyStats,
        location: Option<String>,
        unlock: String,
    },
    FullThroughput {
        stats: LatencyStats,
        download: Option<Throughput>,
        upload: Option<Throughput>,
    },
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::LatencyOnly { .. } => "latency_only",
            Outcome::Unreachable(_) => "unreachable",
            Outcome::Unlocked { .. } => "unlocked",
            Outcome::FullThroughput { .. } => "full_throughput",
        }
    }
}

/// One row of output per endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchResult {
    pub name: String,
    pub protocol: String,
    pub raw: RawConfig,
    pub outcome: Outcome,
}

impl BenchResult {
    pub fn latency(&self) -> Duration {
        match &self.outcome {
            Outcome::LatencyOnly { latency } => *latency,
            Outcome::Unreachable(stats)
            | Outcome::Unlocked { stats, .. }
            | Outcome::FullThroughput { stats, .. } => stats.latency,
        }
    }

    /// `None` in fast mode, where jitter and loss are never reported.
    pub fn stats(&self) -> Option<&LatencyStats> {
        match &self.outcome {
            Outcome::LatencyOnly { .. } => None,
            Outcome::Unreachable(stats)
            | Outcome::Unlocked { stats, .. }
            | Outcome::FullThroughput { stats, .. } => Some(stats),
        }
    }

    pub fn is_reachable(&self) -> bool {
        match &self.outcome {
            Outcome::LatencyOnly { latency } => !latency.is_zero(),
            Outcome::Unreachable(_) => false,
            Outcome::Unlocked { stats, .. }
            | Outcome::FullThroughput { stats, .. } => stats.is_reachable(),
        }
    }

    pub fn download(&self) -> Option<&Throughput> {
        match &self.outcome {
            Outcome::FullThroughput { download, .. } => download.as_ref(),
            _ => None,
        }
    }

    pub fn upload(&self) -> Option<&Throughput> {
        match &self.outcome {
            Outcome::FullThroughput { upload, .. } => upload.as_ref(),
            _ => None,
        }
    }

    /// Bytes per second, zero when unknown.
    pub fn download_speed(&self) -> f64 {
        self.download().map(|t| t.speed).unwrap_or_default()
    }

    pub fn upload_speed(&self) -> f64 {
        self.upload().map(|t| t.speed).unwrap_or_default()
    }

    pub fn location(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Unlocked { location, .. } => location.as_deref(),
            _ => None,
        }
    }

    pub fn unlock(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Unlocked { unlock, .. } if !unlock.is_empty() => {
                Some(unlock.as_str())
            }
            _ => None,
        }
    }

    pub fn format_latency(&self) -> String {
        format_millis(self.latency())
    }

    pub fn format_jitter(&self) -> String {
        self.stats()
            .map(|stats| format_millis(stats.jitter))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }

    pub fn format_packet_loss(&self) -> String {
        self.stats()
            .map(|stats| format!("{:.1}%", stats.packet_loss))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }

    pub fn format_download_speed(&self) -> String {
        format_speed(self.download_speed())
    }

    pub fn format_upload_speed(&self) -> String {
        format_speed(self.upload_speed())
    }

    pub fn format_location(&self) -> String {
        self.location().unwrap_or(NOT_AVAILABLE).to_string()
    }

    pub fn format_unlock(&self) -> String {
        self.unlock().unwrap_or(NOT_AVAILABLE).to_string()
    }
}

pub const NOT_AVAILABLE: &str = "N/A";

fn format_millis(duration: Duration) -> String {
    if duration.is_zero() {
        return NOT_AVAILABLE.to_string();
    }
    format!("{}ms", duration.as_millis())
}

pub fn format_speed(bytes_per_second: f64) -> String {
    const UNITS: [&str; 5] = ["B/s", "KB/s", "MB/s", "GB/s", "TB/s"];

    let mut speed = bytes_per_second;
    let mut unit = 0;
    while speed >= 1024.0 && unit < UNITS.len() - 1 {
        speed /= 1024.0;
        unit += 1;
    }
    format!("{:.2}{}", speed, UNITS[unit])
}
