use std::path::Path;

use serde_yaml::{Mapping, Value};
use tracing::info;

use crate::{
    config::{Mode, OutputConfig},
    error::Result,
    models::BenchResult,
};

const MB: f64 = 1024.0 * 1024.0;

/// Results worth persisting. Unreachable endpoints never are; in unlock
/// mode that is the only check since no speed was measured.
pub fn select<'a>(
    results: &'a [BenchResult],
    output: &OutputConfig,
    mode: Mode,
) -> Vec<&'a BenchResult> {
    results
        .iter()
        .filter(|result| !result.latency().is_zero())
        .filter(|result| {
            if matches!(mode, Mode::Unlock { .. }) {
                return true;
            }
            if let Some(max) = output.max_latency {
                if result.latency() >= max {
                    return false;
                }
            }
            output.min_speed <= 0.0 || result.download_speed() / MB >= output.min_speed
        })
        .collect()
}

/// Writes the raw configuration of every result as a `proxies:` list.
pub async fn write_config(path: &Path, results: &[&BenchResult]) -> Result<usize> {
    let proxies = results
        .iter()
        .map(|result| Value::Mapping(result.raw.clone()))
        .collect::<Vec<_>>();

    let mut document = Mapping::new();
    document.insert(Value::from("proxies"), Value::Sequence(proxies));

    let body = serde_yaml::to_string(&document)?;
    tokio::fs::write(path, body).await?;

    info!(path = %path.display(), count = results.len(), "saved config");
    Ok(results.len())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::models::{LatencyStats, Outcome, RawConfig, Throughput};

    use super::*;

    fn raw(name: &str) -> RawConfig {
        let mut raw = RawConfig::new();
        raw.insert("name".into(), name.into());
        raw.insert("type".into(), "socks5".into());
        raw.insert("server".into(), "10.0.0.1".into());
        raw.insert("port".into(), 1080.into());
        raw
    }

    fn result(name: &str, latency_ms: u64, download_mb: f64) -> BenchResult {
        let latency = Duration::from_millis(latency_ms);
        BenchResult {
            name: name.into(),
            protocol: "Socks5".into(),
            raw: raw(name),
            outcome: if latency_ms == 0 {
                Outcome::Unreachable(LatencyStats::unreachable())
            } else {
                Outcome::FullThroughput {
                    stats: LatencyStats::from_samples(&[latency], 6),
                    download: Some(Throughput {
                        bytes: 1,
                        elapsed: Duration::from_secs(1),
                        speed: download_mb * MB,
                    }),
                    upload: None,
                }
            },
        }
    }

    fn names(selected: &[&BenchResult]) -> Vec<String> {
        selected.iter().map(|r| r.name.clone()).collect()
    }

    #[test]
    fn thresholds_apply_outside_unlock_mode() {
        let results = vec![
            result("dead", 0, 0.0),
            result("quick", 200, 12.0),
            result("laggy", 900, 50.0),
            result("slow", 100, 1.0),
        ];
        let output = OutputConfig {
            path: None,
            max_latency: Some(Duration::from_millis(800)),
            min_speed: 5.0,
        };

        assert_eq!(names(&select(&results, &output, Mode::Full)), vec!["quick"]);
        assert_eq!(
            names(&select(&results, &output, Mode::Unlock { concurrency: 5, risk: false })),
            vec!["quick", "laggy", "slow"]
        );
    }

    #[test]
    fn no_thresholds_keep_every_reachable_endpoint() {
        let results = vec![result("a", 10, 0.0), result("b", 0, 0.0)];
        let selected = select(&results, &OutputConfig::default(), Mode::Full);
        assert_eq!(names(&selected), vec!["a"]);
    }

    #[tokio::test]
    async fn writes_raw_configs_as_proxies_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.yaml");
        let results = vec![result("a", 10, 1.0), result("b", 20, 1.0)];
        let selected: Vec<&BenchResult> = results.iter().collect();

        assert_eq!(write_config(&path, &selected).await.unwrap(), 2);

        let written: serde_yaml::Value =
            serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let proxies = written["proxies"].as_sequence().unwrap();
        assert_eq!(proxies.len(), 2);
        assert_eq!(proxies[1]["name"].as_str(), Some("b"));
        assert_eq!(proxies[0]["port"].as_u64(), Some(1080));
    }
}
