use std::{collections::BTreeMap, time::Duration};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::{
    config::SourceConfig,
    error::{BenchError, Result},
    models::{Endpoint, EndpointSet, RawConfig},
    utils::io::read_source,
};

use super::{dialer_for, field_str, Dial};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Provider name the proxy configuration format keeps for itself.
const RESERVED_PROVIDER: &str = "default";

#[derive(Debug, Default, Deserialize)]
struct SourceFile {
    #[serde(default)]
    proxies: Vec<RawConfig>,
    #[serde(default, rename = "proxy-providers")]
    providers: BTreeMap<String, RawConfig>,
}

/// Endpoints ready for benchmarking plus what the filters removed.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub endpoints: EndpointSet,
    /// Dialable endpoints before filtering.
    pub total: usize,
    /// `name (keyword)` for every endpoint dropped by a block keyword.
    pub blocked: Vec<String>,
}

pub async fn load(sources: &SourceConfig) -> Result<LoadReport> {
    let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
    let mut all = EndpointSet::new();

    for location in &sources.locations {
        let body = match read_source(&client, location).await {
            Ok(body) => body,
            Err(e) => {
                warn!(location = location.as_str(), error = %e, "failed to read config");
                continue;
            }
        };

        let file: SourceFile = serde_yaml::from_str(&body)?;
        let mut named = named_proxies(&file.proxies)?;

        for (provider, config) in &file.providers {
            named.extend(load_provider(&client, provider, config).await?);
        }

        for (name, raw) in named {
            if all.contains(&name) {
                continue;
            }
            if let Some(endpoint) = endpoint_from(name, raw)? {
                all.insert(endpoint);
            }
        }
    }

    let report = apply_filters(all, sources);
    if sources.debug && !sources.block.is_empty() {
        info!(
            total = report.total,
            blocked = report.blocked.len(),
            remaining = report.endpoints.len(),
            "endpoint statistics"
        );
        for blocked in &report.blocked {
            info!("blocked: {}", blocked);
        }
    }
    Ok(report)
}

/// Names every proxy of one list, rejecting duplicates.
fn named_proxies(proxies: &[RawConfig]) -> Result<Vec<(String, RawConfig)>> {
    let mut seen = std::collections::HashSet::new();
    let mut named = Vec::with_capacity(proxies.len());

    for (index, raw) in proxies.iter().enumerate() {
        let name = field_str(raw, "name")
            .ok_or_else(|| BenchError::ParseError(format!("proxy {}: missing name", index)))?;
        if !seen.insert(name.to_string()) {
            return Err(BenchError::DuplicateEndpoint(name.to_string()));
        }
        named.push((name.to_string(), raw.clone()));
    }
    Ok(named)
}

async fn load_provider(
    client: &reqwest::Client,
    provider: &str,
    config: &RawConfig,
) -> Result<Vec<(String, RawConfig)>> {
    if provider == RESERVED_PROVIDER {
        return Err(BenchError::ConfigError(format!(
            "can not define a provider called `{}`",
            RESERVED_PROVIDER
        )));
    }

    let location = match field_str(config, "type") {
        Some("http") => field_str(config, "url"),
        Some("file") => field_str(config, "path"),
        _ => None,
    }
    .ok_or_else(|| {
        BenchError::ConfigError(format!("parse proxy provider {} error: missing url or path", provider))
    })?;

    let body = read_source(client, location).await.map_err(|e| {
        BenchError::ConfigError(format!("initial proxy provider {} error: {}", provider, e))
    })?;
    let file: SourceFile = serde_yaml::from_str(&body)?;

    Ok(named_proxies(&file.proxies)?
        .into_iter()
        .map(|(name, raw)| (format!("[{}] {}", provider, name), raw))
        .collect())
}

fn endpoint_from(name: String, raw: RawConfig) -> Result<Option<Endpoint>> {
    let endpoint = match dialer_for(&raw)? {
        Dial::Ready(dialer) => Some(Endpoint::new(name, dialer, raw)),
        Dial::Unsupported(kind) => {
            warn!(endpoint = name.as_str(), protocol = kind.as_str(), "no dialer for protocol, skipping");
            None
        }
        Dial::Unknown(kind) => {
            debug!(endpoint = name.as_str(), kind = kind.as_str(), "unknown proxy type, skipping");
            None
        }
    };
    Ok(endpoint)
}

/// Block keywords first, then the name filter.
pub fn apply_filters(endpoints: EndpointSet, sources: &SourceConfig) -> LoadReport {
    let total = endpoints.len();
    let mut blocked = Vec::new();

    let endpoints = endpoints
        .into_iter()
        .filter(|endpoint| {
            let lower = endpoint.name.to_lowercase();
            match sources.block.iter().find(|keyword| lower.contains(keyword.as_str())) {
                Some(keyword) => {
                    blocked.push(format!("{} ({})", endpoint.name, keyword));
                    false
                }
                None => true,
            }
        })
        .filter(|endpoint| sources.filter.is_match(&endpoint.name))
        .collect();

    LoadReport {
        endpoints,
        total,
        blocked,
    }
}
