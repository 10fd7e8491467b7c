use std::fmt;

use async_trait::async_trait;
use futures::{future::BoxFuture, FutureExt};
use reqwest::{
    header::{ORIGIN, REFERER},
    Client,
};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

use crate::{
    error::Result,
    utils::deadline::{first_n_until, until},
};

use super::{browser_headers, LocationLookup};

const GEO_PROVIDERS: [&str; 2] = ["https://64.ipcheck.ing/geo", "https://api.ip.sb/geoip"];
const RISK_URL: &str = "https://ipcheck.ing/api/ipchecking";

/// Score at and above which an exit IP is considered poor.
const POOR_RISK: f64 = 66.0;

#[derive(Debug, Clone, Default, Deserialize)]
struct GeoResponse {
    #[serde(default)]
    country: String,
    #[serde(default)]
    ip: String,
}

#[derive(Debug, Deserialize)]
struct RiskResponse {
    #[serde(default, rename = "proxyDetect")]
    proxy_detect: ProxyDetect,
}

#[derive(Debug, Default, Deserialize)]
struct ProxyDetect {
    #[serde(default)]
    risk: Value,
}

/// Classification of a third-party risk score.
#[derive(Debug, Clone, PartialEq)]
pub enum Risk {
    Clean(f64),
    Moderate(f64),
    Poor(f64),
    /// The service answered without a score.
    VeryPoor,
    Unknown(String),
}

impl Risk {
    pub fn classify(score: &Value) -> Risk {
        let numeric = match score {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            Value::Null => return Risk::VeryPoor,
            _ => None,
        };

        match numeric {
            Some(v) if v == 0.0 => Risk::Clean(v),
            Some(v) if v < POOR_RISK => Risk::Moderate(v),
            Some(v) => Risk::Poor(v),
            None => Risk::Unknown(score.to_string()),
        }
    }
}

impl fmt::Display for Risk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Risk::Clean(v) => write!(f, "[{:.0} clean]", v),
            Risk::Moderate(v) => write!(f, "[{:.0} moderate]", v),
            Risk::Poor(v) => write!(f, "[{:.0} poor]", v),
            Risk::VeryPoor => write!(f, "[-- very poor]"),
            Risk::Unknown(raw) => write!(f, "[{} unknown]", raw),
        }
    }
}

/// Geo lookup raced across two providers, with an optional risk score for
/// the exit IP.
#[derive(Debug, Clone, Default)]
pub struct IpCheckLocator {
    debug: bool,
}

impl IpCheckLocator {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    async fn geo(&self, client: &Client, url: &'static str) -> Option<GeoResponse> {
        let response = client.get(url).headers(browser_headers()).send().await;
        let geo = match response {
            Ok(response) => response.json::<GeoResponse>().await,
            Err(e) => Err(e),
        };

        match geo {
            Ok(geo) if !geo.country.is_empty() => Some(geo),
            Ok(_) => {
                if self.debug {
                    debug!(url, "geo response without country");
                }
                None
            }
            Err(e) => {
                if self.debug {
                    debug!(url, error = %e, "geo lookup failed");
                }
                None
            }
        }
    }

    async fn risk(&self, client: &Client, ip: &str) -> Result<Value> {
        let response: RiskResponse = client
            .get(RISK_URL)
            .query(&[("ip", ip), ("lang", "en")])
            .headers(browser_headers())
            .header(REFERER, "https://ipcheck.ing/")
            .header(ORIGIN, "https://ipcheck.ing")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if self.debug {
            debug!(ip, risk = %response.proxy_detect.risk, "risk response");
        }
        Ok(response.proxy_detect.risk)
    }
}

#[async_trait]
impl LocationLookup for IpCheckLocator {
    async fn locate(&self, client: &Client, with_risk: bool, deadline: Instant) -> Option<String> {
        let lookups: Vec<BoxFuture<'_, Option<GeoResponse>>> = GEO_PROVIDERS
            .iter()
            .map(|&url| self.geo(client, url).boxed())
            .collect();

        let (_, geo) = first_n_until(lookups, 1, deadline).await.into_iter().next()?;
        if !with_risk || geo.ip.is_empty() {
            return Some(geo.country);
        }

        match until(deadline, self.risk(client, &geo.ip)).await {
            Some(Ok(score)) => Some(format!("{} {}", geo.country, Risk::classify(&score))),
            Some(Err(e)) => {
                if self.debug {
                    debug!(error = %e, "risk lookup failed, reporting location only");
                }
                Some(geo.country)
            }
            None => {
                if self.debug {
                    debug!("risk lookup timed out, reporting location only");
                }
                Some(geo.country)
            }
        }
    }
}
