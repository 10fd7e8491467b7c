pub mod catalog;
pub mod location;

use async_trait::async_trait;
use futures::{future::BoxFuture, stream, FutureExt, StreamExt};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, USER_AGENT},
    Client,
};
use tokio::time::Instant;
use tracing::debug;

use self::catalog::{Probe, Service, Verdict};

pub use self::location::{IpCheckLocator, Risk};

/// Reports which catalogued services are reachable through a client.
///
/// Never fails: a service that cannot be checked is simply left out of the
/// summary.
#[async_trait]
pub trait UnlockProber: Send + Sync {
    /// `", "`-separated `Name` or `Name:REGION` entries, empty when nothing
    /// is unlocked.
    async fn probe(&self, client: &Client, concurrency: usize, debug: bool) -> String;
}

/// Finds the exit location of a client, optionally annotated with the risk
/// score of the exit IP.
#[async_trait]
pub trait LocationLookup: Send + Sync {
    /// `None` when no provider answered before `deadline`.
    async fn locate(&self, client: &Client, with_risk: bool, deadline: Instant) -> Option<String>;
}

pub struct CatalogProber {
    services: Vec<Service>,
}

impl Default for CatalogProber {
    fn default() -> Self {
        Self::new(catalog::services())
    }
}

impl CatalogProber {
    pub fn new(services: Vec<Service>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl UnlockProber for CatalogProber {
    async fn probe(&self, client: &Client, concurrency: usize, debug: bool) -> String {
        let checks: Vec<BoxFuture<'_, (usize, Verdict)>> = self
            .services
            .iter()
            .enumerate()
            .map(|(index, service)| {
                check(client, service, debug)
                    .map(move |verdict| (index, verdict))
                    .boxed()
            })
            .collect();

        let mut verdicts: Vec<(usize, Verdict)> = stream::iter(checks)
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;
        verdicts.sort_by_key(|(index, _)| *index);

        let entries: Vec<String> = verdicts
            .into_iter()
            .filter_map(|(index, verdict)| verdict.entry(self.services[index].name))
            .collect();
        entries.join(", ")
    }
}

async fn check(client: &Client, service: &Service, debug: bool) -> Verdict {
    let response = match client
        .get(service.url)
        .headers(browser_headers())
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            if debug {
                debug!(service = service.name, error = %e, "unlock request failed");
            }
            return Verdict::Blocked;
        }
    };

    let status = response.status();
    let final_url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    let verdict = (service.detect)(&Probe {
        status,
        final_url: &final_url,
        body: &body,
    });

    if debug {
        debug!(service = service.name, %status, ?verdict, "unlock checked");
    }
    verdict
}

/// Headers of a desktop browser; several services refuse bare clients.
pub(crate) fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36",
        ),
    );
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers
}
