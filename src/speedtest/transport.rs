use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::{header::CONTENT_TYPE, Body, Client};
use tracing::debug;

use crate::{
    error::{BenchError, Result},
    models::Endpoint,
};

/// Size of one slice of the generated upload body.
const UPLOAD_SLICE: usize = 64 * 1024;
static ZEROS: [u8; UPLOAD_SLICE] = [0; UPLOAD_SLICE];

/// HTTP access to the speed test server through one endpoint.
///
/// Every call is bounded by the per-request timeout of the underlying
/// client; an exceeded timeout surfaces as an error like any other
/// transport failure.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Zero byte request. `Ok` only for a success status.
    async fn probe(&self) -> Result<()>;

    /// Requests `bytes` bytes and drains the body, returning what was
    /// actually received. Once a success status arrived, a body that breaks
    /// off (usually the timeout) is not an error.
    async fn download(&self, bytes: u64) -> Result<u64>;

    /// Posts a zero-filled body of `bytes` bytes, returning what the body
    /// generator produced.
    async fn upload(&self, bytes: u64) -> Result<u64>;

    /// The client bound to this endpoint, for location and unlock lookups.
    fn http(&self) -> &Client;
}

/// Builds one dedicated transport per endpoint.
pub trait TransportFactory: Send + Sync {
    fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn Transport>>;
}

pub struct HttpTransportFactory {
    server_url: String,
    timeout: Duration,
}

impl HttpTransportFactory {
    pub fn new(server_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            server_url: server_url.into(),
            timeout,
        }
    }
}

impl TransportFactory for HttpTransportFactory {
    fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn Transport>> {
        let client = Client::builder()
            .proxy(endpoint.dialer.proxy()?)
            .timeout(self.timeout)
            .build()?;

        Ok(Arc::new(HttpTransport {
            client,
            server_url: self.server_url.clone(),
            timeout: self.timeout,
        }))
    }
}

pub struct HttpTransport {
    client: Client,
    server_url: String,
    timeout: Duration,
}

impl HttpTransport {
    fn down_url(&self, bytes: u64) -> String {
        format!("{}/__down?bytes={}", self.server_url, bytes)
    }

    fn up_url(&self) -> String {
        format!("{}/__up", self.server_url)
    }

    fn send_error(&self, e: reqwest::Error) -> BenchError {
        if e.is_timeout() {
            BenchError::TimeoutError(self.timeout)
        } else if e.is_connect() {
            BenchError::ConnectionError(e.to_string())
        } else {
            BenchError::HttpError(e)
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn probe(&self) -> Result<()> {
        let response = self
            .client
            .get(self.down_url(0))
            .send()
            .await
            .map_err(|e| self.send_error(e))?;
        ensure_success(response.status())
    }

    async fn download(&self, bytes: u64) -> Result<u64> {
        let response = self
            .client
            .get(self.down_url(bytes))
            .send()
            .await
            .map_err(|e| self.send_error(e))?;
        ensure_success(response.status())?;

        // A body cut short still counts what arrived.
        let mut received = 0u64;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(chunk) => received += chunk.len() as u64,
                Err(e) => {
                    debug!(received, expected = bytes, error = %e, "download body interrupted");
                    break;
                }
            }
        }
        Ok(received)
    }

    async fn upload(&self, bytes: u64) -> Result<u64> {
        let written = Arc::new(AtomicU64::new(0));
        let body = zero_body(bytes, written.clone());

        let response = self
            .client
            .post(self.up_url())
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;
        ensure_success(response.status())?;

        Ok(written.load(Ordering::Acquire))
    }

    fn http(&self) -> &Client {
        &self.client
    }
}

fn ensure_success(status: reqwest::StatusCode) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }
    debug!(status = status.as_u16(), "non-success status");
    Err(BenchError::StatusError(status.as_u16()))
}

/// Streams `total` zero bytes, counting every slice handed to the
/// connection in `written`.
fn zero_body(total: u64, written: Arc<AtomicU64>) -> Body {
    let slices = ZeroSlices { remaining: total }.map(move |len| {
        written.fetch_add(len as u64, Ordering::AcqRel);
        Ok::<_, std::io::Error>(Bytes::from_static(&ZEROS[..len]))
    });
    Body::wrap_stream(futures::stream::iter(slices))
}

struct ZeroSlices {
    remaining: u64,
}

impl Iterator for ZeroSlices {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let len = self.remaining.min(UPLOAD_SLICE as u64) as usize;
        self.remaining -= len as u64;
        Some(len)
    }
}
