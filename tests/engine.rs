use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use reqwest::Client;
use tokio::time::{sleep, Instant};

use proxybench::{
    config::{BenchConfig, Mode},
    error::{BenchError, Result},
    models::{BenchResult, Endpoint, EndpointSet, Outcome, RawConfig},
    proxies::socks5::Socks5Dialer,
    speedtest::{Driver, Orchestrator, Transport, TransportFactory},
    unlock::{LocationLookup, UnlockProber},
};

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Probe,
    Download,
    Upload,
}

/// Scripted transport. Probe `i` takes `probes[i]` or fails when `None`
/// (or when the script runs out); chunks take `chunk_time` and the first
/// `failing_downloads` download calls fail.
struct FakeTransport {
    client: Client,
    probes: Vec<Option<Duration>>,
    chunk_time: Duration,
    failing_downloads: usize,
    probe_calls: AtomicUsize,
    download_calls: AtomicUsize,
    upload_calls: AtomicUsize,
    events: Mutex<Vec<Event>>,
    chunk_sizes: Mutex<Vec<u64>>,
}

impl FakeTransport {
    fn new(probes: Vec<Option<Duration>>) -> Self {
        Self {
            client: Client::new(),
            probes,
            chunk_time: Duration::from_secs(1),
            failing_downloads: 0,
            probe_calls: AtomicUsize::new(0),
            download_calls: AtomicUsize::new(0),
            upload_calls: AtomicUsize::new(0),
            events: Mutex::new(Vec::new()),
            chunk_sizes: Mutex::new(Vec::new()),
        }
    }

    fn steady(latency: u64) -> Self {
        Self::new(vec![Some(ms(latency)); 6])
    }

    fn dead() -> Self {
        Self::new(vec![None; 6])
    }

    fn failing_downloads(mut self, count: usize) -> Self {
        self.failing_downloads = count;
        self
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn probe(&self) -> Result<()> {
        let call = self.probe_calls.fetch_add(1, Ordering::SeqCst);
        self.record(Event::Probe);
        match self.probes.get(call).copied().flatten() {
            Some(delay) => {
                sleep(delay).await;
                Ok(())
            }
            None => Err(BenchError::ConnectionError("probe refused".into())),
        }
    }

    async fn download(&self, bytes: u64) -> Result<u64> {
        let call = self.download_calls.fetch_add(1, Ordering::SeqCst);
        self.record(Event::Download);
        self.chunk_sizes.lock().unwrap().push(bytes);
        sleep(self.chunk_time).await;
        if call < self.failing_downloads {
            return Err(BenchError::TimeoutError(self.chunk_time));
        }
        Ok(bytes)
    }

    async fn upload(&self, bytes: u64) -> Result<u64> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.record(Event::Upload);
        sleep(self.chunk_time * 2).await;
        Ok(bytes)
    }

    fn http(&self) -> &Client {
        &self.client
    }
}

/// Hands out the scripted transport registered for each endpoint name;
/// unknown names fail to connect.
#[derive(Default)]
struct FakeFactory {
    transports: HashMap<String, Arc<FakeTransport>>,
}

impl FakeFactory {
    fn with(mut self, name: &str, transport: FakeTransport) -> Self {
        self.transports.insert(name.to_string(), Arc::new(transport));
        self
    }

    fn transport(&self, name: &str) -> Arc<FakeTransport> {
        self.transports[name].clone()
    }
}

impl TransportFactory for FakeFactory {
    fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn Transport>> {
        match self.transports.get(&endpoint.name) {
            Some(transport) => Ok(transport.clone() as Arc<dyn Transport>),
            None => Err(BenchError::ConfigError("no route".into())),
        }
    }
}

#[derive(Default)]
struct FakeProber {
    calls: AtomicUsize,
}

#[async_trait]
impl UnlockProber for FakeProber {
    async fn probe(&self, _client: &Client, _concurrency: usize, _debug: bool) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        sleep(ms(500)).await;
        "Netflix:US, YouTube".to_string()
    }
}

#[derive(Default)]
struct FakeLocator {
    budgets: Mutex<Vec<Duration>>,
}

#[async_trait]
impl LocationLookup for FakeLocator {
    async fn locate(&self, _client: &Client, with_risk: bool, deadline: Instant) -> Option<String> {
        self.budgets
            .lock()
            .unwrap()
            .push(deadline.saturating_duration_since(Instant::now()));
        Some(if with_risk { "US [0 clean]" } else { "US" }.to_string())
    }
}

struct Harness {
    factory: Arc<FakeFactory>,
    prober: Arc<FakeProber>,
    locator: Arc<FakeLocator>,
    driver: Driver,
}

fn harness(config: BenchConfig, factory: FakeFactory) -> Harness {
    let factory = Arc::new(factory);
    let prober = Arc::new(FakeProber::default());
    let locator = Arc::new(FakeLocator::default());
    let orchestrator = Orchestrator::new(
        Arc::new(config.normalized()),
        factory.clone(),
        prober.clone(),
        locator.clone(),
    );
    Harness {
        factory,
        prober,
        locator,
        driver: Driver::new(orchestrator),
    }
}

fn endpoints(names: &[&str]) -> EndpointSet {
    names
        .iter()
        .map(|name| {
            Endpoint::new(
                name.to_string(),
                Arc::new(Socks5Dialer::new("127.0.0.1", 1080)),
                RawConfig::new(),
            )
        })
        .collect()
}

fn full_config() -> BenchConfig {
    BenchConfig {
        download_size: 4_000_000,
        upload_size: 2_000_000,
        concurrency: 4,
        mode: Mode::Full,
        ..BenchConfig::default()
    }
}

async fn run(harness: &Harness, set: &EndpointSet) -> Vec<BenchResult> {
    let mut results = Vec::new();
    let emitted = harness.driver.run(set, |result| results.push(result)).await;
    assert_eq!(emitted, results.len());
    results
}

#[tokio::test(start_paused = true)]
async fn one_result_per_endpoint_in_set_order() {
    let harness = harness(
        full_config(),
        FakeFactory::default()
            .with("a", FakeTransport::steady(50))
            .with("b", FakeTransport::dead())
            .with("d", FakeTransport::steady(70)),
    );
    let set = endpoints(&["a", "b", "c", "d"]);

    let results = run(&harness, &set).await;

    let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c", "d"]);
    assert!(results.iter().all(|r| r.protocol == "Socks5"));
    assert!(!results[2].is_reachable());
}

#[tokio::test(start_paused = true)]
async fn endpoint_without_any_successful_probe_is_unreachable() {
    let harness = harness(full_config(), FakeFactory::default().with("dead", FakeTransport::dead()));

    let results = run(&harness, &endpoints(&["dead"])).await;
    let result = &results[0];

    assert!(matches!(result.outcome, Outcome::Unreachable(_)));
    assert!(!result.is_reachable());
    assert_eq!(result.latency(), Duration::ZERO);
    assert_eq!(result.stats().unwrap().packet_loss, 100.0);
    assert_eq!(result.download_speed(), 0.0);
    assert_eq!(result.upload_speed(), 0.0);
    assert!(result.unlock().is_none());

    let transport = harness.factory.transport("dead");
    assert_eq!(transport.probe_calls.load(Ordering::SeqCst), 6);
    assert_eq!(transport.download_calls.load(Ordering::SeqCst), 0);
    assert_eq!(transport.upload_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn latency_jitter_and_loss_from_five_of_six_probes() {
    let probes = vec![
        Some(ms(100)),
        Some(ms(120)),
        None,
        Some(ms(80)),
        Some(ms(110)),
        Some(ms(90)),
    ];
    let harness = harness(full_config(), FakeFactory::default().with("a", FakeTransport::new(probes)));

    let results = run(&harness, &endpoints(&["a"])).await;
    let stats = results[0].stats().unwrap();

    assert_eq!(stats.latency, ms(100));
    assert_eq!(format!("{:.1}", stats.packet_loss), "16.7");
    let jitter = stats.jitter.as_secs_f64() * 1000.0;
    assert!((jitter - 200f64.sqrt()).abs() < 0.01, "jitter was {jitter}");
    assert_eq!(results[0].format_latency(), "100ms");
}

#[tokio::test(start_paused = true)]
async fn equal_chunks_add_up_to_the_configured_size() {
    let harness = harness(full_config(), FakeFactory::default().with("a", FakeTransport::steady(40)));

    let results = run(&harness, &endpoints(&["a"])).await;
    let download = results[0].download().unwrap();
    let upload = results[0].upload().unwrap();

    assert_eq!(download.bytes, 4_000_000);
    assert_eq!(download.elapsed, Duration::from_secs(1));
    assert!((download.speed - 4_000_000.0).abs() < 1e-6);
    assert_eq!(upload.bytes, 2_000_000);
    assert!((upload.speed - 1_000_000.0).abs() < 1e-6);

    let transport = harness.factory.transport("a");
    assert_eq!(*transport.chunk_sizes.lock().unwrap(), vec![1_000_000; 4]);
    assert_eq!(transport.upload_calls.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn failed_chunks_are_left_out_of_the_aggregate() {
    let harness = harness(
        full_config(),
        FakeFactory::default().with("a", FakeTransport::steady(40).failing_downloads(2)),
    );

    let results = run(&harness, &endpoints(&["a"])).await;
    let download = results[0].download().unwrap();

    assert_eq!(download.bytes, 2_000_000);
    assert!((download.speed - 2_000_000.0).abs() < 1e-6);
}

#[tokio::test(start_paused = true)]
async fn all_download_chunks_failing_still_yields_a_result() {
    let harness = harness(
        full_config(),
        FakeFactory::default().with("a", FakeTransport::steady(40).failing_downloads(4)),
    );

    let results = run(&harness, &endpoints(&["a"])).await;
    let result = &results[0];

    assert!(result.is_reachable());
    assert!(result.download().is_none());
    assert_eq!(result.download_speed(), 0.0);
    assert_eq!(result.format_download_speed(), "0.00B/s");
    assert!(result.upload().is_some());
}

#[tokio::test(start_paused = true)]
async fn phases_run_in_order() {
    let harness = harness(full_config(), FakeFactory::default().with("a", FakeTransport::steady(40)));

    run(&harness, &endpoints(&["a"])).await;
    let events = harness.factory.transport("a").events();

    let mut expected = vec![Event::Probe; 6];
    expected.extend([Event::Download; 4]);
    expected.extend([Event::Upload; 4]);
    assert_eq!(events, expected);
}

#[tokio::test(start_paused = true)]
async fn fast_mode_reports_latency_only() {
    let config = BenchConfig {
        mode: Mode::Fast,
        ..full_config()
    };
    let harness = harness(
        config,
        FakeFactory::default()
            .with("a", FakeTransport::steady(60))
            .with("dead", FakeTransport::dead()),
    );

    let results = run(&harness, &endpoints(&["a", "dead"])).await;

    assert_eq!(results[0].outcome, Outcome::LatencyOnly { latency: ms(60) });
    assert!(results[0].stats().is_none());
    assert_eq!(results[0].format_jitter(), "N/A");
    assert_eq!(results[0].format_packet_loss(), "N/A");
    assert_eq!(results[1].outcome, Outcome::LatencyOnly { latency: Duration::ZERO });

    let transport = harness.factory.transport("a");
    assert_eq!(transport.download_calls.load(Ordering::SeqCst), 0);
    assert_eq!(transport.upload_calls.load(Ordering::SeqCst), 0);
    assert_eq!(harness.prober.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn unlock_mode_never_measures_throughput() {
    let config = BenchConfig {
        mode: Mode::Unlock {
            concurrency: 5,
            risk: true,
        },
        timeout: Duration::from_secs(1),
        ..full_config()
    };
    let harness = harness(
        config,
        FakeFactory::default()
            .with("a", FakeTransport::steady(60))
            .with("dead", FakeTransport::dead()),
    );

    let results = run(&harness, &endpoints(&["a", "dead"])).await;

    assert_eq!(results[0].location(), Some("US [0 clean]"));
    assert_eq!(results[0].unlock(), Some("Netflix:US, YouTube"));
    assert_eq!(results[0].download_speed(), 0.0);
    assert!(results[1].location().is_none());
    assert!(results[1].unlock().is_none());

    let transport = harness.factory.transport("a");
    assert_eq!(transport.download_calls.load(Ordering::SeqCst), 0);
    assert_eq!(transport.upload_calls.load(Ordering::SeqCst), 0);
    assert_eq!(harness.prober.calls.load(Ordering::SeqCst), 1);

    // The per-request timeout is shorter than the location timeout and wins.
    assert_eq!(*harness.locator.budgets.lock().unwrap(), vec![Duration::from_secs(1)]);
}

#[tokio::test(start_paused = true)]
async fn repeated_runs_give_identical_results() {
    let factory = || {
        FakeFactory::default()
            .with("a", FakeTransport::steady(45).failing_downloads(1))
            .with("b", FakeTransport::dead())
    };
    let set = endpoints(&["a", "b"]);

    let first = run(&harness(full_config(), factory()), &set).await;
    let second = run(&harness(full_config(), factory()), &set).await;

    assert_eq!(first, second);
}
