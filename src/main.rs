use std::{error::Error, sync::Arc};

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use proxybench::{
    api,
    args::Args,
    config::AppConfig,
    proxies::loader,
    report::{self, LiveReport},
    speedtest::{Driver, HttpTransportFactory, Orchestrator},
    telemetry,
    unlock::{CatalogProber, IpCheckLocator},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    let args = Args::parse();
    telemetry::init_tracing(args.debug);

    let config = AppConfig::try_from(args)?;
    if let Some(addr) = config.metrics_addr {
        telemetry::install_metrics(addr)?;
    }
    if config.bench.debug {
        info!("debug mode enabled");
    }

    let loaded = loader::load(&config.sources).await?;
    let endpoints = loaded.endpoints;
    info!(
        "loaded {} endpoints ({} before filtering)",
        endpoints.len(),
        loaded.total
    );

    let live = Arc::new(LiveReport::new(
        endpoints.len(),
        config.bench.mode,
        config.report.html.clone(),
    ));
    if let Err(e) = live.publish().await {
        warn!(error = %e, "cannot write live report");
    }

    // File rewrites happen off the driver callback; one update per result.
    let (updates, mut pending) = mpsc::unbounded_channel::<()>();
    let publisher = tokio::spawn({
        let live = live.clone();
        async move {
            while pending.recv().await.is_some() {
                if let Err(e) = live.publish().await {
                    warn!(error = %e, "cannot update live report");
                }
            }
        }
    });

    let server = match config.report.addr {
        Some(addr) => {
            let server = api::app(live.clone(), addr)?;
            let handle = server.handle();
            tokio::spawn(server);
            Some(handle)
        }
        None => None,
    };

    let bench = Arc::new(config.bench.clone());
    let orchestrator = Orchestrator::new(
        bench.clone(),
        Arc::new(HttpTransportFactory::new(
            bench.server_url.clone(),
            bench.timeout,
        )),
        Arc::new(CatalogProber::default()),
        Arc::new(IpCheckLocator::new(bench.debug)),
    );
    let driver = Driver::new(orchestrator);

    let mut results = Vec::with_capacity(endpoints.len());
    driver
        .run(&endpoints, |result| {
            live.add(&result);
            let _ = updates.send(());
            results.push(result);
        })
        .await;
    drop(updates);
    if let Err(e) = publisher.await {
        warn!(error = %e, "live report publisher stopped");
    }

    report::sort_results(&mut results);
    println!("{}", report::render(&results, bench.mode));

    if let Some(path) = &config.output.path {
        let selected = report::select(&results, &config.output, bench.mode);
        report::write_config(path, &selected).await?;
        println!("\nsave config file to: {}", path.display());
    }
    if let Some(path) = live.html_path() {
        println!("report written to: {}", path.display());
    }

    if let Some(handle) = server {
        info!("press Ctrl+C to stop the report server");
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "cannot listen for shutdown signal");
        }
        handle.stop(true).await;
        info!("report server stopped");
    }

    Ok(())
}
