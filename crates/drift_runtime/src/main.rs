//! Drift Runtime
//!
//! Runs every configured viewport over one in-memory store with a headless
//! render driver, until `run_for_secs` elapses or Ctrl-C.

mod headless;

use anyhow::{Context, Result};
use drift_metrics::{ExchangeEvent, ExchangeStats};
use drift_net::session::SessionReport;
use drift_net::{MemoryStore, SharedStore, ViewportSession, WindowId};
use drift_services::Settings;
use headless::HeadlessDriver;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    tracing::info!(
        "Drift v{} (protocol {})",
        drift_core::VERSION,
        drift_net::PROTOCOL_VERSION
    );

    let settings = match std::env::args().nth(1) {
        Some(path) => Settings::load(&path).with_context(|| format!("loading settings from {path}"))?,
        None => Settings::default(),
    };
    settings.validate().context("invalid settings")?;

    let store = Arc::new(MemoryStore::new(settings.exchange.store_quota_bytes));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut tasks = Vec::with_capacity(settings.windows.0.len());
    for window in &settings.windows.0 {
        let handle: SharedStore = Arc::new(store.connect(WindowId::generate()));
        let session = ViewportSession::new(&settings, window, handle);
        let shutdown = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            let mut driver = HeadlessDriver::new();
            let report = session.run(&mut driver, shutdown).await;
            (report, driver)
        }));
    }
    tracing::info!(viewports = tasks.len(), "viewports started");

    match settings.run_for_secs {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?,
    }
    tracing::info!("shutting down");
    // Receivers treat a dropped sender as shutdown too.
    let _ = shutdown_tx.send(true);

    let mut total = ExchangeStats::new();
    for task in tasks {
        let (report, driver) = task.await.context("viewport task panicked")?;
        log_report(&report, &driver);
        total.merge(&report.stats);
    }

    for (event, count) in total.iter() {
        tracing::info!(event = event.name(), count, "exchange total");
    }
    tracing::info!(
        published = total.get(ExchangeEvent::Published),
        imported = total.get(ExchangeEvent::Imported),
        store_entries = store.len(),
        store_bytes = store.used_bytes(),
        "run complete"
    );
    Ok(())
}

fn log_report(report: &SessionReport, driver: &HeadlessDriver) {
    tracing::info!(
        window = %report.window,
        title = %report.title,
        ticks = report.ticks,
        frames = driver.frames(),
        uploaded_mb = driver.bytes() as f64 / (1024.0 * 1024.0),
        avg_tick_ms = report.avg_tick_ms,
        max_tick_ms = report.max_tick_ms,
        "viewport report"
    );
}
