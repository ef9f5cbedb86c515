//! Scheduler
//!
//! Drives the two periodic jobs: the endpoint monitor pass and the retry
//! drain. The driver ticks once a minute; per-endpoint intervals filter
//! inside the pass. Each job is a singleton — a tick finishes both jobs
//! before the next one starts — while scrape ingestion runs freely in
//! parallel.

mod types;

use crate::core::ingest::retry::RetryDrainer;
use crate::core::scrapers::ScrapeOptions;
use anyhow::Result;
use std::time::Duration;
use tokio::time;

pub use types::{Scheduler, TickResult};

impl Scheduler {
    pub fn new(
        config: std::sync::Arc<crate::core::config::Config>,
        coordinator: std::sync::Arc<crate::core::ingest::IngestionCoordinator>,
        monitor: std::sync::Arc<crate::core::monitor::EndpointMonitor>,
    ) -> Self {
        let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
        Self {
            config,
            coordinator,
            monitor,
            shutdown_tx,
        }
    }

    /// Get a shutdown signal receiver
    pub fn subscribe_shutdown(&self) -> tokio::sync::broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Shutdown the scheduler gracefully
    pub fn shutdown(&self) -> Result<()> {
        tracing::info!("Shutting down scheduler");
        self.shutdown_tx.send(()).ok();
        Ok(())
    }

    fn scrape_options(&self) -> ScrapeOptions {
        ScrapeOptions {
            politeness_delay_ms: self.config.politeness_delay_ms,
            allow_headless: self.config.allow_headless,
            ..Default::default()
        }
    }

    /// Run one tick: monitor pass and retry drain, concurrently with each
    /// other but never with a previous run of themselves.
    pub async fn run_tick(&self) -> TickResult {
        let monitor_pass = async {
            if !self.config.monitor_enabled {
                return 0;
            }
            match self.monitor.run_monitor_pass().await {
                Ok(checked) => checked,
                Err(e) => {
                    tracing::error!(error = %e, "Monitor pass failed");
                    0
                }
            }
        };

        let retry_drain = async {
            let drainer = RetryDrainer::new(&self.coordinator, self.scrape_options());
            match drainer.drain().await {
                Ok(executed) => executed,
                Err(e) => {
                    tracing::error!(error = %e, "Retry drain failed");
                    0
                }
            }
        };

        let (endpoints_checked, jobs_retried) = tokio::join!(monitor_pass, retry_drain);
        TickResult {
            endpoints_checked,
            jobs_retried,
        }
    }

    /// Run until a shutdown signal arrives
    pub async fn start(&self) -> Result<()> {
        let interval = Duration::from_secs(self.config.tick_interval_secs);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tracing::info!(
            tick_secs = self.config.tick_interval_secs,
            monitor_enabled = self.config.monitor_enabled,
            "Starting scheduler"
        );

        loop {
            let result = self.run_tick().await;
            if result.endpoints_checked > 0 || result.jobs_retried > 0 {
                tracing::info!(
                    endpoints_checked = result.endpoints_checked,
                    jobs_retried = result.jobs_retried,
                    "Scheduler tick complete"
                );
            }

            tokio::select! {
                _ = time::sleep(interval) => {}
                _ = shutdown_rx.recv() => {
                    tracing::info!("Scheduler received shutdown signal, stopping gracefully");
                    break;
                }
            }
        }

        tracing::info!("Scheduler stopped");
        Ok(())
    }
}
