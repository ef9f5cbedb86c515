//! racefeed daemon
//!
//! Loads configuration, connects the database, registers the organiser
//! scrapers and runs the scheduler until the process is told to stop.

use anyhow::Result;
use racefeed::core::browser::{install_shutdown_handler, BrowserManager};
use racefeed::core::config;
use racefeed::core::db::Database;
use racefeed::core::ingest::IngestionCoordinator;
use racefeed::core::monitor::EndpointMonitor;
use racefeed::core::notify::Notifier;
use racefeed::core::scheduler::Scheduler;
use racefeed::core::scrapers::{
    evochip::EvoChipScraper, hopasports::HopasportsScraper, OrganiserScraper, ProgressSender,
    ScrapeOptions,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Arc::new(config::load(config_path.as_deref())?);

    let db_path = config
        .database_path
        .clone()
        .unwrap_or_else(Database::default_path);
    let db = Database::connect(&db_path).await?;
    db.migrate().await?;
    tracing::info!(path = %db_path.display(), "Database ready");

    let browser = Arc::new(BrowserManager::new());
    install_shutdown_handler(browser.clone());

    let scrapers: Vec<Box<dyn OrganiserScraper>> = vec![
        Box::new(HopasportsScraper::new()),
        Box::new(EvoChipScraper::new().with_browser(browser.clone())),
    ];

    let notifier = Arc::new(Notifier::new(config.notifier_webhook_url.clone()));
    let coordinator = Arc::new(IngestionCoordinator::new(
        db.clone(),
        scrapers,
        notifier.clone(),
    ));
    let monitor = Arc::new(EndpointMonitor::new(db.clone(), notifier));

    // Enqueue and run any configured targets once at startup
    for target in &config.targets {
        let job = coordinator.enqueue(&target.organiser, &target.url).await?;
        let options = ScrapeOptions {
            politeness_delay_ms: config.politeness_delay_ms,
            allow_headless: config.allow_headless,
            ..Default::default()
        };
        if let Err(e) = coordinator
            .run_pending_job(&job.id, &options, &ProgressSender::noop())
            .await
        {
            tracing::error!(url = %target.url, error = %e, "Startup scrape failed");
        }
    }

    let scheduler = Arc::new(Scheduler::new(config, coordinator, monitor));

    let scheduler_handle = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.start().await })
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    scheduler.shutdown()?;
    let _ = scheduler_handle.await;
    browser.shutdown().await?;

    Ok(())
}
