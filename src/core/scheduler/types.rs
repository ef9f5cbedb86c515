//! Scheduler type definitions

use crate::core::config::Config;
use crate::core::ingest::IngestionCoordinator;
use crate::core::monitor::EndpointMonitor;
use std::sync::Arc;

/// Periodic driver for monitor checks and the retry-queue drain
pub struct Scheduler {
    pub(super) config: Arc<Config>,
    pub(super) coordinator: Arc<IngestionCoordinator>,
    pub(super) monitor: Arc<EndpointMonitor>,
    pub(super) shutdown_tx: tokio::sync::broadcast::Sender<()>,
}

/// Outcome of one scheduler tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickResult {
    pub endpoints_checked: usize,
    pub jobs_retried: usize,
}
