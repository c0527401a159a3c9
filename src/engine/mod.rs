//! Delivery engine.
//!
//! Owns a pool of [`DeliveryWorker`]s, each an independent tokio task with
//! its own HTTP session, RNG and counters. The engine spawns them, waits for
//! every one of them to observe cancellation and merge its counters, and
//! hands back the aggregate.

pub mod shutdown;
pub mod worker;

use futures::future::join_all;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::ReportError;
use crate::report::PerformanceReport;
use crate::schema::InstanceGenerator;
use crate::stats::RootStats;

pub use shutdown::{ShutdownCoordinator, ShutdownReason};
pub use worker::DeliveryWorker;

/// Settings shared by every worker of one engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Target of every POST
    pub endpoint: Url,
    /// Number of concurrent workers (persistent HTTP clients)
    pub clients: usize,
    pub connect_timeout: Duration,
    /// Upper bound on one request/response exchange, and therefore on how
    /// long a worker can take to notice cancellation
    pub request_timeout: Duration,
    /// Pause between a fault and the next connection attempt
    pub backoff: Duration,
}

impl EngineConfig {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            clients: 1,
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            backoff: Duration::from_millis(10),
        }
    }

    pub fn with_clients(mut self, clients: usize) -> Self {
        self.clients = clients;
        self
    }
}

pub struct DeliveryEngine {
    generator: InstanceGenerator,
    config: Arc<EngineConfig>,
}

impl DeliveryEngine {
    pub fn new(generator: InstanceGenerator, config: EngineConfig) -> Self {
        tracing::info!(
            clients = config.clients,
            endpoint = %config.endpoint,
            "Delivery engine initialized"
        );
        Self {
            generator,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Spawn all workers and wait until every one has been cancelled and has
    /// merged its counters. The returned root is time-stamped at spawn.
    pub async fn run(&self, cancel: &CancellationToken) -> Arc<RootStats> {
        let root = Arc::new(RootStats::new());

        let handles: Vec<_> = (0..self.config.clients)
            .map(|id| {
                let worker = DeliveryWorker::new(id, self.generator.clone(), self.config.clone());
                tokio::spawn(worker.run(cancel.clone(), root.clone()))
            })
            .collect();
        tracing::info!("Started {} delivery workers", handles.len());

        for (id, result) in join_all(handles).await.into_iter().enumerate() {
            if let Err(e) = result {
                tracing::error!(worker = id, error = %e, "Delivery worker task failed");
            }
        }
        tracing::info!("All delivery workers drained");

        root
    }

    /// Run until `coordinator` triggers, then build the final report.
    pub async fn run_until_shutdown(
        &self,
        coordinator: &ShutdownCoordinator,
    ) -> Result<PerformanceReport, ReportError> {
        let root = self.run(&coordinator.token()).await;
        PerformanceReport::from_root(&root, self.config.clients)
    }
}
