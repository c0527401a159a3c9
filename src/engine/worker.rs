//! One delivery worker: a persistent HTTP session that POSTs freshly
//! generated instances until cancelled.
//!
//! ```text
//! Connecting ──► Sending ⇄ (awaiting response)
//!     ▲             │ status >= 400 / transport fault
//!     │             ▼
//!     └──────── Reconnecting (backoff)
//!
//! cancellation (before a send, or during backoff) ──► Terminating
//! ```
//!
//! An in-flight request is never preempted; the client's request timeout
//! bounds how long a cancellation can wait on it.

use rand::rngs::StdRng;
use rand::SeedableRng;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::EngineConfig;
use crate::schema::InstanceGenerator;
use crate::stats::{RootStats, Stats};

enum WorkerState {
    Connecting,
    Sending(Client),
    Reconnecting,
    Terminating,
}

/// Result of one request/response exchange
enum Exchange {
    Completed,
    ErrorStatus(StatusCode),
    Transport(reqwest::Error),
}

pub struct DeliveryWorker {
    id: usize,
    generator: InstanceGenerator,
    config: Arc<EngineConfig>,
    rng: StdRng,
    stats: Stats,
    /// Set while running; counters are merged here exactly once, on normal
    /// exit or when the worker is dropped mid-run (panic, task abort)
    root: Option<Arc<RootStats>>,
}

impl DeliveryWorker {
    pub fn new(id: usize, generator: InstanceGenerator, config: Arc<EngineConfig>) -> Self {
        Self {
            id,
            generator,
            config,
            rng: StdRng::from_entropy(),
            stats: Stats::new(),
            root: None,
        }
    }

    /// Run until `cancel` fires, then merge local counters into `root`.
    ///
    /// Returns the worker's own counters.
    pub async fn run(mut self, cancel: CancellationToken, root: Arc<RootStats>) -> Stats {
        tracing::debug!(worker = self.id, "Worker started");
        self.root = Some(root);

        let mut state = WorkerState::Connecting;
        loop {
            state = match state {
                WorkerState::Connecting => match self.connect() {
                    Ok(client) => WorkerState::Sending(client),
                    Err(e) => {
                        tracing::warn!(worker = self.id, error = %e, "Failed to open HTTP session");
                        WorkerState::Reconnecting
                    }
                },

                WorkerState::Sending(client) => {
                    if cancel.is_cancelled() {
                        WorkerState::Terminating
                    } else {
                        match self.exchange(&client).await {
                            Exchange::Completed => WorkerState::Sending(client),
                            Exchange::ErrorStatus(status) => {
                                tracing::warn!(
                                    worker = self.id,
                                    status = status.as_u16(),
                                    "Response error"
                                );
                                WorkerState::Reconnecting
                            }
                            Exchange::Transport(e) => {
                                tracing::warn!(
                                    worker = self.id,
                                    error_kind = error_kind(&e),
                                    error = %e,
                                    "HTTP request error"
                                );
                                WorkerState::Reconnecting
                            }
                        }
                    }
                }

                WorkerState::Reconnecting => {
                    self.stats.record_dead_connection();
                    tokio::select! {
                        _ = cancel.cancelled() => WorkerState::Terminating,
                        _ = tokio::time::sleep(self.config.backoff) => WorkerState::Connecting,
                    }
                }

                WorkerState::Terminating => break,
            };
        }

        tracing::debug!(
            worker = self.id,
            sent = self.stats.requests_sent,
            completed = self.stats.requests_completed,
            dead_connections = self.stats.dead_connections,
            "Worker cancelled"
        );
        self.flush()
    }

    /// Merge local counters into the root and hand them back.
    fn flush(&mut self) -> Stats {
        let stats = std::mem::take(&mut self.stats);
        if let Some(root) = self.root.take() {
            root.merge(&stats);
        }
        stats
    }

    /// Open a fresh session holding at most one idle connection.
    fn connect(&self) -> reqwest::Result<Client> {
        Client::builder()
            .pool_max_idle_per_host(1)
            .connect_timeout(self.config.connect_timeout)
            .timeout(self.config.request_timeout)
            .build()
    }

    async fn exchange(&mut self, client: &Client) -> Exchange {
        let payload = self.generator.generate_with(&mut self.rng);
        self.stats.record_sent();

        let response = match client
            .post(self.config.endpoint.clone())
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Exchange::Transport(e),
        };

        let status = response.status();
        if status.as_u16() >= 400 {
            self.stats.record_error_status(status.as_u16());
            return Exchange::ErrorStatus(status);
        }

        self.stats.record_completed();

        // Drain the body so the connection returns to the session's pool
        match response.bytes().await {
            Ok(_) => Exchange::Completed,
            Err(e) => Exchange::Transport(e),
        }
    }
}

/// Coarse classification of a transport error for logging
fn error_kind(e: &reqwest::Error) -> &'static str {
    if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connection_failed"
    } else if e.is_request() {
        "request_error"
    } else if e.is_body() {
        "body_error"
    } else if e.is_decode() {
        "decode_error"
    } else {
        "unknown"
    }
}

impl Drop for DeliveryWorker {
    fn drop(&mut self) {
        if self.root.is_some() {
            tracing::warn!(
                worker = self.id,
                sent = self.stats.requests_sent,
                "Worker stopped abnormally, merging partial counters"
            );
            self.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Url;
    use serde_json::json;
    use std::time::Duration;

    fn worker(endpoint: &str) -> DeliveryWorker {
        let generator = InstanceGenerator::from_schema(&json!({"type": "boolean"})).unwrap();
        let config = EngineConfig::new(Url::parse(endpoint).unwrap());
        DeliveryWorker::new(0, generator, Arc::new(config))
    }

    #[test]
    fn test_dropped_worker_merges_partial_counters() {
        let root = Arc::new(RootStats::new());
        let mut worker = worker("http://127.0.0.1:9/events/");
        worker.root = Some(root.clone());
        worker.stats.record_sent();
        worker.stats.record_sent();
        worker.stats.record_completed();
        drop(worker);

        let stats = root.snapshot();
        assert_eq!(stats.requests_sent, 2);
        assert_eq!(stats.requests_completed, 1);
    }

    #[test]
    fn test_idle_worker_drop_merges_nothing() {
        let root = Arc::new(RootStats::new());
        let mut worker = worker("http://127.0.0.1:9/events/");
        worker.stats.record_sent();
        drop(worker);
        assert_eq!(root.snapshot(), Stats::new());
    }

    #[tokio::test]
    async fn test_aborted_worker_keeps_counts() {
        // Accepts connections but never answers, so the worker stays in flight
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let acceptor = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let root = Arc::new(RootStats::new());
        let worker = worker(&format!("http://127.0.0.1:{port}/events/"));
        let handle = tokio::spawn(worker.run(CancellationToken::new(), root.clone()));

        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());

        let stats = root.snapshot();
        assert_eq!(stats.requests_sent, 1);
        assert_eq!(stats.requests_completed, 0);
        acceptor.abort();
    }

    #[tokio::test]
    async fn test_normal_exit_merges_once() {
        let root = Arc::new(RootStats::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let stats = worker("http://127.0.0.1:9/events/")
            .run(cancel, root.clone())
            .await;
        assert_eq!(stats, Stats::new());
        assert_eq!(root.snapshot(), Stats::new());
    }
}
