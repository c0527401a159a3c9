//! Mock ingestion endpoint for exercising the delivery engine.
//!
//! Accepts `POST /events/` (and anything below it) and answers with either a
//! fixed status code or one drawn at random from a mix of 2xx/3xx/4xx/5xx
//! codes.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::post,
    Router,
};
use rand::seq::SliceRandom;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;

/// Status codes the endpoint picks from when no fixed status is configured
pub const RANDOM_STATUS_CODES: [u16; 13] = [
    200, 201, 202, 204, 301, 302, 400, 401, 403, 404, 500, 501, 503,
];

/// Configuration for the mock endpoint
#[derive(Debug, Clone, Default)]
pub struct MockEndpointConfig {
    /// Port to listen on (0 for random)
    pub port: u16,
    /// Always answer with this status; random when `None`
    pub status: Option<u16>,
}

#[derive(Debug, Default)]
struct EndpointState {
    status: Option<StatusCode>,
    received: AtomicU64,
}

/// Mock endpoint server
pub struct MockEndpoint {
    config: MockEndpointConfig,
    state: Arc<EndpointState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    port: u16,
}

impl MockEndpoint {
    /// Create a new mock endpoint with the given configuration
    pub fn new(config: MockEndpointConfig) -> anyhow::Result<Self> {
        let status = config
            .status
            .map(StatusCode::from_u16)
            .transpose()
            .map_err(|e| anyhow::anyhow!("Invalid status code: {}", e))?;

        Ok(Self {
            config,
            state: Arc::new(EndpointState {
                status,
                received: AtomicU64::new(0),
            }),
            shutdown_tx: None,
            port: 0,
        })
    }

    /// Bind, start serving in the background and return the actual port
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("127.0.0.1:{}", self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        self.start_on(listener)
    }

    /// Serve on an already bound listener
    pub fn start_on(&mut self, listener: TcpListener) -> anyhow::Result<u16> {
        let port = listener.local_addr()?.port();
        self.port = port;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);

        let app = router(self.state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        Ok(port)
    }

    /// Router sharing this endpoint's state, for serving or in-process calls
    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// URL of the events route
    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}/events/", self.port)
    }

    /// Number of requests received so far
    pub fn received(&self) -> u64 {
        self.state.received.load(Ordering::Relaxed)
    }

    /// Stop the mock endpoint
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockEndpoint {
    fn drop(&mut self) {
        self.stop();
    }
}

fn router(state: Arc<EndpointState>) -> Router {
    Router::new()
        .route("/events/", post(handle_event))
        .route("/events/*rest", post(handle_event))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_event(State(state): State<Arc<EndpointState>>, _body: Bytes) -> StatusCode {
    state.received.fetch_add(1, Ordering::Relaxed);
    match state.status {
        Some(status) => status,
        None => random_status(),
    }
}

fn random_status() -> StatusCode {
    let code = RANDOM_STATUS_CODES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(200);
    StatusCode::from_u16(code).unwrap_or(StatusCode::OK)
}
