//! Cooperative shutdown.
//!
//! The coordinator owns the [`CancellationToken`] every worker observes.
//! Interrupt, terminate and the optional run timeout all funnel into
//! [`ShutdownCoordinator::trigger`], which cancels exactly once.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// What initiated the shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Interrupt,
    Terminate,
    Timeout,
    Requested,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Interrupt => write!(f, "interrupt signal"),
            ShutdownReason::Terminate => write!(f, "terminate signal"),
            ShutdownReason::Timeout => write!(f, "run timeout"),
            ShutdownReason::Requested => write!(f, "shutdown request"),
        }
    }
}

#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    triggered: AtomicBool,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token handed to the engine and, through it, to every worker
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::Acquire)
    }

    /// Cancel all workers. Only the first call has an effect; it returns
    /// `true`, every later call returns `false`.
    pub fn trigger(&self, reason: ShutdownReason) -> bool {
        if self.triggered.swap(true, Ordering::AcqRel) {
            tracing::info!("Received {}, shutdown already in progress", reason);
            return false;
        }

        tracing::info!("Received {}, cancelling delivery workers...", reason);
        self.token.cancel();
        true
    }

    /// Wait for interrupt / terminate signals or the run timeout and trigger
    /// shutdown on each. Keeps listening after the first trigger so repeated
    /// signals are absorbed; the caller aborts the task once the engine has
    /// drained.
    pub async fn listen(&self, timeout: Option<Duration>) {
        let deadline = async {
            match timeout {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        let mut terminate = TerminateSignal::install();
        let mut ctrl_c_enabled = true;
        let mut deadline_pending = true;

        loop {
            tokio::select! {
                result = signal::ctrl_c(), if ctrl_c_enabled => match result {
                    Ok(()) => {
                        self.trigger(ShutdownReason::Interrupt);
                    }
                    Err(e) => {
                        tracing::error!("Failed to listen for Ctrl+C: {}", e);
                        ctrl_c_enabled = false;
                    }
                },
                _ = terminate.recv() => {
                    self.trigger(ShutdownReason::Terminate);
                }
                _ = &mut deadline, if deadline_pending => {
                    deadline_pending = false;
                    self.trigger(ShutdownReason::Timeout);
                }
            }
        }
    }
}

#[cfg(unix)]
struct TerminateSignal(Option<signal::unix::Signal>);

#[cfg(unix)]
impl TerminateSignal {
    fn install() -> Self {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(stream) => Self(Some(stream)),
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                Self(None)
            }
        }
    }

    async fn recv(&mut self) {
        if let Some(stream) = &mut self.0 {
            if stream.recv().await.is_some() {
                return;
            }
            self.0 = None;
        }
        std::future::pending::<()>().await
    }
}

#[cfg(not(unix))]
struct TerminateSignal;

#[cfg(not(unix))]
impl TerminateSignal {
    fn install() -> Self {
        Self
    }

    async fn recv(&mut self) {
        std::future::pending::<()>().await
    }
}
