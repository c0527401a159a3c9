//! Final performance report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::error::ReportError;
use crate::stats::{RootStats, Stats};

/// Aggregate statistics with derived rates, ready for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub clients: usize,
    pub requests_sent: u64,
    pub requests_completed: u64,
    /// completed / sent * 100
    pub completion_rate: f64,
    pub errors_by_status: BTreeMap<u16, u64>,
    pub dead_connections: u64,
    /// sent / elapsed
    pub requests_per_second: f64,
    /// requests_per_second / clients
    pub requests_per_second_per_client: f64,
}

impl PerformanceReport {
    /// Build a report from the root statistics of a finished run.
    pub fn from_root(root: &RootStats, clients: usize) -> Result<Self, ReportError> {
        Self::from_parts(root.snapshot(), root.elapsed(), root.started_at(), clients)
    }

    /// Build a report from explicit inputs.
    ///
    /// Fails instead of dividing by zero when nothing was sent, no time
    /// elapsed or there are no clients.
    pub fn from_parts(
        stats: Stats,
        elapsed: Duration,
        started_at: DateTime<Utc>,
        clients: usize,
    ) -> Result<Self, ReportError> {
        if stats.requests_sent == 0 {
            return Err(ReportError::NoRequests);
        }
        if clients == 0 {
            return Err(ReportError::NoClients);
        }
        let elapsed_secs = elapsed.as_secs_f64();
        if elapsed_secs == 0.0 {
            return Err(ReportError::ZeroElapsed);
        }

        let sent = stats.requests_sent as f64;
        let requests_per_second = sent / elapsed_secs;

        Ok(Self {
            started_at,
            elapsed_secs,
            clients,
            requests_sent: stats.requests_sent,
            requests_completed: stats.requests_completed,
            completion_rate: stats.requests_completed as f64 / sent * 100.0,
            errors_by_status: stats.errors_by_status,
            dead_connections: stats.dead_connections,
            requests_per_second,
            requests_per_second_per_client: requests_per_second / clients as f64,
        })
    }

    /// Export the report as JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for PerformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "    --- Performance statistics ---    ")?;
        writeln!(f, "Started at: {}", self.started_at.to_rfc3339())?;
        writeln!(f, "Time spent: {:.3} s", self.elapsed_secs)?;
        writeln!(f, "------------------------------------")?;
        writeln!(f, "Requests sent: {}", self.requests_sent)?;
        writeln!(f, "Requests completed successfully: {}", self.requests_completed)?;
        writeln!(f, "Request completion rate: {:.3}%", self.completion_rate)?;
        if self.errors_by_status.is_empty() {
            writeln!(f, "Error responses: none")?;
        } else {
            writeln!(f, "Error responses:")?;
            for (status, count) in &self.errors_by_status {
                writeln!(f, "  {status}: {count}")?;
            }
        }
        writeln!(f, "Dead connections count: {}", self.dead_connections)?;
        writeln!(f, "------------------------------------")?;
        writeln!(f, "Average RPS (Total): {:.3}", self.requests_per_second)?;
        writeln!(
            f,
            "Average RPS (For single http client, {} clients): {:.3}",
            self.clients, self.requests_per_second_per_client
        )?;
        write!(f, "------------------------------------")
    }
}
