//! Asynchronous chart builds.
//!
//! Chart builds are pure and synchronous, so they run on the blocking
//! pool. A newer batch supersedes older ones: results of a stale batch
//! are discarded when they arrive rather than interrupted.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Result of a chart job.
#[derive(Debug, PartialEq)]
pub enum JobOutcome<T> {
    Completed(T),
    /// A newer batch started before this job finished.
    Superseded,
    /// The job did not finish within the configured timeout.
    TimedOut,
}

/// Identifies the batch a job belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// Runs chart builds off the async runtime.
#[derive(Debug, Clone, Default)]
pub struct ChartJobs {
    generation: Arc<AtomicU64>,
    timeout: Option<Duration>,
}

impl ChartJobs {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            generation: Arc::new(AtomicU64::new(0)),
            timeout,
        }
    }

    /// Start a new batch, superseding every earlier one.
    pub fn begin_batch(&self) -> Ticket {
        Ticket(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Whether `ticket` still belongs to the latest batch.
    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket.0
    }

    /// Run `build` on the blocking pool as part of `ticket`'s batch.
    pub async fn run<T, F>(&self, ticket: Ticket, name: &str, build: F) -> Result<JobOutcome<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        debug!("Starting chart job {}", name);
        let handle = tokio::task::spawn_blocking(build);

        let joined = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!("Chart job {} timed out after {}s", name, limit.as_secs_f64());
                    return Ok(JobOutcome::TimedOut);
                }
            },
            None => handle.await,
        };
        let value = joined.with_context(|| format!("Chart job {} panicked", name))?;

        if !self.is_current(ticket) {
            debug!("Discarding stale result of chart job {}", name);
            return Ok(JobOutcome::Superseded);
        }
        Ok(JobOutcome::Completed(value))
    }
}
