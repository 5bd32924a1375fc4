//! Live mode: poll the change log and reconcile on a fixed interval.

use crate::error::Result;
use crate::reconciler::{ReconcileReport, Reconciler};
use crate::tailer::ChangeLogTailer;
use senswatch_detect::PathScanner;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info};

/// Drives tail → reconcile cycles until shut down.
#[derive(Debug)]
pub struct LiveRunner<S> {
    tailer: ChangeLogTailer,
    reconciler: Reconciler<S>,
    poll_interval: Duration,
}

impl<S: PathScanner> LiveRunner<S> {
    /// Runner sleeping `poll_interval` before every cycle.
    pub fn new(tailer: ChangeLogTailer, reconciler: Reconciler<S>, poll_interval: Duration) -> Self {
        Self {
            tailer,
            reconciler,
            poll_interval,
        }
    }

    /// The change log tailer.
    pub fn tailer(&self) -> &ChangeLogTailer {
        &self.tailer
    }

    /// One cycle: read new events, reconcile them, then commit the log
    /// offset. On error the offset stays put and the next cycle retries the
    /// same events.
    pub async fn run_cycle(&mut self) -> Result<ReconcileReport> {
        let batch = self.tailer.poll().await?;
        if batch.is_empty() {
            self.tailer.commit(&batch);
            return Ok(ReconcileReport::default());
        }

        info!("Detected {} file changes", batch.events.len());
        let report = self.reconciler.reconcile(&batch.events).await?;
        self.tailer.commit(&batch);
        Ok(report)
    }

    /// Run cycles until `shutdown` resolves. Cycle failures are logged and
    /// do not stop the loop.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(
            "Watching {} every {:?}",
            self.tailer.path().display(),
            self.poll_interval
        );

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Shutdown requested, stopping live mode");
                    break;
                }
                () = tokio::time::sleep(self.poll_interval) => {}
            }

            match self.run_cycle().await {
                Ok(report) if report.changed_index() => {
                    debug!("Cycle complete: {:?}", report);
                }
                Ok(_) => {}
                Err(e) => error!("Reconciliation cycle failed: {}", e),
            }
        }
    }
}
