//! Poll-loop dispatchers.
//!
//! A dispatcher ticks on a fixed interval, sizes its claim to the gate's
//! free slots, and spawns one detached executor task per claimed row with a
//! gate permit moved into it. Executions from a previous tick keep running
//! across later ticks; the dispatcher itself never awaits them.
//!
//! A dispatcher tick never crashes the loop: claim errors are logged and
//! retried on the next tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, info};

use lens_core::{AiSource, ArtifactRepository, Error, Result, WorkItemRepository};

use crate::analysis::AnalysisExecutor;
use crate::gate::ConcurrencyGate;
use crate::scrape::ScrapeExecutor;

/// Handle for stopping a running dispatcher.
///
/// Shutdown is cooperative: the loop stops claiming, but already-spawned
/// executions run to completion on the runtime.
pub struct DispatcherHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl DispatcherHandle {
    /// Signal the loop to stop and wait for it to exit.
    pub async fn shutdown(self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("dispatcher already stopped".into()))?;
        self.task
            .await
            .map_err(|e| Error::Internal(format!("dispatcher task panicked: {e}")))
    }
}

/// Dispatcher for one source's scrape queue.
pub struct ScrapeDispatcher {
    source: AiSource,
    work_items: Arc<dyn WorkItemRepository>,
    executor: Arc<ScrapeExecutor>,
    gate: ConcurrencyGate,
    poll_interval: Duration,
}

impl ScrapeDispatcher {
    pub fn new(
        source: AiSource,
        work_items: Arc<dyn WorkItemRepository>,
        executor: Arc<ScrapeExecutor>,
        max_concurrent: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            source,
            work_items,
            executor,
            gate: ConcurrencyGate::new(max_concurrent),
            poll_interval,
        }
    }

    pub fn start(self) -> DispatcherHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });
        DispatcherHandle { shutdown_tx, task }
    }

    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        info!(
            subsystem = "engine",
            component = "scrape_dispatcher",
            source = %self.source,
            max_concurrent = self.gate.capacity(),
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Scrape dispatcher started"
        );

        loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }

            if let Err(e) = self.tick().await {
                error!(
                    subsystem = "engine",
                    component = "scrape_dispatcher",
                    source = %self.source,
                    error = %e,
                    "Dispatch tick failed"
                );
            }

            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = sleep(self.poll_interval) => {}
            }
        }

        info!(
            subsystem = "engine",
            component = "scrape_dispatcher",
            source = %self.source,
            "Scrape dispatcher stopped"
        );
    }

    async fn tick(&self) -> Result<()> {
        let slots = self.gate.available_slots();
        if slots == 0 {
            return Ok(());
        }

        let claimed = self.work_items.claim_batch(self.source, slots as i64).await?;
        if claimed.is_empty() {
            return Ok(());
        }
        debug!(
            subsystem = "engine",
            component = "scrape_dispatcher",
            source = %self.source,
            claimed = claimed.len(),
            "Claimed scrape batch"
        );

        for item in claimed {
            let permit = self.gate.acquire().await?;
            let executor = Arc::clone(&self.executor);
            tokio::spawn(async move {
                let _permit = permit;
                executor.execute(item).await;
            });
        }
        Ok(())
    }
}

/// Dispatcher for the artifact analysis queue.
pub struct AnalysisDispatcher {
    artifacts: Arc<dyn ArtifactRepository>,
    executor: Arc<AnalysisExecutor>,
    gate: ConcurrencyGate,
    poll_interval: Duration,
}

impl AnalysisDispatcher {
    pub fn new(
        artifacts: Arc<dyn ArtifactRepository>,
        executor: Arc<AnalysisExecutor>,
        max_concurrent: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            artifacts,
            executor,
            gate: ConcurrencyGate::new(max_concurrent),
            poll_interval,
        }
    }

    pub fn start(self) -> DispatcherHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });
        DispatcherHandle { shutdown_tx, task }
    }

    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        info!(
            subsystem = "engine",
            component = "analysis_dispatcher",
            max_concurrent = self.gate.capacity(),
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Analysis dispatcher started"
        );

        loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }

            if let Err(e) = self.tick().await {
                error!(
                    subsystem = "engine",
                    component = "analysis_dispatcher",
                    error = %e,
                    "Dispatch tick failed"
                );
            }

            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = sleep(self.poll_interval) => {}
            }
        }

        info!(
            subsystem = "engine",
            component = "analysis_dispatcher",
            "Analysis dispatcher stopped"
        );
    }

    async fn tick(&self) -> Result<()> {
        let slots = self.gate.available_slots();
        if slots == 0 {
            return Ok(());
        }

        let claimed = self.artifacts.claim_batch(slots as i64).await?;
        if claimed.is_empty() {
            return Ok(());
        }
        debug!(
            subsystem = "engine",
            component = "analysis_dispatcher",
            claimed = claimed.len(),
            "Claimed analysis batch"
        );

        for artifact in claimed {
            let permit = self.gate.acquire().await?;
            let executor = Arc::clone(&self.executor);
            tokio::spawn(async move {
                let _permit = permit;
                executor.execute(artifact).await;
            });
        }
        Ok(())
    }
}
