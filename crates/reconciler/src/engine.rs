//! The reconciliation engine: one task owning the mutation subscription,
//! the debounce timer, and all per-identifier state.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::select;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use dom_page::{Document, PageEvent};
use sourcecount_selectors::SelectorRegistry;

use crate::filter;
use crate::metrics::{ReconcilerMetrics, ReconcilerMetricsSnapshot};
use crate::scan::{scan_and_process, ScanDeps};
use crate::state::TrackedState;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Trailing-edge debounce window: each qualifying mutation burst
    /// restarts the timer, and the scan runs once the feed quiets down.
    pub debounce_ms: u64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self { debounce_ms: 300 }
    }
}

impl ReconcilerConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Observes document mutations and keeps annotations reconciled.
///
/// Owns its subscription, timer, and state; `start` runs one unconditional
/// scan for content present before observation began, then reacts to the
/// feed. A failed scan is logged and absorbed so the subscription survives
/// for the rest of the page lifetime.
pub struct Reconciler {
    deps: ScanDeps,
    config: ReconcilerConfig,
    task: Option<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl Reconciler {
    pub fn new(
        doc: Arc<Document>,
        registry: Arc<SelectorRegistry>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            deps: ScanDeps {
                doc,
                registry,
                state: Arc::new(TrackedState::new()),
                metrics: Arc::new(ReconcilerMetrics::new()),
            },
            config,
            task: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Start observing. A previous observer task, if any, is aborted.
    pub fn start(&mut self) {
        if let Some(handle) = self.task.take() {
            handle.abort();
        }
        let deps = self.deps.clone();
        let config = self.config.clone();
        let shutdown = self.shutdown.clone();
        let rx = deps.doc.subscribe();
        self.task = Some(tokio::spawn(run_loop(deps, config, rx, shutdown)));
    }

    /// Stop observing and wait for the task to wind down.
    pub async fn stop(&mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.task.take() {
            let _ = handle.await;
        }
    }

    pub fn metrics(&self) -> ReconcilerMetricsSnapshot {
        self.deps.metrics.snapshot()
    }

    pub fn state(&self) -> Arc<TrackedState> {
        Arc::clone(&self.deps.state)
    }

    /// Run one synchronous scan outside the observer task. Useful for
    /// driving reconciliation directly in tests.
    pub fn scan_now(&self) -> bool {
        match scan_and_process(&self.deps) {
            Ok(did_work) => {
                self.deps.metrics.record_scan(did_work);
                did_work
            }
            Err(err) => {
                self.deps.metrics.record_scan_error();
                warn!(target: "reconciler.engine", %err, "scan failed");
                false
            }
        }
    }
}

impl Drop for Reconciler {
    fn drop(&mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.task.take() {
            handle.abort();
        }
    }
}

async fn run_loop(
    deps: ScanDeps,
    config: ReconcilerConfig,
    mut rx: Receiver<PageEvent>,
    shutdown: CancellationToken,
) {
    debug!(target: "reconciler.engine", "reconciler started");

    // Initial scan covers content already rendered before observation began.
    run_scan(&deps);

    let mut pending = false;
    let mut deadline = Instant::now();
    loop {
        select! {
            _ = shutdown.cancelled() => {
                debug!(target: "reconciler.engine", "reconciler shutting down");
                break;
            }
            event = rx.recv() => {
                match event {
                    Ok(event) => {
                        let relevant = filter::is_relevant(&deps.doc, &deps.registry, &event);
                        deps.metrics.record_event(relevant);
                        if relevant {
                            filter::reopen_grown_groups(
                                &deps.doc,
                                &deps.registry,
                                &deps.state,
                                &deps.metrics,
                                &event,
                            );
                            pending = true;
                            deadline = Instant::now() + config.debounce();
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!(target: "reconciler.engine", missed, "mutation feed lagged, scheduling catch-up scan");
                        deps.metrics.record_feed_lag();
                        pending = true;
                        deadline = Instant::now() + config.debounce();
                    }
                    Err(RecvError::Closed) => {
                        debug!(target: "reconciler.engine", "mutation feed closed");
                        break;
                    }
                }
            }
            _ = sleep_until(deadline), if pending => {
                pending = false;
                run_scan(&deps);
            }
        }
    }

    debug!(target: "reconciler.engine", "reconciler exited");
}

fn run_scan(deps: &ScanDeps) {
    match scan_and_process(deps) {
        Ok(did_work) => {
            deps.metrics.record_scan(did_work);
            debug!(target: "reconciler.engine", did_work, "scan completed");
        }
        Err(err) => {
            deps.metrics.record_scan_error();
            warn!(target: "reconciler.engine", %err, "scan failed");
        }
    }
}
