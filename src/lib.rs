//! Augments a host chat application's live page with research-source
//! annotations: numbers every citation and visited-website entry, and keeps
//! a per-response summary banner of used/unused source counts up to date as
//! content streams in.
//!
//! The host page is modeled by [`dom_page::Document`]; the engine observes
//! its mutation feed and reconciles annotations idempotently. Attach it to
//! a document and start it:
//!
//! ```
//! use std::sync::Arc;
//! use source_counter::{event_bus, Document, SourceCounter};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (bus, _rx) = event_bus(64);
//! let doc = Document::new(bus);
//! let mut counter = SourceCounter::attach(Arc::clone(&doc));
//! counter.start();
//! // ... host mutates the document; annotations follow ...
//! counter.stop().await;
//! # }
//! ```

use std::sync::Arc;

pub use dom_page::{event_bus, Document, DomError, ElementSpec, EventBus, NodeId, PageEvent};
pub use sourcecount_annotator::{find_display, render_summary, Counts};
pub use sourcecount_core_types::{ContainerId, ContainerKind, GroupId};
pub use sourcecount_reconciler::{
    scan_and_process, Reconciler, ReconcilerConfig, ReconcilerMetricsSnapshot, ScanDeps,
    TrackedState,
};
pub use sourcecount_selectors::{Query, RegistryTable, SelectorRegistry, SelectorError, Target};

/// The assembled annotation engine for one document.
pub struct SourceCounter {
    reconciler: Reconciler,
}

impl SourceCounter {
    /// Attach with the built-in selector set and default debounce.
    pub fn attach(doc: Arc<Document>) -> Self {
        Self::attach_with(
            doc,
            SelectorRegistry::gemini_defaults(),
            ReconcilerConfig::default(),
        )
    }

    /// Attach with a custom selector registry and configuration.
    pub fn attach_with(
        doc: Arc<Document>,
        registry: SelectorRegistry,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            reconciler: Reconciler::new(doc, Arc::new(registry), config),
        }
    }

    /// Begin observing: one unconditional scan for content already present,
    /// then mutation-driven reconciliation.
    pub fn start(&mut self) {
        self.reconciler.start();
    }

    /// Stop observing and wait for the engine task to wind down.
    pub async fn stop(&mut self) {
        self.reconciler.stop().await;
    }

    /// Run one synchronous reconciliation pass outside the observer.
    pub fn scan_now(&self) -> bool {
        self.reconciler.scan_now()
    }

    pub fn metrics(&self) -> ReconcilerMetricsSnapshot {
        self.reconciler.metrics()
    }

    pub fn state(&self) -> Arc<TrackedState> {
        self.reconciler.state()
    }
}
