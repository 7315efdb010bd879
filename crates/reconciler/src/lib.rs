//! The reconciliation core: observes the document's mutation feed, filters
//! it down to relevant insertions, debounces bursts, and drives idempotent
//! scans that bring injected annotations back into agreement with current
//! content.

pub mod engine;
pub mod errors;
pub mod filter;
pub mod metrics;
pub mod scan;
pub mod state;

pub use engine::{Reconciler, ReconcilerConfig};
pub use errors::ReconcilerError;
pub use metrics::{ReconcilerMetrics, ReconcilerMetricsSnapshot};
pub use scan::{scan_and_process, ScanDeps};
pub use state::{ContainerPhase, ContainerRecord, GroupPhase, GroupRecord, TrackedState};
