//! Mutation relevance filtering. Most page churn is unrelated to research
//! content; only insertions that match (or contain) a watched target may
//! schedule a scan.

use dom_page::{Document, NodeId, PageEvent};
use sourcecount_annotator::markers::GROUP_PROCESSED_ATTR;
use sourcecount_selectors::{SelectorRegistry, Target};
use tracing::debug;

use crate::metrics::ReconcilerMetrics;
use crate::state::TrackedState;

/// Targets whose appearance anywhere in an inserted subtree warrants a scan.
pub const WATCHED_TARGETS: [Target; 6] = [
    Target::ResultContainer,
    Target::ActiveResearchPanel,
    Target::ThinkingPanel,
    Target::SourceListRegion,
    Target::WebsiteGroup,
    Target::WebsiteItem,
];

/// Whether `node` itself matches `target` or contains a match.
pub fn matches_or_contains(
    doc: &Document,
    registry: &SelectorRegistry,
    node: NodeId,
    target: Target,
) -> bool {
    registry.matches(doc, node, target) || registry.find_first(doc, node, target).is_some()
}

/// Whether this mutation batch touches anything the engine tracks.
pub fn is_relevant(doc: &Document, registry: &SelectorRegistry, event: &PageEvent) -> bool {
    match event {
        PageEvent::ChildList { added, .. } => added.iter().any(|node| {
            WATCHED_TARGETS
                .iter()
                .any(|target| matches_or_contains(doc, registry, *node, *target))
        }),
    }
}

/// Reopen already-numbered groups that just gained items, so the next scan
/// runs a fresh, idempotent numbering pass over them.
pub fn reopen_grown_groups(
    doc: &Document,
    registry: &SelectorRegistry,
    state: &TrackedState,
    metrics: &ReconcilerMetrics,
    event: &PageEvent,
) {
    let PageEvent::ChildList { added, .. } = event;
    for node in added {
        if !matches_or_contains(doc, registry, *node, Target::WebsiteItem) {
            continue;
        }
        // A freshly inserted subtree that brings its own group is not a
        // reopening; only growth inside an existing group counts.
        if registry.matches(doc, *node, Target::WebsiteGroup)
            || registry.find_first(doc, *node, Target::WebsiteGroup).is_some()
        {
            continue;
        }
        if let Some(group) = enclosing_group(doc, registry, *node) {
            if let Some(group_id) = state.reopen_group_for_node(group) {
                let _ = doc.remove_attr(group, GROUP_PROCESSED_ATTR);
                metrics.record_group_reopened();
                debug!(target: "reconciler.events", group = %group_id, "numbered group reopened");
            }
        }
    }
}

fn enclosing_group(doc: &Document, registry: &SelectorRegistry, node: NodeId) -> Option<NodeId> {
    let mut cursor = Some(node);
    while let Some(current) = cursor {
        if registry.matches(doc, current, Target::WebsiteGroup) {
            return Some(current);
        }
        cursor = doc.parent(current);
    }
    None
}
