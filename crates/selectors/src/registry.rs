use std::collections::HashMap;

use tracing::debug;

use dom_page::{Document, NodeId};

use crate::errors::SelectorError;
use crate::model::{Query, Target};

/// Serializable form of a registry: raw query strings per target. Values may
/// contain comma-separated alternatives, as the host's selector strings do.
pub type RegistryTable = HashMap<Target, Vec<String>>;

/// Ranked structural query lists, one per logical target.
///
/// Resolution policy: queries are tried in order and the first structural
/// match wins; no match from any alternative is an expected state, not an
/// error.
#[derive(Clone, Debug, Default)]
pub struct SelectorRegistry {
    table: HashMap<Target, Vec<Query>>,
}

impl SelectorRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The selector set recognizing the host markup variants observed so
    /// far. Appending here is the whole cost of tracking a markup revision.
    pub fn gemini_defaults() -> Self {
        let mut registry = Self::empty();
        for (target, list) in DEFAULT_TABLE {
            for raw in *list {
                match Query::parse_list(raw) {
                    Ok(queries) => registry.table.entry(*target).or_default().extend(queries),
                    Err(err) => debug!(target: "selectors", %err, %raw, "skipping builtin query"),
                }
            }
        }
        registry
    }

    /// Build a registry from its serializable table form.
    pub fn from_table(table: &RegistryTable) -> Result<Self, SelectorError> {
        let mut registry = Self::empty();
        for (target, list) in table {
            for raw in list {
                let queries = Query::parse_list(raw)?;
                registry.table.entry(*target).or_default().extend(queries);
            }
        }
        Ok(registry)
    }

    pub fn to_table(&self) -> RegistryTable {
        self.table
            .iter()
            .map(|(target, queries)| {
                (
                    *target,
                    queries.iter().map(|q| q.as_str().to_string()).collect(),
                )
            })
            .collect()
    }

    /// Append a lower-ranked alternative for `target`.
    pub fn push(&mut self, target: Target, query: Query) {
        self.table.entry(target).or_default().push(query);
    }

    pub fn queries(&self, target: Target) -> &[Query] {
        self.table.get(&target).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `node` itself satisfies any query for `target`.
    pub fn matches(&self, doc: &Document, node: NodeId, target: Target) -> bool {
        self.queries(target).iter().any(|q| q.matches(doc, node))
    }

    /// First-match-wins resolution inside `scope`: queries are tried in
    /// rank order, and the first query with any structural match yields its
    /// first match in document order.
    pub fn find_first(&self, doc: &Document, scope: NodeId, target: Target) -> Option<NodeId> {
        let descendants = doc.descendants(scope);
        for query in self.queries(target) {
            if let Some(found) = descendants.iter().find(|n| query.matches(doc, **n)) {
                return Some(*found);
            }
        }
        None
    }

    /// All descendants of `scope` matching any query for `target`, in
    /// document order. Mirrors how the host's union selectors enumerate.
    pub fn find_all(&self, doc: &Document, scope: NodeId, target: Target) -> Vec<NodeId> {
        let queries = self.queries(target);
        if queries.is_empty() {
            return Vec::new();
        }
        doc.descendants(scope)
            .into_iter()
            .filter(|n| queries.iter().any(|q| q.matches(doc, *n)))
            .collect()
    }
}

const DEFAULT_TABLE: &[(Target, &[&str])] = &[
    (Target::ResultContainer, &["response-container"]),
    (
        Target::ActiveResearchPanel,
        &["extended-response-panel", "deep-research-immersive-panel"],
    ),
    (Target::ThinkingPanel, &["thinking-panel"]),
    (
        Target::SourceListRegion,
        &["deep-research-source-lists, source-list-container"],
    ),
    (
        Target::UsedSourceList,
        &["div.source-list.used-sources, div.used-sources"],
    ),
    (
        Target::UnusedSourceList,
        &["div.source-list.unused-sources, div.unused-sources"],
    ),
    (Target::SourceItem, &["browse-web-item, browse-chip-item"]),
    (
        Target::SourceItemLabelTarget,
        &[
            "div.title-container",
            ".browse-item",
            ".mat-ripple.browse-item",
            "span[data-test-id=\"content\"]",
            ".browse-chip",
        ],
    ),
    (Target::WebsiteGroup, &[".browse-container"]),
    (Target::WebsiteItem, &["browse-web-chip"]),
    (Target::WebsiteItemContent, &[".browse-chip"]),
    (
        Target::InsertionPoint,
        &[".response-container-content, .research-content"],
    ),
    (Target::SummaryToolbar, &["toolbar"]),
    (Target::SummaryHeader, &["header, .header"]),
    (Target::ResearchContent, &[".research-content"]),
];
