use dom_page::{Document, NodeId};
use sourcecount_core_types::ContainerKind;
use sourcecount_selectors::{SelectorRegistry, Target};

use crate::markers::IN_PROGRESS_ATTR;

/// Nested regions of interest inside a container. Every field is optional;
/// a missing region skips that feature and contributes a zero count.
#[derive(Clone, Copy, Debug, Default)]
pub struct Regions {
    pub used_list: Option<NodeId>,
    pub unused_list: Option<NodeId>,
    pub thinking_panel: Option<NodeId>,
    pub insertion_anchor: Option<NodeId>,
}

/// Decide what `node` is. Pure inspection; callers perform all mutation.
///
/// A completed result must expose either sources or a thinking panel, plus
/// a resolvable summary insertion anchor. An in-progress panel must expose
/// a thinking panel and not yet carry the in-progress claim.
pub fn classify(doc: &Document, registry: &SelectorRegistry, node: NodeId) -> Option<ContainerKind> {
    if registry.matches(doc, node, Target::ResultContainer) {
        let has_sources = registry.find_first(doc, node, Target::SourceListRegion).is_some()
            || registry.find_first(doc, node, Target::UsedSourceList).is_some()
            || registry.find_first(doc, node, Target::UnusedSourceList).is_some();
        let has_thinking = registry.find_first(doc, node, Target::ThinkingPanel).is_some();
        let has_anchor = registry.find_first(doc, node, Target::InsertionPoint).is_some();
        if (has_sources || has_thinking) && has_anchor {
            return Some(ContainerKind::CompletedResult);
        }
        // Not completed yet; a node can still qualify as an in-progress
        // panel below while its result markup fills in.
    }

    if registry.matches(doc, node, Target::ActiveResearchPanel)
        && registry.find_first(doc, node, Target::ThinkingPanel).is_some()
        && !doc.has_attr(node, IN_PROGRESS_ATTR)
    {
        return Some(ContainerKind::ActiveResearch);
    }

    None
}

/// Resolve the nested regions of `container`. Used/unused lists are looked
/// up inside the source-list region first, then anywhere in the container,
/// matching how the host relocates them across revisions.
pub fn locate_regions(doc: &Document, registry: &SelectorRegistry, container: NodeId) -> Regions {
    let region = registry.find_first(doc, container, Target::SourceListRegion);
    let used_list = region
        .and_then(|r| registry.find_first(doc, r, Target::UsedSourceList))
        .or_else(|| registry.find_first(doc, container, Target::UsedSourceList));
    let unused_list = region
        .and_then(|r| registry.find_first(doc, r, Target::UnusedSourceList))
        .or_else(|| registry.find_first(doc, container, Target::UnusedSourceList));
    Regions {
        used_list,
        unused_list,
        thinking_panel: registry.find_first(doc, container, Target::ThinkingPanel),
        insertion_anchor: registry.find_first(doc, container, Target::InsertionPoint),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom_page::{event_bus, ElementSpec};

    fn fixture() -> (std::sync::Arc<Document>, SelectorRegistry) {
        let (bus, _rx) = event_bus(8);
        (Document::new(bus), SelectorRegistry::gemini_defaults())
    }

    #[test]
    fn completed_result_needs_content_and_anchor() {
        let (doc, registry) = fixture();
        let container = doc
            .append_child(doc.root(), ElementSpec::new("response-container"))
            .unwrap();
        // Anchor alone is not enough.
        doc.append_child(
            container,
            ElementSpec::new("div").class("response-container-content"),
        )
        .unwrap();
        assert_eq!(classify(&doc, &registry, container), None);

        doc.append_child(container, ElementSpec::new("deep-research-source-lists"))
            .unwrap();
        assert_eq!(
            classify(&doc, &registry, container),
            Some(ContainerKind::CompletedResult)
        );
    }

    #[test]
    fn thinking_panel_qualifies_a_result_container() {
        let (doc, registry) = fixture();
        let container = doc
            .append_child(doc.root(), ElementSpec::new("response-container"))
            .unwrap();
        doc.append_child(
            container,
            ElementSpec::new("div").class("response-container-content"),
        )
        .unwrap();
        doc.append_child(container, ElementSpec::new("thinking-panel"))
            .unwrap();
        assert_eq!(
            classify(&doc, &registry, container),
            Some(ContainerKind::CompletedResult)
        );
    }

    #[test]
    fn active_panel_requires_unclaimed_thinking_panel() {
        let (doc, registry) = fixture();
        let panel = doc
            .append_child(doc.root(), ElementSpec::new("extended-response-panel"))
            .unwrap();
        assert_eq!(classify(&doc, &registry, panel), None);

        doc.append_child(panel, ElementSpec::new("thinking-panel"))
            .unwrap();
        assert_eq!(
            classify(&doc, &registry, panel),
            Some(ContainerKind::ActiveResearch)
        );

        doc.set_attr(panel, IN_PROGRESS_ATTR, "true").unwrap();
        assert_eq!(classify(&doc, &registry, panel), None);
    }

    #[test]
    fn regions_fall_back_to_container_wide_lookup() {
        let (doc, registry) = fixture();
        let container = doc
            .append_child(doc.root(), ElementSpec::new("response-container"))
            .unwrap();
        // Used list outside any source-list region.
        let used = doc
            .append_child(
                container,
                ElementSpec::new("div").class("source-list").class("used-sources"),
            )
            .unwrap();
        let regions = locate_regions(&doc, &registry, container);
        assert_eq!(regions.used_list, Some(used));
        assert_eq!(regions.unused_list, None);
        assert_eq!(regions.insertion_anchor, None);
    }
}
