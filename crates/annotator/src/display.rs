use dom_page::{Document, ElementSpec, NodeId};
use sourcecount_core_types::{ContainerId, ContainerKind};
use sourcecount_selectors::{SelectorRegistry, Target};
use tracing::debug;

use crate::errors::AnnotateError;
use crate::markers::display_id;

/// Current counts for one container's summary text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counts {
    pub used: usize,
    pub unused: usize,
    pub research_websites: usize,
    pub in_progress: bool,
}

/// Render the summary text. These two templates are the literal
/// user-visible contract; nothing else is valid.
pub fn render_summary(counts: &Counts) -> String {
    if counts.in_progress {
        return format!(
            "Research in progress: {} websites visited",
            counts.research_websites
        );
    }
    let mut text = format!(
        "Sources Count -> Used: {}, Not Used: {}",
        counts.used, counts.unused
    );
    if counts.research_websites > 0 {
        text.push_str(&format!(
            ", Research Websites: {}",
            counts.research_websites
        ));
    }
    text
}

/// The summary element for `container_id`, if one exists.
pub fn find_display(doc: &Document, container_id: &ContainerId) -> Option<NodeId> {
    doc.find_by_id(&display_id(container_id))
}

/// Return the existing summary element for `container_id`, or create, style,
/// and insert one at the container's resolved anchor. Never creates a
/// duplicate. Returns `None` only when a completed container has no
/// resolvable insertion anchor, in which case the feature is skipped.
pub fn ensure_display(
    doc: &Document,
    registry: &SelectorRegistry,
    container: NodeId,
    container_id: &ContainerId,
    kind: ContainerKind,
) -> Result<Option<NodeId>, AnnotateError> {
    if let Some(existing) = find_display(doc, container_id) {
        return Ok(Some(existing));
    }

    let initial = match kind {
        ContainerKind::ActiveResearch => render_summary(&Counts {
            in_progress: true,
            ..Counts::default()
        }),
        ContainerKind::CompletedResult => render_summary(&Counts::default()),
    };
    let spec = ElementSpec::new("div")
        .attr("id", display_id(container_id))
        .text(initial);

    let display = match kind {
        ContainerKind::CompletedResult => {
            let anchor = match registry.find_first(doc, container, Target::InsertionPoint) {
                Some(anchor) => anchor,
                None => {
                    debug!(target: "annotator.display", container = %container_id, "no insertion anchor");
                    return Ok(None);
                }
            };
            doc.prepend_child(anchor, spec)?
        }
        ContainerKind::ActiveResearch => {
            // Preference order: after a toolbar, after a header, at the
            // start of the research content, else first child of the panel.
            if let Some(toolbar) = registry.find_first(doc, container, Target::SummaryToolbar) {
                doc.insert_after(toolbar, spec)?
            } else if let Some(header) = registry.find_first(doc, container, Target::SummaryHeader)
            {
                doc.insert_after(header, spec)?
            } else if let Some(content) =
                registry.find_first(doc, container, Target::ResearchContent)
            {
                doc.prepend_child(content, spec)?
            } else {
                doc.prepend_child(container, spec)?
            }
        }
    };

    doc.set_style(display, "font-weight", "bold")?;
    doc.set_style(display, "padding", "8px 16px 4px 24px")?;
    doc.set_style(display, "font-size", "0.9em")?;
    doc.set_style(
        display,
        "color",
        "var(--mat-sidenav-content-text-color, #3c4043)",
    )?;
    doc.set_style(
        display,
        "border-bottom",
        "1px solid var(--mat-divider-color, #dadce0)",
    )?;
    doc.set_style(display, "margin-bottom", "8px")?;

    let display_node = display;
    debug!(target: "annotator.display", container = %container_id, display = %display_node, "summary display created");
    Ok(Some(display))
}

/// Rewrite the summary text from current counts.
pub fn update_display(
    doc: &Document,
    display: NodeId,
    counts: &Counts,
) -> Result<(), AnnotateError> {
    doc.set_text(display, render_summary(counts))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom_page::event_bus;

    fn fixture() -> (std::sync::Arc<Document>, SelectorRegistry) {
        let (bus, _rx) = event_bus(8);
        (Document::new(bus), SelectorRegistry::gemini_defaults())
    }

    #[test]
    fn template_exactness() {
        assert_eq!(
            render_summary(&Counts {
                used: 3,
                unused: 2,
                research_websites: 0,
                in_progress: false
            }),
            "Sources Count -> Used: 3, Not Used: 2"
        );
        assert_eq!(
            render_summary(&Counts {
                used: 3,
                unused: 2,
                research_websites: 5,
                in_progress: false
            }),
            "Sources Count -> Used: 3, Not Used: 2, Research Websites: 5"
        );
        assert_eq!(
            render_summary(&Counts {
                used: 0,
                unused: 0,
                research_websites: 7,
                in_progress: true
            }),
            "Research in progress: 7 websites visited"
        );
    }

    #[test]
    fn graceful_absence_renders_zeroes_without_suffix() {
        assert_eq!(
            render_summary(&Counts::default()),
            "Sources Count -> Used: 0, Not Used: 0"
        );
    }

    #[test]
    fn ensure_is_idempotent_per_container_id() {
        let (doc, registry) = fixture();
        let container = doc
            .append_child(doc.root(), ElementSpec::new("response-container"))
            .unwrap();
        doc.append_child(
            container,
            ElementSpec::new("div").class("response-container-content"),
        )
        .unwrap();
        let id = ContainerId::new("c1");
        let first = ensure_display(&doc, &registry, container, &id, ContainerKind::CompletedResult)
            .unwrap()
            .unwrap();
        let second = ensure_display(&doc, &registry, container, &id, ContainerKind::CompletedResult)
            .unwrap()
            .unwrap();
        assert_eq!(first, second);
        let matches: Vec<_> = doc
            .descendants(doc.root())
            .into_iter()
            .filter(|n| doc.attr(*n, "id").as_deref() == Some("source-counter-display-c1"))
            .collect();
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn completed_display_prepends_into_anchor() {
        let (doc, registry) = fixture();
        let container = doc
            .append_child(doc.root(), ElementSpec::new("response-container"))
            .unwrap();
        let anchor = doc
            .append_child(
                container,
                ElementSpec::new("div").class("response-container-content"),
            )
            .unwrap();
        doc.append_child(anchor, ElementSpec::new("p")).unwrap();
        let id = ContainerId::new("c2");
        let display = ensure_display(&doc, &registry, container, &id, ContainerKind::CompletedResult)
            .unwrap()
            .unwrap();
        assert_eq!(doc.first_child(anchor), Some(display));
    }

    #[test]
    fn completed_display_without_anchor_is_skipped() {
        let (doc, registry) = fixture();
        let container = doc
            .append_child(doc.root(), ElementSpec::new("response-container"))
            .unwrap();
        let id = ContainerId::new("c3");
        let display =
            ensure_display(&doc, &registry, container, &id, ContainerKind::CompletedResult)
                .unwrap();
        assert!(display.is_none());
    }

    #[test]
    fn active_display_prefers_toolbar_then_header() {
        let (doc, registry) = fixture();
        let panel = doc
            .append_child(doc.root(), ElementSpec::new("extended-response-panel"))
            .unwrap();
        let header = doc.append_child(panel, ElementSpec::new("header")).unwrap();
        let toolbar = doc.append_child(panel, ElementSpec::new("toolbar")).unwrap();
        let id = ContainerId::new("c4");
        let display = ensure_display(&doc, &registry, panel, &id, ContainerKind::ActiveResearch)
            .unwrap()
            .unwrap();
        // Toolbar wins even though the header comes first in document order.
        assert_eq!(doc.children(panel), vec![header, toolbar, display]);
        assert_eq!(
            doc.text(display).as_deref(),
            Some("Research in progress: 0 websites visited")
        );
    }

    #[test]
    fn active_display_falls_back_to_panel_start() {
        let (doc, registry) = fixture();
        let panel = doc
            .append_child(doc.root(), ElementSpec::new("extended-response-panel"))
            .unwrap();
        let thinking = doc
            .append_child(panel, ElementSpec::new("thinking-panel"))
            .unwrap();
        let id = ContainerId::new("c5");
        let display = ensure_display(&doc, &registry, panel, &id, ContainerKind::ActiveResearch)
            .unwrap()
            .unwrap();
        assert_eq!(doc.children(panel), vec![display, thinking]);
    }

    #[test]
    fn update_rewrites_text() {
        let (doc, registry) = fixture();
        let panel = doc
            .append_child(doc.root(), ElementSpec::new("extended-response-panel"))
            .unwrap();
        let id = ContainerId::new("c6");
        let display = ensure_display(&doc, &registry, panel, &id, ContainerKind::ActiveResearch)
            .unwrap()
            .unwrap();
        update_display(
            &doc,
            display,
            &Counts {
                research_websites: 7,
                in_progress: true,
                ..Counts::default()
            },
        )
        .unwrap();
        assert_eq!(
            doc.text(display).as_deref(),
            Some("Research in progress: 7 websites visited")
        );
    }
}
