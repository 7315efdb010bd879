use dom_page::{Document, ElementSpec, NodeId};
use sourcecount_selectors::{SelectorRegistry, Target};
use tracing::debug;

use crate::errors::AnnotateError;
use crate::markers::ORDINAL_CLASS;

/// Visual placement of an ordinal label over its item's leading edge.
#[derive(Clone, Copy, Debug)]
pub struct LabelPlacement {
    pub left: &'static str,
    pub layered: bool,
}

impl LabelPlacement {
    /// Placement used for citation source items.
    pub const SOURCE: LabelPlacement = LabelPlacement {
        left: "8px",
        layered: true,
    };

    /// Placement used for visited-website chips.
    pub const WEBSITE: LabelPlacement = LabelPlacement {
        left: "3px",
        layered: false,
    };
}

/// Whether `item` already carries an ordinal label anywhere beneath it.
pub fn is_numbered(doc: &Document, item: NodeId) -> bool {
    doc.descendants(item)
        .into_iter()
        .any(|n| doc.has_class(n, ORDINAL_CLASS))
}

/// Stamp `items` with 1-based ordinal labels, idempotently.
///
/// Each item's label lands on the most specific label target resolvable for
/// `label_target` (falling back to the item itself), so the visible marker
/// tracks the clickable surface across host markup depths. Items already
/// labeled are skipped, which is what makes repeated passes over a growing
/// list safe. Returns how many labels were freshly inserted.
pub fn annotate_items(
    doc: &Document,
    registry: &SelectorRegistry,
    items: &[NodeId],
    label_target: Target,
    placement: LabelPlacement,
) -> Result<usize, AnnotateError> {
    let mut labeled = 0;
    for (index, item) in items.iter().copied().enumerate() {
        if is_numbered(doc, item) {
            continue;
        }
        let target = registry.find_first(doc, item, label_target).unwrap_or(item);

        let span = doc.prepend_child(
            target,
            ElementSpec::new("span")
                .class(ORDINAL_CLASS)
                .text(format!("{}. ", index + 1)),
        )?;
        doc.set_style(span, "font-weight", "bold")?;
        doc.set_style(span, "margin-right", "5px")?;
        doc.set_style(span, "position", "absolute")?;
        doc.set_style(span, "left", placement.left)?;
        doc.set_style(span, "top", "50%")?;
        doc.set_style(span, "transform", "translateY(-50%)")?;
        if placement.layered {
            doc.set_style(span, "z-index", "10")?;
        }

        doc.set_style(target, "position", "relative")?;
        doc.set_style(target, "padding-left", "25px")?;

        labeled += 1;
        debug!(target: "annotator.numbering", index, %item, "ordinal label inserted");
    }
    Ok(labeled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom_page::event_bus;

    fn fixture() -> (std::sync::Arc<Document>, SelectorRegistry) {
        let (bus, _rx) = event_bus(8);
        (Document::new(bus), SelectorRegistry::gemini_defaults())
    }

    fn ordinal_text(doc: &Document, item: NodeId) -> Option<String> {
        doc.descendants(item)
            .into_iter()
            .find(|n| doc.has_class(*n, ORDINAL_CLASS))
            .and_then(|n| doc.text(n))
    }

    #[test]
    fn labels_are_one_based_and_placed_on_the_label_target() {
        let (doc, registry) = fixture();
        let mut items = Vec::new();
        for _ in 0..3 {
            let item = doc
                .append_child(doc.root(), ElementSpec::new("browse-web-item"))
                .unwrap();
            doc.append_child(item, ElementSpec::new("div").class("title-container"))
                .unwrap();
            items.push(item);
        }
        let labeled = annotate_items(
            &doc,
            &registry,
            &items,
            Target::SourceItemLabelTarget,
            LabelPlacement::SOURCE,
        )
        .unwrap();
        assert_eq!(labeled, 3);
        for (i, item) in items.iter().enumerate() {
            assert_eq!(
                ordinal_text(&doc, *item).as_deref(),
                Some(format!("{}. ", i + 1).as_str())
            );
            // Label sits inside the title container, not directly on the item.
            let title = doc.children(*item)[0];
            let span = doc.children(title)[0];
            assert!(doc.has_class(span, ORDINAL_CLASS));
            assert_eq!(doc.style(title, "position").as_deref(), Some("relative"));
        }
    }

    #[test]
    fn annotation_is_idempotent() {
        let (doc, registry) = fixture();
        let item = doc
            .append_child(doc.root(), ElementSpec::new("browse-web-item"))
            .unwrap();
        let items = [item];
        let first = annotate_items(
            &doc,
            &registry,
            &items,
            Target::SourceItemLabelTarget,
            LabelPlacement::SOURCE,
        )
        .unwrap();
        let second = annotate_items(
            &doc,
            &registry,
            &items,
            Target::SourceItemLabelTarget,
            LabelPlacement::SOURCE,
        )
        .unwrap();
        assert_eq!((first, second), (1, 0));
        let spans: Vec<_> = doc
            .descendants(item)
            .into_iter()
            .filter(|n| doc.has_class(*n, ORDINAL_CLASS))
            .collect();
        assert_eq!(spans.len(), 1);
    }

    #[test]
    fn item_without_inner_target_is_labeled_directly() {
        let (doc, registry) = fixture();
        let item = doc
            .append_child(doc.root(), ElementSpec::new("browse-web-chip"))
            .unwrap();
        annotate_items(
            &doc,
            &registry,
            &[item],
            Target::WebsiteItemContent,
            LabelPlacement::WEBSITE,
        )
        .unwrap();
        let span = doc.children(item)[0];
        assert!(doc.has_class(span, ORDINAL_CLASS));
        assert_eq!(doc.style(span, "left").as_deref(), Some("3px"));
        assert_eq!(doc.style(span, "z-index"), None);
    }

    #[test]
    fn growing_list_keeps_existing_labels() {
        let (doc, registry) = fixture();
        let mut items = Vec::new();
        for _ in 0..2 {
            items.push(
                doc.append_child(doc.root(), ElementSpec::new("browse-web-chip"))
                    .unwrap(),
            );
        }
        annotate_items(
            &doc,
            &registry,
            &items,
            Target::WebsiteItemContent,
            LabelPlacement::WEBSITE,
        )
        .unwrap();
        for _ in 0..2 {
            items.push(
                doc.append_child(doc.root(), ElementSpec::new("browse-web-chip"))
                    .unwrap(),
            );
        }
        let fresh = annotate_items(
            &doc,
            &registry,
            &items,
            Target::WebsiteItemContent,
            LabelPlacement::WEBSITE,
        )
        .unwrap();
        assert_eq!(fresh, 2);
        let texts: Vec<_> = items
            .iter()
            .map(|i| ordinal_text(&doc, *i).unwrap())
            .collect();
        assert_eq!(texts, vec!["1. ", "2. ", "3. ", "4. "]);
    }
}
