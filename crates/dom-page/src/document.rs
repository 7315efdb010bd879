use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use tracing::debug;

use crate::errors::DomError;
use crate::events::PageEvent;
use crate::ids::NodeId;
use crate::EventBus;

/// Description of an element to insert.
#[derive(Clone, Debug, Default)]
pub struct ElementSpec {
    tag: String,
    classes: Vec<String>,
    attrs: Vec<(String, String)>,
    text: Option<String>,
}

impl ElementSpec {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

#[derive(Debug)]
struct NodeData {
    tag: String,
    classes: Vec<String>,
    attrs: HashMap<String, String>,
    styles: HashMap<String, String>,
    text: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attached: bool,
}

impl NodeData {
    fn from_spec(spec: ElementSpec, parent: Option<NodeId>) -> Self {
        Self {
            tag: spec.tag,
            classes: spec.classes,
            attrs: spec.attrs.into_iter().collect(),
            styles: HashMap::new(),
            text: spec.text,
            parent,
            children: Vec::new(),
            attached: true,
        }
    }
}

#[derive(Debug, Default)]
struct Tree {
    nodes: Vec<NodeData>,
}

impl Tree {
    fn get(&self, id: NodeId) -> Result<&NodeData, DomError> {
        self.nodes
            .get(id.0 as usize)
            .ok_or(DomError::Unknown(id))
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut NodeData, DomError> {
        self.nodes
            .get_mut(id.0 as usize)
            .ok_or(DomError::Unknown(id))
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u64);
        self.nodes.push(data);
        id
    }
}

/// The live element tree. All access is synchronous; mutators publish
/// [`PageEvent`] records on the attached bus.
pub struct Document {
    tree: RwLock<Tree>,
    bus: EventBus,
    root: NodeId,
}

impl Document {
    /// Create a document with an empty `body` root, publishing mutations on
    /// the given bus.
    pub fn new(bus: EventBus) -> Arc<Self> {
        let mut tree = Tree::default();
        let root = tree.push(NodeData::from_spec(ElementSpec::new("body"), None));
        Arc::new(Self {
            tree: RwLock::new(tree),
            bus,
            root,
        })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<PageEvent> {
        self.bus.subscribe()
    }

    // --- mutators -------------------------------------------------------

    /// Insert a new element as the last child of `parent`.
    pub fn append_child(&self, parent: NodeId, spec: ElementSpec) -> Result<NodeId, DomError> {
        self.insert(parent, spec, InsertAt::End)
    }

    /// Insert a new element as the first child of `parent`.
    pub fn prepend_child(&self, parent: NodeId, spec: ElementSpec) -> Result<NodeId, DomError> {
        self.insert(parent, spec, InsertAt::Start)
    }

    /// Insert a new element as the next sibling of `sibling`.
    pub fn insert_after(&self, sibling: NodeId, spec: ElementSpec) -> Result<NodeId, DomError> {
        let parent = {
            let tree = self.tree.read();
            tree.get(sibling)?
                .parent
                .ok_or(DomError::Unknown(sibling))?
        };
        self.insert(parent, spec, InsertAt::After(sibling))
    }

    /// Detach `child` (and its subtree) from `parent`.
    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        {
            let mut tree = self.tree.write();
            let position = tree
                .get(parent)?
                .children
                .iter()
                .position(|c| *c == child)
                .ok_or(DomError::NotAChild { parent, child })?;
            tree.get_mut(parent)?.children.remove(position);
            tree.get_mut(child)?.parent = None;
            detach_subtree(&mut tree, child);
        }
        self.publish(PageEvent::ChildList {
            parent,
            added: Vec::new(),
            removed: vec![child],
            ts: now_ts(),
        });
        Ok(())
    }

    pub fn set_attr(&self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let mut tree = self.tree.write();
        tree.get_mut(node)?
            .attrs
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    pub fn remove_attr(&self, node: NodeId, name: &str) -> Result<(), DomError> {
        let mut tree = self.tree.write();
        tree.get_mut(node)?.attrs.remove(name);
        Ok(())
    }

    pub fn set_style(&self, node: NodeId, prop: &str, value: &str) -> Result<(), DomError> {
        let mut tree = self.tree.write();
        tree.get_mut(node)?
            .styles
            .insert(prop.to_string(), value.to_string());
        Ok(())
    }

    pub fn set_text(&self, node: NodeId, text: impl Into<String>) -> Result<(), DomError> {
        let mut tree = self.tree.write();
        tree.get_mut(node)?.text = Some(text.into());
        Ok(())
    }

    // --- accessors ------------------------------------------------------

    pub fn tag(&self, node: NodeId) -> Option<String> {
        self.tree.read().get(node).ok().map(|n| n.tag.clone())
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<String> {
        self.tree
            .read()
            .get(node)
            .ok()
            .and_then(|n| n.attrs.get(name).cloned())
    }

    pub fn has_attr(&self, node: NodeId, name: &str) -> bool {
        self.tree
            .read()
            .get(node)
            .map(|n| n.attrs.contains_key(name))
            .unwrap_or(false)
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.tree
            .read()
            .get(node)
            .map(|n| n.classes.iter().any(|c| c == class))
            .unwrap_or(false)
    }

    pub fn style(&self, node: NodeId, prop: &str) -> Option<String> {
        self.tree
            .read()
            .get(node)
            .ok()
            .and_then(|n| n.styles.get(prop).cloned())
    }

    pub fn text(&self, node: NodeId) -> Option<String> {
        self.tree.read().get(node).ok().and_then(|n| n.text.clone())
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.tree.read().get(node).ok().and_then(|n| n.parent)
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.tree
            .read()
            .get(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.tree
            .read()
            .get(node)
            .ok()
            .and_then(|n| n.children.first().copied())
    }

    /// Preorder descendants of `node`, excluding `node` itself.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let tree = self.tree.read();
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = match tree.get(node) {
            Ok(data) => data.children.iter().rev().copied().collect(),
            Err(_) => return out,
        };
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Ok(data) = tree.get(next) {
                stack.extend(data.children.iter().rev().copied());
            }
        }
        out
    }

    /// Whether `node` is inside the subtree rooted at `ancestor`.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let tree = self.tree.read();
        let mut cursor = tree.get(node).ok().and_then(|n| n.parent);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = tree.get(current).ok().and_then(|n| n.parent);
        }
        false
    }

    pub fn is_attached(&self, node: NodeId) -> bool {
        self.tree
            .read()
            .get(node)
            .map(|n| n.attached)
            .unwrap_or(false)
    }

    /// First element in document order whose `id` attribute equals `id`.
    pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
        if self.attr(self.root, "id").as_deref() == Some(id) {
            return Some(self.root);
        }
        self.descendants(self.root)
            .into_iter()
            .find(|n| self.attr(*n, "id").as_deref() == Some(id))
    }

    pub fn node_count(&self) -> usize {
        self.tree.read().nodes.len()
    }

    // --- internals ------------------------------------------------------

    fn insert(&self, parent: NodeId, spec: ElementSpec, at: InsertAt) -> Result<NodeId, DomError> {
        let id = {
            let mut tree = self.tree.write();
            tree.get(parent)?;
            let id = tree.push(NodeData::from_spec(spec, Some(parent)));
            let children = &mut tree.get_mut(parent)?.children;
            match at {
                InsertAt::End => children.push(id),
                InsertAt::Start => children.insert(0, id),
                InsertAt::After(sibling) => {
                    let position = children
                        .iter()
                        .position(|c| *c == sibling)
                        .ok_or(DomError::NotAChild {
                            parent,
                            child: sibling,
                        })?;
                    children.insert(position + 1, id);
                }
            }
            id
        };
        debug!(target: "dom-page", %parent, %id, "element inserted");
        self.publish(PageEvent::ChildList {
            parent,
            added: vec![id],
            removed: Vec::new(),
            ts: now_ts(),
        });
        Ok(id)
    }

    fn publish(&self, event: PageEvent) {
        // Nobody listening is fine; observers come and go.
        let _ = self.bus.send(event);
    }
}

enum InsertAt {
    End,
    Start,
    After(NodeId),
}

fn detach_subtree(tree: &mut Tree, node: NodeId) {
    let mut stack = vec![node];
    while let Some(next) = stack.pop() {
        if let Ok(data) = tree.get_mut(next) {
            data.attached = false;
            stack.extend(data.children.iter().copied());
        }
    }
}

fn now_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus;

    #[test]
    fn append_and_walk() {
        let (bus, _rx) = event_bus(8);
        let doc = Document::new(bus);
        let list = doc
            .append_child(doc.root(), ElementSpec::new("div").class("source-list"))
            .unwrap();
        let item = doc
            .append_child(list, ElementSpec::new("browse-web-item"))
            .unwrap();
        assert_eq!(doc.children(doc.root()), vec![list]);
        assert_eq!(doc.descendants(doc.root()), vec![list, item]);
        assert!(doc.contains(doc.root(), item));
        assert!(doc.has_class(list, "source-list"));
        assert_eq!(doc.tag(item).as_deref(), Some("browse-web-item"));
    }

    #[test]
    fn prepend_and_insert_after_keep_order() {
        let (bus, _rx) = event_bus(8);
        let doc = Document::new(bus);
        let first = doc
            .append_child(doc.root(), ElementSpec::new("toolbar"))
            .unwrap();
        let third = doc
            .append_child(doc.root(), ElementSpec::new("footer"))
            .unwrap();
        let second = doc.insert_after(first, ElementSpec::new("div")).unwrap();
        let zeroth = doc
            .prepend_child(doc.root(), ElementSpec::new("header"))
            .unwrap();
        assert_eq!(doc.children(doc.root()), vec![zeroth, first, second, third]);
    }

    #[test]
    fn mutations_are_published() {
        let (bus, mut rx) = event_bus(8);
        let doc = Document::new(bus);
        let child = doc.append_child(doc.root(), ElementSpec::new("div")).unwrap();
        match rx.try_recv().unwrap() {
            PageEvent::ChildList { parent, added, removed, .. } => {
                assert_eq!(parent, doc.root());
                assert_eq!(added, vec![child]);
                assert!(removed.is_empty());
            }
        }
    }

    #[test]
    fn removal_detaches_subtree() {
        let (bus, _rx) = event_bus(8);
        let doc = Document::new(bus);
        let outer = doc.append_child(doc.root(), ElementSpec::new("div")).unwrap();
        let inner = doc.append_child(outer, ElementSpec::new("span")).unwrap();
        doc.remove_child(doc.root(), outer).unwrap();
        assert!(!doc.is_attached(outer));
        assert!(!doc.is_attached(inner));
        assert!(doc.descendants(doc.root()).is_empty());
    }

    #[test]
    fn find_by_id_scans_document_order() {
        let (bus, _rx) = event_bus(8);
        let doc = Document::new(bus);
        let target = doc
            .append_child(doc.root(), ElementSpec::new("div").attr("id", "needle"))
            .unwrap();
        assert_eq!(doc.find_by_id("needle"), Some(target));
        assert_eq!(doc.find_by_id("absent"), None);
    }

    #[test]
    fn attrs_and_styles_round_trip() {
        let (bus, _rx) = event_bus(8);
        let doc = Document::new(bus);
        let node = doc.append_child(doc.root(), ElementSpec::new("div")).unwrap();
        doc.set_attr(node, "data-sources-counted", "true").unwrap();
        assert!(doc.has_attr(node, "data-sources-counted"));
        doc.remove_attr(node, "data-sources-counted").unwrap();
        assert!(!doc.has_attr(node, "data-sources-counted"));
        doc.set_style(node, "position", "relative").unwrap();
        assert_eq!(doc.style(node, "position").as_deref(), Some("relative"));
        doc.set_text(node, "Sources Count -> Used: 0, Not Used: 0").unwrap();
        assert_eq!(
            doc.text(node).as_deref(),
            Some("Sources Count -> Used: 0, Not Used: 0")
        );
    }
}
