//! A minimal live document tree standing in for the host page.
//!
//! The host application owns the real page; this crate models the slice the
//! annotation engine needs: elements with tags, classes, attributes, inline
//! styles and text, ordered children, and a broadcast feed of structural
//! mutation records for observers.

use tokio::sync::broadcast;

pub mod ids {
    use std::fmt;

    use serde::{Deserialize, Serialize};

    /// Handle to one element in a [`crate::Document`]. Stable for the life
    /// of the document, including across detachment.
    #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
    pub struct NodeId(pub u64);

    impl fmt::Display for NodeId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "node#{}", self.0)
        }
    }
}

pub mod events {
    use serde::{Deserialize, Serialize};

    use super::ids::NodeId;

    /// Structural mutation records emitted by the document.
    ///
    /// Attribute, style, and text writes are intentionally silent: observers
    /// of this feed care about child-list changes only.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub enum PageEvent {
        ChildList {
            parent: NodeId,
            added: Vec<NodeId>,
            removed: Vec<NodeId>,
            ts: u64,
        },
    }
}

pub mod errors {
    use thiserror::Error;

    use super::ids::NodeId;

    #[derive(Debug, Error, Clone)]
    pub enum DomError {
        #[error("unknown node {0}")]
        Unknown(NodeId),
        #[error("{child} is not a child of {parent}")]
        NotAChild { parent: NodeId, child: NodeId },
    }
}

mod document;

pub use document::{Document, ElementSpec};
pub use errors::DomError;
pub use events::PageEvent;
pub use ids::NodeId;

/// Sender half of the document's mutation feed.
pub type EventBus = broadcast::Sender<PageEvent>;

/// Helper to create a mutation feed suitable for hooking into a [`Document`].
pub fn event_bus(buffer: usize) -> (EventBus, broadcast::Receiver<PageEvent>) {
    let bus = broadcast::channel(buffer.max(1));
    (bus.0, bus.1)
}
