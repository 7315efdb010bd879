//! Explicit per-identifier state records. These are the source of truth;
//! marker attributes on nodes are only a durable mirror that survives an
//! engine restart within the same page lifetime.

use dashmap::DashMap;

use dom_page::NodeId;
use sourcecount_core_types::{ContainerId, ContainerKind, GroupId};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContainerPhase {
    Unseen,
    Processing,
    Processed,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GroupPhase {
    Unseen,
    Numbered,
}

#[derive(Clone, Debug)]
pub struct ContainerRecord {
    pub node: NodeId,
    pub kind: ContainerKind,
    pub phase: ContainerPhase,
    pub used: usize,
    pub unused: usize,
    pub research_websites: usize,
}

#[derive(Clone, Debug)]
pub struct GroupRecord {
    pub node: NodeId,
    pub phase: GroupPhase,
    pub items_seen: usize,
}

/// All reconciliation state, keyed by container / group identity.
#[derive(Debug, Default)]
pub struct TrackedState {
    containers: DashMap<ContainerId, ContainerRecord>,
    groups: DashMap<GroupId, GroupRecord>,
}

impl TrackedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn container(&self, id: &ContainerId) -> Option<ContainerRecord> {
        self.containers.get(id).map(|r| r.clone())
    }

    pub fn container_phase(&self, id: &ContainerId) -> ContainerPhase {
        self.containers
            .get(id)
            .map(|r| r.phase)
            .unwrap_or(ContainerPhase::Unseen)
    }

    /// Claim a container for processing. Returns false when it is already
    /// claimed or processed, making repeat processing a guaranteed no-op.
    pub fn claim(&self, id: &ContainerId, node: NodeId, kind: ContainerKind) -> bool {
        let mut claimed = false;
        self.containers.entry(id.clone()).or_insert_with(|| {
            claimed = true;
            ContainerRecord {
                node,
                kind,
                phase: ContainerPhase::Processing,
                used: 0,
                unused: 0,
                research_websites: 0,
            }
        });
        claimed
    }

    /// Drop a claim that did not lead anywhere, so the container can be
    /// retried on a later scan once its structure fills in.
    pub fn release(&self, id: &ContainerId) {
        self.containers.remove(id);
    }

    /// Finish processing: record final counts and mark the container
    /// processed. Also used to promote an in-progress panel whose content
    /// finalized into a completed result.
    pub fn complete(
        &self,
        id: &ContainerId,
        node: NodeId,
        used: usize,
        unused: usize,
        research_websites: usize,
    ) {
        self.containers.insert(
            id.clone(),
            ContainerRecord {
                node,
                kind: ContainerKind::CompletedResult,
                phase: ContainerPhase::Processed,
                used,
                unused,
                research_websites,
            },
        );
    }

    /// Update the remembered website count for an in-progress panel.
    pub fn update_research_count(&self, id: &ContainerId, research_websites: usize) {
        if let Some(mut record) = self.containers.get_mut(id) {
            record.research_websites = research_websites;
        }
    }

    pub fn group(&self, id: &GroupId) -> Option<GroupRecord> {
        self.groups.get(id).map(|r| r.clone())
    }

    pub fn group_phase(&self, id: &GroupId) -> GroupPhase {
        self.groups
            .get(id)
            .map(|r| r.phase)
            .unwrap_or(GroupPhase::Unseen)
    }

    pub fn mark_group_numbered(&self, id: &GroupId, node: NodeId, items_seen: usize) {
        self.groups.insert(
            id.clone(),
            GroupRecord {
                node,
                phase: GroupPhase::Numbered,
                items_seen,
            },
        );
    }

    /// Reopen a numbered group because new items were detected inside it.
    /// Returns the group's id when a transition actually happened.
    pub fn reopen_group_for_node(&self, node: NodeId) -> Option<GroupId> {
        for mut entry in self.groups.iter_mut() {
            if entry.node == node && entry.phase == GroupPhase::Numbered {
                entry.phase = GroupPhase::Unseen;
                return Some(entry.key().clone());
            }
        }
        None
    }

    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_is_exclusive_until_released() {
        let state = TrackedState::new();
        let id = ContainerId::new("c1");
        assert!(state.claim(&id, NodeId(1), ContainerKind::CompletedResult));
        assert!(!state.claim(&id, NodeId(1), ContainerKind::CompletedResult));
        assert_eq!(state.container_phase(&id), ContainerPhase::Processing);
        state.release(&id);
        assert_eq!(state.container_phase(&id), ContainerPhase::Unseen);
        assert!(state.claim(&id, NodeId(1), ContainerKind::CompletedResult));
    }

    #[test]
    fn complete_promotes_kind_and_phase() {
        let state = TrackedState::new();
        let id = ContainerId::new("panel");
        state.claim(&id, NodeId(2), ContainerKind::ActiveResearch);
        state.complete(&id, NodeId(2), 3, 2, 5);
        let record = state.container(&id).unwrap();
        assert_eq!(record.phase, ContainerPhase::Processed);
        assert_eq!(record.kind, ContainerKind::CompletedResult);
        assert_eq!((record.used, record.unused, record.research_websites), (3, 2, 5));
    }

    #[test]
    fn groups_reopen_once_per_detection() {
        let state = TrackedState::new();
        let id = GroupId::new("g1");
        state.mark_group_numbered(&id, NodeId(7), 4);
        assert_eq!(state.group_phase(&id), GroupPhase::Numbered);
        assert_eq!(state.reopen_group_for_node(NodeId(7)), Some(id.clone()));
        assert_eq!(state.group_phase(&id), GroupPhase::Unseen);
        // Already reopened; nothing to transition.
        assert_eq!(state.reopen_group_for_node(NodeId(7)), None);
    }
}
