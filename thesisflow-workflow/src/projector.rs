//! Group status projection.
//!
//! A group's externally visible status is never stored; it is derived at
//! read time from the group record and its approval chains. Storing it
//! would add one more document to keep consistent under concurrent
//! decisions, and the derivation is cheap.
//!
//! Only the latest chain version per subject participates: a rejected
//! version-1 chain is history once version 2 exists, not a reason to keep
//! the group in review.

use std::collections::HashMap;
use std::sync::Arc;

use thesisflow_core::{
    ApprovalChain, Collection, GroupId, GroupRecord, GroupWorkflowStatus, StorageError, SubjectId,
    WorkflowResult,
};
use thesisflow_storage::DocumentStore;

/// Read-time derivation of [`GroupWorkflowStatus`].
#[derive(Debug, Clone)]
pub struct StatusProjector<S> {
    store: Arc<S>,
}

impl<S: DocumentStore> StatusProjector<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Derive the current status of a group from the stored group record
    /// and its chains at the current milestone.
    pub async fn project_status(&self, group_id: GroupId) -> WorkflowResult<GroupWorkflowStatus> {
        let group = self
            .store
            .group_get(group_id)
            .await?
            .ok_or_else(|| StorageError::NotFound {
                collection: Collection::Groups,
                id: group_id,
            })?;
        let chains = self
            .store
            .chain_list_by_group_milestone(group_id, group.milestone)
            .await?;
        Ok(project(&group, &chains))
    }

    /// Derive statuses for every group, for listing views.
    pub async fn project_all(&self) -> WorkflowResult<Vec<(GroupRecord, GroupWorkflowStatus)>> {
        let groups = self.store.group_list().await?;
        let mut out = Vec::with_capacity(groups.len());
        for group in groups {
            let chains = self
                .store
                .chain_list_by_group_milestone(group.group_id, group.milestone)
                .await?;
            let status = project(&group, &chains);
            out.push((group, status));
        }
        Ok(out)
    }
}

/// Pure projection from a group record and its current-milestone chains.
///
/// Precedence, first match wins:
/// 1. `Archived` - the explicit flag, whatever else is going on.
/// 2. `Forming` - some required reviewer role is still unfilled.
/// 3. `Completed` - terminal milestone with every subject signed off.
/// 4. `Review` - some subject's latest chain is live or rejected
///    (rejected means the group owes a resubmission).
/// 5. `Active` - roster complete, nothing awaiting sign-off.
pub fn project(group: &GroupRecord, chains: &[ApprovalChain]) -> GroupWorkflowStatus {
    if group.archived {
        return GroupWorkflowStatus::Archived;
    }
    if !group.roster_complete() {
        return GroupWorkflowStatus::Forming;
    }

    let latest = latest_per_subject(chains);
    if group.milestone.is_terminal()
        && !latest.is_empty()
        && latest.iter().all(|c| c.is_complete())
    {
        return GroupWorkflowStatus::Completed;
    }
    if latest.iter().any(|c| c.is_live() || c.is_rejected()) {
        return GroupWorkflowStatus::Review;
    }
    GroupWorkflowStatus::Active
}

/// Keep only the highest version per subject.
fn latest_per_subject(chains: &[ApprovalChain]) -> Vec<&ApprovalChain> {
    let mut by_subject: HashMap<SubjectId, &ApprovalChain> = HashMap::new();
    for chain in chains {
        by_subject
            .entry(chain.subject_id)
            .and_modify(|kept| {
                if chain.version > kept.version {
                    *kept = chain;
                }
            })
            .or_insert(chain);
    }
    by_subject.into_values().collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use thesisflow_core::{
        new_entity_id, ActorRole, Milestone, ReviewerRole, RosterEntry, StageStatus, SubjectKind,
    };
    use thesisflow_storage::MemoryStore;

    fn group_with_full_roster() -> GroupRecord {
        let mut group = GroupRecord::new("Group 7", vec![ReviewerRole::Adviser]);
        group.roster.push(RosterEntry {
            role: ReviewerRole::Adviser,
            reviewer_id: new_entity_id(),
        });
        group
    }

    fn chain_for(group: &GroupRecord, version: i32) -> ApprovalChain {
        ApprovalChain::new(
            new_entity_id(),
            SubjectKind::TopicProposal,
            group.group_id,
            version,
            &[ActorRole::Moderator],
        )
    }

    fn approved(mut chain: ApprovalChain) -> ApprovalChain {
        for stage in &mut chain.stages {
            stage.status = StageStatus::Approved;
        }
        chain
    }

    fn rejected(mut chain: ApprovalChain) -> ApprovalChain {
        chain.stages[0].status = StageStatus::Rejected;
        chain
    }

    #[test]
    fn test_archived_flag_beats_everything() {
        let mut group = group_with_full_roster();
        group.archived = true;
        let live = chain_for(&group, 1);
        assert_eq!(project(&group, &[live]), GroupWorkflowStatus::Archived);
    }

    #[test]
    fn test_unfilled_roster_means_forming() {
        let group = GroupRecord::new("Group 7", vec![ReviewerRole::Adviser]);
        assert_eq!(project(&group, &[]), GroupWorkflowStatus::Forming);
    }

    #[test]
    fn test_live_chain_means_review() {
        let group = group_with_full_roster();
        let live = chain_for(&group, 1);
        assert_eq!(project(&group, &[live]), GroupWorkflowStatus::Review);
    }

    #[test]
    fn test_rejected_latest_chain_still_means_review() {
        // The group owes a resubmission.
        let group = group_with_full_roster();
        let chain = rejected(chain_for(&group, 1));
        assert_eq!(project(&group, &[chain]), GroupWorkflowStatus::Review);
    }

    #[test]
    fn test_rejected_history_is_ignored_once_superseded() {
        let group = group_with_full_roster();
        let subject = new_entity_id();
        let mut v1 = rejected(chain_for(&group, 1));
        v1.subject_id = subject;
        let mut v2 = approved(chain_for(&group, 2));
        v2.subject_id = subject;
        assert_eq!(project(&group, &[v1, v2]), GroupWorkflowStatus::Active);
    }

    #[test]
    fn test_no_open_work_means_active() {
        let group = group_with_full_roster();
        let done = approved(chain_for(&group, 1));
        assert_eq!(project(&group, &[done]), GroupWorkflowStatus::Active);
        assert_eq!(project(&group, &[]), GroupWorkflowStatus::Active);
    }

    #[test]
    fn test_terminal_milestone_with_all_complete_means_completed() {
        let mut group = group_with_full_roster();
        group.milestone = Milestone::TerminalRequirements;
        let done = approved(chain_for(&group, 1));
        assert_eq!(project(&group, &[done]), GroupWorkflowStatus::Completed);

        // No chains at the terminal milestone is not completion.
        assert_eq!(project(&group, &[]), GroupWorkflowStatus::Active);
    }

    #[tokio::test]
    async fn test_project_status_reads_group_and_milestone_chains() {
        let store = Arc::new(MemoryStore::new());
        let projector = StatusProjector::new(store.clone());

        let group = group_with_full_roster();
        store.group_insert(&group).await.unwrap();
        assert_eq!(
            projector.project_status(group.group_id).await.unwrap(),
            GroupWorkflowStatus::Active
        );

        store.chain_insert(&chain_for(&group, 1)).await.unwrap();
        assert_eq!(
            projector.project_status(group.group_id).await.unwrap(),
            GroupWorkflowStatus::Review
        );
    }

    #[tokio::test]
    async fn test_project_all_lists_every_group() {
        let store = Arc::new(MemoryStore::new());
        let projector = StatusProjector::new(store.clone());

        let forming = GroupRecord::new("Group 1", vec![ReviewerRole::Adviser]);
        store.group_insert(&forming).await.unwrap();
        let active = group_with_full_roster();
        store.group_insert(&active).await.unwrap();

        let all = projector.project_all().await.unwrap();
        assert_eq!(all.len(), 2);
        for (group, status) in all {
            if group.group_id == forming.group_id {
                assert_eq!(status, GroupWorkflowStatus::Forming);
            } else {
                assert_eq!(status, GroupWorkflowStatus::Active);
            }
        }
    }
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
