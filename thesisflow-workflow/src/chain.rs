//! Sequential approval chains.
//!
//! A chain is the ordered multi-role sign-off on one submission (topic
//! proposal, chapter, terminal requirement). Exactly one stage is in review
//! at a time; approving it hands review to the next stage, rejecting it
//! terminally rejects the chain and freezes every later stage at `Waiting`.
//! Resubmission after rejection opens a fresh chain with `version + 1` -
//! decided chains are never edited.
//!
//! Acting on a stage is a compare-and-set on the chain document: concurrent
//! actors race on `updated_at` and the loser gets `ChainError::AlreadyDecided`.

use std::sync::Arc;

use chrono::Utc;
use thesisflow_core::{
    ActorRole, ApprovalChain, ChainError, ChainId, Collection, Decision, GroupId, GroupRecord,
    Milestone, StageStatus, StorageError, SubjectId, SubjectKind, UserId, ValidationError,
    WorkflowConfig, WorkflowError, WorkflowEvent, WorkflowResult,
};
use thesisflow_storage::{DocumentStore, Subscription};

use crate::events::EventBroadcaster;

/// Approval chain engine over a document store.
#[derive(Debug, Clone)]
pub struct ApprovalChains<S> {
    store: Arc<S>,
    config: WorkflowConfig,
    events: EventBroadcaster,
}

impl<S: DocumentStore> ApprovalChains<S> {
    pub fn new(store: Arc<S>, config: WorkflowConfig, events: EventBroadcaster) -> Self {
        Self {
            store,
            config,
            events,
        }
    }

    async fn load(&self, chain_id: ChainId) -> WorkflowResult<ApprovalChain> {
        self.store
            .chain_get(chain_id)
            .await?
            .ok_or_else(|| {
                StorageError::NotFound {
                    collection: Collection::ApprovalChains,
                    id: chain_id,
                }
                .into()
            })
    }

    /// Open a chain for a subject using the configured stage template for
    /// its kind.
    pub async fn create_chain(
        &self,
        subject_id: SubjectId,
        subject_kind: SubjectKind,
        group_id: GroupId,
    ) -> WorkflowResult<ApprovalChain> {
        let roles: Vec<ActorRole> = self
            .config
            .stage_templates
            .roles_for(subject_kind)
            .to_vec();
        self.create_chain_with_roles(subject_id, subject_kind, group_id, &roles)
            .await
    }

    /// Open a chain with an explicit stage role list (e.g. a defense panel
    /// assembled per group). The first submission is version 1; each
    /// submission after a decided chain bumps the version.
    pub async fn create_chain_with_roles(
        &self,
        subject_id: SubjectId,
        subject_kind: SubjectKind,
        group_id: GroupId,
        stage_roles: &[ActorRole],
    ) -> WorkflowResult<ApprovalChain> {
        if stage_roles.is_empty() {
            return Err(ChainError::Empty { subject_id }.into());
        }
        let version = match self.store.chain_get_current(subject_id).await? {
            Some(current) if current.is_live() => {
                return Err(ChainError::AlreadyOpen {
                    subject_id,
                    version: current.version,
                }
                .into());
            }
            Some(current) => current.version + 1,
            None => 1,
        };
        let chain = ApprovalChain::new(subject_id, subject_kind, group_id, version, stage_roles);
        match self.store.chain_insert(&chain).await {
            Ok(()) => {}
            // A concurrent submission opened the live chain first.
            Err(WorkflowError::Storage(StorageError::CasConflict { .. })) => {
                return Err(ChainError::AlreadyOpen {
                    subject_id,
                    version,
                }
                .into());
            }
            Err(err) => return Err(err),
        }
        tracing::info!(
            chain_id = %chain.chain_id,
            subject_id = %subject_id,
            group_id = %group_id,
            version,
            stages = chain.stages.len(),
            "approval chain opened"
        );
        Ok(chain)
    }

    /// Decide the stage at `stage_order`. Only the current in-review stage
    /// may be decided, and only by an actor holding its required role.
    /// Rejections require notes; they become the rejection reason shown to
    /// the group.
    pub async fn act(
        &self,
        chain_id: ChainId,
        stage_order: i32,
        actor_id: UserId,
        actor_role: ActorRole,
        decision: Decision,
        notes: Option<String>,
    ) -> WorkflowResult<ApprovalChain> {
        let chain = self.load(chain_id).await?;
        let subject_id = chain.subject_id;

        let current_order = chain.current_stage().map(|s| s.order);
        if current_order != Some(stage_order) {
            // Distinguish "you are late" from "you are early or lost".
            let attempted = chain.stages.iter().find(|s| s.order == stage_order);
            if let Some(stage) = attempted {
                if stage.status == StageStatus::Approved || stage.status == StageStatus::Rejected {
                    return Err(ChainError::AlreadyDecided {
                        subject_id,
                        stage: stage_order,
                    }
                    .into());
                }
            }
            return Err(ChainError::NotCurrentStage {
                subject_id,
                attempted: stage_order,
                current: current_order,
            }
            .into());
        }

        // current_order matched, so the stage exists; re-find it mutably
        // on a working copy.
        let mut next = chain.clone();
        let stage_index = next
            .stages
            .iter()
            .position(|s| s.order == stage_order)
            .ok_or(ChainError::NotCurrentStage {
                subject_id,
                attempted: stage_order,
                current: current_order,
            })?;

        let required = next.stages[stage_index].required_role;
        if required != actor_role {
            return Err(ChainError::RoleMismatch {
                subject_id,
                stage: stage_order,
                required,
                actual: actor_role,
            }
            .into());
        }

        if decision == Decision::Reject
            && notes.as_deref().map_or(true, |n| n.trim().is_empty())
        {
            return Err(ValidationError::RequiredFieldMissing {
                field: "notes".to_string(),
            }
            .into());
        }

        let now = Utc::now();
        {
            let stage = &mut next.stages[stage_index];
            stage.status = match decision {
                Decision::Approve => StageStatus::Approved,
                Decision::Reject => StageStatus::Rejected,
            };
            stage.actor_id = Some(actor_id);
            stage.notes = notes;
            stage.acted_at = Some(now);
        }
        let mut next_order = None;
        if decision == Decision::Approve {
            if let Some(successor) = next.stages.get_mut(stage_index + 1) {
                successor.status = StageStatus::InReview;
                next_order = Some(successor.order);
            }
        }

        let updated = match self.store.chain_replace(chain.updated_at, &next).await {
            Ok(updated) => updated,
            // Someone decided first; first decision wins.
            Err(WorkflowError::Storage(StorageError::CasConflict { .. })) => {
                return Err(ChainError::AlreadyDecided {
                    subject_id,
                    stage: stage_order,
                }
                .into());
            }
            Err(err) => return Err(err),
        };

        match decision {
            Decision::Approve => {
                tracing::info!(
                    chain_id = %chain_id,
                    subject_id = %subject_id,
                    stage = stage_order,
                    "stage approved"
                );
                self.events.broadcast(WorkflowEvent::StageAdvanced {
                    chain_id,
                    subject_id,
                    approved_order: stage_order,
                    next_order,
                });
                if updated.is_complete() {
                    tracing::info!(chain_id = %chain_id, subject_id = %subject_id, "chain completed");
                    self.events.broadcast(WorkflowEvent::ChainCompleted {
                        chain_id,
                        subject_id,
                    });
                }
            }
            Decision::Reject => {
                tracing::info!(
                    chain_id = %chain_id,
                    subject_id = %subject_id,
                    stage = stage_order,
                    "chain rejected"
                );
                self.events.broadcast(WorkflowEvent::ChainRejected {
                    chain_id,
                    subject_id,
                    rejected_order: stage_order,
                });
            }
        }
        Ok(updated)
    }

    /// Get a chain by ID.
    pub async fn get(&self, chain_id: ChainId) -> WorkflowResult<ApprovalChain> {
        self.load(chain_id).await
    }

    /// The latest chain version for a subject, if any.
    pub async fn current_for_subject(
        &self,
        subject_id: SubjectId,
    ) -> WorkflowResult<Option<ApprovalChain>> {
        self.store.chain_get_current(subject_id).await
    }

    /// Every chain version for a subject, the audit history.
    pub async fn history_for_subject(
        &self,
        subject_id: SubjectId,
    ) -> WorkflowResult<Vec<ApprovalChain>> {
        self.store.chain_list_by_subject(subject_id).await
    }

    /// Chains a group accumulated at a milestone.
    pub async fn list_for_group_milestone(
        &self,
        group_id: GroupId,
        milestone: Milestone,
    ) -> WorkflowResult<Vec<ApprovalChain>> {
        self.store
            .chain_list_by_group_milestone(group_id, milestone)
            .await
    }

    /// Subscribe to snapshots of a group's chains.
    pub async fn subscribe(
        &self,
        group_id: GroupId,
    ) -> WorkflowResult<Subscription<Vec<ApprovalChain>>> {
        self.store.chain_subscribe(group_id).await
    }

    /// Advance a group to its next milestone. Permitted only when the group
    /// has at least one chain at the current milestone and all of them are
    /// complete.
    pub async fn advance_milestone(&self, group_id: GroupId) -> WorkflowResult<GroupRecord> {
        let group = self
            .store
            .group_get(group_id)
            .await?
            .ok_or_else(|| StorageError::NotFound {
                collection: Collection::Groups,
                id: group_id,
            })?;
        if group.archived {
            return Err(ValidationError::InvalidValue {
                field: "group_id".to_string(),
                reason: "group is archived".to_string(),
            }
            .into());
        }
        let next_milestone = group.milestone.next().ok_or_else(|| {
            ValidationError::InvalidValue {
                field: "milestone".to_string(),
                reason: "group is already at the terminal milestone".to_string(),
            }
        })?;

        let chains = self
            .store
            .chain_list_by_group_milestone(group_id, group.milestone)
            .await?;
        if chains.is_empty() || !chains.iter().all(|c| c.is_complete()) {
            return Err(ValidationError::InvalidValue {
                field: "milestone".to_string(),
                reason: "current milestone has incomplete approval chains".to_string(),
            }
            .into());
        }

        let mut next = group.clone();
        next.milestone = next_milestone;
        let updated = self.store.group_replace(group.updated_at, &next).await?;
        tracing::info!(group_id = %group_id, milestone = ?next_milestone, "milestone advanced");
        Ok(updated)
    }
}

// ============================================================================
// TESTS
// ============================================================================


// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use thesisflow_core::{new_entity_id, ReviewerRole, StageTemplates};
    use thesisflow_storage::MemoryStore;

    fn test_config() -> WorkflowConfig {
        WorkflowConfig {
            default_capacity: 2,
            default_max_capacity_limit: 5,
            required_reviewer_roles: vec![ReviewerRole::Adviser],
            stage_templates: StageTemplates {
                topic_proposal: vec![ActorRole::Moderator],
                chapter_review: vec![ActorRole::Adviser, ActorRole::Editor],
                terminal_requirement: vec![ActorRole::Panel],
            },
            event_channel_capacity: 64,
        }
    }

    fn arb_actor_role() -> impl Strategy<Value = ActorRole> {
        prop_oneof![
            Just(ActorRole::Adviser),
            Just(ActorRole::Editor),
            Just(ActorRole::Statistician),
            Just(ActorRole::Moderator),
            Just(ActorRole::Chair),
            Just(ActorRole::Head),
            Just(ActorRole::Panel),
        ]
    }

    fn assert_sequential_shape(chain: &ApprovalChain) -> Result<(), TestCaseError> {
        let in_review = chain
            .stages
            .iter()
            .filter(|s| s.status == StageStatus::InReview)
            .count();
        prop_assert!(in_review <= 1);

        if let Some(rejected_at) = chain
            .stages
            .iter()
            .position(|s| s.status == StageStatus::Rejected)
        {
            // Everything before the rejection is approved, everything after
            // is frozen at Waiting.
            for stage in &chain.stages[..rejected_at] {
                prop_assert_eq!(stage.status, StageStatus::Approved);
            }
            for stage in &chain.stages[rejected_at + 1..] {
                prop_assert_eq!(stage.status, StageStatus::Waiting);
            }
            prop_assert_eq!(in_review, 0);
        } else if let Some(current) = chain.current_stage() {
            let idx = (current.order - 1) as usize;
            for stage in &chain.stages[..idx] {
                prop_assert_eq!(stage.status, StageStatus::Approved);
            }
            for stage in &chain.stages[idx + 1..] {
                prop_assert_eq!(stage.status, StageStatus::Waiting);
            }
        } else {
            prop_assert!(chain.is_complete());
        }
        Ok(())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Whatever decisions arrive in whatever order, a chain keeps its
        /// sequential shape: an approved prefix, at most one stage in
        /// review, and nothing past a rejection ever leaves Waiting.
        #[test]
        fn prop_chain_keeps_sequential_shape(
            roles in prop::collection::vec(arb_actor_role(), 1..6),
            decisions in prop::collection::vec(
                (0i32..8, any::<bool>(), arb_actor_role()),
                1..20,
            ),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .build()
                .expect("runtime");
            rt.block_on(async {
                let chains = ApprovalChains::new(
                    Arc::new(MemoryStore::new()),
                    test_config(),
                    EventBroadcaster::new(64),
                );
                let chain = chains
                    .create_chain_with_roles(
                        new_entity_id(),
                        SubjectKind::ChapterSubmission,
                        new_entity_id(),
                        &roles,
                    )
                    .await
                    .unwrap();

                for (order, approve, actor_role) in decisions {
                    let decision = if approve { Decision::Approve } else { Decision::Reject };
                    // Invalid acts must fail cleanly without corrupting the
                    // chain.
                    let _ = chains
                        .act(
                            chain.chain_id,
                            order,
                            new_entity_id(),
                            actor_role,
                            decision,
                            Some("notes".to_string()),
                        )
                        .await;
                    let stored = chains.get(chain.chain_id).await.unwrap();
                    assert_sequential_shape(&stored)?;
                }
                Ok::<(), TestCaseError>(())
            })?;
        }
    }
}
