//! THESISFLOW Test Utilities
//!
//! Centralized test infrastructure for the thesisflow workspace:
//! - Proptest generators for all entity types
//! - Test fixtures for common scenarios
//! - A ready-made valid configuration (the config crate ships no defaults)

// Re-export the store contract and in-memory store from their source crate
pub use thesisflow_storage::{DocumentStore, MemoryStore, RequestFilter, Subscription};

// Re-export core types for convenience
pub use thesisflow_core::{
    ActorRole, ApprovalChain, ApprovalStage, AssignmentRequest, CapacityChangeRequest,
    CapacityError, ChainError, Collection, Decision, GroupRecord, GroupWorkflowStatus, Milestone,
    RequestError, RequestStatus, ReviewerProfile, ReviewerRole, RosterEntry, StageStatus,
    StageTemplates, StorageError, SubjectKind, Timestamp, ValidationError, WorkflowConfig,
    WorkflowError, WorkflowEvent, WorkflowResult, new_entity_id,
};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for thesisflow entities.

    use super::*;
    use chrono::{DateTime, Utc};
    use proptest::prelude::*;
    use uuid::Uuid;

    /// Generate a random v7 UUID (ignores proptest shrinking, IDs are opaque).
    pub fn arb_entity_id() -> impl Strategy<Value = Uuid> {
        any::<u128>().prop_map(|_| Uuid::now_v7())
    }

    /// Generate timestamps between the epoch and 2100.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (0i64..4_102_444_800).prop_map(|secs| {
            DateTime::<Utc>::from_timestamp(secs, 0).expect("timestamp in range")
        })
    }

    pub fn arb_reviewer_role() -> impl Strategy<Value = ReviewerRole> {
        prop_oneof![
            Just(ReviewerRole::Adviser),
            Just(ReviewerRole::Editor),
            Just(ReviewerRole::Statistician),
        ]
    }

    pub fn arb_actor_role() -> impl Strategy<Value = ActorRole> {
        prop_oneof![
            Just(ActorRole::Student),
            Just(ActorRole::Adviser),
            Just(ActorRole::Editor),
            Just(ActorRole::Statistician),
            Just(ActorRole::Moderator),
            Just(ActorRole::Chair),
            Just(ActorRole::Head),
            Just(ActorRole::Panel),
            Just(ActorRole::Admin),
        ]
    }

    pub fn arb_request_status() -> impl Strategy<Value = RequestStatus> {
        prop_oneof![
            Just(RequestStatus::Pending),
            Just(RequestStatus::Approved),
            Just(RequestStatus::Rejected),
        ]
    }

    pub fn arb_stage_status() -> impl Strategy<Value = StageStatus> {
        prop_oneof![
            Just(StageStatus::Waiting),
            Just(StageStatus::InReview),
            Just(StageStatus::Approved),
            Just(StageStatus::Rejected),
        ]
    }

    pub fn arb_milestone() -> impl Strategy<Value = Milestone> {
        prop_oneof![
            Just(Milestone::TopicProposal),
            Just(Milestone::ChapterReview),
            Just(Milestone::TerminalRequirements),
        ]
    }

    pub fn arb_subject_kind() -> impl Strategy<Value = SubjectKind> {
        prop_oneof![
            Just(SubjectKind::ChapterSubmission),
            Just(SubjectKind::TopicProposal),
            Just(SubjectKind::TerminalRequirement),
        ]
    }

    pub fn arb_decision() -> impl Strategy<Value = Decision> {
        prop_oneof![Just(Decision::Approve), Just(Decision::Reject)]
    }

    /// Generate a reviewer profile satisfying the ledger invariants
    /// `active <= capacity <= limit`.
    pub fn arb_reviewer_profile() -> impl Strategy<Value = ReviewerProfile> {
        (arb_reviewer_role(), 0i32..10, 0i32..10, "[A-Z][a-z]{2,12}").prop_map(
            |(role, capacity_seed, headroom, name)| {
                let mut profile = ReviewerProfile::new(
                    format!("Dr. {name}"),
                    role,
                    capacity_seed,
                    capacity_seed + headroom,
                );
                profile.active_assignments = capacity_seed / 2;
                profile
            },
        )
    }

    /// Generate an assignment request in an arbitrary status with consistent
    /// decision fields.
    pub fn arb_assignment_request() -> impl Strategy<Value = AssignmentRequest> {
        (arb_reviewer_role(), arb_request_status()).prop_map(|(role, status)| {
            let mut request = AssignmentRequest::new(
                new_entity_id(),
                new_entity_id(),
                role,
                new_entity_id(),
            );
            if status != RequestStatus::Pending {
                request.status = status;
                request.decided_by = Some(new_entity_id());
                request.decided_at = Some(Utc::now());
                if status == RequestStatus::Rejected {
                    request.decision_reason = Some("declined".to_string());
                }
            }
            request
        })
    }

    /// Generate a freshly opened chain with 1..=6 stages.
    pub fn arb_approval_chain() -> impl Strategy<Value = ApprovalChain> {
        (
            arb_subject_kind(),
            prop::collection::vec(arb_actor_role(), 1..6),
            1i32..5,
        )
            .prop_map(|(kind, roles, version)| {
                ApprovalChain::new(new_entity_id(), kind, new_entity_id(), version, &roles)
            })
    }

    /// Generate a group record with 1..=3 distinct required roles and a
    /// roster filling a prefix of them.
    pub fn arb_group_record() -> impl Strategy<Value = GroupRecord> {
        (1usize..=3, 0usize..=3, "[A-Z][a-z]{2,10} [0-9]{1,2}").prop_map(
            |(required, filled, name)| {
                let all = [
                    ReviewerRole::Adviser,
                    ReviewerRole::Editor,
                    ReviewerRole::Statistician,
                ];
                let required_roles: Vec<ReviewerRole> = all[..required].to_vec();
                let mut group = GroupRecord::new(name, required_roles.clone());
                for role in required_roles.iter().take(filled.min(required)) {
                    group.roster.push(RosterEntry {
                        role: *role,
                        reviewer_id: new_entity_id(),
                    });
                }
                group
            },
        )
    }

    /// Generate a configuration that passes `WorkflowConfig::validate`.
    pub fn arb_valid_config() -> impl Strategy<Value = WorkflowConfig> {
        (0i32..6, 0i32..6, 1usize..64).prop_map(|(capacity, headroom, channel)| {
            WorkflowConfig {
                default_capacity: capacity,
                default_max_capacity_limit: capacity + headroom,
                required_reviewer_roles: vec![
                    ReviewerRole::Adviser,
                    ReviewerRole::Editor,
                    ReviewerRole::Statistician,
                ],
                stage_templates: fixtures::test_config().stage_templates,
                event_channel_capacity: channel,
            }
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common testing scenarios.

    use super::*;

    /// A valid configuration mirroring the source system's defaults:
    /// moderator -> chair -> head for proposals, adviser -> editor for
    /// chapters, panel -> adviser -> editor -> statistician for terminal
    /// requirements.
    pub fn test_config() -> WorkflowConfig {
        WorkflowConfig {
            default_capacity: 3,
            default_max_capacity_limit: 5,
            required_reviewer_roles: vec![
                ReviewerRole::Adviser,
                ReviewerRole::Editor,
                ReviewerRole::Statistician,
            ],
            stage_templates: StageTemplates {
                topic_proposal: vec![ActorRole::Moderator, ActorRole::Chair, ActorRole::Head],
                chapter_review: vec![ActorRole::Adviser, ActorRole::Editor],
                terminal_requirement: vec![
                    ActorRole::Panel,
                    ActorRole::Adviser,
                    ActorRole::Editor,
                    ActorRole::Statistician,
                ],
            },
            event_channel_capacity: 256,
        }
    }

    /// An adviser with free capacity.
    pub fn available_adviser() -> ReviewerProfile {
        ReviewerProfile::new("Dr. Reyes", ReviewerRole::Adviser, 3, 5)
    }

    /// A reviewer with every slot consumed.
    pub fn full_reviewer(role: ReviewerRole) -> ReviewerProfile {
        let mut profile = ReviewerProfile::new("Dr. Santos", role, 2, 5);
        profile.active_assignments = 2;
        profile
    }

    /// A group at the topic-proposal milestone with the standard three
    /// required roles and an empty roster.
    pub fn forming_group() -> GroupRecord {
        GroupRecord::new(
            "Group 7",
            vec![
                ReviewerRole::Adviser,
                ReviewerRole::Editor,
                ReviewerRole::Statistician,
            ],
        )
    }

    /// A pending request tying a group to a reviewer.
    pub fn pending_request(group: &GroupRecord, reviewer: &ReviewerProfile) -> AssignmentRequest {
        AssignmentRequest::new(
            group.group_id,
            reviewer.reviewer_id,
            reviewer.role,
            new_entity_id(),
        )
    }

    /// A first-version chapter chain for a group, adviser -> editor.
    pub fn chapter_chain(group: &GroupRecord) -> ApprovalChain {
        ApprovalChain::new(
            new_entity_id(),
            SubjectKind::ChapterSubmission,
            group.group_id,
            1,
            &[ActorRole::Adviser, ActorRole::Editor],
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fixture_config_is_valid() {
        fixtures::test_config().validate().unwrap();
    }

    #[test]
    fn test_full_reviewer_cannot_accept() {
        assert!(!fixtures::full_reviewer(ReviewerRole::Editor).can_accept());
        assert!(fixtures::available_adviser().can_accept());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_generated_profiles_satisfy_ledger_invariants(
            profile in generators::arb_reviewer_profile(),
        ) {
            prop_assert!(profile.active_assignments >= 0);
            prop_assert!(profile.capacity >= profile.active_assignments);
            prop_assert!(profile.max_capacity_limit >= profile.capacity);
        }

        #[test]
        fn prop_generated_configs_validate(config in generators::arb_valid_config()) {
            prop_assert!(config.validate().is_ok());
        }

        #[test]
        fn prop_generated_requests_have_consistent_decision_fields(
            request in generators::arb_assignment_request(),
        ) {
            if request.is_pending() {
                prop_assert!(request.decided_by.is_none());
                prop_assert!(request.decided_at.is_none());
            } else {
                prop_assert!(request.decided_by.is_some());
                prop_assert!(request.decided_at.is_some());
            }
        }
    }
}
