//! Core entity structures.
//!
//! Constructors stamp timestamps and defaults; every state transition on
//! these entities goes through the engines in `thesisflow-workflow`, which
//! persist via compare-and-set so the first decision wins.

use crate::{
    ActorRole, ChainId, ChangeRequestId, GroupId, Milestone, RequestId, RequestStatus,
    ReviewerId, ReviewerRole, StageStatus, SubjectId, SubjectKind, Timestamp, UserId,
    new_entity_id,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// System-authored decision reason recorded when a requester withdraws a
/// pending assignment request.
pub const WITHDRAWN_REASON: &str = "withdrawn by requester";

// ============================================================================
// REVIEWER PROFILE
// ============================================================================

/// A user capable of serving as adviser/editor/statistician.
///
/// Invariants (enforced by the capacity ledger, never assumed):
/// - `capacity >= active_assignments`
/// - `capacity <= max_capacity_limit`
///
/// `active_assignments` is mutated only by the ledger's activate/deactivate
/// entry points as part of the pipeline's approve/withdraw transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewerProfile {
    pub reviewer_id: ReviewerId,
    pub display_name: String,
    pub role: ReviewerRole,
    /// Max slots this reviewer is willing to accept.
    pub capacity: i32,
    /// Administrator-configured ceiling on `capacity`.
    pub max_capacity_limit: i32,
    /// Count of currently active assignments.
    pub active_assignments: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ReviewerProfile {
    /// Create a profile with no active assignments.
    pub fn new(
        display_name: impl Into<String>,
        role: ReviewerRole,
        capacity: i32,
        max_capacity_limit: i32,
    ) -> Self {
        let now = Utc::now();
        Self {
            reviewer_id: new_entity_id(),
            display_name: display_name.into(),
            role,
            capacity,
            max_capacity_limit,
            active_assignments: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the reviewer has a free slot. Side-effect free.
    pub fn can_accept(&self) -> bool {
        self.capacity > self.active_assignments
    }
}

// ============================================================================
// ASSIGNMENT REQUEST
// ============================================================================

/// A group's request for a specific reviewer in a specific role.
///
/// At most one `Pending` request may exist per (group, reviewer, role).
/// Requests are never deleted; they form the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRequest {
    pub request_id: RequestId,
    pub group_id: GroupId,
    pub reviewer_id: ReviewerId,
    pub role: ReviewerRole,
    /// The group member who filed the request; only they may withdraw it.
    pub requested_by: UserId,
    pub status: RequestStatus,
    /// Required on reject; system-authored on withdraw.
    pub decision_reason: Option<String>,
    pub decided_by: Option<UserId>,
    pub created_at: Timestamp,
    pub decided_at: Option<Timestamp>,
}

impl AssignmentRequest {
    /// Create a pending request.
    pub fn new(
        group_id: GroupId,
        reviewer_id: ReviewerId,
        role: ReviewerRole,
        requested_by: UserId,
    ) -> Self {
        Self {
            request_id: new_entity_id(),
            group_id,
            reviewer_id,
            role,
            requested_by,
            status: RequestStatus::Pending,
            decision_reason: None,
            decided_by: None,
            created_at: Utc::now(),
            decided_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }
}

// ============================================================================
// CAPACITY CHANGE REQUEST
// ============================================================================

/// A reviewer's ask to raise their `max_capacity_limit` beyond the current
/// ceiling. Created by the reviewer, resolved by an administrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityChangeRequest {
    pub change_request_id: ChangeRequestId,
    pub reviewer_id: ReviewerId,
    pub requested_limit: i32,
    pub justification: String,
    pub status: RequestStatus,
    pub resolved_by: Option<UserId>,
    pub created_at: Timestamp,
    pub resolved_at: Option<Timestamp>,
}

impl CapacityChangeRequest {
    /// Create a pending limit-increase request.
    pub fn new(
        reviewer_id: ReviewerId,
        requested_limit: i32,
        justification: impl Into<String>,
    ) -> Self {
        Self {
            change_request_id: new_entity_id(),
            reviewer_id,
            requested_limit,
            justification: justification.into(),
            status: RequestStatus::Pending,
            resolved_by: None,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }
}

// ============================================================================
// APPROVAL CHAIN
// ============================================================================

/// One role's turn in a sequential approval chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalStage {
    /// 1-based position, unique within the chain.
    pub order: i32,
    pub required_role: ActorRole,
    pub status: StageStatus,
    pub actor_id: Option<UserId>,
    pub notes: Option<String>,
    pub acted_at: Option<Timestamp>,
}

impl ApprovalStage {
    fn waiting(order: i32, required_role: ActorRole) -> Self {
        Self {
            order,
            required_role,
            status: StageStatus::Waiting,
            actor_id: None,
            notes: None,
            acted_at: None,
        }
    }
}

/// Ordered multi-role sign-off record for a single subject.
///
/// Stage `n` leaves `Waiting` only once stage `n-1` is `Approved`. A rejected
/// stage terminally rejects the chain; later stages stay `Waiting` forever.
/// Rejected chains are immutable history - resubmission creates a new chain
/// with `version + 1` for the same subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalChain {
    pub chain_id: ChainId,
    pub subject_id: SubjectId,
    pub subject_kind: SubjectKind,
    pub milestone: Milestone,
    pub group_id: GroupId,
    /// 1 for the first submission, n+1 for each resubmission after rejection.
    pub version: i32,
    pub stages: Vec<ApprovalStage>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ApprovalChain {
    /// Build a chain with stage 1 immediately in review and the rest waiting.
    /// Callers must reject an empty `stage_roles` before constructing.
    pub fn new(
        subject_id: SubjectId,
        subject_kind: SubjectKind,
        group_id: GroupId,
        version: i32,
        stage_roles: &[ActorRole],
    ) -> Self {
        let now = Utc::now();
        let mut stages: Vec<ApprovalStage> = stage_roles
            .iter()
            .enumerate()
            .map(|(i, role)| ApprovalStage::waiting(i as i32 + 1, *role))
            .collect();
        if let Some(first) = stages.first_mut() {
            first.status = StageStatus::InReview;
        }
        Self {
            chain_id: new_entity_id(),
            subject_id,
            subject_kind,
            milestone: subject_kind.milestone(),
            group_id,
            version,
            stages,
            created_at: now,
            updated_at: now,
        }
    }

    /// The stage currently in review, if any.
    pub fn current_stage(&self) -> Option<&ApprovalStage> {
        self.stages
            .iter()
            .find(|s| s.status == StageStatus::InReview)
    }

    /// A chain is complete iff every stage is approved.
    pub fn is_complete(&self) -> bool {
        !self.stages.is_empty() && self.stages.iter().all(|s| s.status == StageStatus::Approved)
    }

    /// A chain is terminally rejected iff any stage is rejected.
    pub fn is_rejected(&self) -> bool {
        self.stages.iter().any(|s| s.status == StageStatus::Rejected)
    }

    /// A chain is live while it is neither complete nor rejected.
    pub fn is_live(&self) -> bool {
        !self.is_complete() && !self.is_rejected()
    }
}

// ============================================================================
// GROUP RECORD
// ============================================================================

/// A reviewer bound into a group's roster for one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub role: ReviewerRole,
    pub reviewer_id: ReviewerId,
}

/// A thesis group as the workflow engines see it: roster, current milestone,
/// and the explicit archived flag. Roster entries are added only by the
/// assignment pipeline on approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub group_id: GroupId,
    pub name: String,
    pub milestone: Milestone,
    /// Roles that must be filled before the group leaves `Forming`.
    pub required_roles: Vec<ReviewerRole>,
    pub roster: Vec<RosterEntry>,
    /// Set only by explicit administrative action, never derived.
    pub archived: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl GroupRecord {
    /// Create a group at the topic-proposal milestone with an empty roster.
    pub fn new(name: impl Into<String>, required_roles: Vec<ReviewerRole>) -> Self {
        let now = Utc::now();
        Self {
            group_id: new_entity_id(),
            name: name.into(),
            milestone: Milestone::TopicProposal,
            required_roles,
            roster: Vec::new(),
            archived: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether some reviewer is bound for the given role.
    pub fn role_filled(&self, role: ReviewerRole) -> bool {
        self.roster.iter().any(|e| e.role == role)
    }

    /// Whether every required role has a bound reviewer.
    pub fn roster_complete(&self) -> bool {
        self.required_roles.iter().all(|r| self.role_filled(*r))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reviewer_can_accept_compares_capacity_to_active() {
        let mut profile = ReviewerProfile::new("Dr. Reyes", ReviewerRole::Adviser, 2, 5);
        assert!(profile.can_accept());
        profile.active_assignments = 2;
        assert!(!profile.can_accept());
    }

    #[test]
    fn test_new_request_is_pending() {
        let req = AssignmentRequest::new(
            new_entity_id(),
            new_entity_id(),
            ReviewerRole::Editor,
            new_entity_id(),
        );
        assert!(req.is_pending());
        assert!(req.decision_reason.is_none());
        assert!(req.decided_at.is_none());
    }

    #[test]
    fn test_new_chain_puts_first_stage_in_review() {
        let chain = ApprovalChain::new(
            new_entity_id(),
            SubjectKind::TopicProposal,
            new_entity_id(),
            1,
            &[ActorRole::Moderator, ActorRole::Chair, ActorRole::Head],
        );
        assert_eq!(chain.stages.len(), 3);
        assert_eq!(chain.stages[0].status, StageStatus::InReview);
        assert_eq!(chain.stages[1].status, StageStatus::Waiting);
        assert_eq!(chain.stages[2].status, StageStatus::Waiting);
        assert_eq!(chain.current_stage().map(|s| s.order), Some(1));
        assert!(chain.is_live());
        assert_eq!(chain.milestone, Milestone::TopicProposal);
    }

    #[test]
    fn test_chain_completion_and_rejection_predicates() {
        let mut chain = ApprovalChain::new(
            new_entity_id(),
            SubjectKind::TerminalRequirement,
            new_entity_id(),
            1,
            &[ActorRole::Adviser, ActorRole::Editor],
        );
        assert!(!chain.is_complete());
        chain.stages[0].status = StageStatus::Approved;
        chain.stages[1].status = StageStatus::Approved;
        assert!(chain.is_complete());
        assert!(!chain.is_rejected());

        chain.stages[1].status = StageStatus::Rejected;
        assert!(chain.is_rejected());
        assert!(!chain.is_complete());
        assert!(!chain.is_live());
    }

    #[test]
    fn test_withdrawn_reason_is_nonempty() {
        assert!(!WITHDRAWN_REASON.is_empty());
    }

    #[test]
    fn test_group_roster_completion() {
        let mut group = GroupRecord::new(
            "Group 7",
            vec![ReviewerRole::Adviser, ReviewerRole::Editor],
        );
        assert!(!group.roster_complete());
        group.roster.push(RosterEntry {
            role: ReviewerRole::Adviser,
            reviewer_id: new_entity_id(),
        });
        assert!(group.role_filled(ReviewerRole::Adviser));
        assert!(!group.roster_complete());
        group.roster.push(RosterEntry {
            role: ReviewerRole::Editor,
            reviewer_id: new_entity_id(),
        });
        assert!(group.roster_complete());
    }
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
