//! Async document store trait.
//!
//! Method groups mirror the collections: reviewer profiles, assignment
//! requests, capacity change requests, approval chains, groups. All methods
//! are async; callers must not assume synchronous completion. Store
//! implementations map their transport failures to
//! `StorageError::Unavailable`, which callers retry with backoff - the
//! engines themselves never retry.

use ::async_trait::async_trait;
use thesisflow_core::{
    ApprovalChain, AssignmentRequest, CapacityChangeRequest, ChainId, ChangeRequestId, GroupId,
    GroupRecord, Milestone, RequestId, RequestStatus, ReviewerId, ReviewerProfile, ReviewerRole,
    SubjectId, Timestamp, WorkflowResult,
};

use crate::subscription::Subscription;
use crate::StatusTransition;

/// Filter for assignment request queries and subscriptions.
/// `None` fields match everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestFilter {
    pub group_id: Option<GroupId>,
    pub reviewer_id: Option<ReviewerId>,
    pub role: Option<ReviewerRole>,
    pub status: Option<RequestStatus>,
}

impl RequestFilter {
    /// Whether a request matches this filter.
    pub fn matches(&self, request: &AssignmentRequest) -> bool {
        self.group_id.map_or(true, |g| request.group_id == g)
            && self.reviewer_id.map_or(true, |r| request.reviewer_id == r)
            && self.role.map_or(true, |r| request.role == r)
            && self.status.map_or(true, |s| request.status == s)
    }
}

/// Async document store trait for workflow entities.
///
/// # Compare-and-set contract
///
/// - `*_transition` methods apply only when the stored status equals the
///   expected status, else fail with `StorageError::CasConflict`.
/// - `chain_replace` and `profile_replace` apply only when the stored
///   document's `updated_at` equals the expected one.
/// - `request_insert` must atomically refuse a second pending request for
///   the same (group, reviewer, role) tuple; `chain_insert` must atomically
///   refuse a second live chain for the same subject.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    // ========================================================================
    // REVIEWER PROFILE OPERATIONS
    // ========================================================================

    /// Insert a new reviewer profile.
    async fn profile_insert(&self, profile: &ReviewerProfile) -> WorkflowResult<()>;

    /// Get a reviewer profile by ID.
    async fn profile_get(&self, id: ReviewerId) -> WorkflowResult<Option<ReviewerProfile>>;

    /// Replace a profile if `expected_updated_at` matches the stored document.
    async fn profile_replace(
        &self,
        expected_updated_at: Timestamp,
        profile: &ReviewerProfile,
    ) -> WorkflowResult<ReviewerProfile>;

    /// List profiles by role.
    async fn profile_list_by_role(&self, role: ReviewerRole)
        -> WorkflowResult<Vec<ReviewerProfile>>;

    /// Delete a profile. Implementations only remove the document; the
    /// ledger is responsible for refusing deletion while assignments exist.
    async fn profile_delete(&self, id: ReviewerId) -> WorkflowResult<()>;

    // ========================================================================
    // ASSIGNMENT REQUEST OPERATIONS
    // ========================================================================

    /// Insert a new pending request. Fails with `CasConflict` if a pending
    /// request already exists for the same (group, reviewer, role).
    async fn request_insert(&self, request: &AssignmentRequest) -> WorkflowResult<()>;

    /// Get a request by ID.
    async fn request_get(&self, id: RequestId) -> WorkflowResult<Option<AssignmentRequest>>;

    /// Transition a request out of `expected` status. Fails with
    /// `CasConflict` when the stored status differs (the decision race).
    async fn request_transition(
        &self,
        id: RequestId,
        expected: RequestStatus,
        transition: StatusTransition,
    ) -> WorkflowResult<AssignmentRequest>;

    /// List requests matching a filter.
    async fn request_list(&self, filter: RequestFilter) -> WorkflowResult<Vec<AssignmentRequest>>;

    /// Find the outstanding pending request for a tuple, if any.
    async fn request_find_pending(
        &self,
        group_id: GroupId,
        reviewer_id: ReviewerId,
        role: ReviewerRole,
    ) -> WorkflowResult<Option<AssignmentRequest>>;

    /// Subscribe to snapshots of requests matching a filter. A snapshot is
    /// delivered immediately and after every change to the collection;
    /// nothing is delivered after `unsubscribe`.
    async fn request_subscribe(
        &self,
        filter: RequestFilter,
    ) -> WorkflowResult<Subscription<Vec<AssignmentRequest>>>;

    // ========================================================================
    // CAPACITY CHANGE REQUEST OPERATIONS
    // ========================================================================

    /// Insert a new capacity change request.
    async fn change_request_insert(&self, request: &CapacityChangeRequest) -> WorkflowResult<()>;

    /// Get a capacity change request by ID.
    async fn change_request_get(
        &self,
        id: ChangeRequestId,
    ) -> WorkflowResult<Option<CapacityChangeRequest>>;

    /// Transition a capacity change request out of `expected` status.
    async fn change_request_transition(
        &self,
        id: ChangeRequestId,
        expected: RequestStatus,
        transition: StatusTransition,
    ) -> WorkflowResult<CapacityChangeRequest>;

    /// List change requests by reviewer.
    async fn change_request_list_by_reviewer(
        &self,
        reviewer_id: ReviewerId,
    ) -> WorkflowResult<Vec<CapacityChangeRequest>>;

    /// List all pending change requests (the admin queue).
    async fn change_request_list_pending(&self) -> WorkflowResult<Vec<CapacityChangeRequest>>;

    // ========================================================================
    // APPROVAL CHAIN OPERATIONS
    // ========================================================================

    /// Insert a new chain. Fails with `CasConflict` if a live chain already
    /// exists for the subject.
    async fn chain_insert(&self, chain: &ApprovalChain) -> WorkflowResult<()>;

    /// Get a chain by ID.
    async fn chain_get(&self, id: ChainId) -> WorkflowResult<Option<ApprovalChain>>;

    /// Get the latest chain version for a subject.
    async fn chain_get_current(&self, subject_id: SubjectId)
        -> WorkflowResult<Option<ApprovalChain>>;

    /// List every chain version for a subject (audit history).
    async fn chain_list_by_subject(
        &self,
        subject_id: SubjectId,
    ) -> WorkflowResult<Vec<ApprovalChain>>;

    /// List chains for a group at a milestone.
    async fn chain_list_by_group_milestone(
        &self,
        group_id: GroupId,
        milestone: Milestone,
    ) -> WorkflowResult<Vec<ApprovalChain>>;

    /// Replace a chain if `expected_updated_at` matches the stored document.
    /// This is the decision CAS for `act`: concurrent actors race on it.
    async fn chain_replace(
        &self,
        expected_updated_at: Timestamp,
        chain: &ApprovalChain,
    ) -> WorkflowResult<ApprovalChain>;

    /// Subscribe to snapshots of a group's chains.
    async fn chain_subscribe(
        &self,
        group_id: GroupId,
    ) -> WorkflowResult<Subscription<Vec<ApprovalChain>>>;

    // ========================================================================
    // GROUP OPERATIONS
    // ========================================================================

    /// Insert a new group record.
    async fn group_insert(&self, group: &GroupRecord) -> WorkflowResult<()>;

    /// Get a group by ID.
    async fn group_get(&self, id: GroupId) -> WorkflowResult<Option<GroupRecord>>;

    /// Replace a group if `expected_updated_at` matches the stored document
    /// (roster binds and milestone advances race on this).
    async fn group_replace(
        &self,
        expected_updated_at: Timestamp,
        group: &GroupRecord,
    ) -> WorkflowResult<GroupRecord>;

    /// List all groups.
    async fn group_list(&self) -> WorkflowResult<Vec<GroupRecord>>;
}
