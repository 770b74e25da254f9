//! Assignment request pipeline.
//!
//! Lifecycle of a group's request to be paired with a reviewer:
//! submit -> (approve | reject | withdraw). Decisions are compare-and-set
//! on the stored `Pending` status, so under a race the first decision wins
//! and the loser sees `RequestError::AlreadyDecided` with whatever status
//! the winner left behind.
//!
//! Capacity is advisory at submit time and enforced at approve time: the
//! slot is consumed through the ledger *before* the decision CAS, and
//! released again if the CAS loses. That ordering means an approved request
//! always holds a real slot, at the cost of a momentary over-count visible
//! only to the losing approver.

use std::sync::Arc;

use thesisflow_core::{
    AssignmentRequest, CapacityError, Collection, GroupId, GroupRecord, RequestError, RequestId,
    RequestStatus,
    ReviewerId, ReviewerRole, RosterEntry, StorageError, UserId, ValidationError, WorkflowError,
    WorkflowEvent, WorkflowResult, WITHDRAWN_REASON,
};
use thesisflow_storage::{DocumentStore, RequestFilter, StatusTransition, Subscription};

use crate::events::EventBroadcaster;
use crate::ledger::CapacityLedger;

/// Attempts at re-applying a roster bind when concurrent group writes
/// invalidate the read.
const ROSTER_BIND_ATTEMPTS: usize = 3;

/// Assignment request pipeline over a document store.
#[derive(Debug, Clone)]
pub struct AssignmentPipeline<S> {
    store: Arc<S>,
    ledger: CapacityLedger<S>,
    events: EventBroadcaster,
}

impl<S: DocumentStore> AssignmentPipeline<S> {
    pub fn new(store: Arc<S>, ledger: CapacityLedger<S>, events: EventBroadcaster) -> Self {
        Self {
            store,
            ledger,
            events,
        }
    }

    async fn load(&self, request_id: RequestId) -> WorkflowResult<AssignmentRequest> {
        self.store
            .request_get(request_id)
            .await?
            .ok_or_else(|| {
                StorageError::NotFound {
                    collection: Collection::AssignmentRequests,
                    id: request_id,
                }
                .into()
            })
    }

    async fn load_group(&self, group_id: GroupId) -> WorkflowResult<GroupRecord> {
        self.store
            .group_get(group_id)
            .await?
            .ok_or_else(|| {
                StorageError::NotFound {
                    collection: Collection::Groups,
                    id: group_id,
                }
                .into()
            })
    }

    /// Translate a lost decision CAS into `AlreadyDecided` carrying the
    /// status the winning decision left behind.
    async fn already_decided(&self, request_id: RequestId) -> WorkflowError {
        match self.store.request_get(request_id).await {
            Ok(Some(current)) => RequestError::AlreadyDecided {
                request_id,
                status: current.status,
            }
            .into(),
            Ok(None) => StorageError::NotFound {
                collection: Collection::AssignmentRequests,
                id: request_id,
            }
            .into(),
            Err(err) => err,
        }
    }

    /// A capacity failure during approve can really be a lost decision
    /// race: the winner took the reviewer's last slot deciding this same
    /// request. Report that as `AlreadyDecided`; a genuine shortfall on a
    /// still-pending request passes through unchanged.
    async fn capacity_loss_to_decision(
        &self,
        request_id: RequestId,
        err: WorkflowError,
    ) -> WorkflowError {
        if !matches!(
            err,
            WorkflowError::Capacity(CapacityError::Unavailable { .. })
        ) {
            return err;
        }
        match self.store.request_get(request_id).await {
            Ok(Some(current)) if !current.is_pending() => RequestError::AlreadyDecided {
                request_id,
                status: current.status,
            }
            .into(),
            _ => err,
        }
    }

    /// File a pending request pairing `reviewer_id` with `group_id` in the
    /// reviewer's role. Capacity is not enforced here; a full reviewer may
    /// still receive requests and free a slot before deciding.
    pub async fn submit(
        &self,
        group_id: GroupId,
        reviewer_id: ReviewerId,
        requested_by: UserId,
    ) -> WorkflowResult<AssignmentRequest> {
        let group = self.load_group(group_id).await?;
        if group.archived {
            return Err(ValidationError::InvalidValue {
                field: "group_id".to_string(),
                reason: "group is archived".to_string(),
            }
            .into());
        }
        let profile = self
            .store
            .profile_get(reviewer_id)
            .await?
            .ok_or_else(|| StorageError::NotFound {
                collection: Collection::ReviewerProfiles,
                id: reviewer_id,
            })?;

        if !profile.can_accept() {
            tracing::warn!(
                reviewer_id = %reviewer_id,
                group_id = %group_id,
                active = profile.active_assignments,
                capacity = profile.capacity,
                "request submitted against a full reviewer"
            );
        }

        let request = AssignmentRequest::new(group_id, reviewer_id, profile.role, requested_by);
        match self.store.request_insert(&request).await {
            Ok(()) => {}
            Err(WorkflowError::Storage(StorageError::CasConflict { .. })) => {
                return Err(RequestError::DuplicatePending {
                    group_id,
                    reviewer_id,
                    role: profile.role,
                }
                .into());
            }
            Err(err) => return Err(err),
        }
        tracing::info!(
            request_id = %request.request_id,
            group_id = %group_id,
            reviewer_id = %reviewer_id,
            role = %profile.role,
            "assignment request submitted"
        );
        Ok(request)
    }

    /// Approve a pending request as the requested reviewer. Consumes a
    /// capacity slot and binds the reviewer into the group's roster.
    pub async fn approve(
        &self,
        request_id: RequestId,
        actor_id: UserId,
    ) -> WorkflowResult<AssignmentRequest> {
        let request = self.load(request_id).await?;
        if actor_id != request.reviewer_id {
            return Err(RequestError::NotAuthorized {
                request_id,
                actor_id,
            }
            .into());
        }
        self.approve_inner(request, actor_id).await
    }

    /// Reject a pending request as the requested reviewer. A reason is
    /// required; it is shown to the group verbatim.
    pub async fn reject(
        &self,
        request_id: RequestId,
        actor_id: UserId,
        reason: impl Into<String>,
    ) -> WorkflowResult<AssignmentRequest> {
        let request = self.load(request_id).await?;
        if actor_id != request.reviewer_id {
            return Err(RequestError::NotAuthorized {
                request_id,
                actor_id,
            }
            .into());
        }
        self.reject_inner(request_id, actor_id, reason.into()).await
    }

    /// Withdraw a pending request. Only the member who filed it may
    /// withdraw; the record lands as `Rejected` with a system-authored
    /// reason so the audit trail stays uniform.
    pub async fn withdraw(
        &self,
        request_id: RequestId,
        actor_id: UserId,
    ) -> WorkflowResult<AssignmentRequest> {
        let request = self.load(request_id).await?;
        if actor_id != request.requested_by {
            return Err(RequestError::NotAuthorized {
                request_id,
                actor_id,
            }
            .into());
        }
        let transition = StatusTransition::new(RequestStatus::Rejected, actor_id)
            .with_reason(WITHDRAWN_REASON);
        let decided = match self
            .store
            .request_transition(request_id, RequestStatus::Pending, transition)
            .await
        {
            Ok(decided) => decided,
            Err(WorkflowError::Storage(StorageError::CasConflict { .. })) => {
                return Err(self.already_decided(request_id).await);
            }
            Err(err) => return Err(err),
        };
        tracing::info!(request_id = %request_id, "assignment request withdrawn");
        self.events
            .broadcast(WorkflowEvent::RequestRejected {
                request: decided.clone(),
            });
        Ok(decided)
    }

    /// Decide a request on the reviewer's behalf (coordinator action).
    /// Skips the reviewer-identity check; everything else is identical to
    /// [`approve`](Self::approve) / [`reject`](Self::reject).
    pub async fn decide_as_admin(
        &self,
        request_id: RequestId,
        approve: bool,
        admin_id: UserId,
        reason: Option<String>,
    ) -> WorkflowResult<AssignmentRequest> {
        let request = self.load(request_id).await?;
        if approve {
            self.approve_inner(request, admin_id).await
        } else {
            let reason = reason.ok_or_else(|| ValidationError::RequiredFieldMissing {
                field: "reason".to_string(),
            })?;
            self.reject_inner(request_id, admin_id, reason).await
        }
    }

    /// Get a request by ID.
    pub async fn get(&self, request_id: RequestId) -> WorkflowResult<AssignmentRequest> {
        self.load(request_id).await
    }

    /// List requests matching a filter.
    pub async fn list(&self, filter: RequestFilter) -> WorkflowResult<Vec<AssignmentRequest>> {
        self.store.request_list(filter).await
    }

    /// The outstanding pending request for a tuple, if any. Lets a UI show
    /// "already requested" instead of letting the submit bounce.
    pub async fn pending_for(
        &self,
        group_id: GroupId,
        reviewer_id: ReviewerId,
        role: ReviewerRole,
    ) -> WorkflowResult<Option<AssignmentRequest>> {
        self.store
            .request_find_pending(group_id, reviewer_id, role)
            .await
    }

    /// Subscribe to snapshots of requests matching a filter. The current
    /// snapshot is delivered immediately.
    pub async fn subscribe(
        &self,
        filter: RequestFilter,
    ) -> WorkflowResult<Subscription<Vec<AssignmentRequest>>> {
        self.store.request_subscribe(filter).await
    }

    async fn approve_inner(
        &self,
        request: AssignmentRequest,
        decided_by: UserId,
    ) -> WorkflowResult<AssignmentRequest> {
        let request_id = request.request_id;
        if !request.is_pending() {
            return Err(RequestError::AlreadyDecided {
                request_id,
                status: request.status,
            }
            .into());
        }

        // Consume the slot first. The ledger's conditional write is what
        // enforces capacity under concurrent approvals of different
        // requests against the same reviewer.
        if let Err(err) = self
            .ledger
            .on_assignment_activated(request.reviewer_id)
            .await
        {
            return Err(self.capacity_loss_to_decision(request_id, err).await);
        }

        let transition = StatusTransition::new(RequestStatus::Approved, decided_by);
        let decided = match self
            .store
            .request_transition(request_id, RequestStatus::Pending, transition)
            .await
        {
            Ok(decided) => decided,
            Err(WorkflowError::Storage(StorageError::CasConflict { .. })) => {
                // Lost the decision race: give the slot back.
                if let Err(err) = self
                    .ledger
                    .on_assignment_deactivated(request.reviewer_id)
                    .await
                {
                    tracing::error!(
                        request_id = %request_id,
                        reviewer_id = %request.reviewer_id,
                        error = %err,
                        "failed to release slot after lost decision race"
                    );
                }
                return Err(self.already_decided(request_id).await);
            }
            Err(err) => return Err(err),
        };

        self.bind_roster(&decided).await?;

        tracing::info!(
            request_id = %request_id,
            group_id = %decided.group_id,
            reviewer_id = %decided.reviewer_id,
            "assignment request approved"
        );
        self.events
            .broadcast(WorkflowEvent::RequestApproved {
                request: decided.clone(),
            });
        Ok(decided)
    }

    async fn reject_inner(
        &self,
        request_id: RequestId,
        decided_by: UserId,
        reason: String,
    ) -> WorkflowResult<AssignmentRequest> {
        if reason.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "reason".to_string(),
            }
            .into());
        }
        let transition =
            StatusTransition::new(RequestStatus::Rejected, decided_by).with_reason(reason);
        let decided = match self
            .store
            .request_transition(request_id, RequestStatus::Pending, transition)
            .await
        {
            Ok(decided) => decided,
            Err(WorkflowError::Storage(StorageError::CasConflict { .. })) => {
                return Err(self.already_decided(request_id).await);
            }
            Err(err) => return Err(err),
        };
        tracing::info!(request_id = %request_id, "assignment request rejected");
        self.events
            .broadcast(WorkflowEvent::RequestRejected {
                request: decided.clone(),
            });
        Ok(decided)
    }

    /// Add the approved reviewer to the group roster. Re-reads and
    /// re-applies under concurrent group writes, bounded so an unrelated
    /// hot loop on the group cannot stall an approval forever.
    async fn bind_roster(&self, request: &AssignmentRequest) -> WorkflowResult<()> {
        let mut last_err: Option<WorkflowError> = None;
        for _ in 0..ROSTER_BIND_ATTEMPTS {
            let group = self.load_group(request.group_id).await?;
            if group
                .roster
                .iter()
                .any(|e| e.role == request.role && e.reviewer_id == request.reviewer_id)
            {
                return Ok(());
            }
            let mut next = group.clone();
            next.roster.push(RosterEntry {
                role: request.role,
                reviewer_id: request.reviewer_id,
            });
            match self.store.group_replace(group.updated_at, &next).await {
                Ok(_) => return Ok(()),
                Err(WorkflowError::Storage(StorageError::CasConflict { .. })) => {
                    last_err = Some(
                        StorageError::CasConflict {
                            collection: Collection::Groups,
                            id: request.group_id,
                            reason: "concurrent roster update".to_string(),
                        }
                        .into(),
                    );
                }
                Err(err) => return Err(err),
            }
        }
        // Unreachable unless the loop above exhausted its attempts.
        Err(last_err.unwrap_or_else(|| {
            StorageError::CasConflict {
                collection: Collection::Groups,
                id: request.group_id,
                reason: "concurrent roster update".to_string(),
            }
            .into()
        }))
    }
}

// ============================================================================
// TESTS
// ============================================================================
