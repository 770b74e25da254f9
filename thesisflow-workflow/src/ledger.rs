//! Capacity ledger.
//!
//! Single source of truth for whether a reviewer may accept one more
//! assignment. All writes to `active_assignments` go through
//! [`CapacityLedger::on_assignment_activated`] and
//! [`CapacityLedger::on_assignment_deactivated`], called only by the
//! assignment pipeline inside its approve/withdraw transactions - callers
//! must never recompute active counts ad hoc.

use std::sync::Arc;

use chrono::Utc;
use thesisflow_core::{
    CapacityChangeRequest, CapacityError, ChangeRequestId, Collection, Decision, RequestStatus,
    ReviewerId, ReviewerProfile, ReviewerRole, StorageError, UserId, ValidationError,
    WorkflowConfig, WorkflowError, WorkflowEvent, WorkflowResult,
};
use thesisflow_storage::{DocumentStore, StatusTransition};

use crate::events::EventBroadcaster;

/// Attempts at re-applying a slot count change when concurrent profile
/// writes invalidate the read.
const COUNTER_CAS_ATTEMPTS: usize = 3;

/// Capacity ledger over a document store.
#[derive(Debug, Clone)]
pub struct CapacityLedger<S> {
    store: Arc<S>,
    config: WorkflowConfig,
    events: EventBroadcaster,
}

impl<S: DocumentStore> CapacityLedger<S> {
    pub fn new(store: Arc<S>, config: WorkflowConfig, events: EventBroadcaster) -> Self {
        Self {
            store,
            config,
            events,
        }
    }

    async fn load(&self, reviewer_id: ReviewerId) -> WorkflowResult<ReviewerProfile> {
        self.store
            .profile_get(reviewer_id)
            .await?
            .ok_or_else(|| {
                StorageError::NotFound {
                    collection: Collection::ReviewerProfiles,
                    id: reviewer_id,
                }
                .into()
            })
    }

    fn emit_capacity_changed(&self, profile: &ReviewerProfile) {
        self.events.broadcast(WorkflowEvent::CapacityChanged {
            reviewer_id: profile.reviewer_id,
            capacity: profile.capacity,
            max_capacity_limit: profile.max_capacity_limit,
            active_assignments: profile.active_assignments,
            at: Utc::now(),
        });
    }

    /// Provision a reviewer profile with the configured default capacity
    /// and limit.
    pub async fn register_reviewer(
        &self,
        display_name: impl Into<String>,
        role: ReviewerRole,
    ) -> WorkflowResult<ReviewerProfile> {
        let profile = ReviewerProfile::new(
            display_name,
            role,
            self.config.default_capacity,
            self.config.default_max_capacity_limit,
        );
        self.store.profile_insert(&profile).await?;
        tracing::info!(reviewer_id = %profile.reviewer_id, role = %role, "reviewer registered");
        Ok(profile)
    }

    /// Whether the reviewer has a free slot. Side-effect free.
    pub async fn can_accept(&self, reviewer_id: ReviewerId) -> WorkflowResult<bool> {
        let profile = self.load(reviewer_id).await?;
        Ok(profile.can_accept())
    }

    /// Set a reviewer's capacity, bounded below by the active assignment
    /// count and above by the administrator-configured limit.
    pub async fn set_capacity(
        &self,
        reviewer_id: ReviewerId,
        new_capacity: i32,
    ) -> WorkflowResult<ReviewerProfile> {
        if new_capacity < 0 {
            return Err(ValidationError::InvalidValue {
                field: "capacity".to_string(),
                reason: "capacity must be non-negative".to_string(),
            }
            .into());
        }
        let profile = self.load(reviewer_id).await?;
        if new_capacity < profile.active_assignments {
            return Err(CapacityError::BelowActive {
                reviewer_id,
                requested: new_capacity,
                active: profile.active_assignments,
            }
            .into());
        }
        if new_capacity > profile.max_capacity_limit {
            return Err(CapacityError::ExceedsLimit {
                reviewer_id,
                requested: new_capacity,
                limit: profile.max_capacity_limit,
            }
            .into());
        }
        let mut next = profile.clone();
        next.capacity = new_capacity;
        let updated = self.store.profile_replace(profile.updated_at, &next).await?;
        tracing::info!(reviewer_id = %reviewer_id, capacity = new_capacity, "capacity updated");
        self.emit_capacity_changed(&updated);
        Ok(updated)
    }

    /// File a request to raise the reviewer's `max_capacity_limit`.
    pub async fn request_limit_increase(
        &self,
        reviewer_id: ReviewerId,
        requested_limit: i32,
        justification: impl Into<String>,
    ) -> WorkflowResult<CapacityChangeRequest> {
        let justification = justification.into();
        if justification.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "justification".to_string(),
            }
            .into());
        }
        let profile = self.load(reviewer_id).await?;
        if requested_limit <= profile.max_capacity_limit {
            return Err(CapacityError::InvalidLimit {
                reviewer_id,
                requested: requested_limit,
                current_limit: profile.max_capacity_limit,
            }
            .into());
        }
        let request = CapacityChangeRequest::new(reviewer_id, requested_limit, justification);
        self.store.change_request_insert(&request).await?;
        tracing::info!(
            reviewer_id = %reviewer_id,
            requested_limit,
            "limit increase requested"
        );
        Ok(request)
    }

    /// Resolve a pending limit-increase request. Approval raises the
    /// reviewer's limit to the requested value. A request that is absent or
    /// already resolved reports not-found.
    ///
    /// Approval writes the profile *before* committing the resolution: a
    /// failed profile write (reviewer deleted, storage outage) leaves the
    /// request pending and retryable instead of stranded approved with the
    /// limit never applied.
    pub async fn resolve_limit_request(
        &self,
        change_request_id: ChangeRequestId,
        decision: Decision,
        admin_id: UserId,
    ) -> WorkflowResult<CapacityChangeRequest> {
        let not_found = || StorageError::NotFound {
            collection: Collection::CapacityChangeRequests,
            id: change_request_id,
        };
        let request = self
            .store
            .change_request_get(change_request_id)
            .await?
            .ok_or_else(not_found)?;
        // Already resolved looks the same as absent to the caller.
        if request.status != RequestStatus::Pending {
            return Err(not_found().into());
        }

        let mut previous_limit = None;
        if decision == Decision::Approve {
            previous_limit = Some(
                self.raise_limit(request.reviewer_id, request.requested_limit)
                    .await?,
            );
        }

        let status = match decision {
            Decision::Approve => RequestStatus::Approved,
            Decision::Reject => RequestStatus::Rejected,
        };
        let transition = StatusTransition::new(status, admin_id);
        let resolved = match self
            .store
            .change_request_transition(change_request_id, RequestStatus::Pending, transition)
            .await
        {
            Ok(resolved) => resolved,
            Err(WorkflowError::Storage(StorageError::CasConflict { .. })) => {
                // A concurrent resolver won. A winning approval owns the
                // raised limit; anything else means the raise is undone.
                if let Some(previous) = previous_limit {
                    let winner_approved = matches!(
                        self.store.change_request_get(change_request_id).await,
                        Ok(Some(winner)) if winner.status == RequestStatus::Approved
                    );
                    if !winner_approved {
                        if let Err(err) =
                            self.restore_limit(request.reviewer_id, previous).await
                        {
                            tracing::error!(
                                change_request_id = %change_request_id,
                                reviewer_id = %request.reviewer_id,
                                error = %err,
                                "failed to restore limit after lost resolution race"
                            );
                        }
                    }
                }
                return Err(not_found().into());
            }
            Err(err) => return Err(err),
        };

        if decision == Decision::Approve {
            tracing::info!(
                reviewer_id = %resolved.reviewer_id,
                max_capacity_limit = resolved.requested_limit,
                "capacity limit raised"
            );
        }
        Ok(resolved)
    }

    /// Raise the reviewer's limit to `requested_limit`, with the same
    /// bounded re-read on a lost write as the slot counters. Returns the
    /// limit that was in place before the raise.
    async fn raise_limit(
        &self,
        reviewer_id: ReviewerId,
        requested_limit: i32,
    ) -> WorkflowResult<i32> {
        for _ in 0..COUNTER_CAS_ATTEMPTS {
            let profile = self.load(reviewer_id).await?;
            if profile.max_capacity_limit >= requested_limit {
                return Ok(profile.max_capacity_limit);
            }
            let mut next = profile.clone();
            next.max_capacity_limit = requested_limit;
            match self.store.profile_replace(profile.updated_at, &next).await {
                Ok(updated) => {
                    self.emit_capacity_changed(&updated);
                    return Ok(profile.max_capacity_limit);
                }
                Err(WorkflowError::Storage(StorageError::CasConflict { .. })) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(StorageError::CasConflict {
            collection: Collection::ReviewerProfiles,
            id: reviewer_id,
            reason: "concurrent profile updates".to_string(),
        }
        .into())
    }

    /// Lower the limit back after a lost resolution race, clamped so it
    /// never drops below the capacity a concurrent edit may have set.
    async fn restore_limit(
        &self,
        reviewer_id: ReviewerId,
        previous_limit: i32,
    ) -> WorkflowResult<()> {
        for _ in 0..COUNTER_CAS_ATTEMPTS {
            let profile = self.load(reviewer_id).await?;
            let target = previous_limit.max(profile.capacity);
            if profile.max_capacity_limit <= target {
                return Ok(());
            }
            let mut next = profile.clone();
            next.max_capacity_limit = target;
            match self.store.profile_replace(profile.updated_at, &next).await {
                Ok(updated) => {
                    self.emit_capacity_changed(&updated);
                    return Ok(());
                }
                Err(WorkflowError::Storage(StorageError::CasConflict { .. })) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(StorageError::CasConflict {
            collection: Collection::ReviewerProfiles,
            id: reviewer_id,
            reason: "concurrent profile updates".to_string(),
        }
        .into())
    }

    /// Get a reviewer profile.
    pub async fn get_profile(&self, reviewer_id: ReviewerId) -> WorkflowResult<ReviewerProfile> {
        self.load(reviewer_id).await
    }

    /// List reviewer profiles holding a role, for assignment pickers.
    pub async fn list_by_role(&self, role: ReviewerRole) -> WorkflowResult<Vec<ReviewerProfile>> {
        self.store.profile_list_by_role(role).await
    }

    /// The administrator's queue of unresolved limit-increase requests.
    pub async fn pending_limit_requests(&self) -> WorkflowResult<Vec<CapacityChangeRequest>> {
        self.store.change_request_list_pending().await
    }

    /// A reviewer's limit-request history.
    pub async fn limit_requests_for(
        &self,
        reviewer_id: ReviewerId,
    ) -> WorkflowResult<Vec<CapacityChangeRequest>> {
        self.store.change_request_list_by_reviewer(reviewer_id).await
    }

    /// Remove a reviewer profile. Blocked while assignments reference it.
    pub async fn delete_reviewer(&self, reviewer_id: ReviewerId) -> WorkflowResult<()> {
        let profile = self.load(reviewer_id).await?;
        if profile.active_assignments > 0 {
            return Err(CapacityError::StillAssigned {
                reviewer_id,
                active: profile.active_assignments,
            }
            .into());
        }
        self.store.profile_delete(reviewer_id).await?;
        tracing::info!(reviewer_id = %reviewer_id, "reviewer deleted");
        Ok(())
    }

    /// Consume one slot. Fails when no slot is free. A lost conditional
    /// write means a concurrent slot change, so the capacity check is
    /// re-evaluated against the fresh profile, bounded to keep a hot loop
    /// on the profile from stalling the caller.
    pub(crate) async fn on_assignment_activated(
        &self,
        reviewer_id: ReviewerId,
    ) -> WorkflowResult<ReviewerProfile> {
        for _ in 0..COUNTER_CAS_ATTEMPTS {
            let profile = self.load(reviewer_id).await?;
            if !profile.can_accept() {
                return Err(CapacityError::Unavailable {
                    reviewer_id,
                    capacity: profile.capacity,
                    active: profile.active_assignments,
                }
                .into());
            }
            let mut next = profile.clone();
            next.active_assignments += 1;
            match self.store.profile_replace(profile.updated_at, &next).await {
                Ok(updated) => {
                    tracing::debug!(
                        reviewer_id = %reviewer_id,
                        active = updated.active_assignments,
                        "assignment activated"
                    );
                    self.emit_capacity_changed(&updated);
                    return Ok(updated);
                }
                Err(WorkflowError::Storage(StorageError::CasConflict { .. })) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(StorageError::CasConflict {
            collection: Collection::ReviewerProfiles,
            id: reviewer_id,
            reason: "concurrent slot updates".to_string(),
        }
        .into())
    }

    /// Release one slot, with the same bounded re-read on a lost write.
    pub(crate) async fn on_assignment_deactivated(
        &self,
        reviewer_id: ReviewerId,
    ) -> WorkflowResult<ReviewerProfile> {
        for _ in 0..COUNTER_CAS_ATTEMPTS {
            let profile = self.load(reviewer_id).await?;
            if profile.active_assignments == 0 {
                return Err(ValidationError::InvalidValue {
                    field: "active_assignments".to_string(),
                    reason: "no active assignment to release".to_string(),
                }
                .into());
            }
            let mut next = profile.clone();
            next.active_assignments -= 1;
            match self.store.profile_replace(profile.updated_at, &next).await {
                Ok(updated) => {
                    tracing::debug!(
                        reviewer_id = %reviewer_id,
                        active = updated.active_assignments,
                        "assignment deactivated"
                    );
                    self.emit_capacity_changed(&updated);
                    return Ok(updated);
                }
                Err(WorkflowError::Storage(StorageError::CasConflict { .. })) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(StorageError::CasConflict {
            collection: Collection::ReviewerProfiles,
            id: reviewer_id,
            reason: "concurrent slot updates".to_string(),
        }
        .into())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use thesisflow_core::{new_entity_id, StageTemplates};
    use thesisflow_core::ActorRole;
    use thesisflow_storage::MemoryStore;

    fn test_config() -> WorkflowConfig {
        WorkflowConfig {
            default_capacity: 2,
            default_max_capacity_limit: 5,
            required_reviewer_roles: vec![ReviewerRole::Adviser, ReviewerRole::Editor],
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
            event_channel_capacity: 64,
        }
    }

    fn ledger() -> CapacityLedger<MemoryStore> {
        CapacityLedger::new(
            Arc::new(MemoryStore::new()),
            test_config(),
            EventBroadcaster::new(64),
        )
    }

    #[tokio::test]
    async fn test_register_uses_config_defaults() {
        let ledger = ledger();
        let profile = ledger
            .register_reviewer("Dr. Reyes", ReviewerRole::Adviser)
            .await
            .unwrap();
        assert_eq!(profile.capacity, 2);
        assert_eq!(profile.max_capacity_limit, 5);
        assert_eq!(profile.active_assignments, 0);
        assert!(ledger.can_accept(profile.reviewer_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_can_accept_unknown_reviewer_is_not_found() {
        let ledger = ledger();
        let err = ledger.can_accept(new_entity_id()).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Storage(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_set_capacity_below_active_fails_and_leaves_capacity_unchanged() {
        let ledger = ledger();
        let profile = ledger
            .register_reviewer("Dr. Reyes", ReviewerRole::Adviser)
            .await
            .unwrap();
        ledger
            .on_assignment_activated(profile.reviewer_id)
            .await
            .unwrap();
        ledger
            .on_assignment_activated(profile.reviewer_id)
            .await
            .unwrap();

        let err = ledger
            .set_capacity(profile.reviewer_id, 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Capacity(CapacityError::BelowActive {
                requested: 1,
                active: 2,
                ..
            })
        ));

        let stored = ledger.load(profile.reviewer_id).await.unwrap();
        assert_eq!(stored.capacity, 2);
    }

    #[tokio::test]
    async fn test_set_capacity_above_limit_fails() {
        let ledger = ledger();
        let profile = ledger
            .register_reviewer("Dr. Reyes", ReviewerRole::Editor)
            .await
            .unwrap();
        let err = ledger
            .set_capacity(profile.reviewer_id, 6)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Capacity(CapacityError::ExceedsLimit { limit: 5, .. })
        ));
    }

    #[tokio::test]
    async fn test_activation_consumes_slots_until_full() {
        let ledger = ledger();
        let profile = ledger
            .register_reviewer("Dr. Reyes", ReviewerRole::Adviser)
            .await
            .unwrap();
        ledger
            .on_assignment_activated(profile.reviewer_id)
            .await
            .unwrap();
        let updated = ledger
            .on_assignment_activated(profile.reviewer_id)
            .await
            .unwrap();
        assert_eq!(updated.active_assignments, 2);
        assert!(!updated.can_accept());

        let err = ledger
            .on_assignment_activated(profile.reviewer_id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Capacity(CapacityError::Unavailable {
                capacity: 2,
                active: 2,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_deactivation_below_zero_is_rejected() {
        let ledger = ledger();
        let profile = ledger
            .register_reviewer("Dr. Reyes", ReviewerRole::Adviser)
            .await
            .unwrap();
        let err = ledger
            .on_assignment_deactivated(profile.reviewer_id)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[tokio::test]
    async fn test_limit_increase_flow() {
        let ledger = ledger();
        let profile = ledger
            .register_reviewer("Dr. Reyes", ReviewerRole::Statistician)
            .await
            .unwrap();

        // Not an increase.
        let err = ledger
            .request_limit_increase(profile.reviewer_id, 5, "more slots please")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Capacity(CapacityError::InvalidLimit { .. })
        ));

        // Blank justification.
        let err = ledger
            .request_limit_increase(profile.reviewer_id, 8, "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));

        let request = ledger
            .request_limit_increase(profile.reviewer_id, 8, "taking two more groups this term")
            .await
            .unwrap();
        assert_eq!(request.status, RequestStatus::Pending);

        let admin = new_entity_id();
        let resolved = ledger
            .resolve_limit_request(request.change_request_id, Decision::Approve, admin)
            .await
            .unwrap();
        assert_eq!(resolved.status, RequestStatus::Approved);
        assert_eq!(resolved.resolved_by, Some(admin));

        let stored = ledger.load(profile.reviewer_id).await.unwrap();
        assert_eq!(stored.max_capacity_limit, 8);
        // Capacity itself is untouched until the reviewer raises it.
        assert_eq!(stored.capacity, 2);
        assert!(ledger.set_capacity(profile.reviewer_id, 8).await.is_ok());
    }

    #[tokio::test]
    async fn test_resolving_twice_reports_not_found() {
        let ledger = ledger();
        let profile = ledger
            .register_reviewer("Dr. Reyes", ReviewerRole::Adviser)
            .await
            .unwrap();
        let request = ledger
            .request_limit_increase(profile.reviewer_id, 7, "co-advising a second cohort")
            .await
            .unwrap();

        let admin = new_entity_id();
        ledger
            .resolve_limit_request(request.change_request_id, Decision::Reject, admin)
            .await
            .unwrap();
        let err = ledger
            .resolve_limit_request(request.change_request_id, Decision::Approve, admin)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Storage(StorageError::NotFound { .. })
        ));

        // Rejection left the limit alone.
        let stored = ledger.load(profile.reviewer_id).await.unwrap();
        assert_eq!(stored.max_capacity_limit, 5);
    }

    #[tokio::test]
    async fn test_failed_approval_write_leaves_the_request_pending() {
        let ledger = ledger();
        let profile = ledger
            .register_reviewer("Dr. Reyes", ReviewerRole::Adviser)
            .await
            .unwrap();
        let request = ledger
            .request_limit_increase(profile.reviewer_id, 7, "extra cohort next term")
            .await
            .unwrap();
        ledger.delete_reviewer(profile.reviewer_id).await.unwrap();

        // The profile write fails, so the approval must not commit.
        let err = ledger
            .resolve_limit_request(request.change_request_id, Decision::Approve, new_entity_id())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Storage(StorageError::NotFound { .. })
        ));

        // The request is still in the admin queue and can still be
        // resolved; rejection never touches the profile.
        let queue = ledger.pending_limit_requests().await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].change_request_id, request.change_request_id);
        let resolved = ledger
            .resolve_limit_request(request.change_request_id, Decision::Reject, new_entity_id())
            .await
            .unwrap();
        assert_eq!(resolved.status, RequestStatus::Rejected);
    }

    #[tokio::test]
    async fn test_admin_queue_shrinks_as_requests_resolve() {
        let ledger = ledger();
        let a = ledger
            .register_reviewer("Dr. Reyes", ReviewerRole::Adviser)
            .await
            .unwrap();
        let b = ledger
            .register_reviewer("Dr. Santos", ReviewerRole::Editor)
            .await
            .unwrap();
        let req_a = ledger
            .request_limit_increase(a.reviewer_id, 7, "extra cohort")
            .await
            .unwrap();
        ledger
            .request_limit_increase(b.reviewer_id, 6, "editing backlog cleared")
            .await
            .unwrap();

        assert_eq!(ledger.pending_limit_requests().await.unwrap().len(), 2);
        ledger
            .resolve_limit_request(req_a.change_request_id, Decision::Reject, new_entity_id())
            .await
            .unwrap();
        let queue = ledger.pending_limit_requests().await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].reviewer_id, b.reviewer_id);

        // Resolved requests stay in the reviewer's history.
        assert_eq!(
            ledger.limit_requests_for(a.reviewer_id).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_list_by_role_filters_profiles() {
        let ledger = ledger();
        ledger
            .register_reviewer("Dr. Reyes", ReviewerRole::Adviser)
            .await
            .unwrap();
        ledger
            .register_reviewer("Dr. Santos", ReviewerRole::Editor)
            .await
            .unwrap();

        let advisers = ledger.list_by_role(ReviewerRole::Adviser).await.unwrap();
        assert_eq!(advisers.len(), 1);
        assert_eq!(advisers[0].display_name, "Dr. Reyes");
        assert!(ledger
            .list_by_role(ReviewerRole::Statistician)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_delete_blocked_while_assigned() {
        let ledger = ledger();
        let profile = ledger
            .register_reviewer("Dr. Reyes", ReviewerRole::Adviser)
            .await
            .unwrap();
        ledger
            .on_assignment_activated(profile.reviewer_id)
            .await
            .unwrap();

        let err = ledger.delete_reviewer(profile.reviewer_id).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Capacity(CapacityError::StillAssigned { active: 1, .. })
        ));

        ledger
            .on_assignment_deactivated(profile.reviewer_id)
            .await
            .unwrap();
        ledger.delete_reviewer(profile.reviewer_id).await.unwrap();
        let err = ledger.can_accept(profile.reviewer_id).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Storage(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_capacity_changes_emit_events() {
        let store = Arc::new(MemoryStore::new());
        let events = EventBroadcaster::new(64);
        let ledger = CapacityLedger::new(store, test_config(), events.clone());
        let mut rx = events.subscribe();

        let profile = ledger
            .register_reviewer("Dr. Reyes", ReviewerRole::Adviser)
            .await
            .unwrap();
        ledger.set_capacity(profile.reviewer_id, 3).await.unwrap();

        match rx.recv().await.unwrap() {
            WorkflowEvent::CapacityChanged {
                reviewer_id,
                capacity,
                ..
            } => {
                assert_eq!(reviewer_id, profile.reviewer_id);
                assert_eq!(capacity, 3);
            }
            other => panic!("expected CapacityChanged, got {other:?}"),
        }
    }
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
