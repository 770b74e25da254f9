//! In-memory document store.
//!
//! Reference implementation of [`DocumentStore`] used by the test suite and
//! by small single-process installs. Each collection is a
//! `HashMap` behind an `RwLock`; conditional updates take the write lock,
//! so the compare-and-set contract holds trivially.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ::async_trait::async_trait;
use chrono::Utc;
use thesisflow_core::{
    ApprovalChain, AssignmentRequest, CapacityChangeRequest, ChainId, ChangeRequestId, Collection,
    GroupId, GroupRecord, Milestone, RequestId, RequestStatus, ReviewerId, ReviewerProfile,
    ReviewerRole, StorageError, SubjectId, Timestamp, WorkflowResult,
};
use uuid::Uuid;

use crate::store::{DocumentStore, RequestFilter};
use crate::subscription::{Subscription, SubscriptionSender};
use crate::StatusTransition;

type Subscribers<F, T> = Arc<RwLock<Vec<(F, SubscriptionSender<T>)>>>;

/// In-memory document store. Cloning is cheap and shares the underlying
/// collections.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    profiles: Arc<RwLock<HashMap<Uuid, ReviewerProfile>>>,
    requests: Arc<RwLock<HashMap<Uuid, AssignmentRequest>>>,
    change_requests: Arc<RwLock<HashMap<Uuid, CapacityChangeRequest>>>,
    chains: Arc<RwLock<HashMap<Uuid, ApprovalChain>>>,
    groups: Arc<RwLock<HashMap<Uuid, GroupRecord>>>,
    request_subs: Subscribers<RequestFilter, Vec<AssignmentRequest>>,
    chain_subs: Subscribers<GroupId, Vec<ApprovalChain>>,
    /// When set, every operation fails with `StorageError::Unavailable`,
    /// simulating a store outage for caller-side retry tests.
    offline: Arc<AtomicBool>,
}

fn read_guard<T>(lock: &RwLock<T>) -> WorkflowResult<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| StorageError::LockPoisoned.into())
}

fn write_guard<T>(lock: &RwLock<T>) -> WorkflowResult<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| StorageError::LockPoisoned.into())
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all stored data.
    pub fn clear(&self) {
        if let Ok(mut map) = self.profiles.write() {
            map.clear();
        }
        if let Ok(mut map) = self.requests.write() {
            map.clear();
        }
        if let Ok(mut map) = self.change_requests.write() {
            map.clear();
        }
        if let Ok(mut map) = self.chains.write() {
            map.clear();
        }
        if let Ok(mut map) = self.groups.write() {
            map.clear();
        }
    }

    /// Simulate (or end) a store outage.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> WorkflowResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable {
                reason: "simulated outage".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Count of stored assignment requests.
    pub fn request_count(&self) -> usize {
        self.requests.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Count of stored chains (all versions).
    pub fn chain_count(&self) -> usize {
        self.chains.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Audit helper: count a reviewer's approved assignment requests. Tests
    /// use this to cross-check the ledger-maintained counter; engine code
    /// must never recompute active counts ad hoc from it.
    pub fn recount_active_assignments(&self, reviewer_id: ReviewerId) -> WorkflowResult<i32> {
        let requests = read_guard(&self.requests)?;
        Ok(requests
            .values()
            .filter(|r| r.reviewer_id == reviewer_id && r.status == RequestStatus::Approved)
            .count() as i32)
    }

    fn notify_request_subs(&self) -> WorkflowResult<()> {
        let snapshot_source = read_guard(&self.requests)?;
        let mut subs = write_guard(&self.request_subs)?;
        subs.retain(|(filter, sender)| {
            if !sender.is_active() {
                return false;
            }
            let mut snapshot: Vec<AssignmentRequest> = snapshot_source
                .values()
                .filter(|r| filter.matches(r))
                .cloned()
                .collect();
            snapshot.sort_by_key(|r| r.request_id);
            sender.send(snapshot)
        });
        Ok(())
    }

    fn notify_chain_subs(&self) -> WorkflowResult<()> {
        let snapshot_source = read_guard(&self.chains)?;
        let mut subs = write_guard(&self.chain_subs)?;
        subs.retain(|(group_id, sender)| {
            if !sender.is_active() {
                return false;
            }
            let mut snapshot: Vec<ApprovalChain> = snapshot_source
                .values()
                .filter(|c| c.group_id == *group_id)
                .cloned()
                .collect();
            snapshot.sort_by_key(|c| (c.subject_id, c.version));
            sender.send(snapshot)
        });
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    // === Reviewer Profile Operations ===

    async fn profile_insert(&self, profile: &ReviewerProfile) -> WorkflowResult<()> {
        self.ensure_online()?;
        let mut profiles = write_guard(&self.profiles)?;
        if profiles.contains_key(&profile.reviewer_id) {
            return Err(StorageError::DuplicateId {
                collection: Collection::ReviewerProfiles,
                id: profile.reviewer_id,
            }
            .into());
        }
        profiles.insert(profile.reviewer_id, profile.clone());
        Ok(())
    }

    async fn profile_get(&self, id: ReviewerId) -> WorkflowResult<Option<ReviewerProfile>> {
        self.ensure_online()?;
        let profiles = read_guard(&self.profiles)?;
        Ok(profiles.get(&id).cloned())
    }

    async fn profile_replace(
        &self,
        expected_updated_at: Timestamp,
        profile: &ReviewerProfile,
    ) -> WorkflowResult<ReviewerProfile> {
        self.ensure_online()?;
        let mut profiles = write_guard(&self.profiles)?;
        let stored = profiles
            .get_mut(&profile.reviewer_id)
            .ok_or(StorageError::NotFound {
                collection: Collection::ReviewerProfiles,
                id: profile.reviewer_id,
            })?;
        if stored.updated_at != expected_updated_at {
            return Err(StorageError::CasConflict {
                collection: Collection::ReviewerProfiles,
                id: profile.reviewer_id,
                reason: "profile changed since read".to_string(),
            }
            .into());
        }
        let mut next = profile.clone();
        next.updated_at = Utc::now();
        *stored = next.clone();
        Ok(next)
    }

    async fn profile_list_by_role(
        &self,
        role: ReviewerRole,
    ) -> WorkflowResult<Vec<ReviewerProfile>> {
        self.ensure_online()?;
        let profiles = read_guard(&self.profiles)?;
        let mut list: Vec<ReviewerProfile> =
            profiles.values().filter(|p| p.role == role).cloned().collect();
        list.sort_by_key(|p| p.reviewer_id);
        Ok(list)
    }

    async fn profile_delete(&self, id: ReviewerId) -> WorkflowResult<()> {
        self.ensure_online()?;
        let mut profiles = write_guard(&self.profiles)?;
        profiles.remove(&id).ok_or(StorageError::NotFound {
            collection: Collection::ReviewerProfiles,
            id,
        })?;
        Ok(())
    }

    // === Assignment Request Operations ===

    async fn request_insert(&self, request: &AssignmentRequest) -> WorkflowResult<()> {
        self.ensure_online()?;
        {
            let mut requests = write_guard(&self.requests)?;
            if requests.contains_key(&request.request_id) {
                return Err(StorageError::DuplicateId {
                    collection: Collection::AssignmentRequests,
                    id: request.request_id,
                }
                .into());
            }
            let duplicate_pending = requests.values().any(|r| {
                r.group_id == request.group_id
                    && r.reviewer_id == request.reviewer_id
                    && r.role == request.role
                    && r.status == RequestStatus::Pending
            });
            if duplicate_pending {
                return Err(StorageError::CasConflict {
                    collection: Collection::AssignmentRequests,
                    id: request.request_id,
                    reason: "pending request exists for tuple".to_string(),
                }
                .into());
            }
            requests.insert(request.request_id, request.clone());
        }
        self.notify_request_subs()
    }

    async fn request_get(&self, id: RequestId) -> WorkflowResult<Option<AssignmentRequest>> {
        self.ensure_online()?;
        let requests = read_guard(&self.requests)?;
        Ok(requests.get(&id).cloned())
    }

    async fn request_transition(
        &self,
        id: RequestId,
        expected: RequestStatus,
        transition: StatusTransition,
    ) -> WorkflowResult<AssignmentRequest> {
        self.ensure_online()?;
        let updated = {
            let mut requests = write_guard(&self.requests)?;
            let stored = requests.get_mut(&id).ok_or(StorageError::NotFound {
                collection: Collection::AssignmentRequests,
                id,
            })?;
            if stored.status != expected {
                return Err(StorageError::CasConflict {
                    collection: Collection::AssignmentRequests,
                    id,
                    reason: format!("status is {:?}, expected {:?}", stored.status, expected),
                }
                .into());
            }
            stored.status = transition.status;
            stored.decision_reason = transition.decision_reason;
            stored.decided_by = Some(transition.decided_by);
            stored.decided_at = Some(transition.decided_at);
            stored.clone()
        };
        self.notify_request_subs()?;
        Ok(updated)
    }

    async fn request_list(&self, filter: RequestFilter) -> WorkflowResult<Vec<AssignmentRequest>> {
        self.ensure_online()?;
        let requests = read_guard(&self.requests)?;
        let mut list: Vec<AssignmentRequest> = requests
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        list.sort_by_key(|r| r.request_id);
        Ok(list)
    }

    async fn request_find_pending(
        &self,
        group_id: GroupId,
        reviewer_id: ReviewerId,
        role: ReviewerRole,
    ) -> WorkflowResult<Option<AssignmentRequest>> {
        self.ensure_online()?;
        let requests = read_guard(&self.requests)?;
        Ok(requests
            .values()
            .find(|r| {
                r.group_id == group_id
                    && r.reviewer_id == reviewer_id
                    && r.role == role
                    && r.status == RequestStatus::Pending
            })
            .cloned())
    }

    async fn request_subscribe(
        &self,
        filter: RequestFilter,
    ) -> WorkflowResult<Subscription<Vec<AssignmentRequest>>> {
        self.ensure_online()?;
        let (sender, subscription) = Subscription::channel();
        let initial: Vec<AssignmentRequest> = {
            let requests = read_guard(&self.requests)?;
            let mut snapshot: Vec<AssignmentRequest> = requests
                .values()
                .filter(|r| filter.matches(r))
                .cloned()
                .collect();
            snapshot.sort_by_key(|r| r.request_id);
            snapshot
        };
        sender.send(initial);
        let mut subs = write_guard(&self.request_subs)?;
        subs.push((filter, sender));
        Ok(subscription)
    }

    // === Capacity Change Request Operations ===

    async fn change_request_insert(&self, request: &CapacityChangeRequest) -> WorkflowResult<()> {
        self.ensure_online()?;
        let mut change_requests = write_guard(&self.change_requests)?;
        if change_requests.contains_key(&request.change_request_id) {
            return Err(StorageError::DuplicateId {
                collection: Collection::CapacityChangeRequests,
                id: request.change_request_id,
            }
            .into());
        }
        change_requests.insert(request.change_request_id, request.clone());
        Ok(())
    }

    async fn change_request_get(
        &self,
        id: ChangeRequestId,
    ) -> WorkflowResult<Option<CapacityChangeRequest>> {
        self.ensure_online()?;
        let change_requests = read_guard(&self.change_requests)?;
        Ok(change_requests.get(&id).cloned())
    }

    async fn change_request_transition(
        &self,
        id: ChangeRequestId,
        expected: RequestStatus,
        transition: StatusTransition,
    ) -> WorkflowResult<CapacityChangeRequest> {
        self.ensure_online()?;
        let mut change_requests = write_guard(&self.change_requests)?;
        let stored = change_requests.get_mut(&id).ok_or(StorageError::NotFound {
            collection: Collection::CapacityChangeRequests,
            id,
        })?;
        if stored.status != expected {
            return Err(StorageError::CasConflict {
                collection: Collection::CapacityChangeRequests,
                id,
                reason: format!("status is {:?}, expected {:?}", stored.status, expected),
            }
            .into());
        }
        stored.status = transition.status;
        stored.resolved_by = Some(transition.decided_by);
        stored.resolved_at = Some(transition.decided_at);
        Ok(stored.clone())
    }

    async fn change_request_list_by_reviewer(
        &self,
        reviewer_id: ReviewerId,
    ) -> WorkflowResult<Vec<CapacityChangeRequest>> {
        self.ensure_online()?;
        let change_requests = read_guard(&self.change_requests)?;
        let mut list: Vec<CapacityChangeRequest> = change_requests
            .values()
            .filter(|r| r.reviewer_id == reviewer_id)
            .cloned()
            .collect();
        list.sort_by_key(|r| r.change_request_id);
        Ok(list)
    }

    async fn change_request_list_pending(&self) -> WorkflowResult<Vec<CapacityChangeRequest>> {
        self.ensure_online()?;
        let change_requests = read_guard(&self.change_requests)?;
        let mut list: Vec<CapacityChangeRequest> = change_requests
            .values()
            .filter(|r| r.status == RequestStatus::Pending)
            .cloned()
            .collect();
        list.sort_by_key(|r| r.change_request_id);
        Ok(list)
    }

    // === Approval Chain Operations ===

    async fn chain_insert(&self, chain: &ApprovalChain) -> WorkflowResult<()> {
        self.ensure_online()?;
        {
            let mut chains = write_guard(&self.chains)?;
            if chains.contains_key(&chain.chain_id) {
                return Err(StorageError::DuplicateId {
                    collection: Collection::ApprovalChains,
                    id: chain.chain_id,
                }
                .into());
            }
            let live_exists = chains
                .values()
                .any(|c| c.subject_id == chain.subject_id && c.is_live());
            if live_exists {
                return Err(StorageError::CasConflict {
                    collection: Collection::ApprovalChains,
                    id: chain.chain_id,
                    reason: "live chain exists for subject".to_string(),
                }
                .into());
            }
            chains.insert(chain.chain_id, chain.clone());
        }
        self.notify_chain_subs()
    }

    async fn chain_get(&self, id: ChainId) -> WorkflowResult<Option<ApprovalChain>> {
        self.ensure_online()?;
        let chains = read_guard(&self.chains)?;
        Ok(chains.get(&id).cloned())
    }

    async fn chain_get_current(
        &self,
        subject_id: SubjectId,
    ) -> WorkflowResult<Option<ApprovalChain>> {
        self.ensure_online()?;
        let chains = read_guard(&self.chains)?;
        Ok(chains
            .values()
            .filter(|c| c.subject_id == subject_id)
            .max_by_key(|c| c.version)
            .cloned())
    }

    async fn chain_list_by_subject(
        &self,
        subject_id: SubjectId,
    ) -> WorkflowResult<Vec<ApprovalChain>> {
        self.ensure_online()?;
        let chains = read_guard(&self.chains)?;
        let mut list: Vec<ApprovalChain> = chains
            .values()
            .filter(|c| c.subject_id == subject_id)
            .cloned()
            .collect();
        list.sort_by_key(|c| c.version);
        Ok(list)
    }

    async fn chain_list_by_group_milestone(
        &self,
        group_id: GroupId,
        milestone: Milestone,
    ) -> WorkflowResult<Vec<ApprovalChain>> {
        self.ensure_online()?;
        let chains = read_guard(&self.chains)?;
        let mut list: Vec<ApprovalChain> = chains
            .values()
            .filter(|c| c.group_id == group_id && c.milestone == milestone)
            .cloned()
            .collect();
        list.sort_by_key(|c| (c.subject_id, c.version));
        Ok(list)
    }

    async fn chain_replace(
        &self,
        expected_updated_at: Timestamp,
        chain: &ApprovalChain,
    ) -> WorkflowResult<ApprovalChain> {
        self.ensure_online()?;
        let updated = {
            let mut chains = write_guard(&self.chains)?;
            let stored = chains.get_mut(&chain.chain_id).ok_or(StorageError::NotFound {
                collection: Collection::ApprovalChains,
                id: chain.chain_id,
            })?;
            if stored.updated_at != expected_updated_at {
                return Err(StorageError::CasConflict {
                    collection: Collection::ApprovalChains,
                    id: chain.chain_id,
                    reason: "chain changed since read".to_string(),
                }
                .into());
            }
            let mut next = chain.clone();
            next.updated_at = Utc::now();
            *stored = next.clone();
            next
        };
        self.notify_chain_subs()?;
        Ok(updated)
    }

    async fn chain_subscribe(
        &self,
        group_id: GroupId,
    ) -> WorkflowResult<Subscription<Vec<ApprovalChain>>> {
        self.ensure_online()?;
        let (sender, subscription) = Subscription::channel();
        let initial: Vec<ApprovalChain> = {
            let chains = read_guard(&self.chains)?;
            let mut snapshot: Vec<ApprovalChain> = chains
                .values()
                .filter(|c| c.group_id == group_id)
                .cloned()
                .collect();
            snapshot.sort_by_key(|c| (c.subject_id, c.version));
            snapshot
        };
        sender.send(initial);
        let mut subs = write_guard(&self.chain_subs)?;
        subs.push((group_id, sender));
        Ok(subscription)
    }

    // === Group Operations ===

    async fn group_insert(&self, group: &GroupRecord) -> WorkflowResult<()> {
        self.ensure_online()?;
        let mut groups = write_guard(&self.groups)?;
        if groups.contains_key(&group.group_id) {
            return Err(StorageError::DuplicateId {
                collection: Collection::Groups,
                id: group.group_id,
            }
            .into());
        }
        groups.insert(group.group_id, group.clone());
        Ok(())
    }

    async fn group_get(&self, id: GroupId) -> WorkflowResult<Option<GroupRecord>> {
        self.ensure_online()?;
        let groups = read_guard(&self.groups)?;
        Ok(groups.get(&id).cloned())
    }

    async fn group_replace(
        &self,
        expected_updated_at: Timestamp,
        group: &GroupRecord,
    ) -> WorkflowResult<GroupRecord> {
        self.ensure_online()?;
        let mut groups = write_guard(&self.groups)?;
        let stored = groups.get_mut(&group.group_id).ok_or(StorageError::NotFound {
            collection: Collection::Groups,
            id: group.group_id,
        })?;
        if stored.updated_at != expected_updated_at {
            return Err(StorageError::CasConflict {
                collection: Collection::Groups,
                id: group.group_id,
                reason: "group changed since read".to_string(),
            }
            .into());
        }
        let mut next = group.clone();
        next.updated_at = Utc::now();
        *stored = next.clone();
        Ok(next)
    }

    async fn group_list(&self) -> WorkflowResult<Vec<GroupRecord>> {
        self.ensure_online()?;
        let groups = read_guard(&self.groups)?;
        let mut list: Vec<GroupRecord> = groups.values().cloned().collect();
        list.sort_by_key(|g| g.group_id);
        Ok(list)
    }
}

// ============================================================================
// TESTS
// ============================================================================
