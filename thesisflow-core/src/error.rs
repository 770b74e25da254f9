//! Error types for thesisflow operations.
//!
//! Every domain error here is recoverable by the caller and maps to a
//! user-facing message; `StorageError::Unavailable` is the one kind callers
//! should retry with backoff. The engines never retry internally - retrying
//! a compare-and-set under an ambiguous failure risks double-applying it.

use crate::{ActorRole, Collection, GroupId, RequestStatus, ReviewerId, ReviewerRole, SubjectId};
use thiserror::Error;
use uuid::Uuid;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {collection} with id {id}")]
    NotFound { collection: Collection, id: Uuid },

    #[error("Compare-and-set conflict on {collection} with id {id}: {reason}")]
    CasConflict {
        collection: Collection,
        id: Uuid,
        reason: String,
    },

    #[error("Duplicate insert into {collection} with id {id}")]
    DuplicateId { collection: Collection, id: Uuid },

    #[error("Storage unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Serialization failed for {collection}: {reason}")]
    Serialization {
        collection: Collection,
        reason: String,
    },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Capacity ledger errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CapacityError {
    #[error(
        "Capacity {requested} for reviewer {reviewer_id} is below active assignment count {active}"
    )]
    BelowActive {
        reviewer_id: ReviewerId,
        requested: i32,
        active: i32,
    },

    #[error("Capacity {requested} for reviewer {reviewer_id} exceeds limit {limit}")]
    ExceedsLimit {
        reviewer_id: ReviewerId,
        requested: i32,
        limit: i32,
    },

    #[error(
        "Requested limit {requested} for reviewer {reviewer_id} does not exceed current limit {current_limit}"
    )]
    InvalidLimit {
        reviewer_id: ReviewerId,
        requested: i32,
        current_limit: i32,
    },

    #[error("Reviewer {reviewer_id} has no free slot ({active} of {capacity} in use)")]
    Unavailable {
        reviewer_id: ReviewerId,
        capacity: i32,
        active: i32,
    },

    #[error("Reviewer {reviewer_id} still has {active} active assignments")]
    StillAssigned { reviewer_id: ReviewerId, active: i32 },
}

/// Assignment request pipeline errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("A pending request already exists for group {group_id}, reviewer {reviewer_id}, role {role}")]
    DuplicatePending {
        group_id: GroupId,
        reviewer_id: ReviewerId,
        role: ReviewerRole,
    },

    #[error("Request {request_id} was already decided: {status:?}")]
    AlreadyDecided {
        request_id: Uuid,
        status: RequestStatus,
    },

    #[error("Actor {actor_id} is not authorized to act on request {request_id}")]
    NotAuthorized { request_id: Uuid, actor_id: Uuid },
}

/// Approval chain errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("Cannot create a chain with no stages for subject {subject_id}")]
    Empty { subject_id: SubjectId },

    #[error("Subject {subject_id} already has a live chain (version {version})")]
    AlreadyOpen { subject_id: SubjectId, version: i32 },

    #[error("Stage {attempted} is not the current stage of subject {subject_id} (current: {current:?})")]
    NotCurrentStage {
        subject_id: SubjectId,
        attempted: i32,
        current: Option<i32>,
    },

    #[error("Stage {stage} of subject {subject_id} requires role {required}, actor has {actual}")]
    RoleMismatch {
        subject_id: SubjectId,
        stage: i32,
        required: ActorRole,
        actual: ActorRole,
    },

    #[error("Stage {stage} of subject {subject_id} was already decided")]
    AlreadyDecided { subject_id: SubjectId, stage: i32 },
}

/// Validation errors for malformed input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid config value for {field} ({value}): {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all thesisflow errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Capacity error: {0}")]
    Capacity(#[from] CapacityError),

    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for thesisflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::new_entity_id;

    #[test]
    fn test_domain_errors_fold_into_master_error() {
        let id = new_entity_id();
        let err: WorkflowError = StorageError::NotFound {
            collection: Collection::AssignmentRequests,
            id,
        }
        .into();
        assert!(matches!(
            err,
            WorkflowError::Storage(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn test_already_decided_is_distinguishable() {
        // The UI shows "someone already acted on this" for this kind only,
        // so it must not collapse into a generic failure.
        let err: WorkflowError = RequestError::AlreadyDecided {
            request_id: new_entity_id(),
            status: RequestStatus::Approved,
        }
        .into();
        match err {
            WorkflowError::Request(RequestError::AlreadyDecided { status, .. }) => {
                assert_eq!(status, RequestStatus::Approved);
            }
            other => panic!("expected AlreadyDecided, got {other:?}"),
        }
    }

    #[test]
    fn test_error_messages_name_the_offending_values() {
        let err = CapacityError::BelowActive {
            reviewer_id: new_entity_id(),
            requested: 1,
            active: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("below active assignment count 2"));
    }
}
