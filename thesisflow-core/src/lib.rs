//! THESISFLOW Core - Entity Types
//!
//! Pure data structures with no behavior. All other crates depend on this.
//! This crate contains ONLY data types - no business logic: the workflow
//! engines that mutate these entities live in `thesisflow-workflow`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod config;
pub mod entities;
pub mod enums;
pub mod error;
pub mod event;

pub use config::{StageTemplates, WorkflowConfig};
pub use entities::{
    ApprovalChain, ApprovalStage, AssignmentRequest, CapacityChangeRequest, GroupRecord,
    ReviewerProfile, RosterEntry, WITHDRAWN_REASON,
};
pub use enums::{
    ActorRole, Collection, Decision, GroupWorkflowStatus, Milestone, RequestStatus, ReviewerRole,
    StageStatus, SubjectKind,
};
pub use error::{
    CapacityError, ChainError, ConfigError, RequestError, StorageError, ValidationError,
    WorkflowError, WorkflowResult,
};
pub use event::WorkflowEvent;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Entity identifier using UUIDv7 for timestamp-sortable IDs.
/// UUIDv7 embeds a Unix timestamp, making IDs naturally sortable by creation time.
pub type EntityId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Identifier of a reviewer profile (adviser, editor, statistician).
pub type ReviewerId = Uuid;

/// Identifier of a thesis group.
pub type GroupId = Uuid;

/// Identifier of an assignment request.
pub type RequestId = Uuid;

/// Identifier of a capacity change request.
pub type ChangeRequestId = Uuid;

/// Identifier of an approval chain.
pub type ChainId = Uuid;

/// Identifier of the subject a chain signs off on (chapter, proposal,
/// terminal-requirement submission).
pub type SubjectId = Uuid;

/// Identifier of any acting user (student, reviewer, chair, admin).
pub type UserId = Uuid;

/// Generate a new UUIDv7 EntityId (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entity_id_is_v7() {
        let id = new_entity_id();
        assert_eq!(id.get_version_num(), 7);
    }

    #[test]
    fn test_entity_ids_are_sortable() {
        let id1 = new_entity_id();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = new_entity_id();
        // UUIDv7 should be lexicographically sortable by time
        assert!(id1.to_string() < id2.to_string());
    }
}
