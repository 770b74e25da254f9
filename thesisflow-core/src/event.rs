//! Domain event types.
//!
//! Every state-changing operation in the workflow engines broadcasts one of
//! these for external notifiers (dashboards, mailers). Delivery is
//! fire-and-forget: a notification that nobody receives never rolls back the
//! underlying state change.

use crate::{
    AssignmentRequest, ChainId, ReviewerId, SubjectId, Timestamp,
};
use serde::{Deserialize, Serialize};

/// Domain events emitted by the workflow engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkflowEvent {
    // ========================================================================
    // ASSIGNMENT REQUEST EVENTS
    // ========================================================================
    /// A reviewer (or admin) approved an assignment request.
    RequestApproved {
        /// The request in its approved state
        request: AssignmentRequest,
    },

    /// A reviewer (or admin) rejected an assignment request, or the
    /// requester withdrew it.
    RequestRejected {
        /// The request in its rejected state
        request: AssignmentRequest,
    },

    // ========================================================================
    // APPROVAL CHAIN EVENTS
    // ========================================================================
    /// A stage was approved and the chain moved on (or completed).
    StageAdvanced {
        chain_id: ChainId,
        subject_id: SubjectId,
        /// The stage that was just approved
        approved_order: i32,
        /// The stage now in review, None when the chain completed
        next_order: Option<i32>,
    },

    /// Every stage of a chain is approved.
    ChainCompleted {
        chain_id: ChainId,
        subject_id: SubjectId,
    },

    /// A stage was rejected; the chain is terminally rejected.
    ChainRejected {
        chain_id: ChainId,
        subject_id: SubjectId,
        /// The stage that rejected
        rejected_order: i32,
    },

    // ========================================================================
    // CAPACITY EVENTS
    // ========================================================================
    /// A reviewer's capacity, limit, or active assignment count changed.
    CapacityChanged {
        reviewer_id: ReviewerId,
        capacity: i32,
        max_capacity_limit: i32,
        active_assignments: i32,
        at: Timestamp,
    },
}

impl WorkflowEvent {
    /// Stable event kind name, useful for log fields and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowEvent::RequestApproved { .. } => "request_approved",
            WorkflowEvent::RequestRejected { .. } => "request_rejected",
            WorkflowEvent::StageAdvanced { .. } => "stage_advanced",
            WorkflowEvent::ChainCompleted { .. } => "chain_completed",
            WorkflowEvent::ChainRejected { .. } => "chain_rejected",
            WorkflowEvent::CapacityChanged { .. } => "capacity_changed",
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{new_entity_id, ReviewerRole};

    #[test]
    fn test_events_serialize_with_type_tag() {
        let event = WorkflowEvent::ChainCompleted {
            chain_id: new_entity_id(),
            subject_id: new_entity_id(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ChainCompleted");
    }

    #[test]
    fn test_request_events_carry_the_full_request() {
        let request =
            AssignmentRequest::new(
            new_entity_id(),
            new_entity_id(),
            ReviewerRole::Adviser,
            new_entity_id(),
        );
        let event = WorkflowEvent::RequestApproved {
            request: request.clone(),
        };
        assert_eq!(event.kind(), "request_approved");
        let json = serde_json::to_string(&event).unwrap();
        let back: WorkflowEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(
            back,
            WorkflowEvent::RequestApproved { request }
        );
    }
}
