//! THESISFLOW Storage - Document Store Contract and In-Memory Implementation
//!
//! Defines the persistence abstraction the workflow engines run against.
//! A production deployment implements [`DocumentStore`] over a managed
//! document database; [`MemoryStore`] is the shipped reference
//! implementation backing the test suite and small installs.
//!
//! The contract encodes the concurrency model directly: every
//! state-changing method is an atomic conditional update (compare-and-set
//! on the document's current state), never a lock. The first writer to
//! observe the pre-decision state wins; the second receives
//! [`StorageError::CasConflict`](thesisflow_core::StorageError) and the
//! engines map that to their domain "already decided" kinds.

pub mod memory;
pub mod store;
pub mod subscription;

pub use memory::MemoryStore;
pub use store::{DocumentStore, RequestFilter};
pub use subscription::Subscription;

use thesisflow_core::{RequestStatus, Timestamp, UserId};

// ============================================================================
// TRANSITION PAYLOADS
// ============================================================================

/// Status transition payload for assignment requests and capacity change
/// requests. Applied only when the stored status matches the expected one.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusTransition {
    /// Status the document moves to.
    pub status: RequestStatus,
    /// Reason recorded with the decision (required for rejections).
    pub decision_reason: Option<String>,
    /// Actor who decided.
    pub decided_by: UserId,
    /// Decision timestamp.
    pub decided_at: Timestamp,
}

impl StatusTransition {
    /// Transition to the given status, decided now by `decided_by`.
    pub fn new(status: RequestStatus, decided_by: UserId) -> Self {
        Self {
            status,
            decision_reason: None,
            decided_by,
            decided_at: chrono::Utc::now(),
        }
    }

    /// Attach a decision reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.decision_reason = Some(reason.into());
        self
    }
}
