//! THESISFLOW Workflow - Approval and Assignment Engines
//!
//! The four cooperating engines behind thesis-group workflow state:
//!
//! - [`CapacityLedger`] - single source of truth for whether a reviewer may
//!   accept one more assignment.
//! - [`AssignmentPipeline`] - lifecycle of a group's request to be paired
//!   with a reviewer; consumes capacity on approval.
//! - [`ApprovalChains`] - ordered multi-role sign-off on chapter, proposal,
//!   and terminal-requirement submissions.
//! - [`StatusProjector`] - pure read-time derivation of a group's
//!   externally visible status.
//!
//! Engines run against any [`DocumentStore`](thesisflow_storage::DocumentStore)
//! and publish [`WorkflowEvent`](thesisflow_core::WorkflowEvent)s on an
//! [`EventBroadcaster`] for external notifiers. Every state change is an
//! atomic conditional update; a lost decision race surfaces as an
//! "already decided" error the caller can present as such.

pub mod chain;
pub mod events;
pub mod ledger;
pub mod pipeline;
pub mod projector;

pub use chain::ApprovalChains;
pub use events::EventBroadcaster;
pub use ledger::CapacityLedger;
pub use pipeline::AssignmentPipeline;
pub use projector::StatusProjector;
