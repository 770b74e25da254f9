//! Status and role enums shared across the workflow engines.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// REVIEWER ROLE
// ============================================================================

/// Role a reviewer serves in for a thesis group.
///
/// The source system named the capacity field differently per role
/// ("slots" for experts, "capacity" for mentors); here all three roles share
/// one capacity model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReviewerRole {
    Adviser,
    Editor,
    Statistician,
}

impl ReviewerRole {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            ReviewerRole::Adviser => "adviser",
            ReviewerRole::Editor => "editor",
            ReviewerRole::Statistician => "statistician",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, RoleParseError> {
        match s.to_lowercase().as_str() {
            "adviser" => Ok(ReviewerRole::Adviser),
            "editor" => Ok(ReviewerRole::Editor),
            "statistician" => Ok(ReviewerRole::Statistician),
            _ => Err(RoleParseError(s.to_string())),
        }
    }

    /// The actor role a reviewer of this kind acts as in approval chains.
    pub fn as_actor_role(&self) -> ActorRole {
        match self {
            ReviewerRole::Adviser => ActorRole::Adviser,
            ReviewerRole::Editor => ActorRole::Editor,
            ReviewerRole::Statistician => ActorRole::Statistician,
        }
    }
}

impl fmt::Display for ReviewerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for ReviewerRole {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid role string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleParseError(pub String);

impl fmt::Display for RoleParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid role: {}", self.0)
    }
}

impl std::error::Error for RoleParseError {}

// ============================================================================
// ACTOR ROLE
// ============================================================================

/// Any role that can act on a workflow entity. Approval chain stages name
/// one of these as the role required to sign off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorRole {
    Student,
    Adviser,
    Editor,
    Statistician,
    Moderator,
    Chair,
    Head,
    Panel,
    Admin,
}

impl ActorRole {
    /// Whether this actor role corresponds to a capacity-carrying reviewer role.
    pub fn as_reviewer_role(&self) -> Option<ReviewerRole> {
        match self {
            ActorRole::Adviser => Some(ReviewerRole::Adviser),
            ActorRole::Editor => Some(ReviewerRole::Editor),
            ActorRole::Statistician => Some(ReviewerRole::Statistician),
            _ => None,
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActorRole::Student => "student",
            ActorRole::Adviser => "adviser",
            ActorRole::Editor => "editor",
            ActorRole::Statistician => "statistician",
            ActorRole::Moderator => "moderator",
            ActorRole::Chair => "chair",
            ActorRole::Head => "head",
            ActorRole::Panel => "panel",
            ActorRole::Admin => "admin",
        };
        write!(f, "{s}")
    }
}

// ============================================================================
// STATUSES
// ============================================================================

/// Status of an assignment request or capacity change request.
///
/// Requests are never deleted, only status-transitioned; a withdrawn request
/// is a `Rejected` request with a system-authored reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

/// Status of a single stage in an approval chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageStatus {
    /// Predecessor not yet approved; frozen forever if an earlier stage rejected.
    Waiting,
    /// This stage's role is the one expected to act next.
    InReview,
    Approved,
    Rejected,
}

/// Externally visible status of a thesis group, derived by the projector.
/// Never persisted; recomputed from requests and chains on each read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupWorkflowStatus {
    /// Required reviewer roles not yet all filled.
    Forming,
    /// A current-milestone chain is in review, incomplete, or rejected.
    Review,
    /// Roster complete and no chain work outstanding.
    Active,
    /// Terminal milestone's chain is complete.
    Completed,
    /// Set only by explicit administrative action on the group record.
    Archived,
}

// ============================================================================
// WORKFLOW CLASSIFIERS
// ============================================================================

/// A named phase of a thesis's lifecycle, each governed by its own chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Milestone {
    TopicProposal,
    ChapterReview,
    TerminalRequirements,
}

impl Milestone {
    /// The last milestone; completing its chain completes the thesis.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Milestone::TerminalRequirements)
    }

    /// The milestone that follows this one, None at the end.
    pub fn next(&self) -> Option<Milestone> {
        match self {
            Milestone::TopicProposal => Some(Milestone::ChapterReview),
            Milestone::ChapterReview => Some(Milestone::TerminalRequirements),
            Milestone::TerminalRequirements => None,
        }
    }
}

/// Kind of subject an approval chain signs off on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubjectKind {
    ChapterSubmission,
    TopicProposal,
    TerminalRequirement,
}

impl SubjectKind {
    /// The milestone this kind of subject belongs to.
    pub fn milestone(&self) -> Milestone {
        match self {
            SubjectKind::TopicProposal => Milestone::TopicProposal,
            SubjectKind::ChapterSubmission => Milestone::ChapterReview,
            SubjectKind::TerminalRequirement => Milestone::TerminalRequirements,
        }
    }
}

/// A reviewer's or administrator's verdict on a request or stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    Approve,
    Reject,
}

// ============================================================================
// COLLECTIONS
// ============================================================================

/// Collection discriminator for storage errors and polymorphic references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collection {
    ReviewerProfiles,
    AssignmentRequests,
    CapacityChangeRequests,
    ApprovalChains,
    Groups,
}

impl Collection {
    /// Collection name as stored in the document database.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Collection::ReviewerProfiles => "reviewerProfiles",
            Collection::AssignmentRequests => "assignmentRequests",
            Collection::CapacityChangeRequests => "capacityChangeRequests",
            Collection::ApprovalChains => "approvalChains",
            Collection::Groups => "groups",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reviewer_role_round_trips_through_db_str() {
        for role in [
            ReviewerRole::Adviser,
            ReviewerRole::Editor,
            ReviewerRole::Statistician,
        ] {
            assert_eq!(ReviewerRole::from_db_str(role.as_db_str()), Ok(role));
        }
    }

    #[test]
    fn test_reviewer_role_parse_is_case_insensitive() {
        assert_eq!(
            ReviewerRole::from_db_str("Adviser"),
            Ok(ReviewerRole::Adviser)
        );
        assert!(ReviewerRole::from_db_str("dean").is_err());
    }

    #[test]
    fn test_actor_role_reviewer_mapping() {
        assert_eq!(
            ActorRole::Editor.as_reviewer_role(),
            Some(ReviewerRole::Editor)
        );
        assert_eq!(ActorRole::Chair.as_reviewer_role(), None);
        assert_eq!(
            ReviewerRole::Statistician.as_actor_role(),
            ActorRole::Statistician
        );
    }

    #[test]
    fn test_request_status_terminality() {
        assert!(!RequestStatus::Pending.is_terminal());
        assert!(RequestStatus::Approved.is_terminal());
        assert!(RequestStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_subject_kind_milestones() {
        assert!(SubjectKind::TerminalRequirement.milestone().is_terminal());
        assert!(!SubjectKind::TopicProposal.milestone().is_terminal());
    }
}
