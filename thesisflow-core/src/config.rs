//! Service configuration.
//!
//! ALL values are required - no defaults anywhere. Test fixtures that need a
//! ready-made configuration live in `thesisflow-test-utils`.

use crate::{
    ActorRole, ConfigError, ReviewerRole, SubjectKind, WorkflowError, WorkflowResult,
};
use serde::{Deserialize, Serialize};

/// Ordered stage roles per chain subject kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTemplates {
    /// Topic proposals: moderator -> chair -> head in the source system.
    pub topic_proposal: Vec<ActorRole>,
    /// Chapter submissions.
    pub chapter_review: Vec<ActorRole>,
    /// Terminal requirements: panel/adviser/editor/statistician in
    /// configured order.
    pub terminal_requirement: Vec<ActorRole>,
}

impl StageTemplates {
    /// Stage roles for the given subject kind.
    pub fn roles_for(&self, kind: SubjectKind) -> &[ActorRole] {
        match kind {
            SubjectKind::TopicProposal => &self.topic_proposal,
            SubjectKind::ChapterSubmission => &self.chapter_review,
            SubjectKind::TerminalRequirement => &self.terminal_requirement,
        }
    }
}

/// Master configuration struct for the workflow service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    // Capacity ledger (REQUIRED)
    /// Capacity a newly provisioned reviewer starts with.
    pub default_capacity: i32,
    /// System default ceiling; raised per reviewer only through an approved
    /// capacity change request.
    pub default_max_capacity_limit: i32,

    // Group formation (REQUIRED)
    /// Reviewer roles every group must fill before leaving `Forming`.
    pub required_reviewer_roles: Vec<ReviewerRole>,

    // Approval chains (REQUIRED)
    pub stage_templates: StageTemplates,

    // Events (REQUIRED)
    /// Buffer size of the broadcast channel events are published on.
    pub event_channel_capacity: usize,
}

impl WorkflowConfig {
    /// Validate the configuration.
    /// Returns Ok(()) if valid, Err(WorkflowError::Config) if invalid.
    pub fn validate(&self) -> WorkflowResult<()> {
        if self.default_capacity < 0 {
            return Err(WorkflowError::Config(ConfigError::InvalidValue {
                field: "default_capacity".to_string(),
                value: self.default_capacity.to_string(),
                reason: "default_capacity must be non-negative".to_string(),
            }));
        }

        if self.default_max_capacity_limit < self.default_capacity {
            return Err(WorkflowError::Config(ConfigError::InvalidValue {
                field: "default_max_capacity_limit".to_string(),
                value: self.default_max_capacity_limit.to_string(),
                reason: "default_max_capacity_limit must be >= default_capacity".to_string(),
            }));
        }

        if self.required_reviewer_roles.is_empty() {
            return Err(WorkflowError::Config(ConfigError::InvalidValue {
                field: "required_reviewer_roles".to_string(),
                value: "[]".to_string(),
                reason: "at least one required reviewer role".to_string(),
            }));
        }

        let mut seen = Vec::new();
        for role in &self.required_reviewer_roles {
            if seen.contains(role) {
                return Err(WorkflowError::Config(ConfigError::InvalidValue {
                    field: "required_reviewer_roles".to_string(),
                    value: role.to_string(),
                    reason: "duplicate required reviewer role".to_string(),
                }));
            }
            seen.push(*role);
        }

        for (field, roles) in [
            ("stage_templates.topic_proposal", &self.stage_templates.topic_proposal),
            ("stage_templates.chapter_review", &self.stage_templates.chapter_review),
            (
                "stage_templates.terminal_requirement",
                &self.stage_templates.terminal_requirement,
            ),
        ] {
            if roles.is_empty() {
                return Err(WorkflowError::Config(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: "[]".to_string(),
                    reason: "stage template must name at least one role".to_string(),
                }));
            }
        }

        if self.event_channel_capacity == 0 {
            return Err(WorkflowError::Config(ConfigError::InvalidValue {
                field: "event_channel_capacity".to_string(),
                value: "0".to_string(),
                reason: "event_channel_capacity must be positive".to_string(),
            }));
        }

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
