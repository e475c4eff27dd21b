//! Task model and lifecycle state machine.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{generate_id, now_utc};

/// Publisher ID used for tasks generated by the system itself.
pub const SYSTEM_PUBLISHER: &str = "system";

/// Lifecycle status of a task.
///
/// Transitions are restricted to the graph encoded by [`TaskStatus::can_transition`]:
///
/// ```text
/// pending -> claimed -> in_progress -> completed | failed -> archived
///               \------------------------> failed (lease expiry / reaper)
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Published and waiting for a claimant
    Pending,

    /// Claimed under a lease but not yet started
    Claimed,

    /// Actively being worked on
    InProgress,

    /// Finished successfully
    Completed,

    /// Finished unsuccessfully or timed out
    Failed,

    /// Terminal task moved out of the active set
    Archived,
}

impl TaskStatus {
    /// String form used in the database and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Claimed => "claimed",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Archived => "archived",
        }
    }

    /// Parse the database string form.
    pub fn parse(raw: &str) -> Option<TaskStatus> {
        match raw {
            "pending" => Some(TaskStatus::Pending),
            "claimed" => Some(TaskStatus::Claimed),
            "in_progress" => Some(TaskStatus::InProgress),
            "completed" => Some(TaskStatus::Completed),
            "failed" => Some(TaskStatus::Failed),
            "archived" => Some(TaskStatus::Archived),
            _ => None,
        }
    }

    /// Whether this status ends the working lifecycle (completed or failed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether a transition from `self` to `next` is part of the lifecycle graph.
    pub fn can_transition(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Claimed)
                | (TaskStatus::Claimed, TaskStatus::InProgress)
                | (TaskStatus::Claimed, TaskStatus::Failed)
                | (TaskStatus::InProgress, TaskStatus::Completed)
                | (TaskStatus::InProgress, TaskStatus::Failed)
                | (TaskStatus::Completed, TaskStatus::Archived)
                | (TaskStatus::Failed, TaskStatus::Archived)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of work a task represents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskType {
    /// Regular work published by a hunter
    #[default]
    Normal,

    /// System-generated task asking a peer to evaluate a report
    Evaluation,

    /// Task whose deliverable is new knowledge
    Research,
}

impl TaskType {
    /// String form used in the database and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Normal => "NORMAL",
            TaskType::Evaluation => "EVALUATION",
            TaskType::Research => "RESEARCH",
        }
    }

    /// Parse the database string form.
    pub fn parse(raw: &str) -> Option<TaskType> {
        match raw {
            "NORMAL" => Some(TaskType::Normal),
            "EVALUATION" => Some(TaskType::Evaluation),
            "RESEARCH" => Some(TaskType::Research),
            _ => None,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Evaluation outcome denormalized onto the evaluated task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskEvaluation {
    /// Score in [0, 100]
    pub score: i64,

    /// Reputation delta applied to the submitter
    pub reputation_change: i64,

    /// Free-form evaluator feedback
    pub feedback: String,

    /// Hunter who performed the evaluation
    pub evaluator_id: String,

    /// Per-skill deltas requested by the evaluator
    #[serde(default)]
    pub skill_updates: HashMap<String, i64>,

    /// When the evaluation was recorded
    pub evaluated_at: DateTime<Utc>,
}

/// A unit of work with a required skill, lifecycle status, and optional
/// dependencies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Unique identifier (`task-<random>`)
    pub id: String,

    /// Short human-readable name
    pub name: String,

    /// Detailed instructions
    pub details: String,

    /// Skill a claimant must hold (any level, including 0)
    pub required_skill: String,

    /// Current lifecycle status
    pub status: TaskStatus,

    /// Scheduling priority derived from the publisher's reputation
    pub priority: i64,

    /// Kind of work
    pub task_type: TaskType,

    /// Claimant, set by a successful claim
    pub hunter_id: Option<String>,

    /// Routing hint for pre-assigned tasks; advisory, not a claim
    pub assigned_hunter_id: Option<String>,

    /// Publisher; `"system"` for auto-generated tasks
    pub published_by_hunter_id: Option<String>,

    /// Active lease identifier, present only while claimed
    pub lease_id: Option<String>,

    /// Lease deadline, present only while claimed
    pub lease_expires_at: Option<DateTime<Utc>>,

    /// Tasks this task depends on (recorded, not enforced on claim)
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Task that spawned this one, if any
    pub parent_task_id: Option<String>,

    /// For EVALUATION tasks, the report under review
    pub report_id: Option<String>,

    /// Evaluation outcome once the task's report has been scored
    pub evaluation: Option<TaskEvaluation>,

    /// Whether the task has been archived
    pub is_archived: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp, monotonically non-decreasing
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a new pending task.
    pub fn new(
        name: impl Into<String>,
        details: impl Into<String>,
        required_skill: impl Into<String>,
        published_by_hunter_id: impl Into<String>,
        priority: i64,
        task_type: TaskType,
        depends_on: Vec<String>,
    ) -> Self {
        let now = now_utc();
        Task {
            id: generate_id("task"),
            name: name.into(),
            details: details.into(),
            required_skill: required_skill.into(),
            status: TaskStatus::Pending,
            priority,
            task_type,
            hunter_id: None,
            assigned_hunter_id: None,
            published_by_hunter_id: Some(published_by_hunter_id.into()),
            lease_id: None,
            lease_expires_at: None,
            depends_on,
            parent_task_id: None,
            report_id: None,
            evaluation: None,
            is_archived: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Bump the modification timestamp.
    pub fn touch(&mut self) {
        self.updated_at = now_utc();
    }

    /// Drop the lease fields. Leases are only meaningful while claimed.
    pub fn clear_lease(&mut self) {
        self.lease_id = None;
        self.lease_expires_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Claimed,
            TaskStatus::InProgress,
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::Archived,
        ] {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::parse("unknown"), None);
    }

    #[test]
    fn test_transition_graph() {
        assert!(TaskStatus::Pending.can_transition(TaskStatus::Claimed));
        assert!(TaskStatus::Claimed.can_transition(TaskStatus::InProgress));
        assert!(TaskStatus::Claimed.can_transition(TaskStatus::Failed));
        assert!(TaskStatus::InProgress.can_transition(TaskStatus::Completed));
        assert!(TaskStatus::InProgress.can_transition(TaskStatus::Failed));
        assert!(TaskStatus::Completed.can_transition(TaskStatus::Archived));
        assert!(TaskStatus::Failed.can_transition(TaskStatus::Archived));

        assert!(!TaskStatus::Pending.can_transition(TaskStatus::InProgress));
        assert!(!TaskStatus::Completed.can_transition(TaskStatus::Pending));
        assert!(!TaskStatus::Archived.can_transition(TaskStatus::Archived));
        assert!(!TaskStatus::Pending.can_transition(TaskStatus::Archived));
    }

    #[test]
    fn test_task_type_round_trip() {
        assert_eq!(TaskType::parse("NORMAL"), Some(TaskType::Normal));
        assert_eq!(TaskType::parse("EVALUATION"), Some(TaskType::Evaluation));
        assert_eq!(TaskType::parse("RESEARCH"), Some(TaskType::Research));
        assert_eq!(TaskType::parse("normal"), None);
    }

    #[test]
    fn test_new_task_defaults() {
        let task = Task::new(
            "fix parser",
            "handle trailing commas",
            "rust",
            "hunter-1",
            5,
            TaskType::Normal,
            vec![],
        );
        assert!(task.id.starts_with("task-"));
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, 5);
        assert!(task.hunter_id.is_none());
        assert!(task.lease_id.is_none());
        assert!(!task.is_archived);
        assert_eq!(task.created_at, task.updated_at);
    }

    #[test]
    fn test_clear_lease() {
        let mut task = Task::new("t", "d", "s", "h", 0, TaskType::Normal, vec![]);
        task.lease_id = Some("lease-x".to_string());
        task.lease_expires_at = Some(now_utc());
        task.clear_lease();
        assert!(task.lease_id.is_none());
        assert!(task.lease_expires_at.is_none());
    }
}
