//! Report model: a hunter's submission for a finished task, plus the
//! peer evaluation recorded against it.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{generate_id, now_utc};
use crate::task::TaskStatus;

/// Outcome a report records. Mirrors the terminal task statuses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// The task succeeded
    Completed,

    /// The task failed
    Failed,
}

impl ReportStatus {
    /// String form used in the database and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Completed => "completed",
            ReportStatus::Failed => "failed",
        }
    }

    /// Parse the database string form.
    pub fn parse(raw: &str) -> Option<ReportStatus> {
        match raw {
            "completed" => Some(ReportStatus::Completed),
            "failed" => Some(ReportStatus::Failed),
            _ => None,
        }
    }

    /// The task status this report outcome corresponds to.
    pub fn task_status(&self) -> TaskStatus {
        match self {
            ReportStatus::Completed => TaskStatus::Completed,
            ReportStatus::Failed => TaskStatus::Failed,
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A peer-scored judgment of a report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportEvaluation {
    /// Score in [0, 100]
    pub score: i64,

    /// Free-form evaluator feedback
    pub feedback: String,

    /// Hunter who performed the evaluation; never the report's submitter
    pub evaluator_id: String,

    /// Per-skill deltas to apply to the submitter (may be negative)
    #[serde(default)]
    pub skill_updates: HashMap<String, i64>,

    /// When the evaluation was recorded
    pub evaluated_at: DateTime<Utc>,
}

/// A hunter's submission for a task it completed or failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    /// Unique identifier (`report-<random>`)
    pub id: String,

    /// Task this report belongs to
    pub task_id: String,

    /// Submitter; equals the task's claimant at submission time
    pub hunter_id: String,

    /// Outcome the report records
    pub status: ReportStatus,

    /// Canonical result payload for the task
    pub result: Option<String>,

    /// Additional notes
    pub details: Option<String>,

    /// Peer evaluation, once one has been recorded
    pub evaluation: Option<ReportEvaluation>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl Report {
    /// Create a new, unevaluated report.
    pub fn new(
        task_id: impl Into<String>,
        hunter_id: impl Into<String>,
        status: ReportStatus,
        result: Option<String>,
        details: Option<String>,
    ) -> Self {
        let now = now_utc();
        Report {
            id: generate_id("report"),
            task_id: task_id.into(),
            hunter_id: hunter_id.into(),
            status,
            result,
            details,
            evaluation: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Bump the modification timestamp.
    pub fn touch(&mut self) {
        self.updated_at = now_utc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        assert_eq!(ReportStatus::parse("completed"), Some(ReportStatus::Completed));
        assert_eq!(ReportStatus::parse("failed"), Some(ReportStatus::Failed));
        assert_eq!(ReportStatus::parse("pending"), None);
    }

    #[test]
    fn test_status_mirrors_task_status() {
        assert_eq!(ReportStatus::Completed.task_status(), TaskStatus::Completed);
        assert_eq!(ReportStatus::Failed.task_status(), TaskStatus::Failed);
    }

    #[test]
    fn test_new_report() {
        let report = Report::new("task-1", "hunter-2", ReportStatus::Completed, Some("done".into()), None);
        assert!(report.id.starts_with("report-"));
        assert_eq!(report.task_id, "task-1");
        assert_eq!(report.hunter_id, "hunter-2");
        assert!(report.evaluation.is_none());
    }
}
