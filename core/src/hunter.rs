//! Hunter model: skills, reputation, and task bookkeeping.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::now_utc;

/// Upper bound for any skill level.
pub const SKILL_MAX: i64 = 100;

/// Skill points gained per matching tag when studying a knowledge item.
pub const STUDY_SKILL_GAIN: i64 = 5;

/// Whether a hunter participates in task routing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HunterStatus {
    /// Eligible for claims and routing
    #[default]
    Active,

    /// Temporarily out of rotation
    Inactive,
}

impl HunterStatus {
    /// String form used in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            HunterStatus::Active => "active",
            HunterStatus::Inactive => "inactive",
        }
    }

    /// Parse the database string form.
    pub fn parse(raw: &str) -> Option<HunterStatus> {
        match raw {
            "active" => Some(HunterStatus::Active),
            "inactive" => Some(HunterStatus::Inactive),
            _ => None,
        }
    }
}

impl fmt::Display for HunterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An autonomous agent identity with skills, reputation, and task history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Hunter {
    /// Caller-declared identifier, unique within a namespace
    pub id: String,

    /// Skill name to level in [0, 100]
    #[serde(default)]
    pub skills: HashMap<String, i64>,

    /// Non-negative reputation score
    pub reputation: i64,

    /// Routing eligibility
    pub status: HunterStatus,

    /// Tasks currently held (claimed or in progress)
    #[serde(default)]
    pub current_tasks: Vec<String>,

    /// Count of tasks finished successfully
    pub completed_tasks: i64,

    /// Count of tasks that ended in failure
    pub failed_tasks: i64,

    /// Registration timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,

    /// Discussion read watermark
    pub last_read_discussion_timestamp: Option<DateTime<Utc>>,
}

impl Hunter {
    /// Create a freshly registered hunter.
    pub fn new(id: impl Into<String>, skills: HashMap<String, i64>) -> Self {
        let now = now_utc();
        let mut hunter = Hunter {
            id: id.into(),
            skills: HashMap::new(),
            reputation: 0,
            status: HunterStatus::Active,
            current_tasks: Vec::new(),
            completed_tasks: 0,
            failed_tasks: 0,
            created_at: now,
            updated_at: now,
            last_read_discussion_timestamp: None,
        };
        hunter.merge_skills(&skills);
        hunter
    }

    /// Bump the modification timestamp.
    pub fn touch(&mut self) {
        self.updated_at = now_utc();
    }

    /// Merge proposed skills, keeping the higher value for existing keys.
    ///
    /// Registration never lowers a skill; values are clamped into [0, 100].
    pub fn merge_skills(&mut self, incoming: &HashMap<String, i64>) {
        for (name, level) in incoming {
            let level = (*level).clamp(0, SKILL_MAX);
            let entry = self.skills.entry(name.clone()).or_insert(0);
            if level > *entry {
                *entry = level;
            }
        }
    }

    /// Apply study gains for each tag on a knowledge item.
    ///
    /// A previously unknown skill starts at the study gain itself.
    pub fn apply_study(&mut self, skill_tags: &[String]) {
        for tag in skill_tags {
            let entry = self.skills.entry(tag.clone()).or_insert(0);
            *entry = (*entry + STUDY_SKILL_GAIN).min(SKILL_MAX);
        }
    }

    /// Apply an evaluator-driven skill delta, clamped into [0, 100].
    pub fn apply_skill_delta(&mut self, skill: &str, delta: i64) {
        let entry = self.skills.entry(skill.to_string()).or_insert(0);
        *entry = (*entry + delta).clamp(0, SKILL_MAX);
    }

    /// Record that a held task reached a terminal status.
    pub fn finish_task(&mut self, task_id: &str, succeeded: bool) {
        self.current_tasks.retain(|held| held != task_id);
        if succeeded {
            self.completed_tasks += 1;
        } else {
            self.failed_tasks += 1;
        }
        self.touch();
    }

    /// Drop a held task without counting it as finished (deletes).
    pub fn release_task(&mut self, task_id: &str) {
        self.current_tasks.retain(|held| held != task_id);
        self.touch();
    }

    /// Routing score: reputation weighted against current workload.
    pub fn match_score(&self) -> f64 {
        self.reputation as f64 * 0.7 - self.current_tasks.len() as f64 * 0.3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skills(pairs: &[(&str, i64)]) -> HashMap<String, i64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_merge_skills_max_wins() {
        let mut hunter = Hunter::new("h5", skills(&[("go", 30)]));
        hunter.merge_skills(&skills(&[("go", 10), ("java", 20)]));
        assert_eq!(hunter.skills["go"], 30);
        assert_eq!(hunter.skills["java"], 20);
    }

    #[test]
    fn test_merge_skills_clamps_range() {
        let mut hunter = Hunter::new("h", HashMap::new());
        hunter.merge_skills(&skills(&[("rust", 250), ("review", -4)]));
        assert_eq!(hunter.skills["rust"], 100);
        assert_eq!(hunter.skills["review"], 0);
    }

    #[test]
    fn test_apply_study_gains() {
        let mut hunter = Hunter::new("h4", skills(&[("rust", 40)]));
        hunter.apply_study(&["rust".to_string()]);
        assert_eq!(hunter.skills["rust"], 45);

        // Brand-new skills start at the study gain.
        hunter.apply_study(&["python".to_string()]);
        assert_eq!(hunter.skills["python"], 5);
    }

    #[test]
    fn test_apply_study_saturates_at_cap() {
        let mut hunter = Hunter::new("h4", skills(&[("rust", 40)]));
        for _ in 0..13 {
            hunter.apply_study(&["rust".to_string()]);
        }
        assert_eq!(hunter.skills["rust"], 100);
    }

    #[test]
    fn test_apply_skill_delta_clamps() {
        let mut hunter = Hunter::new("h", skills(&[("rust", 98)]));
        hunter.apply_skill_delta("rust", 10);
        assert_eq!(hunter.skills["rust"], 100);
        hunter.apply_skill_delta("rust", -250);
        assert_eq!(hunter.skills["rust"], 0);
        hunter.apply_skill_delta("new", -3);
        assert_eq!(hunter.skills["new"], 0);
    }

    #[test]
    fn test_finish_task_bookkeeping() {
        let mut hunter = Hunter::new("h", HashMap::new());
        hunter.current_tasks = vec!["task-a".to_string(), "task-b".to_string()];
        hunter.finish_task("task-a", true);
        assert_eq!(hunter.current_tasks, vec!["task-b".to_string()]);
        assert_eq!(hunter.completed_tasks, 1);
        hunter.finish_task("task-b", false);
        assert!(hunter.current_tasks.is_empty());
        assert_eq!(hunter.failed_tasks, 1);
    }

    #[test]
    fn test_match_score_weighs_workload() {
        let mut idle = Hunter::new("idle", HashMap::new());
        idle.reputation = 10;
        let mut busy = Hunter::new("busy", HashMap::new());
        busy.reputation = 10;
        busy.current_tasks = vec!["task-1".to_string(); 5];
        assert!(idle.match_score() > busy.match_score());
    }
}
