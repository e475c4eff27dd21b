//! Report submission and peer evaluation.
//!
//! Submitting a report, transitioning its task, updating the submitter's
//! bookkeeping, and spawning the follow-up EVALUATION task all happen in a
//! single transaction: an observer never sees a report without its
//! evaluation task, nor the reverse.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::config::{EvaluationSpawnMode, WorkflowConfig};
use crate::errors::{HubError, HubResult};
use crate::hunter_service::select_best_hunter;
use crate::ids::now_utc;
use crate::report::{Report, ReportEvaluation, ReportStatus};
use crate::store::{ReportFilter, SqliteStore};
use crate::task::{Task, TaskEvaluation, TaskStatus, TaskType, SYSTEM_PUBLISHER};

/// Submit a report for a held task.
///
/// On an in-progress task this performs the terminal transition and the
/// holder's bookkeeping. A task already in the matching terminal state
/// (finished via the complete operation) just gets the report recorded.
/// NORMAL tasks additionally spawn an EVALUATION task, pre-routed to the
/// best available evaluator other than the submitter.
pub async fn report_submit(
    store: &SqliteStore,
    workflow: &WorkflowConfig,
    task_id: &str,
    hunter_id: &str,
    status: ReportStatus,
    result: Option<String>,
    details: Option<String>,
) -> HubResult<Report> {
    let mut tx = store.begin().await?;
    let mut task = tx
        .get_task(task_id)
        .await?
        .ok_or_else(|| HubError::NotFound(format!("task {}", task_id)))?;

    if task.hunter_id.as_deref() != Some(hunter_id) {
        return Err(HubError::NotOwner(format!(
            "task {} is not held by {}",
            task_id, hunter_id
        )));
    }

    let final_status = status.task_status();
    let transitions = task.status == TaskStatus::InProgress;
    if !transitions && task.status != final_status {
        return Err(HubError::InvalidState(format!(
            "task {} is {}, cannot record a {} report",
            task_id, task.status, status
        )));
    }

    let report = Report::new(task_id, hunter_id, status, result, details);
    tx.save_report(&report).await?;

    if transitions {
        task.status = final_status;
        task.clear_lease();
        task.touch();
        if let Some(mut hunter) = tx.get_hunter(hunter_id).await? {
            hunter.finish_task(&task.id, final_status == TaskStatus::Completed);
            tx.save_hunter(&hunter).await?;
        }
    }
    tx.save_task(&task).await?;

    if task.task_type == TaskType::Normal && should_spawn_evaluation(workflow, task.priority) {
        let hunters = tx.list_hunters().await?;
        let skill = workflow
            .evaluation_skill
            .clone()
            .unwrap_or_else(|| task.required_skill.clone());
        let evaluator = select_best_hunter(hunters, &skill, &[hunter_id]);

        let mut evaluation_task = Task::new(
            format!("Evaluate report {}", report.id),
            "Review the linked report, score it, and leave feedback.",
            skill,
            SYSTEM_PUBLISHER,
            task.priority,
            TaskType::Evaluation,
            vec![],
        );
        evaluation_task.report_id = Some(report.id.clone());
        evaluation_task.parent_task_id = Some(task.id.clone());
        evaluation_task.assigned_hunter_id = evaluator.as_ref().map(|h| h.id.clone());
        tx.save_task(&evaluation_task).await?;
        info!(
            task_id = %evaluation_task.id,
            report_id = %report.id,
            evaluator = ?evaluation_task.assigned_hunter_id,
            "evaluation task spawned"
        );
    }

    tx.commit().await?;
    info!(report_id = %report.id, task_id, hunter_id, status = %status, "report submitted");
    Ok(report)
}

fn should_spawn_evaluation(workflow: &WorkflowConfig, priority: i64) -> bool {
    match workflow.evaluation_spawn {
        EvaluationSpawnMode::Always => true,
        EvaluationSpawnMode::Priority => priority > workflow.evaluation_priority_threshold,
        EvaluationSpawnMode::Off => false,
    }
}

/// Evaluate a report, awarding reputation and skill movement to its
/// submitter.
///
/// The task's priority boosts both: `bonus = 1 + priority/100`,
/// `reputation += floor((score/10) * bonus)`, and each skill delta is
/// scaled by the bonus then clamped into [0, 100].
pub async fn report_evaluate(
    store: &SqliteStore,
    report_id: &str,
    evaluator_id: &str,
    score: i64,
    feedback: &str,
    skill_updates: Option<HashMap<String, i64>>,
) -> HubResult<Report> {
    if !(0..=100).contains(&score) {
        return Err(HubError::Validation(format!(
            "score must lie in [0, 100], got {}",
            score
        )));
    }

    let mut tx = store.begin().await?;
    let mut report = tx
        .get_report(report_id)
        .await?
        .ok_or_else(|| HubError::NotFound(format!("report {}", report_id)))?;

    if report.hunter_id == evaluator_id {
        return Err(HubError::SelfEvaluation);
    }

    let mut task = tx
        .get_task(&report.task_id)
        .await?
        .ok_or_else(|| HubError::NotFound(format!("task {}", report.task_id)))?;
    let mut hunter = tx
        .get_hunter(&report.hunter_id)
        .await?
        .ok_or_else(|| HubError::NotFound(format!("hunter {}", report.hunter_id)))?;

    let skill_updates = skill_updates.unwrap_or_default();
    let priority_bonus = 1.0 + task.priority as f64 / 100.0;
    let reputation_gain = ((score as f64 / 10.0) * priority_bonus).floor() as i64;
    hunter.reputation = (hunter.reputation + reputation_gain).max(0);

    for (skill, delta) in &skill_updates {
        let scaled = (*delta as f64 * priority_bonus).floor() as i64;
        hunter.apply_skill_delta(skill, scaled);
    }
    hunter.touch();

    let evaluation = ReportEvaluation {
        score,
        feedback: feedback.to_string(),
        evaluator_id: evaluator_id.to_string(),
        skill_updates,
        evaluated_at: now_utc(),
    };
    report.evaluation = Some(evaluation.clone());
    report.touch();

    task.evaluation = Some(TaskEvaluation {
        score,
        reputation_change: reputation_gain,
        feedback: evaluation.feedback.clone(),
        evaluator_id: evaluation.evaluator_id.clone(),
        skill_updates: evaluation.skill_updates.clone(),
        evaluated_at: evaluation.evaluated_at,
    });
    task.touch();

    tx.save_report(&report).await?;
    tx.save_task(&task).await?;
    tx.save_hunter(&hunter).await?;
    tx.commit().await?;
    info!(
        report_id,
        evaluator_id,
        score,
        reputation_gain,
        "report evaluated"
    );
    Ok(report)
}

/// List reports matching all supplied filters, newest first.
pub async fn report_list(store: &SqliteStore, filter: &ReportFilter) -> HubResult<Vec<Report>> {
    let reports = store.list_reports(filter).await?;
    debug!(count = reports.len(), "reports listed");
    Ok(reports)
}
