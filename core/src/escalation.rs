//! Stale-task escalation.
//!
//! A periodic sweep fails work that stopped moving: in-progress tasks idle
//! past 24 hours and claimed tasks unstarted past 12 hours (the lease is
//! advisory; this sweep is the sole authority acting on expiry). Pending
//! tasks pre-routed to a hunter who ignored them are re-routed to the next
//! best candidate, or returned to the open pool with a priority boost.
//!
//! The sweep runs outside any user transaction; every task it touches gets
//! its own short write so one bad record cannot wedge the whole pass.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, warn};

use crate::config::WorkflowConfig;
use crate::errors::HubResult;
use crate::hunter_service::select_best_hunter;
use crate::ids::now_utc;
use crate::store::{SqliteStore, TaskFilter};
use crate::task::TaskStatus;

/// Priority boost applied when a pre-assigned task returns to the open pool.
const UNASSIGN_PRIORITY_BOOST: i64 = 10;

/// Scan one namespace for stale tasks and escalate them.
///
/// Returns the number of status transitions performed (re-routes of pending
/// tasks do not transition status and are not counted).
pub async fn escalate_stale_tasks(
    store: &SqliteStore,
    workflow: &WorkflowConfig,
) -> HubResult<u64> {
    let now = now_utc();
    let in_progress_cutoff = now - Duration::hours(workflow.in_progress_timeout_hours);
    let claimed_cutoff = now - Duration::hours(workflow.claimed_timeout_hours);
    let assignment_cutoff = now - Duration::hours(workflow.assignment_timeout_hours);

    let tasks = store.list_tasks(&TaskFilter::default()).await?;
    let mut transitioned = 0u64;

    for task in tasks {
        match task.status {
            TaskStatus::InProgress if task.updated_at < in_progress_cutoff => {
                if fail_stale_task(store, &task.id, TaskStatus::InProgress, in_progress_cutoff)
                    .await?
                {
                    transitioned += 1;
                }
            }
            TaskStatus::Claimed if task.updated_at < claimed_cutoff => {
                if fail_stale_task(store, &task.id, TaskStatus::Claimed, claimed_cutoff).await? {
                    transitioned += 1;
                }
            }
            TaskStatus::Pending
                if task.assigned_hunter_id.is_some() && task.created_at < assignment_cutoff =>
            {
                reroute_assigned_task(store, &task.id, assignment_cutoff).await?;
            }
            _ => {}
        }
    }

    if transitioned > 0 {
        info!(transitioned, "stale tasks escalated");
    }
    Ok(transitioned)
}

/// Fail one stale task, re-checking its state inside the transaction.
async fn fail_stale_task(
    store: &SqliteStore,
    task_id: &str,
    expected: TaskStatus,
    cutoff: DateTime<Utc>,
) -> HubResult<bool> {
    let mut tx = store.begin().await?;
    let Some(mut task) = tx.get_task(task_id).await? else {
        return Ok(false);
    };
    // The task may have moved on since the scan read it.
    if task.status != expected || task.updated_at >= cutoff {
        return Ok(false);
    }

    warn!(task_id, status = %task.status, "task timed out, marking failed");
    task.status = TaskStatus::Failed;
    task.clear_lease();
    task.touch();
    tx.save_task(&task).await?;

    if let Some(holder_id) = &task.hunter_id {
        if let Some(mut holder) = tx.get_hunter(holder_id).await? {
            holder.finish_task(&task.id, false);
            tx.save_hunter(&holder).await?;
        }
    }
    tx.commit().await?;
    Ok(true)
}

/// Re-route a pre-assigned pending task nobody claimed.
async fn reroute_assigned_task(
    store: &SqliteStore,
    task_id: &str,
    cutoff: DateTime<Utc>,
) -> HubResult<()> {
    let mut tx = store.begin().await?;
    let Some(mut task) = tx.get_task(task_id).await? else {
        return Ok(());
    };
    let Some(previous) = task.assigned_hunter_id.clone() else {
        return Ok(());
    };
    if task.status != TaskStatus::Pending || task.created_at >= cutoff {
        return Ok(());
    }

    let hunters = tx.list_hunters().await?;
    match select_best_hunter(hunters, &task.required_skill, &[previous.as_str()]) {
        Some(next) => {
            info!(task_id, from = %previous, to = %next.id, "stale assignment re-routed");
            task.assigned_hunter_id = Some(next.id);
        }
        None => {
            warn!(task_id, from = %previous, "no other candidates, returning task to the pool");
            task.assigned_hunter_id = None;
            task.priority += UNASSIGN_PRIORITY_BOOST;
        }
    }
    task.touch();
    tx.save_task(&task).await?;
    tx.commit().await?;
    Ok(())
}

/// Spawn the periodic reaper over every open namespace.
///
/// Errors are logged and the loop keeps running; the handle can be aborted
/// on shutdown.
pub fn spawn_reaper(hub: Arc<crate::hub::Taskhub>) -> tokio::task::JoinHandle<()> {
    let period = std::time::Duration::from_secs(hub.config().workflow.reaper_interval_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so a fresh start does
        // not race namespace opening.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match hub.run_reaper_once().await {
                Ok(count) if count > 0 => info!(count, "reaper pass finished"),
                Ok(_) => {}
                Err(e) => error!(error = %e, "reaper pass failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkflowConfig;
    use crate::hunter_service::hunter_register;
    use crate::task::{Task, TaskType};
    use std::collections::HashMap;
    use tempfile::TempDir;

    async fn scratch_store() -> (TempDir, SqliteStore) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::connect(dir.path().join("test.db"))
            .await
            .unwrap();
        (dir, store)
    }

    fn skills(pairs: &[(&str, i64)]) -> HashMap<String, i64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    /// Persist a task whose clock fields sit `hours_ago` in the past.
    async fn aged_task(store: &SqliteStore, status: TaskStatus, hours_ago: i64) -> Task {
        let mut task = Task::new("stale", "d", "python", "publisher", 0, TaskType::Normal, vec![]);
        task.status = status;
        if matches!(status, TaskStatus::Claimed | TaskStatus::InProgress) {
            task.hunter_id = Some("holder".to_string());
        }
        let past = now_utc() - Duration::hours(hours_ago);
        task.created_at = past;
        task.updated_at = past;
        store.save_task(&task).await.unwrap();
        task
    }

    #[tokio::test]
    async fn test_in_progress_fails_after_25_hours() {
        let (_dir, store) = scratch_store().await;
        let task = aged_task(&store, TaskStatus::InProgress, 25).await;
        let count = escalate_stale_tasks(&store, &WorkflowConfig::default())
            .await
            .unwrap();
        assert_eq!(count, 1);
        let task = store.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn test_claimed_fails_after_13_hours() {
        let (_dir, store) = scratch_store().await;
        let task = aged_task(&store, TaskStatus::Claimed, 13).await;
        let count = escalate_stale_tasks(&store, &WorkflowConfig::default())
            .await
            .unwrap();
        assert_eq!(count, 1);
        let task = store.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.lease_id.is_none());
        assert!(task.lease_expires_at.is_none());
    }

    #[tokio::test]
    async fn test_fresh_tasks_left_alone() {
        let (_dir, store) = scratch_store().await;
        let claimed = aged_task(&store, TaskStatus::Claimed, 11).await;
        let in_progress = aged_task(&store, TaskStatus::InProgress, 23).await;
        let count = escalate_stale_tasks(&store, &WorkflowConfig::default())
            .await
            .unwrap();
        assert_eq!(count, 0);
        assert_eq!(
            store.get_task(&claimed.id).await.unwrap().unwrap().status,
            TaskStatus::Claimed
        );
        assert_eq!(
            store.get_task(&in_progress.id).await.unwrap().unwrap().status,
            TaskStatus::InProgress
        );
    }

    #[tokio::test]
    async fn test_failed_holder_bookkeeping() {
        let (_dir, store) = scratch_store().await;
        hunter_register(&store, "holder", Some(skills(&[("python", 10)])))
            .await
            .unwrap();
        let task = aged_task(&store, TaskStatus::InProgress, 25).await;
        {
            // Simulate the claim-time bookkeeping.
            let mut holder = store.get_hunter("holder").await.unwrap().unwrap();
            holder.current_tasks.push(task.id.clone());
            store.save_hunter(&holder).await.unwrap();
        }

        escalate_stale_tasks(&store, &WorkflowConfig::default())
            .await
            .unwrap();
        let holder = store.get_hunter("holder").await.unwrap().unwrap();
        assert!(holder.current_tasks.is_empty());
        assert_eq!(holder.failed_tasks, 1);
    }

    #[tokio::test]
    async fn test_stale_assignment_reroutes_to_next_best() {
        let (_dir, store) = scratch_store().await;
        hunter_register(&store, "ignorer", Some(skills(&[("python", 50)])))
            .await
            .unwrap();
        hunter_register(&store, "backup", Some(skills(&[("python", 40)])))
            .await
            .unwrap();
        let mut task = aged_task(&store, TaskStatus::Pending, 25).await;
        task.assigned_hunter_id = Some("ignorer".to_string());
        store.save_task(&task).await.unwrap();

        let count = escalate_stale_tasks(&store, &WorkflowConfig::default())
            .await
            .unwrap();
        // Re-routes do not count as transitions.
        assert_eq!(count, 0);
        let task = store.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.assigned_hunter_id.as_deref(), Some("backup"));
    }

    #[tokio::test]
    async fn test_stale_assignment_unassigns_and_boosts_priority() {
        let (_dir, store) = scratch_store().await;
        hunter_register(&store, "ignorer", Some(skills(&[("python", 50)])))
            .await
            .unwrap();
        let mut task = aged_task(&store, TaskStatus::Pending, 25).await;
        task.assigned_hunter_id = Some("ignorer".to_string());
        task.priority = 2;
        store.save_task(&task).await.unwrap();

        escalate_stale_tasks(&store, &WorkflowConfig::default())
            .await
            .unwrap();
        let task = store.get_task(&task.id).await.unwrap().unwrap();
        assert!(task.assigned_hunter_id.is_none());
        assert_eq!(task.priority, 12);
    }

    #[tokio::test]
    async fn test_unassigned_pending_tasks_ignored() {
        let (_dir, store) = scratch_store().await;
        let task = aged_task(&store, TaskStatus::Pending, 48).await;
        let count = escalate_stale_tasks(&store, &WorkflowConfig::default())
            .await
            .unwrap();
        assert_eq!(count, 0);
        assert_eq!(
            store.get_task(&task.id).await.unwrap().unwrap().status,
            TaskStatus::Pending
        );
    }
}
