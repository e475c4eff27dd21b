//! Task lifecycle operations: publish, claim, start, complete, list,
//! archive, delete.
//!
//! Every multi-step update runs inside a store transaction so concurrent
//! claims serialize: the losing claimant re-reads the task inside its own
//! transaction, sees it is no longer pending, and fails with an invalid
//! state error instead of double-claiming.

use chrono::Duration;
use tracing::{debug, info};

use crate::config::WorkflowConfig;
use crate::errors::{HubError, HubResult};
use crate::ids::{generate_id, now_utc};
use crate::store::{SqliteStore, TaskFilter};
use crate::task::{Task, TaskStatus, TaskType, SYSTEM_PUBLISHER};

/// Publish a new task.
///
/// Priority derives from the publisher's reputation (10 reputation points
/// buy 1 priority point). System-published tasks get priority 0 unless the
/// caller overrides it afterwards.
pub async fn task_publish(
    store: &SqliteStore,
    name: &str,
    details: &str,
    required_skill: &str,
    publisher_id: &str,
    depends_on: Vec<String>,
    task_type: TaskType,
) -> HubResult<Task> {
    if name.trim().is_empty() {
        return Err(HubError::Validation("task name must not be empty".to_string()));
    }
    if required_skill.trim().is_empty() {
        return Err(HubError::Validation(
            "required_skill must not be empty".to_string(),
        ));
    }

    let mut tx = store.begin().await?;
    let priority = if publisher_id == SYSTEM_PUBLISHER {
        0
    } else {
        let publisher = tx
            .get_hunter(publisher_id)
            .await?
            .ok_or_else(|| HubError::NotFound(format!("publisher hunter {}", publisher_id)))?;
        publisher.reputation / 10
    };

    let task = Task::new(
        name,
        details,
        required_skill,
        publisher_id,
        priority,
        task_type,
        depends_on,
    );
    tx.save_task(&task).await?;
    tx.commit().await?;
    info!(task_id = %task.id, publisher_id, priority, "task published");
    Ok(task)
}

/// Claim a pending task under a lease.
///
/// The claimant must hold the required skill (any level, including 0) and
/// must not be the publisher. Dependencies are recorded but not consulted.
pub async fn task_claim(
    store: &SqliteStore,
    workflow: &WorkflowConfig,
    task_id: &str,
    hunter_id: &str,
) -> HubResult<Task> {
    let mut tx = store.begin().await?;
    let mut task = tx
        .get_task(task_id)
        .await?
        .ok_or_else(|| HubError::NotFound(format!("task {}", task_id)))?;

    if task.status != TaskStatus::Pending {
        return Err(HubError::InvalidState(format!(
            "task {} is {}, not pending",
            task_id, task.status
        )));
    }
    if task.published_by_hunter_id.as_deref() == Some(hunter_id) {
        return Err(HubError::SelfClaim);
    }

    let mut hunter = tx
        .get_hunter(hunter_id)
        .await?
        .ok_or_else(|| HubError::NotFound(format!("hunter {}", hunter_id)))?;
    if !hunter.skills.contains_key(&task.required_skill) {
        return Err(HubError::SkillMissing(task.required_skill.clone()));
    }

    let now = now_utc();
    task.status = TaskStatus::Claimed;
    task.hunter_id = Some(hunter_id.to_string());
    task.lease_id = Some(generate_id("lease"));
    task.lease_expires_at = Some(now + Duration::hours(workflow.lease_duration_hours));
    task.updated_at = now;

    hunter.current_tasks.push(task.id.clone());
    hunter.touch();

    tx.save_task(&task).await?;
    tx.save_hunter(&hunter).await?;
    tx.commit().await?;
    info!(task_id, hunter_id, lease_id = ?task.lease_id, "task claimed");
    Ok(task)
}

/// Start working on a claimed task. Clears the lease: it only bounds the
/// claimed-but-unstarted window.
pub async fn task_start(store: &SqliteStore, task_id: &str, hunter_id: &str) -> HubResult<Task> {
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
    if task.status != TaskStatus::Claimed {
        return Err(HubError::InvalidState(format!(
            "task {} is {}, not claimed",
            task_id, task.status
        )));
    }

    task.status = TaskStatus::InProgress;
    task.clear_lease();
    task.touch();
    tx.save_task(&task).await?;
    tx.commit().await?;
    debug!(task_id, hunter_id, "task started");
    Ok(task)
}

/// Finish an in-progress task with a terminal status.
///
/// The report is the canonical home for results; this transition only moves
/// the state machine and updates the holder's bookkeeping.
pub async fn task_complete(
    store: &SqliteStore,
    task_id: &str,
    hunter_id: &str,
    result: Option<&str>,
    final_status: TaskStatus,
) -> HubResult<Task> {
    if !final_status.is_terminal() {
        return Err(HubError::Validation(format!(
            "final status must be completed or failed, got {}",
            final_status
        )));
    }

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
    if task.status != TaskStatus::InProgress {
        return Err(HubError::InvalidState(format!(
            "task {} is {}, not in_progress",
            task_id, task.status
        )));
    }

    task.status = final_status;
    task.touch();
    tx.save_task(&task).await?;

    if let Some(mut hunter) = tx.get_hunter(hunter_id).await? {
        hunter.finish_task(&task.id, final_status == TaskStatus::Completed);
        tx.save_hunter(&hunter).await?;
    }
    tx.commit().await?;
    info!(task_id, hunter_id, status = %final_status, result = ?result, "task finished");
    Ok(task)
}

/// Fetch a task by ID.
pub async fn get_task(store: &SqliteStore, task_id: &str) -> HubResult<Option<Task>> {
    Ok(store.get_task(task_id).await?)
}

/// List tasks matching all supplied filters, in no particular order.
pub async fn task_list(store: &SqliteStore, filter: &TaskFilter) -> HubResult<Vec<Task>> {
    Ok(store.list_tasks(filter).await?)
}

/// Archive a terminal task.
pub async fn task_archive(store: &SqliteStore, task_id: &str) -> HubResult<Task> {
    let mut tx = store.begin().await?;
    let mut task = tx
        .get_task(task_id)
        .await?
        .ok_or_else(|| HubError::NotFound(format!("task {}", task_id)))?;

    if !task.status.is_terminal() {
        return Err(HubError::InvalidState(format!(
            "task {} is {}, only completed or failed tasks can be archived",
            task_id, task.status
        )));
    }

    task.status = TaskStatus::Archived;
    task.is_archived = true;
    task.touch();
    tx.save_task(&task).await?;
    tx.commit().await?;
    info!(task_id, "task archived");
    Ok(task)
}

/// Hard-delete a task.
///
/// Claimed tasks are protected unless `force` is set; a forced delete also
/// releases the task from its holder's current set.
pub async fn task_delete(store: &SqliteStore, task_id: &str, force: bool) -> HubResult<()> {
    let mut tx = store.begin().await?;
    let task = tx
        .get_task(task_id)
        .await?
        .ok_or_else(|| HubError::NotFound(format!("task {}", task_id)))?;

    if !force && task.status == TaskStatus::Claimed {
        return Err(HubError::InvalidState(format!(
            "task {} is claimed; pass force to delete it anyway",
            task_id
        )));
    }

    if matches!(task.status, TaskStatus::Claimed | TaskStatus::InProgress) {
        if let Some(holder_id) = &task.hunter_id {
            if let Some(mut holder) = tx.get_hunter(holder_id).await? {
                holder.release_task(&task.id);
                tx.save_hunter(&holder).await?;
            }
        }
    }

    tx.delete_task(task_id).await?;
    tx.commit().await?;
    info!(task_id, force, "task deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hunter_service::hunter_register;
    use std::collections::HashMap;
    use tempfile::TempDir;

    async fn scratch_store() -> (TempDir, SqliteStore) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::connect(dir.path().join("test.db"))
            .await
            .unwrap();
        (dir, store)
    }

    fn workflow() -> WorkflowConfig {
        WorkflowConfig::default()
    }

    fn skills(pairs: &[(&str, i64)]) -> HashMap<String, i64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    async fn publish_basic(store: &SqliteStore, publisher: &str) -> Task {
        hunter_register(store, publisher, Some(skills(&[("python", 50)])))
            .await
            .unwrap();
        task_publish(
            store,
            "t",
            "details",
            "python",
            publisher,
            vec![],
            TaskType::Normal,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_publish_priority_from_reputation() {
        let (_dir, store) = scratch_store().await;
        hunter_register(&store, "h0", None).await.unwrap();
        let task = task_publish(&store, "t", "d", "python", "h0", vec![], TaskType::Normal)
            .await
            .unwrap();
        assert_eq!(task.priority, 0);

        hunter_register(&store, "h57", None).await.unwrap();
        crate::hunter_service::adjust_reputation(&store, "h57", 57)
            .await
            .unwrap();
        let task = task_publish(&store, "t", "d", "python", "h57", vec![], TaskType::Normal)
            .await
            .unwrap();
        assert_eq!(task.priority, 5);
    }

    #[tokio::test]
    async fn test_publish_system_priority_zero() {
        let (_dir, store) = scratch_store().await;
        let task = task_publish(
            &store,
            "t",
            "d",
            "python",
            SYSTEM_PUBLISHER,
            vec![],
            TaskType::Evaluation,
        )
        .await
        .unwrap();
        assert_eq!(task.priority, 0);
        assert_eq!(task.published_by_hunter_id.as_deref(), Some(SYSTEM_PUBLISHER));
    }

    #[tokio::test]
    async fn test_publish_unknown_publisher() {
        let (_dir, store) = scratch_store().await;
        assert!(matches!(
            task_publish(&store, "t", "d", "python", "ghost", vec![], TaskType::Normal).await,
            Err(HubError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_publish_same_inputs_distinct_tasks() {
        let (_dir, store) = scratch_store().await;
        hunter_register(&store, "h1", None).await.unwrap();
        let a = task_publish(&store, "t", "d", "python", "h1", vec![], TaskType::Normal)
            .await
            .unwrap();
        let b = task_publish(&store, "t", "d", "python", "h1", vec![], TaskType::Normal)
            .await
            .unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_claim_sets_lease_and_bookkeeping() {
        let (_dir, store) = scratch_store().await;
        let task = publish_basic(&store, "publisher").await;
        hunter_register(&store, "worker", Some(skills(&[("python", 10)])))
            .await
            .unwrap();

        let claimed = task_claim(&store, &workflow(), &task.id, "worker")
            .await
            .unwrap();
        assert_eq!(claimed.status, TaskStatus::Claimed);
        assert_eq!(claimed.hunter_id.as_deref(), Some("worker"));
        assert!(claimed.lease_id.as_deref().unwrap().starts_with("lease-"));
        let lease_for = claimed.lease_expires_at.unwrap() - claimed.updated_at;
        assert_eq!(lease_for, Duration::hours(1));

        let worker = store.get_hunter("worker").await.unwrap().unwrap();
        assert_eq!(worker.current_tasks, vec![claimed.id.clone()]);
    }

    #[tokio::test]
    async fn test_claim_rejects_self_claim() {
        let (_dir, store) = scratch_store().await;
        let task = publish_basic(&store, "publisher").await;
        assert!(matches!(
            task_claim(&store, &workflow(), &task.id, "publisher").await,
            Err(HubError::SelfClaim)
        ));
    }

    #[tokio::test]
    async fn test_claim_requires_skill_presence() {
        let (_dir, store) = scratch_store().await;
        let task = publish_basic(&store, "publisher").await;
        hunter_register(&store, "unskilled", Some(skills(&[("go", 90)])))
            .await
            .unwrap();
        assert!(matches!(
            task_claim(&store, &workflow(), &task.id, "unskilled").await,
            Err(HubError::SkillMissing(_))
        ));

        // Presence at level 0 satisfies the gate.
        hunter_register(&store, "novice", Some(skills(&[("python", 0)])))
            .await
            .unwrap();
        assert!(task_claim(&store, &workflow(), &task.id, "novice").await.is_ok());
    }

    #[tokio::test]
    async fn test_claim_race_second_claim_fails() {
        let (_dir, store) = scratch_store().await;
        let task = publish_basic(&store, "publisher").await;
        for worker in ["worker-a", "worker-b"] {
            hunter_register(&store, worker, Some(skills(&[("python", 10)])))
                .await
                .unwrap();
        }

        task_claim(&store, &workflow(), &task.id, "worker-a")
            .await
            .unwrap();
        assert!(matches!(
            task_claim(&store, &workflow(), &task.id, "worker-b").await,
            Err(HubError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_claim_missing_task() {
        let (_dir, store) = scratch_store().await;
        assert!(matches!(
            task_claim(&store, &workflow(), "task-none", "worker").await,
            Err(HubError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_start_clears_lease() {
        let (_dir, store) = scratch_store().await;
        let task = publish_basic(&store, "publisher").await;
        hunter_register(&store, "worker", Some(skills(&[("python", 10)])))
            .await
            .unwrap();
        task_claim(&store, &workflow(), &task.id, "worker")
            .await
            .unwrap();

        let started = task_start(&store, &task.id, "worker").await.unwrap();
        assert_eq!(started.status, TaskStatus::InProgress);
        assert!(started.lease_id.is_none());
        assert!(started.lease_expires_at.is_none());
    }

    #[tokio::test]
    async fn test_start_requires_owner_and_state() {
        let (_dir, store) = scratch_store().await;
        let task = publish_basic(&store, "publisher").await;
        hunter_register(&store, "worker", Some(skills(&[("python", 10)])))
            .await
            .unwrap();

        // Not claimed yet: nobody owns it.
        assert!(matches!(
            task_start(&store, &task.id, "worker").await,
            Err(HubError::NotOwner(_))
        ));

        task_claim(&store, &workflow(), &task.id, "worker")
            .await
            .unwrap();
        assert!(matches!(
            task_start(&store, &task.id, "someone-else").await,
            Err(HubError::NotOwner(_))
        ));

        task_start(&store, &task.id, "worker").await.unwrap();
        assert!(matches!(
            task_start(&store, &task.id, "worker").await,
            Err(HubError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_complete_updates_bookkeeping() {
        let (_dir, store) = scratch_store().await;
        let task = publish_basic(&store, "publisher").await;
        hunter_register(&store, "worker", Some(skills(&[("python", 10)])))
            .await
            .unwrap();
        task_claim(&store, &workflow(), &task.id, "worker")
            .await
            .unwrap();
        task_start(&store, &task.id, "worker").await.unwrap();

        let done = task_complete(&store, &task.id, "worker", Some("done"), TaskStatus::Completed)
            .await
            .unwrap();
        assert_eq!(done.status, TaskStatus::Completed);

        let worker = store.get_hunter("worker").await.unwrap().unwrap();
        assert!(worker.current_tasks.is_empty());
        assert_eq!(worker.completed_tasks, 1);
        assert_eq!(worker.failed_tasks, 0);
    }

    #[tokio::test]
    async fn test_complete_rejects_non_terminal_status() {
        let (_dir, store) = scratch_store().await;
        let task = publish_basic(&store, "publisher").await;
        assert!(matches!(
            task_complete(&store, &task.id, "worker", None, TaskStatus::Pending).await,
            Err(HubError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_archive_and_replay() {
        let (_dir, store) = scratch_store().await;
        let task = publish_basic(&store, "publisher").await;
        hunter_register(&store, "worker", Some(skills(&[("python", 10)])))
            .await
            .unwrap();

        // Pending tasks cannot be archived.
        assert!(matches!(
            task_archive(&store, &task.id).await,
            Err(HubError::InvalidState(_))
        ));

        task_claim(&store, &workflow(), &task.id, "worker")
            .await
            .unwrap();
        task_start(&store, &task.id, "worker").await.unwrap();
        task_complete(&store, &task.id, "worker", None, TaskStatus::Completed)
            .await
            .unwrap();

        let archived = task_archive(&store, &task.id).await.unwrap();
        assert_eq!(archived.status, TaskStatus::Archived);
        assert!(archived.is_archived);

        // Replaying the archive is rejected.
        assert!(matches!(
            task_archive(&store, &task.id).await,
            Err(HubError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_claimed_requires_force() {
        let (_dir, store) = scratch_store().await;
        let task = publish_basic(&store, "publisher").await;
        hunter_register(&store, "worker", Some(skills(&[("python", 10)])))
            .await
            .unwrap();
        task_claim(&store, &workflow(), &task.id, "worker")
            .await
            .unwrap();

        assert!(matches!(
            task_delete(&store, &task.id, false).await,
            Err(HubError::InvalidState(_))
        ));

        task_delete(&store, &task.id, true).await.unwrap();
        assert!(store.get_task(&task.id).await.unwrap().is_none());
        let worker = store.get_hunter("worker").await.unwrap().unwrap();
        assert!(worker.current_tasks.is_empty());
    }

    #[tokio::test]
    async fn test_list_filters_combined() {
        let (_dir, store) = scratch_store().await;
        let task = publish_basic(&store, "publisher").await;
        hunter_register(&store, "worker", Some(skills(&[("python", 10)])))
            .await
            .unwrap();
        task_claim(&store, &workflow(), &task.id, "worker")
            .await
            .unwrap();

        let matches = task_list(
            &store,
            &TaskFilter {
                status: Some(TaskStatus::Claimed),
                required_skill: Some("python".to_string()),
                hunter_id: Some("worker".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(matches.len(), 1);

        let none = task_list(
            &store,
            &TaskFilter {
                status: Some(TaskStatus::Pending),
                required_skill: Some("python".to_string()),
                hunter_id: Some("worker".to_string()),
            },
        )
        .await
        .unwrap();
        assert!(none.is_empty());
    }
}
