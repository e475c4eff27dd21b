//! Hunter registration, study-driven skill growth, and best-match routing.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::errors::{HubError, HubResult};
use crate::hunter::{Hunter, HunterStatus};
use crate::store::SqliteStore;

/// Register a new hunter or merge skills into an existing one.
///
/// Merging keeps the higher value for every provided key, so replaying a
/// registration never loses progress. The hunter's `updated_at` is bumped
/// either way.
pub async fn hunter_register(
    store: &SqliteStore,
    hunter_id: &str,
    skills: Option<HashMap<String, i64>>,
) -> HubResult<Hunter> {
    if hunter_id.trim().is_empty() {
        return Err(HubError::Validation("hunter id must not be empty".to_string()));
    }

    let mut tx = store.begin().await?;
    let hunter = match tx.get_hunter(hunter_id).await? {
        Some(mut hunter) => {
            if let Some(skills) = &skills {
                hunter.merge_skills(skills);
            }
            hunter.touch();
            hunter
        }
        None => {
            info!(hunter_id, "registering new hunter");
            Hunter::new(hunter_id, skills.unwrap_or_default())
        }
    };
    tx.save_hunter(&hunter).await?;
    tx.commit().await?;
    Ok(hunter)
}

/// Apply study gains from a knowledge item's skill tags.
pub async fn hunter_study(
    store: &SqliteStore,
    hunter_id: &str,
    skill_tags: &[String],
) -> HubResult<Hunter> {
    let mut tx = store.begin().await?;
    let mut hunter = tx
        .get_hunter(hunter_id)
        .await?
        .ok_or_else(|| HubError::NotFound(format!("hunter {}", hunter_id)))?;
    hunter.apply_study(skill_tags);
    hunter.touch();
    tx.save_hunter(&hunter).await?;
    tx.commit().await?;
    debug!(hunter_id, tags = skill_tags.len(), "study applied");
    Ok(hunter)
}

/// Directly set a hunter's reputation (admin operation). Clamped at zero.
pub async fn adjust_reputation(
    store: &SqliteStore,
    hunter_id: &str,
    new_reputation: i64,
) -> HubResult<Hunter> {
    let mut tx = store.begin().await?;
    let mut hunter = tx
        .get_hunter(hunter_id)
        .await?
        .ok_or_else(|| HubError::NotFound(format!("hunter {}", hunter_id)))?;
    hunter.reputation = new_reputation.max(0);
    hunter.touch();
    tx.save_hunter(&hunter).await?;
    tx.commit().await?;
    info!(hunter_id, reputation = hunter.reputation, "reputation adjusted");
    Ok(hunter)
}

/// Fetch a hunter by ID.
pub async fn get_hunter(store: &SqliteStore, hunter_id: &str) -> HubResult<Option<Hunter>> {
    Ok(store.get_hunter(hunter_id).await?)
}

/// List every hunter in the namespace.
pub async fn hunter_list(store: &SqliteStore) -> HubResult<Vec<Hunter>> {
    Ok(store.list_hunters().await?)
}

/// Find the most suitable hunter for a task.
pub async fn find_best_hunter_for_task(
    store: &SqliteStore,
    skill: &str,
    exclude_hunter_ids: &[&str],
) -> HubResult<Option<Hunter>> {
    let hunters = store.list_hunters().await?;
    Ok(select_best_hunter(hunters, skill, exclude_hunter_ids))
}

/// Pick the best candidate from a hunter set.
///
/// Candidates must be active, hold the skill above level 0, and not be
/// excluded. Scoring weighs reputation at 0.7 against 0.3 per held task;
/// ties break on the lexicographically smallest id so selection is
/// deterministic.
pub(crate) fn select_best_hunter(
    hunters: Vec<Hunter>,
    skill: &str,
    exclude_hunter_ids: &[&str],
) -> Option<Hunter> {
    let mut eligible: Vec<Hunter> = hunters
        .into_iter()
        .filter(|hunter| {
            hunter.status == HunterStatus::Active
                && !exclude_hunter_ids.contains(&hunter.id.as_str())
                && hunter.skills.get(skill).copied().unwrap_or(0) > 0
        })
        .collect();

    if eligible.is_empty() {
        warn!(skill, "no eligible hunters found");
        return None;
    }

    eligible.sort_by(|a, b| {
        b.match_score()
            .partial_cmp(&a.match_score())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    eligible.into_iter().next()
}
