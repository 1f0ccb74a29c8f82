//! Deletion of task definitions and their generated children.
//!
//! Every call works from the current repository state, so a root and its
//! children can be deleted in any order.

use crate::launcher::TaskLauncher;
use crate::store::{ExecutionStore, TaskDefinitionRepository};
use crate::{twlog, twlog_debug, twlog_warn, Error, Result};

/// Delete `name`. A composed root takes its confirmed children with it; a
/// child goes alone. Returns the names removed, root first and children in
/// DSL order.
///
/// # Errors
/// `NotFound` when `name` is not stored.
pub async fn delete(
    repository: &dyn TaskDefinitionRepository,
    executions: &dyn ExecutionStore,
    launcher: &dyn TaskLauncher,
    name: &str,
) -> Result<Vec<String>> {
    let definition = repository
        .find_by_name(name)
        .await?
        .ok_or_else(|| Error::NotFound(name.to_string()))?;

    let mut names = vec![definition.name.clone()];
    let expected = definition.child_names();
    if !expected.is_empty() {
        let prefix = format!("{}-", name);
        let mut children: Vec<String> = repository
            .find_by_name_prefix(&prefix)
            .await?
            .into_iter()
            .filter(|candidate| definition.generated(candidate))
            .map(|candidate| candidate.name)
            .collect();
        children.sort_by_key(|child| expected.iter().position(|e| e == child));
        twlog_debug!(
            "Deleting {} with children {:?} (expected {:?})",
            name,
            children,
            expected
        );
        names.extend(children);
    }

    let removed = repository.delete_by_names(&names).await?;
    if !removed.iter().any(|n| n == name) {
        // Lost a race with another delete
        return Err(Error::NotFound(name.to_string()));
    }
    twlog!("Deleted task {} ({} definitions)", name, removed.len());

    destroy_launched(executions, launcher, &removed).await?;
    Ok(removed)
}

/// Delete every stored definition. Returns the removed names.
pub async fn delete_all(
    repository: &dyn TaskDefinitionRepository,
    executions: &dyn ExecutionStore,
    launcher: &dyn TaskLauncher,
) -> Result<Vec<String>> {
    let removed = repository.delete_all().await?;
    twlog!("Deleted all tasks ({} definitions)", removed.len());
    destroy_launched(executions, launcher, &removed).await?;
    Ok(removed)
}

/// Ask the launcher to tear down each removed task that was ever launched.
/// Destroy failures are logged; the definitions are already gone.
async fn destroy_launched(
    executions: &dyn ExecutionStore,
    launcher: &dyn TaskLauncher,
    removed: &[String],
) -> Result<()> {
    for name in removed {
        if !executions.has_launched(name).await? {
            continue;
        }
        if let Err(e) = launcher.destroy(name).await {
            twlog_warn!("Failed to destroy launched task {}: {}", name, e);
        }
    }
    Ok(())
}
