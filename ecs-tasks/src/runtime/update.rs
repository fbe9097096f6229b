// Copyright (c) 2020-present, UMD Database Group.
//
// This program is free software: you can use, redistribute, and/or modify
// it under the terms of the GNU Affero General Public License, version 3
// or later ("AGPL"), as published by the Free Software Foundation.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <http://www.gnu.org/licenses/>.

//! Decides whether a custom resource update launches a new task batch.

use crate::aws::cloudformation::StackClient;
use crate::aws::ecs::TaskClient;
use crate::configs::*;
use crate::error::Result;
use crate::runtime::spec::{TaskSpec, UpdateCriterion};
use log::info;

/// Returns true if an update from `old` to `new` should run the task.
///
/// The checks short-circuit in order:
///
/// 1. `RunOnUpdate` must be set and the new request must start at least one
///    task.
/// 2. Unless `RunOnRollback` is set, the stack must not be rolling back. The
///    stack status is only fetched in that case.
/// 3. Without update criteria, any update runs the task.
/// 4. Otherwise the task runs only if the watched environment values of the
///    new task definition differ from those of the old one.
///
/// The criteria of the new request are applied to both task definitions.
pub async fn should_run_on_update(
    tasks: &dyn TaskClient,
    stacks: &dyn StackClient,
    stack_id: &str,
    old: &TaskSpec,
    new: &TaskSpec,
) -> Result<bool> {
    if !new.run_on_update || !new.runs_tasks() {
        return Ok(false);
    }

    if !new.run_on_rollback {
        let status = stacks.get_stack_status(stack_id).await?;
        if ECS_TASKS_ROLLBACK_STATES.contains(&status) {
            info!("Stack is in {}, skipping the task run", status);
            return Ok(false);
        }
    }

    if new.update_criteria.is_empty() {
        return Ok(true);
    }

    let old_values = watched_values(tasks, &old.task_definition, &new.update_criteria).await?;
    let new_values = watched_values(tasks, &new.task_definition, &new.update_criteria).await?;
    if old_values == new_values {
        info!("Update criteria unchanged, skipping the task run");
    }
    Ok(old_values != new_values)
}

/// Resolves the watched environment values of a task definition in criterion
/// declaration order. A missing container or key contributes nothing.
async fn watched_values(
    tasks: &dyn TaskClient,
    task_definition: &str,
    criteria: &[UpdateCriterion],
) -> Result<Vec<String>> {
    let containers = tasks.describe_task_definition(task_definition).await?;
    Ok(criteria
        .iter()
        .flat_map(|criterion| {
            let container = containers.iter().find(|c| c.name == criterion.container);
            criterion
                .environment_keys
                .iter()
                .filter_map(move |key| container.and_then(|c| c.value(key)).map(str::to_owned))
        })
        .collect())
}
