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

//! Task and container records as last reported by Amazon ECS.
//!
//! The records mirror the shape ECS uses on the wire (camel-cased keys), so a
//! task list received from one invocation can be handed back verbatim in the
//! next one.

use serde::{Deserialize, Serialize};
use std::fmt;

/// ECS `lastStatus` of a task that has not started running yet.
pub const PENDING: &str = "PENDING";
/// ECS `lastStatus` of a running task.
pub const RUNNING: &str = "RUNNING";
/// ECS `lastStatus` of a task that has stopped.
pub const STOPPED: &str = "STOPPED";

/// The status of a task batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// At least one task is still pending.
    Pending,
    /// No task is pending and at least one has not stopped.
    Running,
    /// Every task has stopped.
    Stopped,
    /// The batch ended with a terminal failure.
    Failed,
}

impl TaskStatus {
    /// Derives the status of a batch from its current task records.
    ///
    /// PENDING wins over RUNNING. A batch is STOPPED only when every task
    /// reports STOPPED; transitional statuses (e.g. `DEPROVISIONING`) count
    /// as RUNNING.
    pub fn derive(tasks: &[TaskRecord]) -> TaskStatus {
        if tasks.iter().any(|t| t.has_status(PENDING)) {
            TaskStatus::Pending
        } else if tasks.iter().all(|t| t.has_status(STOPPED)) {
            TaskStatus::Stopped
        } else {
            TaskStatus::Running
        }
    }

    /// Returns the upper-cased name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => PENDING,
            TaskStatus::Running => RUNNING,
            TaskStatus::Stopped => STOPPED,
            TaskStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A container inside a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContainerRecord {
    /// ARN of the container.
    pub container_arn: Option<String>,
    /// ARN of the task the container belongs to.
    pub task_arn:      Option<String>,
    /// Container name.
    pub name:          Option<String>,
    /// Last known ECS status.
    pub last_status:   Option<String>,
    /// Only set once the container has stopped.
    pub exit_code:     Option<i64>,
    /// Why the container stopped.
    pub reason:        Option<String>,
}

/// A task launched on a cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TaskRecord {
    /// ARN of the task.
    pub task_arn:            Option<String>,
    /// ARN of the cluster the task runs on.
    pub cluster_arn:         Option<String>,
    /// ARN of the task definition.
    pub task_definition_arn: Option<String>,
    /// Last known ECS status.
    pub last_status:         Option<String>,
    /// Status ECS drives the task towards.
    pub desired_status:      Option<String>,
    /// Tag given at launch.
    pub started_by:          Option<String>,
    /// Why the task stopped.
    pub stopped_reason:      Option<String>,
    /// Containers of the task.
    pub containers:          Vec<ContainerRecord>,
}

impl TaskRecord {
    fn has_status(&self, status: &str) -> bool {
        self.last_status.as_deref() == Some(status)
    }

    /// Returns true if any container did not exit cleanly. A missing exit
    /// code counts as non-zero: the container never ran to completion.
    pub fn exited_non_zero(&self) -> bool {
        self.containers.iter().any(|c| c.exit_code != Some(0))
    }
}

/// A failure record reported by a launch or describe call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FailureRecord {
    /// ARN of the failed resource.
    pub arn:    Option<String>,
    /// Why the call failed for that resource.
    pub reason: Option<String>,
}

impl fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({})",
            self.reason.as_deref().unwrap_or("UNKNOWN"),
            self.arn.as_deref().unwrap_or("-")
        )
    }
}

/// The outcome of the last launch or describe call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskResult {
    /// Tasks returned by the call.
    pub tasks:    Vec<TaskRecord>,
    /// Failure records returned by the call.
    pub failures: Vec<FailureRecord>,
}

impl TaskResult {
    /// Returns the ARNs of every task in the result, in order.
    pub fn task_arns(&self) -> Vec<String> {
        self.tasks.iter().filter_map(|t| t.task_arn.clone()).collect()
    }

    /// Returns the status derived from the current task records.
    pub fn status(&self) -> TaskStatus {
        TaskStatus::derive(&self.tasks)
    }

    /// Returns the ARNs of the tasks with a container that did not exit
    /// cleanly, each listed once.
    pub fn non_zero_exits(&self) -> Vec<String> {
        let mut arns: Vec<String> = vec![];
        for task in self.tasks.iter().filter(|t| t.exited_non_zero()) {
            let arn = task.task_arn.clone().unwrap_or_default();
            if !arns.contains(&arn) {
                arns.push(arn);
            }
        }
        arns
    }
}
