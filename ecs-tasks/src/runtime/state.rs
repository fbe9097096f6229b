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

//! The record threaded through every invocation of one logical operation.

use crate::runtime::spec::TaskSpec;
use crate::runtime::task::{TaskResult, TaskStatus};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The state of one task batch, from launch to a terminal status.
///
/// It is owned by a single logical operation and is never persisted by this
/// crate: between invocations it travels as an opaque token inside the event
/// that resumes the operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskBatchState {
    /// The request the batch was launched from.
    pub task:          TaskSpec,
    /// Set once, when the launch call succeeds.
    pub creation_time: DateTime<Utc>,
    /// The last launch or describe result.
    pub task_result:   TaskResult,
    /// Status derived from `task_result`.
    pub status:        TaskStatus,
}

impl TaskBatchState {
    /// Creates the state of a freshly launched (or externally tracked) batch.
    pub fn new(task: TaskSpec, creation_time: DateTime<Utc>, task_result: TaskResult) -> Self {
        let status = task_result.status();
        Self {
            task,
            creation_time,
            task_result,
            status,
        }
    }

    /// Returns the instant after which the batch has timed out.
    pub fn deadline(&self) -> DateTime<Utc> {
        self.creation_time + Duration::seconds(self.task.timeout as i64)
    }

    /// Returns true if `now` is past the deadline of the batch.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.deadline()
    }

    /// Replaces the last known result and re-derives the status from it.
    pub fn update(&mut self, task_result: TaskResult) {
        self.status = task_result.status();
        self.task_result = task_result;
    }

    /// Returns the ARNs of the tasks in the batch.
    pub fn task_arns(&self) -> Vec<String> {
        self.task_result.task_arns()
    }

    /// Returns the ARN of the first task in the batch.
    pub fn first_task_arn(&self) -> Option<String> {
        self.task_result.tasks.iter().find_map(|t| t.task_arn.clone())
    }
}
