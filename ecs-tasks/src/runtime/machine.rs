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

//! The task state machine: launch a batch, then poll it until it stops, fails
//! or times out.
//!
//! A Lambda invocation cannot block for the whole life of a batch, so polling
//! is cooperative. Before every sleep the machine checks the execution budget
//! left to the current invocation; when another interval (plus a grace margin
//! for one describe round-trip) no longer fits, it hands the state back as
//! [`PollOutcome::Suspended`] and the caller resumes it in a later invocation.
//!
//! Each iteration runs three checks in a fixed order:
//!
//! 1. the absolute timeout, measured from the creation time of the batch;
//! 2. the remaining execution budget of the invocation;
//! 3. a describe call, which classifies the batch.
//!
//! A batch past its deadline therefore fails even if the invocation has budget
//! left for one more look.

use crate::aws::ecs::{LaunchRequest, TaskClient};
use crate::configs::*;
use crate::error::{EcsTaskError, Result};
use crate::runtime::clock::{Clock, SystemClock};
use crate::runtime::spec::TaskSpec;
use crate::runtime::state::TaskBatchState;
use crate::runtime::task::TaskStatus;
use chrono::{DateTime, Utc};
use log::info;
use std::sync::Arc;
use std::time::Duration;

/// The non-failing outcomes of [`TaskStateMachine::poll`].
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Every task stopped and every container exited with code zero.
    Completed(TaskBatchState),
    /// The invocation ran out of budget. The state must be handed back
    /// verbatim to a later invocation to continue polling.
    Suspended(TaskBatchState),
}

/// Drives one task batch from launch to a terminal status.
pub struct TaskStateMachine {
    client: Arc<dyn TaskClient>,
    clock:  Arc<dyn Clock>,
    grace:  Duration,
}

impl TaskStateMachine {
    /// Creates a state machine issuing its remote calls through `client`.
    pub fn new(client: Arc<dyn TaskClient>) -> Self {
        Self {
            client,
            clock: Arc::new(SystemClock),
            grace: *ECS_TASKS_POLL_GRACE,
        }
    }

    /// Replaces the wall clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the grace margin kept on top of the poll interval.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Returns the current time according to the machine's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Launches the batch described by `task`.
    ///
    /// Tasks go onto the explicit instance list when one is given, otherwise
    /// `count` copies are placed by the scheduler. Any failure record fails
    /// the launch as a whole.
    pub async fn start(&self, task: TaskSpec) -> Result<TaskBatchState> {
        let creation_time = self.clock.now();
        let request = LaunchRequest {
            cluster:         task.cluster.clone(),
            task_definition: task.task_definition.clone(),
            overrides:       task.overrides.clone(),
            started_by:      task.started_by.clone(),
            placement:       task.placement(),
        };
        let result = self.client.start_task(request).await?;
        if !result.failures.is_empty() {
            return Err(EcsTaskError::TaskLaunch(result.failures));
        }
        Ok(TaskBatchState::new(task, creation_time, result))
    }

    /// Fails with [`EcsTaskError::TaskTimeout`] if the batch is past its
    /// deadline.
    pub fn check_timeout(&self, state: &mut TaskBatchState) -> Result<()> {
        if state.is_expired(self.clock.now()) {
            state.status = TaskStatus::Failed;
            return Err(EcsTaskError::TaskTimeout(state.task.timeout));
        }
        Ok(())
    }

    /// Describes the batch once and classifies it.
    ///
    /// The stored result is replaced by the describe result and the status is
    /// re-derived from it. Failure records and non-zero exits of a stopped
    /// batch are terminal; the state is marked FAILED before returning the
    /// error so the caller can still report the latest task records. A batch
    /// without task ARNs cannot be described and fails validation.
    pub async fn check_once(&self, state: &mut TaskBatchState) -> Result<TaskStatus> {
        let task_arns = state.task_arns();
        if task_arns.is_empty() {
            state.status = TaskStatus::Failed;
            return Err(EcsTaskError::Validation(
                "expected at least one task @ data['Tasks']".to_string(),
            ));
        }
        let result = self
            .client
            .describe_tasks(&state.task.cluster, &task_arns)
            .await?;
        state.update(result);

        if !state.task_result.failures.is_empty() {
            state.status = TaskStatus::Failed;
            return Err(EcsTaskError::TaskFailure(state.task_result.failures.clone()));
        }

        if state.status == TaskStatus::Stopped {
            let non_zero = state.task_result.non_zero_exits();
            if !non_zero.is_empty() {
                state.status = TaskStatus::Failed;
                return Err(EcsTaskError::TaskExitCode(non_zero));
            }
        }

        Ok(state.status)
    }

    /// Polls the batch until it completes, fails, or the invocation runs out
    /// of budget.
    ///
    /// # Arguments
    /// * `state` - The batch to poll, as returned by [`start`](Self::start) or
    ///   by a previous suspension.
    /// * `remaining_millis` - Returns the execution time left to the current
    ///   invocation, in milliseconds.
    pub async fn poll<F>(
        &self,
        mut state: TaskBatchState,
        remaining_millis: F,
    ) -> Result<PollOutcome>
    where
        F: Fn() -> u64 + Send + Sync,
    {
        let interval = Duration::from_secs(state.task.poll_interval);
        let required = (interval + self.grace).as_millis() as u64;
        loop {
            self.check_timeout(&mut state)?;

            let remaining = remaining_millis();
            if remaining < required {
                info!(
                    "{} ms left in this invocation, {} ms needed for another check; suspending",
                    remaining, required
                );
                return Ok(PollOutcome::Suspended(state));
            }

            let status = self.check_once(&mut state).await?;
            if status == TaskStatus::Stopped {
                return Ok(PollOutcome::Completed(state));
            }

            info!(
                "Task(s) are {}, checking again in {} seconds...",
                status,
                interval.as_secs()
            );
            tokio::time::sleep(interval).await;
        }
    }
}
