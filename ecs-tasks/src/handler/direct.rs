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

//! Direct invocation entry points.
//!
//! `create` launches a batch and returns at once; `check` inspects it once.
//! The caller (for example a Step Functions loop) owns the schedule between
//! checks and re-submits the returned event verbatim, so no sleeping happens
//! here. Both entry points answer with the input event merged with the task
//! fields, and never fail: errors become `Status: FAILED` plus a `Reason`.

use crate::error::{EcsTaskError, Result};
use crate::runtime::machine::TaskStateMachine;
use crate::runtime::spec::TaskSpec;
use crate::runtime::state::TaskBatchState;
use crate::runtime::task::{FailureRecord, TaskRecord, TaskResult};
use crate::validation::validate_ecs;
use chrono::{DateTime, Utc};
use log::{error, info};
use serde::Serialize;
use serde_json::{Map, Value};

/// A validated direct invocation event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EcsTaskEvent {
    /// The cluster to launch on.
    pub cluster:          String,
    /// The task definition family, revision or ARN.
    pub task_definition:  String,
    /// Number of copies for count-based launches.
    pub count:            u32,
    /// Task overrides.
    pub overrides:        Value,
    /// Container instances to launch onto.
    pub instances:        Vec<String>,
    /// Tasks as last described.
    pub tasks:            Vec<TaskRecord>,
    /// Failure records of the last launch or describe call.
    pub failures:         Vec<FailureRecord>,
    /// Batch status, or `FAILED`.
    pub status:           String,
    /// Tag attached to the launched tasks.
    pub started_by:       String,
    /// Absolute timeout of the batch, in seconds.
    pub timeout:          u64,
    /// Seconds the caller waits between two checks.
    pub poll:             u64,
    /// When the batch was launched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_timestamp: Option<DateTime<Utc>>,
    /// Keys the orchestrator does not own, passed through untouched.
    #[serde(flatten)]
    pub extra:            Map<String, Value>,
}

impl EcsTaskEvent {
    /// Returns the launch request described by the event.
    pub fn to_spec(&self) -> TaskSpec {
        TaskSpec {
            cluster: self.cluster.clone(),
            task_definition: self.task_definition.clone(),
            count: self.count,
            instances: self.instances.clone(),
            overrides: self.overrides.clone(),
            started_by: self.started_by.clone(),
            timeout: self.timeout,
            poll_interval: self.poll,
            ..Default::default()
        }
    }

    fn apply(&mut self, state: TaskBatchState) {
        self.status = state.status.to_string();
        self.tasks = state.task_result.tasks;
        self.failures = state.task_result.failures;
    }
}

/// Handles the `create` and `check` direct invocations.
pub struct DirectHandler {
    machine: TaskStateMachine,
}

impl DirectHandler {
    /// Creates a handler driving `machine`.
    pub fn new(machine: TaskStateMachine) -> Self {
        Self { machine }
    }

    /// Launches the tasks described by `event`.
    pub async fn create(&self, event: Value) -> Value {
        info!("Received event {}", event);
        let raw = into_map(event);
        let mut event = match validate_ecs(&raw) {
            Ok(event) => event,
            Err(e) => return failed(raw, e),
        };
        let result = self.create_task(&mut event).await;
        complete(event, result)
    }

    /// Checks the tasks of an event previously returned by `create` or
    /// `check`.
    pub async fn check(&self, event: Value) -> Value {
        info!("Received event {}", event);
        let raw = into_map(event);
        let mut event = match validate_ecs(&raw) {
            Ok(event) => event,
            Err(e) => return failed(raw, e),
        };
        let result = self.check_task(&mut event).await;
        complete(event, result)
    }

    async fn create_task(&self, event: &mut EcsTaskEvent) -> Result<()> {
        let state = self.machine.start(event.to_spec()).await?;
        event.create_timestamp = Some(state.creation_time);
        event.apply(state);
        Ok(())
    }

    async fn check_task(&self, event: &mut EcsTaskEvent) -> Result<()> {
        let created = event.create_timestamp.ok_or_else(|| {
            EcsTaskError::Validation("required key not provided @ data['CreateTimestamp']".into())
        })?;
        let mut state = TaskBatchState::new(
            event.to_spec(),
            created,
            TaskResult {
                tasks:    event.tasks.clone(),
                failures: vec![],
            },
        );
        self.machine.check_timeout(&mut state)?;

        let checked = self.machine.check_once(&mut state).await;
        event.apply(state);
        checked.map(|_| ())
    }
}

fn into_map(event: Value) -> Map<String, Value> {
    match event {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn complete(event: EcsTaskEvent, result: Result<()>) -> Value {
    match (serde_json::to_value(&event), result) {
        (Ok(Value::Object(map)), Ok(())) => Value::Object(map),
        (Ok(Value::Object(map)), Err(e)) => failed(map, e),
        (Ok(_), _) => failed(event.extra, "event did not serialize to a mapping".into()),
        (Err(e), _) => failed(event.extra, e.into()),
    }
}

fn failed(mut event: Map<String, Value>, error: EcsTaskError) -> Value {
    let reason = error.reason();
    error!("{}", reason);
    if let Some(failures) = error.failures() {
        event.insert(
            "Failures".to_string(),
            serde_json::to_value(failures).unwrap_or_default(),
        );
    }
    event.insert("Status".to_string(), Value::from("FAILED"));
    event.insert("Reason".to_string(), Value::from(reason));
    Value::Object(event)
}
