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

//! CloudFormation custom resource entry point.
//!
//! A request is handled to completion within one invocation when it can be.
//! When the task batch outlives the invocation, the handler returns
//! [`HandlerOutcome::Suspend`] carrying the request with its `EventState` set;
//! the Lambda binary re-invokes itself with that request and no response is
//! sent to CloudFormation until a later invocation reaches a terminal state.

use crate::aws::cloudformation::StackClient;
use crate::aws::ecs::TaskClient;
use crate::configs::*;
use crate::error::{EcsTaskError, Result};
use crate::runtime::clock::Clock;
use crate::runtime::machine::{PollOutcome, TaskStateMachine};
use crate::runtime::spec::TaskSpec;
use crate::runtime::state::TaskBatchState;
use crate::runtime::update::should_run_on_update;
use crate::validation::validate_cfn;
use async_trait::async_trait;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

/// The lifecycle phase of a custom resource request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
    /// The resource is being created.
    Create,
    /// The resource properties changed.
    Update,
    /// The resource is being deleted.
    Delete,
}

/// A custom resource request, as sent by CloudFormation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceRequest {
    /// The lifecycle phase.
    pub request_type:            RequestType,
    /// Pre-signed S3 URL the response is PUT to.
    #[serde(rename = "ResponseURL")]
    pub response_url:            String,
    /// ARN of the stack owning the resource.
    pub stack_id:                String,
    /// Unique id of this request.
    pub request_id:              String,
    /// The resource type declared in the template.
    #[serde(default)]
    pub resource_type:           String,
    /// Template name of the resource.
    pub logical_resource_id:     String,
    /// Physical id returned by an earlier response. Absent on create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_resource_id:    Option<String>,
    /// Properties of the resource.
    #[serde(default)]
    pub resource_properties:     Value,
    /// Properties before the update. Only set on update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_resource_properties: Option<Value>,
    /// ARN of the function serving the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_token:           Option<String>,
    /// The batch being polled. Only set on requests re-submitted by the
    /// function itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_state:             Option<TaskBatchState>,
}

/// Outcome of a request as reported to CloudFormation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    /// The request succeeded.
    Success,
    /// The request failed; the stack rolls back.
    Failed,
}

/// The response delivered to the `ResponseURL` of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceResponse {
    /// Whether the request succeeded.
    pub status:               ResponseStatus,
    /// Why the request failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason:               Option<String>,
    /// Identifier of the resource. CloudFormation replaces the resource when it changes.
    pub physical_resource_id: String,
    /// Copied from the request.
    pub stack_id:             String,
    /// Copied from the request.
    pub request_id:           String,
    /// Copied from the request.
    pub logical_resource_id:  String,
    /// Attributes readable with `Fn::GetAtt`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data:                 Option<Value>,
}

/// What the Lambda binary has to do once a request has been handled.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutcome {
    /// Deliver the response to CloudFormation.
    Respond(CustomResourceResponse),
    /// Re-submit the request, which now carries the batch state, to a new
    /// invocation.
    Suspend(CustomResourceRequest),
}

/// Returns the started-by marker of a custom resource: a name-based UUID of
/// the stack and the logical resource id, which fits the 36 characters ECS
/// allows.
pub fn task_id(stack_id: &str, logical_resource_id: &str) -> String {
    let name = format!("{}{}", stack_id, logical_resource_id);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

enum Progress {
    Done {
        task_arn:  Option<String>,
        task_arns: Vec<String>,
    },
    Suspended(TaskBatchState),
}

impl Progress {
    fn nothing_run() -> Self {
        Progress::Done {
            task_arn:  None,
            task_arns: vec![],
        }
    }

    fn done(state: &TaskBatchState) -> Self {
        Progress::Done {
            task_arn:  state.first_task_arn(),
            task_arns: state.task_arns(),
        }
    }
}

/// A terminal failure, with the first task of the batch when one was
/// launched.
struct Failed {
    error:    EcsTaskError,
    task_arn: Option<String>,
}

impl From<EcsTaskError> for Failed {
    fn from(error: EcsTaskError) -> Self {
        Failed {
            error,
            task_arn: None,
        }
    }
}

type Handled = std::result::Result<Progress, Failed>;

/// Handles the create, update and delete phases of the custom resource, and
/// the resumption of a suspended batch.
pub struct CustomResourceHandler {
    tasks:   Arc<dyn TaskClient>,
    stacks:  Arc<dyn StackClient>,
    machine: TaskStateMachine,
}

impl CustomResourceHandler {
    /// Creates a handler over the given ECS and CloudFormation clients.
    pub fn new(tasks: Arc<dyn TaskClient>, stacks: Arc<dyn StackClient>) -> Self {
        let machine = TaskStateMachine::new(tasks.clone());
        Self {
            tasks,
            stacks,
            machine,
        }
    }

    /// Replaces the wall clock used for task timeouts.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.machine = self.machine.with_clock(clock);
        self
    }

    /// Handles one request.
    ///
    /// # Arguments
    /// * `request` - The request. A request with `EventState` set resumes
    ///   polling whatever its `RequestType`.
    /// * `remaining_millis` - Returns the execution time left to the current
    ///   invocation, in milliseconds.
    pub async fn handle<F>(
        &self,
        mut request: CustomResourceRequest,
        remaining_millis: F,
    ) -> HandlerOutcome
    where
        F: Fn() -> u64 + Send + Sync,
    {
        let handled = match request.event_state.take() {
            Some(state) => self.on_poll(&request, state, &remaining_millis).await,
            None => match request.request_type {
                RequestType::Create => self.on_create(&request, &remaining_millis).await,
                RequestType::Update => self.on_update(&request, &remaining_millis).await,
                RequestType::Delete => self.on_delete(&request).await,
            },
        };

        match handled {
            Ok(Progress::Suspended(state)) => {
                info!(
                    "Task(s) still running, handing over to a new invocation: {:?}",
                    state.task_arns()
                );
                request.event_state = Some(state);
                HandlerOutcome::Suspend(request)
            }
            Ok(Progress::Done {
                task_arn,
                task_arns,
            }) => {
                let data = if task_arns.is_empty() {
                    None
                } else {
                    Some(json!({ "TaskArns": task_arns }))
                };
                HandlerOutcome::Respond(respond(
                    &request,
                    ResponseStatus::Success,
                    None,
                    task_arn,
                    data,
                ))
            }
            Err(Failed { error, task_arn }) => {
                let reason = error.reason();
                error!("{}", reason);
                HandlerOutcome::Respond(respond(
                    &request,
                    ResponseStatus::Failed,
                    Some(reason),
                    task_arn,
                    None,
                ))
            }
        }
    }

    /// Validates the resource properties and stamps the started-by marker of
    /// the resource.
    fn task(&self, request: &CustomResourceRequest, properties: &Value) -> Result<TaskSpec> {
        let mut task = validate_cfn(properties)?;
        task.started_by = task_id(&request.stack_id, &request.logical_resource_id);
        Ok(task)
    }

    async fn on_create<F>(&self, request: &CustomResourceRequest, remaining_millis: &F) -> Handled
    where
        F: Fn() -> u64 + Send + Sync,
    {
        info!("Received create event {}", request.request_id);
        let task = self.task(request, &request.resource_properties)?;
        if !task.runs_tasks() {
            return Ok(Progress::nothing_run());
        }
        self.run(task, remaining_millis).await
    }

    async fn on_update<F>(&self, request: &CustomResourceRequest, remaining_millis: &F) -> Handled
    where
        F: Fn() -> u64 + Send + Sync,
    {
        info!("Received update event {}", request.request_id);
        let task = self.task(request, &request.resource_properties)?;
        let old_properties = request.old_resource_properties.as_ref().ok_or_else(|| {
            EcsTaskError::Validation(
                "required key not provided @ data['OldResourceProperties']".to_string(),
            )
        })?;
        let old_task = self.task(request, old_properties)?;

        let should_run = should_run_on_update(
            self.tasks.as_ref(),
            self.stacks.as_ref(),
            &request.stack_id,
            &old_task,
            &task,
        )
        .await?;
        if !should_run {
            return Ok(Progress::nothing_run());
        }
        self.run(task, remaining_millis).await
    }

    async fn on_delete(&self, request: &CustomResourceRequest) -> Handled {
        info!("Received delete event {}", request.request_id);
        let task = self.task(request, &request.resource_properties)?;
        let task_arns = self.tasks.list_tasks(&task.cluster, &task.started_by).await?;

        let reason = format!("{} {}", *ECS_TASKS_DELETE_REASON, request.stack_id);
        for task_arn in task_arns {
            match self.tasks.stop_task(&task.cluster, &task_arn, &reason).await {
                Ok(()) => info!("Stopped task {}", task_arn),
                Err(e) => warn!("Failed to stop task {}: {}", task_arn, e),
            }
        }
        Ok(Progress::nothing_run())
    }

    async fn on_poll<F>(
        &self,
        request: &CustomResourceRequest,
        state: TaskBatchState,
        remaining_millis: &F,
    ) -> Handled
    where
        F: Fn() -> u64 + Send + Sync,
    {
        info!(
            "Received poll event {} for task(s) {:?}",
            request.request_id,
            state.task_arns()
        );
        self.poll(state, remaining_millis).await
    }

    async fn run<F>(&self, task: TaskSpec, remaining_millis: &F) -> Handled
    where
        F: Fn() -> u64 + Send + Sync,
    {
        let state = self.machine.start(task).await?;
        info!(
            "Task created successfully with result: {}",
            serde_json::to_string(&state.task_result).unwrap_or_default()
        );
        if state.task.timeout == 0 {
            return Ok(Progress::done(&state));
        }
        self.poll(state, remaining_millis).await
    }

    async fn poll<F>(&self, state: TaskBatchState, remaining_millis: &F) -> Handled
    where
        F: Fn() -> u64 + Send + Sync,
    {
        let task_arn = state.first_task_arn();
        match self.machine.poll(state, remaining_millis).await {
            Ok(PollOutcome::Completed(state)) => {
                info!(
                    "Task completed successfully with result: {}",
                    serde_json::to_string(&state.task_result).unwrap_or_default()
                );
                Ok(Progress::done(&state))
            }
            Ok(PollOutcome::Suspended(state)) => Ok(Progress::Suspended(state)),
            Err(error) => Err(Failed { error, task_arn }),
        }
    }
}

/// Carries a handler outcome out of the invocation.
#[async_trait]
pub trait Delivery: Send + Sync {
    /// PUTs `response` to the pre-signed `response_url`.
    async fn respond(&self, response_url: &str, response: &CustomResourceResponse) -> Result<()>;

    /// Submits `request` to a new invocation of the function.
    async fn resubmit(&self, request: &CustomResourceRequest) -> Result<()>;
}

/// Delivers `outcome` and returns the value the invocation completes with.
///
/// Delivery errors never fail the invocation, since a retried request would
/// launch the batch again. An undeliverable response is logged; a failed
/// re-submission is reported to CloudFormation as a failure of the resource.
pub async fn deliver(
    delivery: &dyn Delivery,
    response_url: &str,
    outcome: HandlerOutcome,
) -> Value {
    match outcome {
        HandlerOutcome::Respond(response) => send(delivery, response_url, response).await,
        HandlerOutcome::Suspend(request) => match delivery.resubmit(&request).await {
            Ok(()) => json!({ "RequestId": request.request_id, "Status": "IN_PROGRESS" }),
            Err(e) => {
                error!("Failed to re-invoke the function: {}", e);
                let task_arn = request.event_state.as_ref().and_then(|s| s.first_task_arn());
                let reason = format!("Unable to keep polling the task: {}", e.reason());
                let response =
                    respond(&request, ResponseStatus::Failed, Some(reason), task_arn, None);
                send(delivery, response_url, response).await
            }
        },
    }
}

async fn send(
    delivery: &dyn Delivery,
    response_url: &str,
    response: CustomResourceResponse,
) -> Value {
    if let Err(e) = delivery.respond(response_url, &response).await {
        error!("Failed to deliver the custom resource response: {}", e);
    }
    serde_json::to_value(&response).unwrap_or_default()
}

/// Builds the response to `request`. The physical id falls back to the one
/// of the request, then to the started-by marker of the resource.
fn respond(
    request: &CustomResourceRequest,
    status: ResponseStatus,
    reason: Option<String>,
    task_arn: Option<String>,
    data: Option<Value>,
) -> CustomResourceResponse {
    let physical_resource_id = task_arn
        .or_else(|| request.physical_resource_id.clone())
        .unwrap_or_else(|| task_id(&request.stack_id, &request.logical_resource_id));
    CustomResourceResponse {
        status,
        reason,
        physical_resource_id,
        stack_id: request.stack_id.clone(),
        request_id: request.request_id.clone(),
        logical_resource_id: request.logical_resource_id.clone(),
        data,
    }
}
