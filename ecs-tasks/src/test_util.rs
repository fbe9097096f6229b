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

//! Fixtures and in-memory collaborators shared by the unit tests.

use crate::aws::cloudformation::StackClient;
use crate::aws::ecs::{ContainerEnvironment, LaunchRequest, TaskClient};
use crate::error::{EcsTaskError, Result};
use crate::handler::custom_resource::{CustomResourceRequest, RequestType};
use crate::runtime::clock::Clock;
use crate::runtime::spec::TaskSpec;
use crate::runtime::task::{ContainerRecord, FailureRecord, TaskRecord, TaskResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::time::Instant;

pub const AWS_REGION: &str = "us-west-2";
pub const FUNCTION_ARN: &str = "arn:aws:lambda:us-west-2:123456789012:function:my-stack-cfnEcsTasks";
pub const CLUSTER_NAME: &str = "my-stack-ApplicationCluster";
pub const OLD_TASK_DEFINITION_ARN: &str =
    "arn:aws:ecs:us-west-2:123456789012:task-definition/my-stack-AdhocTaskDefinition:1";
pub const NEW_TASK_DEFINITION_ARN: &str =
    "arn:aws:ecs:us-west-2:123456789012:task-definition/my-stack-AdhocTaskDefinition:2";
pub const TASK_ARN: &str =
    "arn:aws:ecs:us-west-2:123456789012:task/96052dc0-a646-4068-86d5-4c947b9a88b5";
pub const OTHER_TASK_ARN: &str =
    "arn:aws:ecs:us-west-2:123456789012:task/2bb8e3bd-7c3b-4e0a-a0f4-5f03c1b2d6a1";
pub const CONTAINER_INSTANCE_ARN: &str =
    "arn:aws:ecs:us-west-2:123456789012:container-instance/a1b2c3d4-5678-90ab-cdef-11111EXAMPLE";
pub const STACK_ID: &str = "arn:aws:cloudformation:us-west-2:123456789012:stack/my-stack/\
                            5b918d10-cd98-11e6-9af2-50d5ca6e60ae";
pub const REQUEST_ID: &str = "6a4e5b6c-bc6f-4a6e-9b2a-4f3a7c1d2e0f";
pub const LOGICAL_RESOURCE_ID: &str = "MyEcsTask";
pub const RESPONSE_URL: &str = "https://cloudformation-custom-resource-response-uswest2.s3.amazonaws.com/response";
pub const CONTAINER_NAME: &str = "app";
pub const OLD_DB_HOST: &str = "my-old-app-db.example.org";
pub const NEW_DB_HOST: &str = "my-new-app-db.example.org";

/// A one-task request against the old task definition.
pub fn task_spec() -> TaskSpec {
    TaskSpec {
        cluster:         CLUSTER_NAME.to_string(),
        task_definition: OLD_TASK_DEFINITION_ARN.to_string(),
        count:           1,
        instances:       vec![],
        overrides:       json!({}),
        started_by:      "admin".to_string(),
        timeout:         290,
        poll_interval:   10,
        run_on_update:   true,
        run_on_rollback: true,
        update_criteria: vec![],
    }
}

fn task_result(status: &str, exit_code: Option<i64>) -> TaskResult {
    TaskResult {
        tasks:    vec![TaskRecord {
            task_arn: Some(TASK_ARN.to_string()),
            cluster_arn: Some(format!(
                "arn:aws:ecs:{}:123456789012:cluster/{}",
                AWS_REGION, CLUSTER_NAME
            )),
            task_definition_arn: Some(OLD_TASK_DEFINITION_ARN.to_string()),
            last_status: Some(status.to_string()),
            desired_status: Some("RUNNING".to_string()),
            started_by: Some("admin".to_string()),
            stopped_reason: None,
            containers: vec![ContainerRecord {
                container_arn: Some(
                    "arn:aws:ecs:us-west-2:123456789012:container/\
                     0d2d6b4e-62a6-4b0f-92c9-a4c3b1d5e8f7"
                        .to_string(),
                ),
                task_arn: Some(TASK_ARN.to_string()),
                name: Some(CONTAINER_NAME.to_string()),
                last_status: Some(status.to_string()),
                exit_code,
                reason: None,
            }],
        }],
        failures: vec![],
    }
}

pub fn start_task_result() -> TaskResult {
    task_result("PENDING", None)
}

pub fn running_task_result() -> TaskResult {
    task_result("RUNNING", None)
}

pub fn stopped_task_result() -> TaskResult {
    task_result("STOPPED", Some(0))
}

/// A stopped task whose only container exited with code 1.
pub fn failed_task_result() -> TaskResult {
    task_result("STOPPED", Some(1))
}

/// A result with no tasks and a placement failure.
pub fn task_failure() -> TaskResult {
    TaskResult {
        tasks:    vec![],
        failures: vec![FailureRecord {
            arn:    Some(CONTAINER_INSTANCE_ARN.to_string()),
            reason: Some("RESOURCE:MEMORY".to_string()),
        }],
    }
}

/// The containers of a task definition whose `app` container sets `DB_HOST`.
pub fn task_definition(db_host: &str) -> Vec<ContainerEnvironment> {
    vec![ContainerEnvironment {
        name:        CONTAINER_NAME.to_string(),
        environment: vec![
            ("DB_HOST".to_string(), db_host.to_string()),
            ("DB_NAME".to_string(), "app".to_string()),
        ],
    }]
}

/// A custom resource request for the given lifecycle phase.
pub fn cfn_request(request_type: RequestType) -> CustomResourceRequest {
    let update = request_type == RequestType::Update;
    let create = request_type == RequestType::Create;
    CustomResourceRequest {
        request_type,
        response_url: RESPONSE_URL.to_string(),
        stack_id: STACK_ID.to_string(),
        request_id: REQUEST_ID.to_string(),
        resource_type: "Custom::EcsTask".to_string(),
        logical_resource_id: LOGICAL_RESOURCE_ID.to_string(),
        physical_resource_id: if create {
            None
        } else {
            Some(TASK_ARN.to_string())
        },
        resource_properties: json!({
            "ServiceToken": FUNCTION_ARN,
            "Cluster": CLUSTER_NAME,
            "TaskDefinition": NEW_TASK_DEFINITION_ARN,
        }),
        old_resource_properties: if update {
            Some(json!({
                "ServiceToken": FUNCTION_ARN,
                "Cluster": CLUSTER_NAME,
                "TaskDefinition": OLD_TASK_DEFINITION_ARN,
            }))
        } else {
            None
        },
        service_token: Some(FUNCTION_ARN.to_string()),
        event_state: None,
    }
}

/// A call recorded by [`FakeTaskClient`].
#[derive(Debug, Clone, PartialEq)]
pub enum TaskCall {
    Launch(LaunchRequest),
    Describe(Vec<String>),
    DescribeTaskDefinition(String),
    List(String),
    Stop(String, String),
}

/// An in-memory [`TaskClient`].
///
/// Describe calls answer from a queue; the last queued result keeps being
/// returned once the others are consumed.
pub struct FakeTaskClient {
    launch:      TaskResult,
    describe:    Mutex<VecDeque<TaskResult>>,
    definitions: HashMap<String, Vec<ContainerEnvironment>>,
    listed:      Vec<String>,
    stop_errors: Vec<String>,
    calls:       Mutex<Vec<TaskCall>>,
}

impl FakeTaskClient {
    pub fn new() -> Self {
        let mut definitions = HashMap::new();
        definitions.insert(
            OLD_TASK_DEFINITION_ARN.to_string(),
            task_definition(OLD_DB_HOST),
        );
        definitions.insert(
            NEW_TASK_DEFINITION_ARN.to_string(),
            task_definition(NEW_DB_HOST),
        );
        Self {
            launch: start_task_result(),
            describe: Mutex::new(vec![stopped_task_result()].into()),
            definitions,
            listed: vec![TASK_ARN.to_string()],
            stop_errors: vec![],
            calls: Mutex::new(vec![]),
        }
    }

    pub fn with_launch(mut self, result: TaskResult) -> Self {
        self.launch = result;
        self
    }

    pub fn with_describe(self, results: Vec<TaskResult>) -> Self {
        *self.describe.lock().unwrap() = results.into();
        self
    }

    pub fn with_definition(mut self, arn: &str, containers: Vec<ContainerEnvironment>) -> Self {
        self.definitions.insert(arn.to_string(), containers);
        self
    }

    pub fn with_listed(mut self, arns: Vec<&str>) -> Self {
        self.listed = arns.into_iter().map(str::to_owned).collect();
        self
    }

    pub fn with_stop_error(mut self, arn: &str) -> Self {
        self.stop_errors.push(arn.to_string());
        self
    }

    pub fn calls(&self) -> Vec<TaskCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn launches(&self) -> Vec<LaunchRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                TaskCall::Launch(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn describes(&self) -> usize {
        self.count(|c| matches!(c, TaskCall::Describe(_)))
    }

    pub fn definitions_described(&self) -> usize {
        self.count(|c| matches!(c, TaskCall::DescribeTaskDefinition(_)))
    }

    pub fn lists(&self) -> usize {
        self.count(|c| matches!(c, TaskCall::List(_)))
    }

    /// Returns the `(task ARN, reason)` of every stop call.
    pub fn stops(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                TaskCall::Stop(arn, reason) => Some((arn, reason)),
                _ => None,
            })
            .collect()
    }

    fn count(&self, f: impl Fn(&TaskCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| f(c)).count()
    }

    fn record(&self, call: TaskCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl TaskClient for FakeTaskClient {
    async fn start_task(&self, request: LaunchRequest) -> Result<TaskResult> {
        self.record(TaskCall::Launch(request));
        Ok(self.launch.clone())
    }

    async fn describe_tasks(&self, _cluster: &str, task_arns: &[String]) -> Result<TaskResult> {
        self.record(TaskCall::Describe(task_arns.to_vec()));
        let mut queue = self.describe.lock().unwrap();
        let result = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        Ok(result.unwrap_or_default())
    }

    async fn describe_task_definition(
        &self,
        task_definition: &str,
    ) -> Result<Vec<ContainerEnvironment>> {
        self.record(TaskCall::DescribeTaskDefinition(task_definition.to_string()));
        self.definitions.get(task_definition).cloned().ok_or_else(|| {
            EcsTaskError::AWS(format!(
                "Unable to describe task definition {}",
                task_definition
            ))
        })
    }

    async fn list_tasks(&self, _cluster: &str, started_by: &str) -> Result<Vec<String>> {
        self.record(TaskCall::List(started_by.to_string()));
        Ok(self.listed.clone())
    }

    async fn stop_task(&self, _cluster: &str, task_arn: &str, reason: &str) -> Result<()> {
        self.record(TaskCall::Stop(task_arn.to_string(), reason.to_string()));
        if self.stop_errors.iter().any(|arn| arn == task_arn) {
            return Err(EcsTaskError::AWS(format!(
                "The referenced task was not found: {}",
                task_arn
            )));
        }
        Ok(())
    }
}

/// An in-memory [`StackClient`] reporting a fixed status.
pub struct FakeStackClient {
    status: String,
    calls:  AtomicUsize,
}

impl FakeStackClient {
    pub fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
            calls:  AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StackClient for FakeStackClient {
    async fn get_stack_status(&self, _stack_name: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.status.clone())
    }
}

/// A wall clock that follows tokio's (pausable) clock from a fixed base, and
/// can be moved forward by hand.
pub struct PausedClock {
    base:    DateTime<Utc>,
    started: Instant,
    skew:    Mutex<Duration>,
}

impl PausedClock {
    pub fn new(base: DateTime<Utc>) -> Self {
        Self {
            base,
            started: Instant::now(),
            skew: Mutex::new(Duration::zero()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut skew = self.skew.lock().unwrap();
        *skew = *skew + by;
    }
}

impl Clock for PausedClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = Duration::from_std(self.started.elapsed()).unwrap();
        self.base + elapsed + *self.skew.lock().unwrap()
    }
}
