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

//! This crate contains all wrapped functions of the Amazon ECS service.

use crate::aws::paginate::drain_pages;
use crate::error::{EcsTaskError, Result};
use crate::runtime::spec::Placement;
use crate::runtime::task::{ContainerRecord, FailureRecord, TaskRecord, TaskResult};
use async_trait::async_trait;
use rusoto_ecs::{
    DescribeTaskDefinitionRequest, DescribeTasksRequest, Ecs, EcsClient, ListTasksRequest,
    RunTaskRequest, StartTaskRequest, StopTaskRequest, TaskOverride,
};
use serde_json::Value;

/// A request to launch a batch of tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchRequest {
    /// The cluster to launch on.
    pub cluster:         String,
    /// The task definition family, revision or ARN.
    pub task_definition: String,
    /// Task overrides, in the shape of the ECS `TaskOverride` structure.
    pub overrides:       Value,
    /// Tag attached to every launched task.
    pub started_by:      String,
    /// Where the tasks go.
    pub placement:       Placement,
}

/// The environment of one container definition, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerEnvironment {
    /// The container name.
    pub name:        String,
    /// Environment variables as name/value pairs.
    pub environment: Vec<(String, String)>,
}

impl ContainerEnvironment {
    /// Returns the value of the environment variable `key`, if declared.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.environment
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

/// The ECS operations the orchestrators depend on.
///
/// Each method is a single request/response; no retries and no local state.
#[async_trait]
pub trait TaskClient: Send + Sync {
    /// Launches a batch of tasks, either onto explicit container instances or
    /// as a number of copies placed by the scheduler.
    async fn start_task(&self, request: LaunchRequest) -> Result<TaskResult>;

    /// Describes the given tasks.
    async fn describe_tasks(&self, cluster: &str, task_arns: &[String]) -> Result<TaskResult>;

    /// Returns the container environments declared by a task definition.
    async fn describe_task_definition(
        &self,
        task_definition: &str,
    ) -> Result<Vec<ContainerEnvironment>>;

    /// Lists the ARNs of every task in `cluster` started with `started_by`.
    async fn list_tasks(&self, cluster: &str, started_by: &str) -> Result<Vec<String>>;

    /// Stops a task.
    async fn stop_task(&self, cluster: &str, task_arn: &str, reason: &str) -> Result<()>;
}

/// [`TaskClient`] backed by the Amazon ECS API.
pub struct EcsTaskClient {
    client: EcsClient,
}

impl EcsTaskClient {
    /// Wraps an ECS client.
    pub fn new(client: EcsClient) -> Self {
        Self { client }
    }
}

/// Converts the stringified overrides into the ECS request shape. An empty
/// mapping means no overrides at all.
fn task_override(overrides: &Value) -> Result<Option<TaskOverride>> {
    match overrides {
        Value::Null => Ok(None),
        Value::Object(map) if map.is_empty() => Ok(None),
        value => serde_json::from_value(value.clone()).map(Some).map_err(|e| {
            EcsTaskError::Validation(format!("{} @ data['Overrides']", e))
        }),
    }
}

fn task_result(
    tasks: Option<Vec<rusoto_ecs::Task>>,
    failures: Option<Vec<rusoto_ecs::Failure>>,
) -> TaskResult {
    TaskResult {
        tasks:    tasks
            .unwrap_or_default()
            .into_iter()
            .map(TaskRecord::from)
            .collect(),
        failures: failures
            .unwrap_or_default()
            .into_iter()
            .map(FailureRecord::from)
            .collect(),
    }
}

impl From<rusoto_ecs::Container> for ContainerRecord {
    fn from(c: rusoto_ecs::Container) -> Self {
        ContainerRecord {
            container_arn: c.container_arn,
            task_arn:      c.task_arn,
            name:          c.name,
            last_status:   c.last_status,
            exit_code:     c.exit_code,
            reason:        c.reason,
        }
    }
}

impl From<rusoto_ecs::Task> for TaskRecord {
    fn from(t: rusoto_ecs::Task) -> Self {
        TaskRecord {
            task_arn:            t.task_arn,
            cluster_arn:         t.cluster_arn,
            task_definition_arn: t.task_definition_arn,
            last_status:         t.last_status,
            desired_status:      t.desired_status,
            started_by:          t.started_by,
            stopped_reason:      t.stopped_reason,
            containers:          t
                .containers
                .unwrap_or_default()
                .into_iter()
                .map(ContainerRecord::from)
                .collect(),
        }
    }
}

impl From<rusoto_ecs::Failure> for FailureRecord {
    fn from(f: rusoto_ecs::Failure) -> Self {
        FailureRecord {
            arn:    f.arn,
            reason: f.reason,
        }
    }
}

#[async_trait]
impl TaskClient for EcsTaskClient {
    async fn start_task(&self, request: LaunchRequest) -> Result<TaskResult> {
        let overrides = task_override(&request.overrides)?;
        match request.placement {
            Placement::Instances(instances) => {
                let response = self
                    .client
                    .start_task(StartTaskRequest {
                        cluster: Some(request.cluster),
                        container_instances: instances,
                        overrides,
                        started_by: Some(request.started_by),
                        task_definition: request.task_definition,
                        ..Default::default()
                    })
                    .await
                    .map_err(|e| EcsTaskError::AWS(e.to_string()))?;
                Ok(task_result(response.tasks, response.failures))
            }
            Placement::Count(count) => {
                let response = self
                    .client
                    .run_task(RunTaskRequest {
                        cluster: Some(request.cluster),
                        count: Some(count as i64),
                        overrides,
                        started_by: Some(request.started_by),
                        task_definition: request.task_definition,
                        ..Default::default()
                    })
                    .await
                    .map_err(|e| EcsTaskError::AWS(e.to_string()))?;
                Ok(task_result(response.tasks, response.failures))
            }
        }
    }

    async fn describe_tasks(&self, cluster: &str, task_arns: &[String]) -> Result<TaskResult> {
        // ECS rejects a describe call without task ARNs.
        if task_arns.is_empty() {
            return Ok(TaskResult::default());
        }
        let response = self
            .client
            .describe_tasks(DescribeTasksRequest {
                cluster: Some(cluster.to_owned()),
                tasks: task_arns.to_vec(),
                ..Default::default()
            })
            .await
            .map_err(|e| EcsTaskError::AWS(e.to_string()))?;
        Ok(task_result(response.tasks, response.failures))
    }

    async fn describe_task_definition(
        &self,
        task_definition: &str,
    ) -> Result<Vec<ContainerEnvironment>> {
        let response = self
            .client
            .describe_task_definition(DescribeTaskDefinitionRequest {
                task_definition: task_definition.to_owned(),
                ..Default::default()
            })
            .await
            .map_err(|e| EcsTaskError::AWS(e.to_string()))?;

        Ok(response
            .task_definition
            .and_then(|d| d.container_definitions)
            .unwrap_or_default()
            .into_iter()
            .map(|c| ContainerEnvironment {
                name:        c.name.unwrap_or_default(),
                environment: c
                    .environment
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|kv| Some((kv.name?, kv.value.unwrap_or_default())))
                    .collect(),
            })
            .collect())
    }

    async fn list_tasks(&self, cluster: &str, started_by: &str) -> Result<Vec<String>> {
        drain_pages(|next_token| {
            let request = ListTasksRequest {
                cluster: Some(cluster.to_owned()),
                started_by: Some(started_by.to_owned()),
                next_token,
                ..Default::default()
            };
            async move {
                let response = self
                    .client
                    .list_tasks(request)
                    .await
                    .map_err(|e| EcsTaskError::AWS(e.to_string()))?;
                Ok((response.task_arns.unwrap_or_default(), response.next_token))
            }
        })
        .await
    }

    async fn stop_task(&self, cluster: &str, task_arn: &str, reason: &str) -> Result<()> {
        self.client
            .stop_task(StopTaskRequest {
                cluster: Some(cluster.to_owned()),
                reason:  Some(reason.to_owned()),
                task:    task_arn.to_owned(),
                ..Default::default()
            })
            .await
            .map_err(|e| EcsTaskError::AWS(e.to_string()))
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_overrides_are_omitted() -> Result<()> {
        assert_eq!(None, task_override(&Value::Null)?);
        assert_eq!(None, task_override(&json!({}))?);
        Ok(())
    }

    #[test]
    fn overrides_map_onto_ecs_shape() -> Result<()> {
        let overrides = json!({
            "containerOverrides": [{
                "name": "app",
                "command": ["bundle", "exec", "rake", "db:migrate"],
                "environment": [{ "name": "RAILS_ENV", "value": "production" }]
            }]
        });
        let parsed = task_override(&overrides)?.unwrap();
        let containers = parsed.container_overrides.unwrap();
        assert_eq!(Some("app".to_string()), containers[0].name);
        assert_eq!(4, containers[0].command.as_ref().unwrap().len());
        Ok(())
    }

    #[test]
    fn malformed_overrides_name_the_property() {
        let overrides = json!({ "containerOverrides": "app" });
        match task_override(&overrides) {
            Err(EcsTaskError::Validation(desc)) => assert!(desc.contains("Overrides")),
            other => panic!("expected a validation error, got {:?}", other),
        }
    }

    #[test]
    fn converts_described_tasks() {
        let result = task_result(
            Some(vec![rusoto_ecs::Task {
                task_arn: Some("arn:aws:ecs:us-west-2:123456789012:task/abc".to_string()),
                last_status: Some("STOPPED".to_string()),
                containers: Some(vec![rusoto_ecs::Container {
                    name: Some("app".to_string()),
                    exit_code: Some(1),
                    ..Default::default()
                }]),
                ..Default::default()
            }]),
            Some(vec![rusoto_ecs::Failure {
                arn: Some("arn:aws:ecs:us-west-2:123456789012:container-instance/1".to_string()),
                reason: Some("RESOURCE:MEMORY".to_string()),
                ..Default::default()
            }]),
        );

        assert_eq!(1, result.tasks.len());
        assert_eq!(Some(1), result.tasks[0].containers[0].exit_code);
        assert_eq!(Some("RESOURCE:MEMORY"), result.failures[0].reason.as_deref());
    }

    #[test]
    fn environment_lookup() {
        let container = ContainerEnvironment {
            name:        "app".to_string(),
            environment: vec![("DB_HOST".to_string(), "db.example.org".to_string())],
        };
        assert_eq!(Some("db.example.org"), container.value("DB_HOST"));
        assert_eq!(None, container.value("DB_PORT"));
    }
}
