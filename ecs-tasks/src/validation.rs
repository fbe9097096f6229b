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

//! Validation of incoming event properties.
//!
//! Both entry-point families accept loosely typed JSON: numbers may arrive as
//! digit strings and booleans as `"true"`/`"yes"`/`"false"`/`"no"`, since
//! CloudFormation passes every template property as a string. The validators
//! coerce those values, apply defaults and ranges, and name the offending
//! property in every error.

use crate::configs::*;
use crate::error::{EcsTaskError, Result};
use crate::handler::direct::EcsTaskEvent;
use crate::runtime::spec::{TaskSpec, UpdateCriterion};
use crate::runtime::task::{FailureRecord, TaskRecord};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::ops::RangeInclusive;

/// Property keys of a direct invocation event owned by [`EcsTaskEvent`].
const ECS_EVENT_KEYS: [&str; 12] = [
    "Cluster",
    "TaskDefinition",
    "Count",
    "Overrides",
    "Instances",
    "Tasks",
    "Failures",
    "Status",
    "StartedBy",
    "Timeout",
    "Poll",
    "CreateTimestamp",
];

/// Validates the event of a direct invocation. Unknown keys are preserved.
pub fn validate_ecs(event: &Map<String, Value>) -> Result<EcsTaskEvent> {
    let tasks: Vec<TaskRecord> = match event.get("Tasks") {
        None | Some(Value::Null) => vec![],
        Some(Value::Array(tasks)) => serde_json::from_value(Value::Array(tasks.clone()))
            .map_err(|_| invalid("expected a list of tasks", "Tasks"))?,
        Some(_) => return Err(invalid("expected list", "Tasks")),
    };
    let failures: Vec<FailureRecord> = match event.get("Failures") {
        None | Some(Value::Null) => vec![],
        Some(failures) => serde_json::from_value(failures.clone())
            .map_err(|_| invalid("expected a list of failures", "Failures"))?,
    };
    let create_timestamp = match event.get("CreateTimestamp") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(
            DateTime::parse_from_rfc3339(s)
                .map_err(|_| invalid("expected an RFC 3339 timestamp", "CreateTimestamp"))?
                .with_timezone(&Utc),
        ),
        Some(_) => return Err(invalid("expected an RFC 3339 timestamp", "CreateTimestamp")),
    };

    let mut extra = event.clone();
    ECS_EVENT_KEYS.iter().for_each(|key| {
        extra.remove(*key);
    });

    Ok(EcsTaskEvent {
        cluster: required_str(event, "Cluster")?,
        task_definition: required_str(event, "TaskDefinition")?,
        count: int_in(event, "Count", 1, 1..=10)? as u32,
        overrides: overrides(event)?,
        instances: instances(event)?,
        tasks,
        failures,
        status: optional_str(event, "Status", "")?,
        started_by: optional_str(event, "StartedBy", &ECS_TASKS_DEFAULT_STARTED_BY)?,
        timeout: int_in(event, "Timeout", 3600, 60..=604_800)?,
        poll: int_in(event, "Poll", 10, 10..=3600)?,
        create_timestamp,
        extra,
    })
}

/// Validates the resource properties of a custom resource request. Unknown
/// keys (such as `ServiceToken`) are ignored.
///
/// The started-by marker is not a resource property; the caller derives it
/// from the stack and the logical resource id.
pub fn validate_cfn(properties: &Value) -> Result<TaskSpec> {
    let props = properties
        .as_object()
        .ok_or_else(|| EcsTaskError::Validation("expected a mapping of properties".to_string()))?;

    Ok(TaskSpec {
        cluster:         required_str(props, "Cluster")?,
        task_definition: required_str(props, "TaskDefinition")?,
        count:           int_in(props, "Count", 1, 0..=10)? as u32,
        instances:       instances(props)?,
        overrides:       overrides(props)?,
        started_by:      String::new(),
        timeout:         int_in(props, "Timeout", 290, 0..=3600)?,
        poll_interval:   int_in(props, "PollInterval", 10, 10..=60)?,
        run_on_update:   bool_or(props, "RunOnUpdate", true)?,
        run_on_rollback: bool_or(props, "RunOnRollback", true)?,
        update_criteria: update_criteria(props)?,
    })
}

fn invalid(problem: &str, key: &str) -> EcsTaskError {
    EcsTaskError::Validation(format!("{} @ data['{}']", problem, key))
}

/// Returns the value of `key`, treating an explicit null as absent.
fn lookup<'a>(props: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    props.get(key).filter(|v| !v.is_null())
}

fn required_str(props: &Map<String, Value>, key: &str) -> Result<String> {
    match lookup(props, key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(invalid("expected str", key)),
        None => Err(invalid("required key not provided", key)),
    }
}

fn optional_str(props: &Map<String, Value>, key: &str, default: &str) -> Result<String> {
    match lookup(props, key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(invalid("expected str", key)),
        None => Ok(default.to_string()),
    }
}

/// Accepts a non-negative integer or a string made only of digits.
fn to_int(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => {
            s.parse().ok()
        }
        _ => None,
    }
}

/// Accepts a boolean or one of `true`, `yes`, `false`, `no` in any case.
fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn int_in(
    props: &Map<String, Value>,
    key: &str,
    default: u64,
    range: RangeInclusive<u64>,
) -> Result<u64> {
    let value = match lookup(props, key) {
        Some(v) => to_int(v).ok_or_else(|| invalid("expected int", key))?,
        None => default,
    };
    if !range.contains(&value) {
        return Err(invalid(
            &format!(
                "value must be between {} and {}",
                range.start(),
                range.end()
            ),
            key,
        ));
    }
    Ok(value)
}

fn bool_or(props: &Map<String, Value>, key: &str, default: bool) -> Result<bool> {
    match lookup(props, key) {
        Some(v) => to_bool(v).ok_or_else(|| invalid("expected bool", key)),
        None => Ok(default),
    }
}

fn instances(props: &Map<String, Value>) -> Result<Vec<String>> {
    let instances = match lookup(props, "Instances") {
        Some(Value::Array(instances)) => instances,
        Some(_) => return Err(invalid("expected list", "Instances")),
        None => return Ok(vec![]),
    };
    if instances.len() > 10 {
        return Err(invalid("length of value must be at most 10", "Instances"));
    }
    instances
        .iter()
        .map(|i| {
            i.as_str()
                .map(str::to_owned)
                .ok_or_else(|| invalid("expected a list of container instances", "Instances"))
        })
        .collect()
}

fn overrides(props: &Map<String, Value>) -> Result<Value> {
    match lookup(props, "Overrides") {
        Some(v @ Value::Object(_)) => Ok(stringify(v)),
        Some(_) => Err(invalid("expected dict", "Overrides")),
        None => Ok(Value::Object(Map::new())),
    }
}

/// Converts every leaf of `value` to a string. Task overrides must specify
/// all of their values as strings.
fn stringify(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), stringify(v)))
                .collect(),
        ),
        Value::Array(list) => Value::Array(list.iter().map(stringify).collect()),
        Value::String(s) => Value::String(s.clone()),
        Value::Null => Value::String(String::new()),
        other => Value::String(other.to_string()),
    }
}

fn update_criteria(props: &Map<String, Value>) -> Result<Vec<UpdateCriterion>> {
    let criteria = match lookup(props, "UpdateCriteria") {
        Some(Value::Array(criteria)) => criteria,
        Some(_) => return Err(invalid("expected list", "UpdateCriteria")),
        None => return Ok(vec![]),
    };
    criteria
        .iter()
        .map(|criterion| {
            let criterion = criterion
                .as_object()
                .ok_or_else(|| invalid("expected dict", "UpdateCriteria"))?;
            let container = required_str(criterion, "Container")
                .map_err(|_| invalid("expected a Container name", "UpdateCriteria"))?;
            let environment_keys = match lookup(criterion, "EnvironmentKeys") {
                Some(Value::Array(keys)) => keys
                    .iter()
                    .map(|k| k.as_str().map(str::to_owned))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| {
                        invalid("expected a list of EnvironmentKeys", "UpdateCriteria")
                    })?,
                _ => return Err(invalid("expected a list of EnvironmentKeys", "UpdateCriteria")),
            };
            Ok(UpdateCriterion {
                container,
                environment_keys,
            })
        })
        .collect()
}
