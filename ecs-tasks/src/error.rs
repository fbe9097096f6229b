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

//! ECS task orchestration error types

use crate::runtime::task::FailureRecord;
use std::error;
use std::fmt::{Display, Formatter};
use std::result;

/// Result type for operations that could result in an [EcsTaskError]
pub type Result<T> = result::Result<T, EcsTaskError>;

/// ECS task orchestration error
#[derive(Debug)]
pub enum EcsTaskError {
    /// Error associated to Lambda runtime execution.
    LambdaError(Box<dyn std::error::Error + Send + Sync>),
    /// Error returned when serde_json failed to serialize or deserialize data.
    SerdeJson(serde_json::Error),
    /// Error returned when an input property is missing or invalid. The
    /// message names the offending property.
    Validation(String),
    /// Error returned when the launch call reports one or more failure records.
    /// Some placements may have succeeded, but the batch is never treated as
    /// partially launched.
    TaskLaunch(Vec<FailureRecord>),
    /// Error returned when a describe call reports one or more failure records.
    TaskFailure(Vec<FailureRecord>),
    /// Error returned when a stopped task has a container with a non-zero exit
    /// code. Holds the ARNs of the offending tasks.
    TaskExitCode(Vec<String>),
    /// Error returned when the batch did not finish within its absolute
    /// timeout, in seconds.
    TaskTimeout(u64),
    /// Error returned when accessing the AWS services fails.
    AWS(String),
    /// Error returned as a consequence of an invariant that does not hold.
    /// This error should not happen in normal usage.
    Internal(String),
}

impl EcsTaskError {
    /// Returns the reason reported to the caller when an operation fails with
    /// this error.
    pub fn reason(&self) -> String {
        match self {
            EcsTaskError::Validation(desc) => {
                format!("One or more invalid event properties: {}", desc)
            }
            EcsTaskError::TaskLaunch(failures) | EcsTaskError::TaskFailure(failures) => {
                format!("A task failure occurred: {}", describe_failures(failures))
            }
            EcsTaskError::TaskExitCode(arns) => format!(
                "One or more containers failed with a non-zero exit code: [{}]",
                arns.join(", ")
            ),
            EcsTaskError::TaskTimeout(timeout) => format!(
                "The task failed to complete with the specified timeout of {} seconds",
                timeout
            ),
            EcsTaskError::AWS(desc) => format!("An AWS client error occurred: {}", desc),
            other => format!("An error occurred: {}", other),
        }
    }

    /// Returns the failure records carried by this error, if any.
    pub fn failures(&self) -> Option<&[FailureRecord]> {
        match self {
            EcsTaskError::TaskLaunch(failures) | EcsTaskError::TaskFailure(failures) => {
                Some(failures)
            }
            _ => None,
        }
    }
}

fn describe_failures(failures: &[FailureRecord]) -> String {
    format!(
        "[{}]",
        failures
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    )
}

impl From<serde_json::Error> for EcsTaskError {
    fn from(e: serde_json::Error) -> Self {
        EcsTaskError::SerdeJson(e)
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for EcsTaskError {
    fn from(e: Box<dyn std::error::Error + Send + Sync>) -> Self {
        EcsTaskError::LambdaError(e)
    }
}

impl From<&str> for EcsTaskError {
    fn from(e: &str) -> Self {
        EcsTaskError::Internal(e.to_string())
    }
}

impl Display for EcsTaskError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            EcsTaskError::LambdaError(ref desc) => write!(f, "Lambda error: {}", desc),
            EcsTaskError::SerdeJson(ref desc) => write!(f, "serde_json error: {:?}", desc),
            EcsTaskError::Validation(ref desc) => write!(f, "Validation error: {}", desc),
            EcsTaskError::TaskLaunch(ref failures) => {
                write!(f, "Task launch failure: {}", describe_failures(failures))
            }
            EcsTaskError::TaskFailure(ref failures) => {
                write!(f, "Task failure: {}", describe_failures(failures))
            }
            EcsTaskError::TaskExitCode(ref arns) => {
                write!(f, "Non-zero exit code: [{}]", arns.join(", "))
            }
            EcsTaskError::TaskTimeout(timeout) => {
                write!(f, "Task timeout: exceeded {} seconds", timeout)
            }
            EcsTaskError::AWS(ref desc) => write!(f, "AWS error: {}", desc),
            EcsTaskError::Internal(ref desc) => write!(
                f,
                "Internal error: {}. This was likely caused by a bug in the task \
                    orchestrator and we would welcome that you file a bug report",
                desc
            ),
        }
    }
}

impl error::Error for EcsTaskError {}
