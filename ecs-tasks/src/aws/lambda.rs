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

//! This crate contains the wrapped functions of the AWS Lambda service used by
//! the orchestrators to resume themselves.

use crate::configs::*;
use crate::error::{EcsTaskError, Result};
use bytes::Bytes;
use chrono::Utc;
use log::info;
use rusoto_lambda::{InvocationRequest, Lambda, LambdaClient};
use serde::Serialize;

/// Returns the execution time left before `deadline`, in milliseconds.
///
/// # Arguments
/// * `deadline` - The invocation deadline, in milliseconds since the epoch,
///   as carried by the Lambda context.
pub fn remaining_time_in_millis(deadline: u64) -> u64 {
    let now = Utc::now().timestamp_millis().max(0) as u64;
    deadline.saturating_sub(now)
}

/// Invokes the lambda function asynchronously with the given payload.
///
/// # Arguments
/// * `client` - The Lambda client.
/// * `function_name` - The name or ARN of the lambda function.
/// * `payload` - The event to be passed to the lambda function.
pub async fn invoke_function<T: Serialize>(
    client: &LambdaClient,
    function_name: &str,
    payload: &T,
) -> Result<()> {
    let request = InvocationRequest {
        function_name: function_name.to_owned(),
        invocation_type: Some(ECS_TASKS_ASYNC_CALL.clone()),
        payload: Some(Bytes::from(serde_json::to_vec(payload)?)),
        ..Default::default()
    };

    let response = client
        .invoke(request)
        .await
        .map_err(|e| EcsTaskError::AWS(e.to_string()))?;
    if let Some(error) = response.function_error {
        return Err(EcsTaskError::AWS(format!(
            "Function invocation error: {}",
            error
        )));
    }

    info!(
        "Invoked {} asynchronously, status code: {:?}",
        function_name, response.status_code
    );
    Ok(())
}
