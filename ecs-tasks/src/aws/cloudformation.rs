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

//! This crate contains all wrapped functions of the AWS CloudFormation
//! service, including delivery of custom resource responses.

use crate::aws::paginate::drain_pages;
use crate::error::{EcsTaskError, Result};
use async_trait::async_trait;
use log::info;
use reqwest::header::CONTENT_TYPE;
use rusoto_cloudformation::{CloudFormation, CloudFormationClient, DescribeStacksInput};
use serde::Serialize;

/// The CloudFormation operations the orchestrators depend on.
#[async_trait]
pub trait StackClient: Send + Sync {
    /// Returns the current status of a stack, looked up by name or id.
    async fn get_stack_status(&self, stack_name: &str) -> Result<String>;
}

/// [`StackClient`] backed by the AWS CloudFormation API.
pub struct CfnStackClient {
    client: CloudFormationClient,
}

impl CfnStackClient {
    /// Wraps a CloudFormation client.
    pub fn new(client: CloudFormationClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StackClient for CfnStackClient {
    async fn get_stack_status(&self, stack_name: &str) -> Result<String> {
        let stacks = drain_pages(|next_token| {
            let request = DescribeStacksInput {
                stack_name: Some(stack_name.to_owned()),
                next_token,
                ..Default::default()
            };
            async move {
                let response = self
                    .client
                    .describe_stacks(request)
                    .await
                    .map_err(|e| EcsTaskError::AWS(e.to_string()))?;
                Ok((response.stacks.unwrap_or_default(), response.next_token))
            }
        })
        .await?;

        stacks
            .into_iter()
            .next()
            .map(|stack| stack.stack_status)
            .ok_or_else(|| EcsTaskError::AWS(format!("Stack {} does not exist", stack_name)))
    }
}

/// Delivers a custom resource response to the pre-signed `ResponseURL` of the
/// request.
///
/// The URL is signed without a content type, so the header must be sent
/// empty.
pub async fn send_response<T: Serialize>(response_url: &str, response: &T) -> Result<()> {
    let body = serde_json::to_vec(response)?;
    info!("Sending custom resource response ({} bytes)", body.len());
    reqwest::Client::new()
        .put(response_url)
        .header(CONTENT_TYPE, "")
        .body(body)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| EcsTaskError::AWS(format!("Failed to send response: {}", e)))
        .map(|_| ())
}
