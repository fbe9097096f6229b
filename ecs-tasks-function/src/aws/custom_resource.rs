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

//! The CloudFormation custom resource function.
//!
//! Terminal outcomes are PUT to the pre-signed `ResponseURL` of the request.
//! When the task batch outlives this invocation, the function re-invokes
//! itself asynchronously with the batch state attached to the request, and
//! CloudFormation keeps waiting for the response of a later invocation.

use async_trait::async_trait;
use ecs_tasks::logger;
use ecs_tasks::prelude::*;
use lambda_runtime::{service_fn, LambdaEvent};
use log::info;
use rusoto_cloudformation::CloudFormationClient;
use rusoto_core::Region;
use rusoto_ecs::EcsClient;
use rusoto_lambda::LambdaClient;
use serde_json::Value;
use std::sync::Arc;

/// Delivers outcomes through the response URL and a self re-invocation.
struct AwsDelivery<'a> {
    lambda:       &'a LambdaClient,
    function_arn: &'a str,
}

#[async_trait]
impl Delivery for AwsDelivery<'_> {
    async fn respond(&self, response_url: &str, response: &CustomResourceResponse) -> Result<()> {
        send_response(response_url, response).await
    }

    async fn resubmit(&self, request: &CustomResourceRequest) -> Result<()> {
        info!(
            "Re-invoking {} to keep polling request {}",
            self.function_arn, request.request_id
        );
        invoke_function(self.lambda, self.function_arn, request).await
    }
}

async fn handler(
    resource: &CustomResourceHandler,
    lambda: &LambdaClient,
    event: LambdaEvent<CustomResourceRequest>,
) -> Result<Value> {
    let (request, context) = (event.payload, event.context);
    let response_url = request.response_url.clone();
    let deadline = context.deadline;

    let outcome = resource
        .handle(request, move || remaining_time_in_millis(deadline))
        .await;
    let delivery = AwsDelivery {
        lambda,
        function_arn: &context.invoked_function_arn,
    };
    Ok(deliver(&delivery, &response_url, outcome).await)
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init();
    let tasks = Arc::new(EcsTaskClient::new(EcsClient::new(Region::default())));
    let stacks = Arc::new(CfnStackClient::new(CloudFormationClient::new(
        Region::default(),
    )));
    let lambda = LambdaClient::new(Region::default());

    let resource = CustomResourceHandler::new(tasks, stacks);
    let (resource, lambda) = (&resource, &lambda);
    lambda_runtime::run(service_fn(move |event| handler(resource, lambda, event))).await?;
    Ok(())
}
