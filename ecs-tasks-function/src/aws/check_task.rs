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

//! Checks, once, the ECS tasks of an event returned by `create-task` or by a
//! previous check.

use ecs_tasks::logger;
use ecs_tasks::prelude::*;
use lambda_runtime::{service_fn, LambdaEvent};
use rusoto_core::Region;
use rusoto_ecs::EcsClient;
use serde_json::Value;
use std::sync::Arc;

async fn handler(direct: &DirectHandler, event: LambdaEvent<Value>) -> Result<Value> {
    Ok(direct.check(event.payload).await)
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init();
    let client = Arc::new(EcsTaskClient::new(EcsClient::new(Region::default())));
    let direct = DirectHandler::new(TaskStateMachine::new(client));
    let direct = &direct;
    lambda_runtime::run(service_fn(move |event| handler(direct, event))).await?;
    Ok(())
}
