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

//! A "prelude" for users of the ecs-tasks crate.
//!
//! Like the standard library's prelude, this module simplifies importing of
//! common items. Unlike the standard prelude, the contents of this module must
//! be imported manually:
//!
//! ```
//! use ecs_tasks::prelude::*;
//! ```

pub use crate::aws::cloudformation::send_response;
pub use crate::aws::lambda::{invoke_function, remaining_time_in_millis};
pub use crate::aws::{CfnStackClient, EcsTaskClient, StackClient, TaskClient};
pub use crate::configs::*;
pub use crate::error::{EcsTaskError, Result};
pub use crate::handler::{
    deliver, CustomResourceHandler, CustomResourceRequest, CustomResourceResponse, Delivery,
    DirectHandler, HandlerOutcome,
};
pub use crate::runtime::{PollOutcome, TaskBatchState, TaskSpec, TaskStateMachine, TaskStatus};
