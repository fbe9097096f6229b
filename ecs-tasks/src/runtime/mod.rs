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

//! The task runtime: the task model, the resumable poll state machine and the
//! update decision logic.

pub mod clock;
pub mod machine;
pub mod spec;
pub mod state;
pub mod task;
pub mod update;

pub use clock::{Clock, SystemClock};
pub use machine::{PollOutcome, TaskStateMachine};
pub use spec::{Placement, TaskSpec, UpdateCriterion};
pub use state::TaskBatchState;
pub use task::{ContainerRecord, FailureRecord, TaskRecord, TaskResult, TaskStatus};
pub use update::should_run_on_update;
