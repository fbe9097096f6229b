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

//! This module provides various default configurations for the task
//! orchestrators.

pub use crate::config::ECS_TASKS_CONF;
use humantime::parse_duration;
use lazy_static::lazy_static;
use std::time::Duration;

lazy_static! {
    /// Margin kept in reserve on top of the poll interval before another
    /// sleep is attempted within the current invocation.
    pub static ref ECS_TASKS_POLL_GRACE: Duration = parse_duration(&ECS_TASKS_CONF["poll"]["grace"]).unwrap();

    /// Started-by marker used by direct invocations that do not supply one.
    pub static ref ECS_TASKS_DEFAULT_STARTED_BY: String = ECS_TASKS_CONF["ecs"]["default_started_by"].to_string();
    /// Stop reason prefix for tasks stopped on stack deletion.
    pub static ref ECS_TASKS_DELETE_REASON: String = ECS_TASKS_CONF["ecs"]["delete_reason"].to_string();

    /// Stack statuses under which a run on update is suppressed.
    pub static ref ECS_TASKS_ROLLBACK_STATES: Vec<String> = ECS_TASKS_CONF["cloudformation"]["rollback_states"]
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    /// Environment variable holding the log level.
    pub static ref ECS_TASKS_LOG_LEVEL_ENV: String = ECS_TASKS_CONF["lambda"]["log_level_env"].to_string();
    /// Log level used when the environment does not set one.
    pub static ref ECS_TASKS_DEFAULT_LOG_LEVEL: String = ECS_TASKS_CONF["lambda"]["default_log_level"].to_string();
    /// AWS Lambda function async invocation.
    pub static ref ECS_TASKS_ASYNC_CALL: String = ECS_TASKS_CONF["lambda"]["async_invocation"].to_string();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_settings() {
        assert_eq!(Duration::from_secs(5), *ECS_TASKS_POLL_GRACE);
        assert_eq!(
            vec!["ROLLBACK_IN_PROGRESS", "UPDATE_ROLLBACK_IN_PROGRESS"],
            *ECS_TASKS_ROLLBACK_STATES
        );
        assert_eq!("Delete requested for", ECS_TASKS_DELETE_REASON.as_str());
    }
}
