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

//! The normalized task request produced by property validation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A container and the environment keys watched on it when deciding whether
/// an update re-runs the task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateCriterion {
    /// Name of the container definition to watch.
    pub container:        String,
    /// Environment variables compared between revisions.
    pub environment_keys: Vec<String>,
}

/// A validated request to run a batch of tasks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskSpec {
    /// The cluster to launch on.
    pub cluster:         String,
    /// The task definition family, revision or ARN.
    pub task_definition: String,
    /// Number of copies for count-based launches. Ignored when `instances` is
    /// not empty.
    pub count:           u32,
    /// Container instances to launch onto, one task each.
    pub instances:       Vec<String>,
    /// Task overrides with every leaf value stringified.
    pub overrides:       Value,
    /// Tag attached at launch to find the tasks of this operation later.
    pub started_by:      String,
    /// Absolute timeout of the batch, in seconds.
    pub timeout:         u64,
    /// Seconds between two describe calls while polling.
    pub poll_interval:   u64,
    /// Re-run the task when the resource is updated.
    #[serde(default)]
    pub run_on_update:   bool,
    /// Also re-run while the stack rolls back.
    #[serde(default)]
    pub run_on_rollback: bool,
    /// Restricts update runs to changes of these values.
    #[serde(default)]
    pub update_criteria: Vec<UpdateCriterion>,
}

/// How the tasks of a batch are placed on the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Placement {
    /// One task on each of the given container instances.
    Instances(Vec<String>),
    /// The given number of copies placed by the ECS scheduler.
    Count(u32),
}

impl TaskSpec {
    /// Returns the placement for this request. An explicit instance list
    /// always overrides the count.
    pub fn placement(&self) -> Placement {
        if self.instances.is_empty() {
            Placement::Count(self.count)
        } else {
            Placement::Instances(self.instances.clone())
        }
    }

    /// Returns true if launching this request would start at least one task.
    pub fn runs_tasks(&self) -> bool {
        !self.instances.is_empty() || self.count > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instances_override_count() {
        let mut spec = TaskSpec {
            count: 3,
            ..Default::default()
        };
        assert_eq!(Placement::Count(3), spec.placement());

        spec.instances = vec!["i-0a1b2c".to_string()];
        assert_eq!(
            Placement::Instances(vec!["i-0a1b2c".to_string()]),
            spec.placement()
        );

        spec.count = 0;
        assert!(spec.runs_tasks());
        spec.instances.clear();
        assert!(!spec.runs_tasks());
    }
}
