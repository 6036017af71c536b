// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Executor tasks: status transitions and launch specifications.

use std::fmt::{Display, Formatter};

use crate::offer::Resource;

/// Identifier of a launched executor task. Minted monotonically by the
/// backend and never reused for the lifetime of the process.
pub type TaskId = u64;

/// Builds the externally visible executor id, `"<node_id>/<task_id>"`.
pub fn executor_id(node_id: &str, task_id: TaskId) -> String {
    format!("{node_id}/{task_id}")
}

/// Splits an executor id back into `(node_id, task_id)` on the FIRST `/`,
/// so node ids containing slashes round-trip.
pub fn parse_executor_id(executor_id: &str) -> Option<(&str, &str)> {
    executor_id.split_once('/')
}

/// Task state as reported by the resource manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Starting,
    Running,
    Finished,
    Failed,
    Killed,
    Lost,
    Error,
}

impl TaskState {
    /// Whether the task has reached a terminal state and its resources are
    /// released.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Finished
                | TaskState::Failed
                | TaskState::Killed
                | TaskState::Lost
                | TaskState::Error
        )
    }

    /// Whether the terminal state counts against the node's failure budget.
    /// Finished and Killed do not: those are expected exits.
    pub fn is_failure(&self) -> bool {
        matches!(self, TaskState::Failed | TaskState::Lost | TaskState::Error)
    }
}

impl Display for TaskState {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let name = match self {
            TaskState::Starting => "STARTING",
            TaskState::Running => "RUNNING",
            TaskState::Finished => "FINISHED",
            TaskState::Failed => "FAILED",
            TaskState::Killed => "KILLED",
            TaskState::Lost => "LOST",
            TaskState::Error => "ERROR",
        };
        write!(f, "{name}")
    }
}

/// A status transition for a launched task, delivered by the driver.
#[derive(Debug, Clone)]
pub struct TaskStatus {
    /// The task id as the resource manager carries it, stringly typed on the
    /// wire.
    pub task_id: String,
    /// Node the task runs on. May be absent on some transitions; the
    /// backend's own bookkeeping is authoritative.
    pub node_id: Option<String>,
    pub state: TaskState,
    pub message: String,
}

/// The launch command for one executor process.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandSpec {
    /// Environment bindings visible to the executor.
    pub environment: Vec<(String, String)>,
    /// URIs fetched into the sandbox before launch.
    pub uris: Vec<String>,
    /// Shell command line starting the executor.
    pub shell_command: String,
    /// Container image to run in, if any.
    pub container_image: Option<String>,
}

/// Everything the driver needs to launch one executor on an accepted offer.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub task_id: TaskId,
    pub name: String,
    pub node_id: String,
    /// Resources taken from the offer. The cpu share here may exceed the
    /// cpus the executor was sized for (oversubscription).
    pub resources: Vec<Resource>,
    pub command: CommandSpec,
}
