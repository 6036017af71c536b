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

//! Mutable bookkeeping for launched executors.
//!
//! Everything here is owned by the backend's single state lock; no field is
//! touched without it. The task/node association is a bijection maintained
//! as two hash maps mutated only in pairs.

use std::collections::{HashMap, HashSet};

use gravel_core::task::TaskId;

/// A node is ineligible for launches once it has accumulated this many
/// executor failures. The counter is never reset.
pub const MAX_NODE_FAILURES: u32 = 2;

#[derive(Default)]
pub(crate) struct BackendState {
    /// Cpus in use by each live task.
    cores_by_task_id: HashMap<TaskId, i32>,
    /// Running total of acquired cpus, always the sum of `cores_by_task_id`.
    total_cores_acquired: i32,
    /// Nodes that currently host an executor.
    nodes_with_executors: HashSet<String>,
    /// Hostname per node, recorded at launch and consumed at the first
    /// RUNNING status to register with the shuffle service.
    node_hosts: HashMap<String, String>,
    /// Bijection, forward direction.
    task_id_to_node_id: HashMap<TaskId, String>,
    /// Bijection, reverse direction.
    node_id_to_task_id: HashMap<String, TaskId>,
    /// Executor failures per node, monotonic.
    failures_by_node_id: HashMap<String, u32>,
    /// Cap on concurrently live executors, unbounded until the allocation
    /// controller first sets it.
    executor_limit: Option<usize>,
    /// Nodes whose executor we asked the resource manager to kill.
    pending_removed_node_ids: HashSet<String>,
    next_task_id: TaskId,
}

impl BackendState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints the next task id. Ids are monotonic and never reused.
    pub fn mint_task_id(&mut self) -> TaskId {
        let task_id = self.next_task_id;
        self.next_task_id += 1;
        task_id
    }

    pub fn total_cores_acquired(&self) -> i32 {
        self.total_cores_acquired
    }

    /// Number of live executors.
    pub fn executor_count(&self) -> usize {
        self.task_id_to_node_id.len()
    }

    /// Number of nodes still hosting an executor; the shutdown drain waits
    /// on this reaching zero.
    pub fn occupied_node_count(&self) -> usize {
        self.nodes_with_executors.len()
    }

    pub fn executor_limit(&self) -> usize {
        self.executor_limit.unwrap_or(usize::MAX)
    }

    pub fn set_executor_limit(&mut self, limit: usize) {
        self.executor_limit = Some(limit);
    }

    pub fn has_executor_on(&self, node_id: &str) -> bool {
        self.nodes_with_executors.contains(node_id)
    }

    pub fn is_blacklisted(&self, node_id: &str) -> bool {
        self.failures_by_node_id
            .get(node_id)
            .is_some_and(|failures| *failures >= MAX_NODE_FAILURES)
    }

    /// Records a freshly launched executor. The node must not already host
    /// one (single-executor-per-node rule).
    pub fn bind_task(
        &mut self,
        task_id: TaskId,
        node_id: &str,
        hostname: &str,
        cores: i32,
    ) {
        debug_assert!(
            !self.node_id_to_task_id.contains_key(node_id),
            "node {node_id} already hosts an executor"
        );
        self.task_id_to_node_id.insert(task_id, node_id.to_string());
        self.node_id_to_task_id.insert(node_id.to_string(), task_id);
        self.nodes_with_executors.insert(node_id.to_string());
        self.node_hosts.insert(node_id.to_string(), hostname.to_string());
        self.cores_by_task_id.insert(task_id, cores);
        self.total_cores_acquired += cores;
    }

    /// Releases the cpus recorded for a task. Idempotent.
    pub fn release_cores(&mut self, task_id: TaskId) {
        if let Some(cores) = self.cores_by_task_id.remove(&task_id) {
            self.total_cores_acquired -= cores;
        }
    }

    pub fn node_for_task(&self, task_id: TaskId) -> Option<&String> {
        self.task_id_to_node_id.get(&task_id)
    }

    pub fn task_for_node(&self, node_id: &str) -> Option<TaskId> {
        self.node_id_to_task_id.get(node_id).copied()
    }

    /// Removes the bijection entry for a node, returning the task that
    /// lived there.
    pub fn unbind_node(&mut self, node_id: &str) -> Option<TaskId> {
        let task_id = self.node_id_to_task_id.remove(node_id)?;
        self.task_id_to_node_id.remove(&task_id);
        Some(task_id)
    }

    /// Drops all remaining per-node tracking after executor teardown.
    pub fn forget_node(&mut self, node_id: &str) {
        self.pending_removed_node_ids.remove(node_id);
        self.nodes_with_executors.remove(node_id);
    }

    /// Consumes the hostname recorded at launch, so shuffle registration
    /// happens at most once per launch.
    pub fn take_node_host(&mut self, node_id: &str) -> Option<String> {
        self.node_hosts.remove(node_id)
    }

    /// Bumps the node's failure counter and returns the new count.
    pub fn record_failure(&mut self, node_id: &str) -> u32 {
        let failures = self.failures_by_node_id.entry(node_id.to_string()).or_insert(0);
        *failures += 1;
        *failures
    }

    pub fn mark_pending_removal(&mut self, node_id: &str) {
        self.pending_removed_node_ids.insert(node_id.to_string());
    }

    #[cfg(test)]
    pub fn is_pending_removal(&self, node_id: &str) -> bool {
        self.pending_removed_node_ids.contains(node_id)
    }

    /// Checks the bookkeeping invariants. Test support.
    #[cfg(test)]
    pub fn assert_invariants(&self, max_cores: i32) {
        assert_eq!(
            self.total_cores_acquired,
            self.cores_by_task_id.values().sum::<i32>(),
            "acquired cores must equal the sum over live tasks"
        );
        assert!(self.total_cores_acquired <= max_cores);
        assert_eq!(self.task_id_to_node_id.len(), self.node_id_to_task_id.len());
        for (task_id, node_id) in &self.task_id_to_node_id {
            assert_eq!(Some(*task_id), self.node_id_to_task_id.get(node_id).copied());
        }
        for node_id in self.task_id_to_node_id.values() {
            assert!(self.nodes_with_executors.contains(node_id));
        }
    }
}
