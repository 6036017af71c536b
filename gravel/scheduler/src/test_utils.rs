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

//! Test doubles for backend testing: recording driver, host application and
//! shuffle client, plus offer and status builders.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use gravel_core::config::{GravelConfig, GRAVEL_TESTING};
use gravel_core::driver::ClusterDriver;
use gravel_core::error::{GravelError, Result};
use gravel_core::offer::{
    AttributeValue, Offer, OfferFilter, Resource, RESOURCE_CPUS, RESOURCE_MEM,
};
use gravel_core::task::{TaskId, TaskSpec, TaskState, TaskStatus};

use crate::upstream::{HostApplication, ShuffleServiceClient};

/// Builds a test configuration with `gravel.testing` preset.
pub fn test_config(settings: &[(&str, &str)]) -> GravelConfig {
    let mut builder = GravelConfig::builder().set(GRAVEL_TESTING, "true");
    for (key, value) in settings {
        builder = builder.set(key, value);
    }
    builder.build().expect("valid test configuration")
}

/// A launch recorded by [`MockClusterDriver`].
#[derive(Debug, Clone)]
pub struct RecordedLaunch {
    pub offer_id: String,
    pub task: TaskSpec,
    pub filter: OfferFilter,
}

/// Driver double recording every outbound command.
#[derive(Default)]
pub struct MockClusterDriver {
    pub started: AtomicBool,
    pub stopped: AtomicBool,
    pub launches: Mutex<Vec<RecordedLaunch>>,
    pub declines: Mutex<Vec<(String, Option<OfferFilter>)>>,
    pub kills: Mutex<Vec<TaskId>>,
    pub revive_count: AtomicUsize,
}

impl MockClusterDriver {
    pub fn launched_tasks(&self) -> Vec<RecordedLaunch> {
        self.launches.lock().clone()
    }

    pub fn declined_offer_ids(&self) -> Vec<String> {
        self.declines.lock().iter().map(|(id, _)| id.clone()).collect()
    }
}

impl ClusterDriver for MockClusterDriver {
    fn start(&self) {
        self.started.store(true, Ordering::SeqCst);
    }

    fn launch_tasks(&self, offer_id: &str, tasks: Vec<TaskSpec>, filter: OfferFilter) {
        let mut launches = self.launches.lock();
        for task in tasks {
            launches.push(RecordedLaunch {
                offer_id: offer_id.to_string(),
                task,
                filter,
            });
        }
    }

    fn decline_offer(&self, offer_id: &str, filter: Option<OfferFilter>) {
        self.declines.lock().push((offer_id.to_string(), filter));
    }

    fn kill_task(&self, task_id: TaskId) {
        self.kills.lock().push(task_id);
    }

    fn revive_offers(&self) {
        self.revive_count.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Host-application double with configurable overhead and environment.
pub struct MockHostApplication {
    pub overhead_mb: i32,
    pub min_registered_ratio: f64,
    pub environment: Vec<(String, String)>,
    pub registered: AtomicBool,
    pub stopped: AtomicBool,
    pub removed_executors: Mutex<Vec<(String, String)>>,
    pub fatal_errors: Mutex<Vec<String>>,
}

impl Default for MockHostApplication {
    fn default() -> Self {
        Self {
            overhead_mb: 384,
            min_registered_ratio: 0.0,
            environment: vec![],
            registered: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            removed_executors: Mutex::new(vec![]),
            fatal_errors: Mutex::new(vec![]),
        }
    }
}

impl MockHostApplication {
    pub fn with_overhead(overhead_mb: i32) -> Self {
        Self {
            overhead_mb,
            ..Default::default()
        }
    }

    pub fn with_environment(environment: Vec<(String, String)>) -> Self {
        Self {
            environment,
            ..Default::default()
        }
    }

    pub fn with_min_registered_ratio(min_registered_ratio: f64) -> Self {
        Self {
            min_registered_ratio,
            ..Default::default()
        }
    }

    pub fn removed(&self) -> Vec<(String, String)> {
        self.removed_executors.lock().clone()
    }
}

impl HostApplication for MockHostApplication {
    fn memory_overhead_mb(&self) -> i32 {
        self.overhead_mb
    }

    fn executor_environment(&self) -> Vec<(String, String)> {
        self.environment.clone()
    }

    fn driver_url(&self) -> String {
        "gravel://driver@localhost:7077".to_string()
    }

    fn min_registered_ratio(&self) -> f64 {
        self.min_registered_ratio
    }

    fn mark_registered(&self) {
        self.registered.store(true, Ordering::SeqCst);
    }

    fn remove_executor(&self, executor_id: &str, reason: &str) {
        self.removed_executors
            .lock()
            .push((executor_id.to_string(), reason.to_string()));
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn fatal_error(&self, message: &str) {
        self.fatal_errors.lock().push(message.to_string());
    }
}

/// Shuffle-service double recording registrations.
#[derive(Default)]
pub struct MockShuffleClient {
    pub fail_registrations: AtomicBool,
    pub initialized_with: Mutex<Vec<String>>,
    pub registrations: Mutex<Vec<(String, u16)>>,
}

impl ShuffleServiceClient for MockShuffleClient {
    fn initialize(&self, app_id: &str) {
        self.initialized_with.lock().push(app_id.to_string());
    }

    fn register_driver(&self, host: &str, port: u16) -> Result<()> {
        if self.fail_registrations.load(Ordering::SeqCst) {
            return Err(GravelError::General(format!(
                "connection refused: {host}:{port}"
            )));
        }
        self.registrations.lock().push((host.to_string(), port));
        Ok(())
    }
}

/// Builds an offer with the given scalar cpu and memory resources.
pub fn offer(id: &str, node_id: &str, hostname: &str, cpus: f64, mem: f64) -> Offer {
    offer_with_attributes(id, node_id, hostname, cpus, mem, HashMap::new())
}

pub fn offer_with_attributes(
    id: &str,
    node_id: &str,
    hostname: &str,
    cpus: f64,
    mem: f64,
    attributes: HashMap<String, AttributeValue>,
) -> Offer {
    Offer {
        id: id.to_string(),
        node_id: node_id.to_string(),
        hostname: hostname.to_string(),
        resources: vec![
            Resource::scalar(RESOURCE_CPUS, cpus),
            Resource::scalar(RESOURCE_MEM, mem),
        ],
        attributes,
    }
}

/// Builds a status update in the wire form the driver delivers.
pub fn status(task_id: TaskId, node_id: &str, state: TaskState) -> TaskStatus {
    TaskStatus {
        task_id: task_id.to_string(),
        node_id: Some(node_id.to_string()),
        state,
        message: String::new(),
    }
}
