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

//! Capabilities the backend requires from the hosting application.

use gravel_core::error::Result;

/// Bridge to the hosting application's own scheduler layer.
///
/// Methods may be invoked while the backend holds its state lock, so
/// implementations must not call back into the backend and must take their
/// own locks, if any, strictly after the backend's.
pub trait HostApplication: Send + Sync {
    /// Memory set aside per executor beyond the heap, in MB.
    fn memory_overhead_mb(&self) -> i32;

    /// Environment bindings every executor should see.
    fn executor_environment(&self) -> Vec<(String, String)>;

    /// URL executors connect back to.
    fn driver_url(&self) -> String;

    /// Fraction of `max_cores` that must be acquired before the application
    /// considers its resources sufficient, in `[0, 1]`.
    fn min_registered_ratio(&self) -> f64;

    /// The framework registration completed.
    fn mark_registered(&self);

    /// An executor is gone. `executor_id` is the composite
    /// `"<node_id>/<task_id>"` form; called exactly once per launched task.
    fn remove_executor(&self, executor_id: &str, reason: &str);

    /// The backend is shutting down; stop dispatching work to executors.
    fn stop(&self);

    /// An unrecoverable resource-manager error; the application should tear
    /// itself down.
    fn fatal_error(&self, message: &str);
}

/// Client for the external shuffle service running on every node.
pub trait ShuffleServiceClient: Send + Sync {
    /// Ties subsequent registrations to the given application id. Called
    /// once, at framework registration.
    fn initialize(&self, app_id: &str);

    /// Registers the application with the shuffle service on one node so it
    /// can clean up the application's state when the driver exits.
    ///
    /// Called synchronously under the backend's state lock; implementations
    /// must bound the call.
    fn register_driver(&self, host: &str, port: u16) -> Result<()>;
}
