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

//! The contract between the backend and the resource-manager driver library.
//!
//! The driver library owns the wire protocol and its own threads. Inbound,
//! it invokes [`SchedulerCallbacks`] on the registered callback sink from
//! one or more of those threads; outbound, the backend issues commands
//! through [`ClusterDriver`]. Both sides are `Send + Sync` trait objects so
//! either can be mocked.

use crate::offer::{Offer, OfferFilter};
use crate::task::{TaskId, TaskSpec, TaskStatus};

/// Outbound commands to the resource manager.
///
/// All methods are thread-safe, non-blocking enqueues per the driver library
/// contract; they may be called while the backend holds its state lock.
pub trait ClusterDriver: Send + Sync {
    /// Connects to the resource manager and begins delivering callbacks.
    fn start(&self);

    /// Launches tasks on an accepted offer, filtering re-offers of the
    /// leftover resources for `filter.refuse_seconds`.
    fn launch_tasks(&self, offer_id: &str, tasks: Vec<TaskSpec>, filter: OfferFilter);

    /// Declines an offer, optionally filtering re-offers for a while.
    fn decline_offer(&self, offer_id: &str, filter: Option<OfferFilter>);

    /// Asks the resource manager to kill a launched task. Completion is
    /// reported through a terminal status update.
    fn kill_task(&self, task_id: TaskId);

    /// Clears any decline filters so previously refused offers flow again.
    fn revive_offers(&self);

    /// Disconnects from the resource manager. No callbacks are delivered
    /// after this returns.
    fn stop(&self);
}

/// Inbound callbacks delivered by the driver library.
///
/// Implementations must tolerate invocation from multiple driver threads;
/// the backend serializes internally on one state lock.
pub trait SchedulerCallbacks: Send + Sync {
    /// The framework was registered under `framework_id`.
    fn registered(&self, framework_id: &str);

    /// The framework re-registered after a resource-manager failover.
    fn reregistered(&self);

    /// The driver lost its connection to the resource manager.
    fn disconnected(&self);

    /// A batch of resource offers. Every offer must be answered, either by
    /// launching on it or by declining it.
    fn resource_offers(&self, offers: Vec<Offer>);

    /// A previously delivered offer is no longer valid.
    fn offer_rescinded(&self, offer_id: &str);

    /// A launched task changed state.
    fn status_update(&self, status: TaskStatus);

    /// A node was lost wholesale, along with any executor on it.
    fn node_lost(&self, node_id: &str);

    /// A single executor process exited.
    fn executor_lost(&self, executor_id: &str, node_id: &str, exit_status: i32);

    /// An unrecoverable driver or resource-manager error.
    fn error(&self, message: &str);
}
