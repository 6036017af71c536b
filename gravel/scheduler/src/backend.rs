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

//! The coarse-grained scheduler backend.
//!
//! Offers arriving from the resource manager are matched against the
//! application's outstanding demand and answered with long-lived executor
//! launches; resources accepted here are held until application shutdown.
//! All callbacks serialize on one state lock, so each offer batch observes
//! the completed effects of every earlier status transition.

use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use parking_lot::Mutex;

use gravel_core::config::GravelConfig;
use gravel_core::driver::{ClusterDriver, SchedulerCallbacks};
use gravel_core::error::{GravelError, Result};
use gravel_core::offer::{Offer, OfferFilter, Resource, RESOURCE_CPUS, RESOURCE_MEM};
use gravel_core::task::{
    executor_id, parse_executor_id, TaskId, TaskSpec, TaskState, TaskStatus,
};

use crate::command::build_executor_command;
use crate::constraints::{matches_constraints, parse_constraints, Constraints};
use crate::sizing::{size_executor, ExecutorSizing};
use crate::state::{BackendState, MAX_NODE_FAILURES};
use crate::upstream::{HostApplication, ShuffleServiceClient};

/// Resources left on an accepted offer are not re-offered for this long.
const LAUNCH_REFUSE_SECONDS: f64 = 5.0;
/// Poll interval of the shutdown drain loop.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Why an offer was declined. Admission is all-or-nothing; the first failed
/// predicate wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeclineReason {
    ExecutorLimitReached,
    CoreBudgetExhausted,
    ConstraintsUnsatisfied,
    InsufficientResources,
    NodeBlacklisted,
    NodeOccupied,
}

impl Display for DeclineReason {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let reason = match self {
            DeclineReason::ExecutorLimitReached => "executor limit reached",
            DeclineReason::CoreBudgetExhausted => "core budget exhausted",
            DeclineReason::ConstraintsUnsatisfied => "constraints unsatisfied",
            DeclineReason::InsufficientResources => "insufficient resources",
            DeclineReason::NodeBlacklisted => "node is blacklisted",
            DeclineReason::NodeOccupied => "node already hosts an executor",
        };
        write!(f, "{reason}")
    }
}

/// Couples the hosting application to the resource manager, holding
/// acquired resources for the whole application lifetime.
///
/// The backend runs no threads of its own: the driver library calls the
/// [`SchedulerCallbacks`] methods from its threads, the allocation
/// controller calls [`request_total_executors`](Self::request_total_executors)
/// and [`kill_executors`](Self::kill_executors) from its own, and
/// [`start`](Self::start) / [`stop`](Self::stop) come from the application
/// main thread.
pub struct CoarseSchedulerBackend {
    config: GravelConfig,
    host: Arc<dyn HostApplication>,
    shuffle: Option<Arc<dyn ShuffleServiceClient>>,
    constraints: Constraints,
    driver: OnceLock<Arc<dyn ClusterDriver>>,
    app_id: OnceLock<String>,
    stop_called: AtomicBool,
    state: Mutex<BackendState>,
}

impl CoarseSchedulerBackend {
    /// Creates the backend, validating everything a launch will later need.
    pub fn new(
        config: GravelConfig,
        host: Arc<dyn HostApplication>,
        shuffle: Option<Arc<dyn ShuffleServiceClient>>,
    ) -> Result<Self> {
        let constraints = parse_constraints(&config.constraints())?;
        if config.executor_uri().is_none() && config.executor_home().is_none() {
            return Err(GravelError::Configuration(format!(
                "'{}' must be set when no executor URI is configured",
                gravel_core::config::GRAVEL_EXECUTOR_HOME
            )));
        }
        if !config.testing()
            && (config.driver_host().is_none() || config.driver_port().is_none())
        {
            return Err(GravelError::Configuration(format!(
                "'{}' and '{}' must be set",
                gravel_core::config::GRAVEL_DRIVER_HOST,
                gravel_core::config::GRAVEL_DRIVER_PORT
            )));
        }
        if config.shuffle_service_enabled() && shuffle.is_none() {
            return Err(GravelError::Configuration(
                "shuffle service is enabled but no shuffle client was provided"
                    .to_string(),
            ));
        }
        Ok(Self {
            config,
            host,
            shuffle,
            constraints,
            driver: OnceLock::new(),
            app_id: OnceLock::new(),
            stop_called: AtomicBool::new(false),
            state: Mutex::new(BackendState::new()),
        })
    }

    /// Adopts the driver as the outbound channel and starts it. The host
    /// must have registered this backend as the driver's callback sink.
    pub fn start(&self, driver: Arc<dyn ClusterDriver>) -> Result<()> {
        self.driver
            .set(driver.clone())
            .map_err(|_| GravelError::Internal("backend already started".to_string()))?;
        info!("Starting the coarse-grained scheduler backend");
        driver.start();
        Ok(())
    }

    /// Stops the backend: no further launches, upstream stop, then a drain
    /// bounded by the configured shutdown timeout, then driver stop.
    /// Idempotent; concurrent duplicates return immediately.
    pub fn stop(&self) {
        if self
            .stop_called
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Ignoring duplicate stop");
            return;
        }
        info!("Stopping the coarse-grained scheduler backend");
        {
            let _state = self.state.lock();
            self.host.stop();
        }

        // Wait for executors to report terminal states so their shutdown is
        // observed before the driver goes away. Sleeps happen without the
        // lock so status updates can drain the set.
        let timeout = Duration::from_millis(self.config.shutdown_timeout_ms());
        let started = Instant::now();
        loop {
            let remaining = self.state.lock().occupied_node_count();
            if remaining == 0 {
                break;
            }
            if started.elapsed() >= timeout {
                warn!(
                    "Timed out waiting for {remaining} executor(s) to terminate within {}ms",
                    timeout.as_millis()
                );
                break;
            }
            thread::sleep(DRAIN_POLL_INTERVAL);
        }

        if let Some(driver) = self.driver() {
            driver.stop();
        }
    }

    /// The framework id assigned at registration, if registered yet.
    pub fn application_id(&self) -> Option<&str> {
        self.app_id.get().map(String::as_str)
    }

    /// Whether enough of the core budget has been acquired for the
    /// application to start scheduling work.
    pub fn sufficient_resources_registered(&self) -> bool {
        let acquired = self.state.lock().total_cores_acquired();
        acquired as f64 >= self.config.max_cores() as f64 * self.host.min_registered_ratio()
    }

    /// Caps the number of concurrently live executors. Enforcement happens
    /// on future offers; running executors are not reclaimed here.
    pub fn request_total_executors(&self, total: usize) -> bool {
        info!("Capping executors at {total}");
        self.state.lock().set_executor_limit(total);
        true
    }

    /// Asks the resource manager to kill the given executors, identified by
    /// their composite `"<node_id>/<task_id>"` ids. Teardown completes when
    /// the matching terminal status updates arrive. Returns false when no
    /// requested executor could be killed.
    pub fn kill_executors(&self, executor_ids: &[String]) -> bool {
        let Some(driver) = self.driver() else {
            warn!("Asked to kill executors before the driver was started");
            return false;
        };
        let mut state = self.state.lock();
        let mut killed = 0;
        for id in executor_ids {
            let Some((node_id, _)) = parse_executor_id(id) else {
                warn!("Ignoring malformed executor id {id}");
                continue;
            };
            match state.task_for_node(node_id) {
                Some(task_id) => {
                    info!("Killing executor {id} (task {task_id})");
                    driver.kill_task(task_id);
                    state.mark_pending_removal(node_id);
                    killed += 1;
                }
                None => {
                    warn!("Asked to kill executor {id} but node {node_id} has no live executor")
                }
            }
        }
        killed > 0
    }

    fn driver(&self) -> Option<&Arc<dyn ClusterDriver>> {
        self.driver.get()
    }

    /// Evaluates the admission predicate for one offer.
    fn evaluate_offer(
        &self,
        state: &BackendState,
        offer: &Offer,
    ) -> std::result::Result<ExecutorSizing, DeclineReason> {
        if state.executor_count() >= state.executor_limit() {
            return Err(DeclineReason::ExecutorLimitReached);
        }
        let remaining_cores = self.config.max_cores() - state.total_cores_acquired();
        if remaining_cores <= 0 {
            return Err(DeclineReason::CoreBudgetExhausted);
        }
        if !matches_constraints(&self.constraints, &offer.attributes) {
            return Err(DeclineReason::ConstraintsUnsatisfied);
        }
        let available_cpus =
            (offer.scalar_resource(RESOURCE_CPUS) as i32).min(remaining_cores);
        let available_mem = offer.scalar_resource(RESOURCE_MEM) as i32;
        let sizing = size_executor(
            available_cpus,
            available_mem,
            self.host.memory_overhead_mb(),
            self.config.min_mb_per_core(),
            self.config.max_mb_per_core(),
        )
        .ok_or(DeclineReason::InsufficientResources)?;
        if state.is_blacklisted(&offer.node_id) {
            return Err(DeclineReason::NodeBlacklisted);
        }
        if state.has_executor_on(&offer.node_id) {
            return Err(DeclineReason::NodeOccupied);
        }
        Ok(sizing)
    }

    fn launch_on_offer(
        &self,
        state: &mut BackendState,
        driver: &Arc<dyn ClusterDriver>,
        offer: &Offer,
        sizing: ExecutorSizing,
    ) {
        let task_id = state.mint_task_id();
        let app_id = self.application_id().unwrap_or_default();
        let command = match build_executor_command(
            &self.config,
            self.host.as_ref(),
            app_id,
            &offer.hostname,
            &offer.node_id,
            task_id,
            sizing.cpus,
            sizing.heap_mb,
        ) {
            Ok(command) => command,
            Err(e) => {
                // Validated at construction, so this is unreachable in
                // practice; decline rather than poison the callback.
                error!("Fail to build executor command due to {e}");
                driver.decline_offer(&offer.id, None);
                return;
            }
        };

        state.bind_task(task_id, &offer.node_id, &offer.hostname, sizing.cpus);

        // The advertised cpu share exceeds the cpus the executor was sized
        // for by the configured extra cores (oversubscription).
        let advertised_cpus = sizing.cpus + self.config.extra_cores_per_node();
        let task = TaskSpec {
            task_id,
            name: format!("gravel-executor-{task_id}"),
            node_id: offer.node_id.clone(),
            resources: vec![
                Resource::scalar(RESOURCE_CPUS, advertised_cpus as f64),
                Resource::scalar(RESOURCE_MEM, sizing.total_mem_mb as f64),
            ],
            command,
        };
        info!(
            "Launching executor {} on host {} with {} cpus ({} advertised) and {} MB",
            executor_id(&offer.node_id, task_id),
            offer.hostname,
            sizing.cpus,
            advertised_cpus,
            sizing.total_mem_mb
        );
        driver.launch_tasks(
            &offer.id,
            vec![task],
            OfferFilter::refuse_for_seconds(LAUNCH_REFUSE_SECONDS),
        );
    }

    /// Tears down the executor on a node, if any. Idempotent; callers hold
    /// the state lock.
    fn executor_terminated(
        &self,
        state: &mut BackendState,
        node_id: &str,
        reason: &str,
    ) {
        if !state.has_executor_on(node_id) {
            return;
        }
        if let Some(task_id) = state.unbind_node(node_id) {
            state.release_cores(task_id);
            let executor_id = executor_id(node_id, task_id);
            info!("Removing executor {executor_id}: {reason}");
            self.host.remove_executor(&executor_id, reason);
        }
        state.forget_node(node_id);
    }
}

impl SchedulerCallbacks for CoarseSchedulerBackend {
    fn registered(&self, framework_id: &str) {
        info!("Registered as framework {framework_id}");
        if self.app_id.set(framework_id.to_string()).is_err() {
            debug!("Framework id already recorded");
        }
        if self.config.shuffle_service_enabled() {
            if let Some(shuffle) = &self.shuffle {
                shuffle.initialize(framework_id);
            }
        }
        self.host.mark_registered();
    }

    fn reregistered(&self) {
        // TODO: reconcile task state with the resource manager after a
        // master failover instead of trusting our own bookkeeping.
        info!("Re-registered with the resource manager");
    }

    fn disconnected(&self) {
        info!("Disconnected from the resource manager");
    }

    fn resource_offers(&self, offers: Vec<Offer>) {
        let Some(driver) = self.driver() else {
            warn!("Dropping {} offer(s) received before start", offers.len());
            return;
        };
        if self.stop_called.load(Ordering::SeqCst) {
            debug!("Declining {} offer(s) received after stop", offers.len());
            for offer in &offers {
                driver.decline_offer(&offer.id, None);
            }
            return;
        }

        let mut state = self.state.lock();
        for offer in offers {
            match self.evaluate_offer(&state, &offer) {
                Ok(sizing) => {
                    self.launch_on_offer(&mut state, driver, &offer, sizing)
                }
                Err(reason) => {
                    debug!(
                        "Declining offer {} from node {}: {reason}",
                        offer.id, offer.node_id
                    );
                    driver.decline_offer(&offer.id, None);
                }
            }
        }
    }

    fn offer_rescinded(&self, offer_id: &str) {
        debug!("Offer {offer_id} rescinded");
    }

    fn status_update(&self, status: TaskStatus) {
        let Some(driver) = self.driver() else {
            warn!("Dropping status update received before start");
            return;
        };
        let task_id: TaskId = match status.task_id.parse() {
            Ok(task_id) => task_id,
            Err(_) => {
                warn!("Ignoring status update with unparseable task id '{}'", status.task_id);
                return;
            }
        };
        info!("Task {task_id} is now {}", status.state);

        let mut state = self.state.lock();

        // First RUNNING for a launch: hand the node's shuffle service our
        // application so it can clean up when the driver exits. Consuming
        // the recorded hostname makes the registration at-most-once.
        if status.state == TaskState::Running && self.config.shuffle_service_enabled() {
            if let Some(node_id) = status.node_id.as_deref() {
                if let Some(hostname) = state.take_node_host(node_id) {
                    let port = self.config.shuffle_service_port();
                    debug!("Connecting to shuffle service on {hostname}:{port}");
                    if let Some(shuffle) = &self.shuffle {
                        if let Err(e) = shuffle.register_driver(&hostname, port) {
                            error!(
                                "Fail to register with shuffle service on {hostname}:{port} due to {e}"
                            );
                        }
                    }
                }
            }
        }

        if status.state.is_terminal() {
            // Our bookkeeping is authoritative for the node; the reported
            // node id may be absent or stale.
            let node_id = state.node_for_task(task_id).cloned();
            state.release_cores(task_id);
            match node_id {
                Some(node_id) => {
                    if status.state.is_failure() {
                        let failures = state.record_failure(&node_id);
                        if failures == MAX_NODE_FAILURES {
                            info!(
                                "Blacklisting node {node_id} after {failures} executor failures; \
                                 is gravel installed on it?"
                            );
                        }
                    }
                    self.executor_terminated(
                        &mut state,
                        &node_id,
                        &format!("Executor finished with state {}", status.state),
                    );
                    // Capacity freed: a previously declined offer may fit now.
                    driver.revive_offers();
                }
                None => debug!("Ignoring terminal update for unknown task {task_id}"),
            }
        }
    }

    fn node_lost(&self, node_id: &str) {
        info!("Node {node_id} lost");
        let mut state = self.state.lock();
        self.executor_terminated(&mut state, node_id, "node lost");
    }

    fn executor_lost(&self, executor_id: &str, node_id: &str, exit_status: i32) {
        info!("Executor {executor_id} on node {node_id} exited with status {exit_status}");
        // A lost executor means we lose everything the node hosted.
        self.node_lost(node_id);
    }

    fn error(&self, message: &str) {
        error!("Resource manager error: {message}");
        self.host.fatal_error(message);
    }
}
