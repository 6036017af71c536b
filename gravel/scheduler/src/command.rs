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

//! Assembly of the executor launch command.

use gravel_core::config::GravelConfig;
use gravel_core::error::{GravelError, Result};
use gravel_core::task::{executor_id, CommandSpec, TaskId};

use crate::upstream::HostApplication;

/// Name of the executor launcher shipped in `bin/` of every gravel
/// installation and distribution archive.
pub const EXECUTOR_LAUNCHER: &str = "gravel-executor";

/// Builds the launch command for one executor.
///
/// Without an executor URI the launcher is invoked from the configured
/// installation directory and identifies itself by node id alone. With a
/// URI, the distribution is fetched into the sandbox, the launcher runs
/// relative to the unpacked directory, and the executor identifies itself
/// with the composite `"<node_id>/<task_id>"` id.
pub(crate) fn build_executor_command(
    config: &GravelConfig,
    host: &dyn HostApplication,
    app_id: &str,
    hostname: &str,
    node_id: &str,
    task_id: TaskId,
    cpus: i32,
    heap_mb: i32,
) -> Result<CommandSpec> {
    let mut environment = vec![
        ("EXECUTOR_OPTS".to_string(), config.executor_extra_java_options()),
        ("EXECUTOR_MEMORY".to_string(), format!("{heap_mb}M")),
    ];
    environment.extend(host.executor_environment());
    if let Some(classpath) = config.executor_extra_classpath() {
        environment.push(("CLASSPATH".to_string(), classpath));
    }

    // Native library paths cannot go through the environment map: the
    // launcher must see them before it execs, so they prefix the command.
    let prefix = config
        .executor_extra_library_path()
        .map(|path| format!("LD_LIBRARY_PATH=\"{path}:$LD_LIBRARY_PATH\" "))
        .unwrap_or_default();

    let mut uris = Vec::new();
    let shell_command = match config.executor_uri() {
        None => {
            let executor_home = config.executor_home().ok_or_else(|| {
                GravelError::Configuration(format!(
                    "'{}' must be set when no executor URI is configured",
                    gravel_core::config::GRAVEL_EXECUTOR_HOME
                ))
            })?;
            format!(
                "{prefix}{executor_home}/bin/{EXECUTOR_LAUNCHER} {}",
                launcher_flags(host, node_id, hostname, cpus, app_id)
            )
        }
        Some(uri) => {
            let basename = distribution_basename(&uri).to_string();
            uris.push(uri);
            format!(
                "cd {basename}*; {prefix}./bin/{EXECUTOR_LAUNCHER} {}",
                launcher_flags(
                    host,
                    &executor_id(node_id, task_id),
                    hostname,
                    cpus,
                    app_id
                )
            )
        }
    };
    uris.extend(config.extra_uris());

    Ok(CommandSpec {
        environment,
        uris,
        shell_command,
        container_image: config.container_image(),
    })
}

fn launcher_flags(
    host: &dyn HostApplication,
    executor_id: &str,
    hostname: &str,
    cpus: i32,
    app_id: &str,
) -> String {
    format!(
        "--driver-url {} --executor-id {} --hostname {} --cores {} --app-id {}",
        host.driver_url(),
        executor_id,
        hostname,
        cpus,
        app_id
    )
}

/// First segment of the archive's filename, before the first `.`; the
/// fetcher unpacks the archive into a directory starting with it.
fn distribution_basename(uri: &str) -> &str {
    let filename = uri.rsplit('/').next().unwrap_or(uri);
    filename.split('.').next().unwrap_or(filename)
}
