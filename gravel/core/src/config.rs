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

//! Gravel configuration

use std::collections::HashMap;
use std::result;

use crate::error::{GravelError, Result};

/// Cap on total cpus acquired across all executors.
pub const GRAVEL_CORES_MAX: &str = "gravel.cores.max";
/// Lower bound on executor heap memory per core, in MB.
pub const GRAVEL_CORES_MB_MIN: &str = "gravel.cores.mb.min";
/// Upper bound on executor heap memory per core, in MB.
pub const GRAVEL_CORES_MB_MAX: &str = "gravel.cores.mb.max";
/// How long `stop` waits for launched executors to terminate, in milliseconds.
pub const GRAVEL_COARSE_SHUTDOWN_MS: &str = "gravel.coarse.shutdown.ms";
/// Extra cpus advertised to the resource manager on top of the cpus sized
/// for the executor (deliberate oversubscription).
pub const GRAVEL_COARSE_EXTRA_CORES: &str = "gravel.coarse.extra.cores";
/// Offer attribute constraints, e.g. `"zone:us-east-1a,us-east-1b;os:centos7"`.
pub const GRAVEL_COARSE_CONSTRAINTS: &str = "gravel.coarse.constraints";
/// Additional URIs to fetch into the executor sandbox, comma separated.
pub const GRAVEL_COARSE_URIS: &str = "gravel.coarse.uris";
/// Whether executors register with an external shuffle service on startup.
pub const GRAVEL_SHUFFLE_SERVICE_ENABLED: &str = "gravel.shuffle.service.enabled";
/// Port of the external shuffle service on every node.
pub const GRAVEL_SHUFFLE_SERVICE_PORT: &str = "gravel.shuffle.service.port";
/// Installation directory of gravel on the nodes, used when no executor URI
/// is configured.
pub const GRAVEL_EXECUTOR_HOME: &str = "gravel.executor.home";
/// URI of a gravel distribution to fetch into the executor sandbox.
pub const GRAVEL_EXECUTOR_URI: &str = "gravel.executor.uri";
/// Extra entries for the executor CLASSPATH.
pub const GRAVEL_EXECUTOR_EXTRA_CLASSPATH: &str = "gravel.executor.extraClassPath";
/// Extra JVM options passed to the executor as EXECUTOR_OPTS.
pub const GRAVEL_EXECUTOR_EXTRA_JAVA_OPTIONS: &str = "gravel.executor.extraJavaOptions";
/// Extra native library path prepended to the executor launch command.
pub const GRAVEL_EXECUTOR_EXTRA_LIBRARY_PATH: &str =
    "gravel.executor.extraLibraryPath";
/// Container image to launch executors in, if any.
pub const GRAVEL_EXECUTOR_CONTAINER_IMAGE: &str = "gravel.executor.container.image";
/// Host the application driver listens on, advertised to executors.
pub const GRAVEL_DRIVER_HOST: &str = "gravel.driver.host";
/// Port the application driver listens on. Zero means unset.
pub const GRAVEL_DRIVER_PORT: &str = "gravel.driver.port";
/// Relaxes start-up validation for in-process tests.
pub const GRAVEL_TESTING: &str = "gravel.testing";

pub type ParseResult<T> = result::Result<T, String>;

/// Data type tag for a configuration entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigDataType {
    /// Non-negative integer.
    UInt,
    /// Floating point number; `inf` is accepted.
    Float,
    Boolean,
    Utf8,
}

/// Configuration option meta-data
#[derive(Debug, Clone)]
pub struct ConfigEntry {
    name: String,
    _description: String,
    data_type: ConfigDataType,
    default_value: Option<String>,
}

impl ConfigEntry {
    fn new(
        name: String,
        description: String,
        data_type: ConfigDataType,
        default_value: Option<String>,
    ) -> Self {
        Self {
            name,
            _description: description,
            data_type,
            default_value,
        }
    }
}

/// Configuration with values in a valid String format
#[derive(Debug, Clone)]
struct ValidConfiguration {
    settings: HashMap<String, String>,
    valid_entries: HashMap<String, ConfigEntry>,
}

impl ValidConfiguration {
    // When constructing a ValidConfiguration, necessary validation check will be done
    fn new(
        settings: HashMap<String, String>,
        valid_entries: Vec<ConfigEntry>,
    ) -> Result<Self> {
        let valid_entries = valid_entries
            .into_iter()
            .map(|e| (e.name.clone(), e))
            .collect::<HashMap<_, _>>();

        // Firstly, check whether the entries in settings are valid or not
        for (name, _) in settings.iter() {
            if valid_entries.get(name).is_none() {
                return Err(GravelError::Configuration(format!(
                    "The configuration setting '{name}' is not valid"
                )));
            }
        }

        // Secondly, check each entry in the valid_entries:
        // if its value is specified in settings, then check whether it's valid to
        // be parsed to the related data type, else do the same check on its
        // default value. Entries without a default are optional and only
        // validated when set.
        for (name, entry) in valid_entries.iter() {
            if let Some(v) = settings.get(&entry.name) {
                Self::parse_value(v.as_str(), entry.data_type).map_err(|e| {
                    GravelError::Configuration(format!(
                        "Failed to parse user-supplied value '{v}' for configuration setting '{name}': {e}"
                    ))
                })?;
            } else if let Some(v) = entry.default_value.clone() {
                Self::parse_value(v.as_str(), entry.data_type).map_err(|e| {
                    GravelError::Configuration(format!(
                        "Failed to parse default value '{v}' for configuration setting '{name}': {e}"
                    ))
                })?;
            }
        }

        Ok(Self {
            settings,
            valid_entries,
        })
    }

    fn raw_setting(&self, key: &str) -> Option<&String> {
        self.settings
            .get(key)
            .or_else(|| self.valid_entries.get(key)?.default_value.as_ref())
    }

    fn get_usize_setting(&self, key: &str) -> usize {
        // infallible because we validate all configs in the constructor
        self.raw_setting(key).unwrap().parse().unwrap()
    }

    fn get_f64_setting(&self, key: &str) -> f64 {
        // infallible because we validate all configs in the constructor
        self.raw_setting(key).unwrap().parse().unwrap()
    }

    fn get_bool_setting(&self, key: &str) -> bool {
        // infallible because we validate all configs in the constructor
        self.raw_setting(key).unwrap().parse().unwrap()
    }

    fn get_string_setting(&self, key: &str) -> String {
        // infallible because we validate all configs in the constructor
        self.raw_setting(key).unwrap().to_string()
    }

    fn get_optional_setting(&self, key: &str) -> Option<String> {
        self.raw_setting(key)
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
    }

    /// Error when the value is not able to parsed to the data type
    fn parse_value(val: &str, data_type: ConfigDataType) -> ParseResult<()> {
        match data_type {
            ConfigDataType::UInt => {
                val.parse::<u64>().map_err(|e| format!("{e:?}"))?;
            }
            ConfigDataType::Float => {
                val.parse::<f64>().map_err(|e| format!("{e:?}"))?;
            }
            ConfigDataType::Boolean => {
                val.parse::<bool>().map_err(|e| format!("{e:?}"))?;
            }
            ConfigDataType::Utf8 => {}
        }

        Ok(())
    }
}

/// Gravel configuration builder
#[derive(Default)]
pub struct GravelConfigBuilder {
    settings: HashMap<String, String>,
}

impl GravelConfigBuilder {
    /// Create a new configuration based on key-value pairs
    pub fn with_settings(settings: HashMap<String, String>) -> Self {
        Self { settings }
    }

    /// Create a new config with an additional setting
    pub fn set(&self, k: &str, v: &str) -> Self {
        let mut settings = self.settings.clone();
        settings.insert(k.to_owned(), v.to_owned());
        Self { settings }
    }

    pub fn build(&self) -> Result<GravelConfig> {
        ValidConfiguration::new(self.settings.clone(), GravelConfig::valid_entries())
            .map(|valid_config| GravelConfig { valid_config })
    }
}

/// Gravel configuration, frozen before the backend starts.
#[derive(Debug, Clone)]
pub struct GravelConfig {
    valid_config: ValidConfiguration,
}

impl GravelConfig {
    /// Create a configuration builder
    pub fn builder() -> GravelConfigBuilder {
        GravelConfigBuilder::default()
    }

    /// Create a default configuration
    pub fn new() -> Result<Self> {
        Self::with_settings(HashMap::new())
    }

    /// Create a new configuration based on key-value pairs
    pub fn with_settings(settings: HashMap<String, String>) -> Result<Self> {
        GravelConfigBuilder::with_settings(settings).build()
    }

    /// All available configuration options
    pub fn valid_entries() -> Vec<ConfigEntry> {
        vec![
            ConfigEntry::new(GRAVEL_CORES_MAX.to_string(),
                             "Cap on the total number of cpus acquired across all executors".to_string(),
                             ConfigDataType::UInt, Some(i32::MAX.to_string())),
            ConfigEntry::new(GRAVEL_CORES_MB_MIN.to_string(),
                             "Lower bound on executor heap memory per core in MB".to_string(),
                             ConfigDataType::Float, Some("0.0".to_string())),
            ConfigEntry::new(GRAVEL_CORES_MB_MAX.to_string(),
                             "Upper bound on executor heap memory per core in MB".to_string(),
                             ConfigDataType::Float, Some("inf".to_string())),
            ConfigEntry::new(GRAVEL_COARSE_SHUTDOWN_MS.to_string(),
                             "How long stop waits for executors to terminate, in milliseconds".to_string(),
                             ConfigDataType::UInt, Some("10000".to_string())),
            ConfigEntry::new(GRAVEL_COARSE_EXTRA_CORES.to_string(),
                             "Extra cpus advertised per executor beyond the cpus it uses".to_string(),
                             ConfigDataType::UInt, Some("0".to_string())),
            ConfigEntry::new(GRAVEL_COARSE_CONSTRAINTS.to_string(),
                             "Offer attribute constraints required for executor placement".to_string(),
                             ConfigDataType::Utf8, Some("".to_string())),
            ConfigEntry::new(GRAVEL_COARSE_URIS.to_string(),
                             "Additional URIs fetched into the executor sandbox, comma separated".to_string(),
                             ConfigDataType::Utf8, Some("".to_string())),
            ConfigEntry::new(GRAVEL_SHUFFLE_SERVICE_ENABLED.to_string(),
                             "Whether to register executors with an external shuffle service".to_string(),
                             ConfigDataType::Boolean, Some("false".to_string())),
            ConfigEntry::new(GRAVEL_SHUFFLE_SERVICE_PORT.to_string(),
                             "Port of the external shuffle service on every node".to_string(),
                             ConfigDataType::UInt, Some("7337".to_string())),
            ConfigEntry::new(GRAVEL_EXECUTOR_HOME.to_string(),
                             "Installation directory of gravel on the nodes".to_string(),
                             ConfigDataType::Utf8, None),
            ConfigEntry::new(GRAVEL_EXECUTOR_URI.to_string(),
                             "URI of a gravel distribution to fetch into the executor sandbox".to_string(),
                             ConfigDataType::Utf8, None),
            ConfigEntry::new(GRAVEL_EXECUTOR_EXTRA_CLASSPATH.to_string(),
                             "Extra entries for the executor CLASSPATH".to_string(),
                             ConfigDataType::Utf8, None),
            ConfigEntry::new(GRAVEL_EXECUTOR_EXTRA_JAVA_OPTIONS.to_string(),
                             "Extra JVM options passed to the executor".to_string(),
                             ConfigDataType::Utf8, Some("".to_string())),
            ConfigEntry::new(GRAVEL_EXECUTOR_EXTRA_LIBRARY_PATH.to_string(),
                             "Extra native library path for the executor".to_string(),
                             ConfigDataType::Utf8, None),
            ConfigEntry::new(GRAVEL_EXECUTOR_CONTAINER_IMAGE.to_string(),
                             "Container image to launch executors in".to_string(),
                             ConfigDataType::Utf8, None),
            ConfigEntry::new(GRAVEL_DRIVER_HOST.to_string(),
                             "Host the application driver listens on".to_string(),
                             ConfigDataType::Utf8, None),
            ConfigEntry::new(GRAVEL_DRIVER_PORT.to_string(),
                             "Port the application driver listens on, zero means unset".to_string(),
                             ConfigDataType::UInt, Some("0".to_string())),
            ConfigEntry::new(GRAVEL_TESTING.to_string(),
                             "Relaxes start-up validation for in-process tests".to_string(),
                             ConfigDataType::Boolean, Some("false".to_string())),
        ]
    }

    pub fn settings(&self) -> &HashMap<String, String> {
        &self.valid_config.settings
    }

    pub fn max_cores(&self) -> i32 {
        self.valid_config.get_usize_setting(GRAVEL_CORES_MAX) as i32
    }

    pub fn min_mb_per_core(&self) -> f64 {
        self.valid_config.get_f64_setting(GRAVEL_CORES_MB_MIN)
    }

    pub fn max_mb_per_core(&self) -> f64 {
        self.valid_config.get_f64_setting(GRAVEL_CORES_MB_MAX)
    }

    pub fn shutdown_timeout_ms(&self) -> u64 {
        self.valid_config.get_usize_setting(GRAVEL_COARSE_SHUTDOWN_MS) as u64
    }

    pub fn extra_cores_per_node(&self) -> i32 {
        self.valid_config.get_usize_setting(GRAVEL_COARSE_EXTRA_CORES) as i32
    }

    pub fn constraints(&self) -> String {
        self.valid_config.get_string_setting(GRAVEL_COARSE_CONSTRAINTS)
    }

    /// Additional sandbox URIs, with empty segments dropped.
    pub fn extra_uris(&self) -> Vec<String> {
        self.valid_config
            .get_string_setting(GRAVEL_COARSE_URIS)
            .split(',')
            .map(|uri| uri.trim())
            .filter(|uri| !uri.is_empty())
            .map(|uri| uri.to_string())
            .collect()
    }

    pub fn shuffle_service_enabled(&self) -> bool {
        self.valid_config
            .get_bool_setting(GRAVEL_SHUFFLE_SERVICE_ENABLED)
    }

    pub fn shuffle_service_port(&self) -> u16 {
        self.valid_config
            .get_usize_setting(GRAVEL_SHUFFLE_SERVICE_PORT) as u16
    }

    pub fn executor_home(&self) -> Option<String> {
        self.valid_config.get_optional_setting(GRAVEL_EXECUTOR_HOME)
    }

    pub fn executor_uri(&self) -> Option<String> {
        self.valid_config.get_optional_setting(GRAVEL_EXECUTOR_URI)
    }

    pub fn executor_extra_classpath(&self) -> Option<String> {
        self.valid_config
            .get_optional_setting(GRAVEL_EXECUTOR_EXTRA_CLASSPATH)
    }

    pub fn executor_extra_java_options(&self) -> String {
        self.valid_config
            .get_string_setting(GRAVEL_EXECUTOR_EXTRA_JAVA_OPTIONS)
    }

    pub fn executor_extra_library_path(&self) -> Option<String> {
        self.valid_config
            .get_optional_setting(GRAVEL_EXECUTOR_EXTRA_LIBRARY_PATH)
    }

    pub fn container_image(&self) -> Option<String> {
        self.valid_config
            .get_optional_setting(GRAVEL_EXECUTOR_CONTAINER_IMAGE)
    }

    pub fn driver_host(&self) -> Option<String> {
        self.valid_config.get_optional_setting(GRAVEL_DRIVER_HOST)
    }

    /// The driver port, `None` when unset (zero).
    pub fn driver_port(&self) -> Option<u16> {
        let port = self.valid_config.get_usize_setting(GRAVEL_DRIVER_PORT);
        (port != 0).then_some(port as u16)
    }

    pub fn testing(&self) -> bool {
        self.valid_config.get_bool_setting(GRAVEL_TESTING)
    }
}
