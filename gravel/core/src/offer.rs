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

//! Resource offers as presented by the resource manager.

use std::collections::{HashMap, HashSet};

/// Well-known scalar resource carrying cpu shares.
pub const RESOURCE_CPUS: &str = "cpus";
/// Well-known scalar resource carrying memory in MB.
pub const RESOURCE_MEM: &str = "mem";

/// A typed resource amount within an offer or a launch.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceValue {
    Scalar(f64),
    /// Inclusive ranges, e.g. port ranges.
    Ranges(Vec<(u64, u64)>),
}

/// A named resource within an offer or a launch.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub name: String,
    pub value: ResourceValue,
}

impl Resource {
    /// Creates a scalar resource.
    pub fn scalar(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value: ResourceValue::Scalar(value),
        }
    }
}

/// A node attribute value reported by the resource manager.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Scalar(f64),
    Text(String),
    Set(HashSet<String>),
    /// Inclusive ranges.
    Ranges(Vec<(u64, u64)>),
}

/// A bundle of resources on one node, offered for a bounded time.
#[derive(Debug, Clone)]
pub struct Offer {
    /// Offer identifier, consumed when the offer is accepted or declined.
    pub id: String,
    /// Node the resources live on.
    pub node_id: String,
    /// Hostname of the node, used for shuffle-service registration.
    pub hostname: String,
    pub resources: Vec<Resource>,
    pub attributes: HashMap<String, AttributeValue>,
}

impl Offer {
    /// Sums the scalar amounts of the named resource across the offer.
    pub fn scalar_resource(&self, name: &str) -> f64 {
        self.resources
            .iter()
            .filter(|r| r.name == name)
            .map(|r| match &r.value {
                ResourceValue::Scalar(v) => *v,
                ResourceValue::Ranges(_) => 0.0,
            })
            .sum()
    }
}

/// Asks the resource manager not to re-offer declined resources for a while.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OfferFilter {
    pub refuse_seconds: f64,
}

impl OfferFilter {
    pub fn refuse_for_seconds(refuse_seconds: f64) -> Self {
        Self { refuse_seconds }
    }
}
