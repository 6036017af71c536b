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

//! Sizing an executor against the cpu and memory available on one offer.

/// A feasible executor size for an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorSizing {
    /// Cpus the executor will actually use.
    pub cpus: i32,
    /// Total memory to take from the offer, heap plus overhead, in MB.
    pub total_mem_mb: i32,
    /// Heap memory for the executor process, in MB.
    pub heap_mb: i32,
}

/// Determines how large an executor the offer can host, or `None` when the
/// offer cannot satisfy even a single core within the configured
/// heap-per-core band, or when the overhead leaves no heap at all.
///
/// `available_cpus` must already be clamped to the remaining core budget.
/// The heap-per-core band is enforced by capping heap on memory-rich offers
/// and by shedding cpus on memory-poor ones.
pub fn size_executor(
    available_cpus: i32,
    available_mem_mb: i32,
    overhead_mb: i32,
    min_mb_per_core: f64,
    max_mb_per_core: f64,
) -> Option<ExecutorSizing> {
    let usable_mem = available_mem_mb - overhead_mb;
    if available_cpus <= 0 {
        return None;
    }
    if (usable_mem as f64) < min_mb_per_core || usable_mem <= 0 {
        return None;
    }

    let ratio = usable_mem as f64 / available_cpus as f64;
    if ratio > max_mb_per_core {
        // Memory-rich offer: cap the heap rather than leave cpus unused.
        let capped_heap = (max_mb_per_core * available_cpus as f64) as i32;
        if (capped_heap as f64) < min_mb_per_core {
            return None;
        }
        Some(ExecutorSizing {
            cpus: available_cpus,
            total_mem_mb: capped_heap + overhead_mb,
            heap_mb: capped_heap,
        })
    } else if ratio < min_mb_per_core {
        // Memory-poor offer: shed cpus until each remaining core gets its
        // minimum heap.
        let cpus = (usable_mem as f64 / min_mb_per_core) as i32;
        if cpus <= 0 {
            return None;
        }
        Some(ExecutorSizing {
            cpus,
            total_mem_mb: usable_mem + overhead_mb,
            heap_mb: usable_mem,
        })
    } else {
        Some(ExecutorSizing {
            cpus: available_cpus,
            total_mem_mb: usable_mem + overhead_mb,
            heap_mb: usable_mem,
        })
    }
}
