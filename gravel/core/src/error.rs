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

//! Gravel error types

use std::{
    error::Error,
    fmt::{Display, Formatter},
    result,
};

/// Result type alias for gravel operations.
pub type Result<T> = result::Result<T, GravelError>;

/// Gravel error types for the scheduler backend.
#[derive(Debug)]
pub enum GravelError {
    /// Configuration error with invalid or missing settings.
    Configuration(String),
    /// General error with a descriptive message.
    General(String),
    /// Internal error indicating a bug or unexpected state.
    Internal(String),
}

/// Creates a general gravel error from a string message.
pub fn gravel_error(message: &str) -> GravelError {
    GravelError::General(message.to_owned())
}

impl From<String> for GravelError {
    fn from(e: String) -> Self {
        GravelError::General(e)
    }
}

impl Display for GravelError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            GravelError::Configuration(desc) => {
                write!(f, "Configuration error: {desc}")
            }
            GravelError::General(desc) => write!(f, "General error: {desc}"),
            GravelError::Internal(desc) => {
                write!(f, "Internal gravel error: {desc}")
            }
        }
    }
}

impl Error for GravelError {}
