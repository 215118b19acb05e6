// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Core error types

use thiserror::Error;

/// Result type for configuration handling
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// JSON configuration could not be parsed
    #[error("Invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML configuration could not be parsed
    #[error("Invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required option is missing or empty
    #[error("Missing required option: {0}")]
    Missing(&'static str),

    /// An option holds an unusable value
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
