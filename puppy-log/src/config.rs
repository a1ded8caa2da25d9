/*
 * Copyright 2019 OysterPack Inc.
 *
 *    Licensed under the Apache License, Version 2.0 (the "License");
 *    you may not use this file except in compliance with the License.
 *    You may obtain a copy of the License at
 *
 *        http://www.apache.org/licenses/LICENSE-2.0
 *
 *    Unless required by applicable law or agreed to in writing, software
 *    distributed under the License is distributed on an "AS IS" BASIS,
 *    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *    See the License for the specific language governing permissions and
 *    limitations under the License.
 */

//! Log config

use log::Level;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// Log config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    root_level: Level,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target_levels: Option<BTreeMap<Target, Level>>,
    #[serde(default)]
    output: LogOutput,
}

impl LogConfig {
    /// Returns the root log level.
    pub fn root_level(&self) -> Level {
        self.root_level
    }

    /// Returns the configured target log levels
    pub fn target_levels(&self) -> Option<&BTreeMap<Target, Level>> {
        self.target_levels.as_ref()
    }

    /// Where log records are written
    pub fn output(&self) -> LogOutput {
        self.output
    }
}

impl Default for LogConfig {
    /// Creates a default LogConfig with the root log level set to Warn
    fn default() -> Self {
        LogConfig {
            root_level: Level::Warn,
            target_levels: None,
            output: LogOutput::default(),
        }
    }
}

/// Console stream that log records are written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogOutput {
    /// stdout
    Stdout,
    /// stderr
    Stderr,
}

impl Default for LogOutput {
    fn default() -> Self {
        LogOutput::Stdout
    }
}

/// LogConfig builder
#[derive(Debug)]
pub struct LogConfigBuilder {
    config: LogConfig,
}

impl LogConfigBuilder {
    /// Constructs a new LogConfigBuilder with the specified root log level
    pub fn new(root_level: Level) -> Self {
        LogConfigBuilder {
            config: LogConfig {
                root_level,
                ..LogConfig::default()
            },
        }
    }

    /// Sets the log level for the specified target
    pub fn target_level(mut self, target: Target, level: Level) -> Self {
        self.config
            .target_levels
            .get_or_insert_with(BTreeMap::new)
            .insert(target, level);
        self
    }

    /// Sets the log output
    pub fn output(mut self, output: LogOutput) -> Self {
        self.config.output = output;
        self
    }

    /// Builds and returns the LogConfig
    pub fn build(self) -> LogConfig {
        self.config
    }
}

/// Represents a log target
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Target(pub String);

impl Target {
    /// Constructs a new Target by appending the specified target.
    ///
    /// ## Examples
    ///
    /// ```rust
    /// # use puppy_log::config::Target;
    /// let foo = Target("foo".to_string());
    /// let foo_bar = foo.append(Target("bar".to_string()));
    /// assert_eq!(Target("foo::bar".to_string()), foo_bar);
    /// ```
    pub fn append(&self, target: Target) -> Target {
        Target(format!("{}::{}", self.0, target.0))
    }
}

impl AsRef<str> for Target {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'a> From<&'a str> for Target {
    fn from(target: &'a str) -> Self {
        Target(target.to_string())
    }
}
