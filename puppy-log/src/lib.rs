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

//! Standardizes logging for the Puppy platform on top of [log](https://crates.io/crates/log).
//! Given a LogConfig, this crate knows how to initialize the logging system.
//!
//! ```rust
//! fn main() {
//!     puppy_log::init(log_config()).unwrap();
//!     // The LogConfig used to initialize the log system can be retrieved.
//!     let log_config = puppy_log::config().unwrap();
//!     assert_eq!(log_config.root_level(), puppy_log::Level::Warn);
//! }
//!
//! /// This should be loaded from the app's configuration.
//! /// The default LogConfig sets the root log level to Warn and logs to stdout.
//! fn log_config() -> puppy_log::LogConfig {
//!     Default::default()
//! }
//! ```

#![deny(missing_docs, missing_debug_implementations)]
#![doc(html_root_url = "https://docs.rs/puppy_log/0.1.0")]

pub mod config;
pub mod manager;

pub use crate::config::{LogConfig, LogConfigBuilder, LogOutput, Target};
pub use crate::manager::{config, init, is_initialized, LogInitError};

pub use log::{
    // re-export the log macros
    debug,
    error,
    info,
    log,
    log_enabled,
    trace,
    warn,
    // re-export some other common log members
    Level,
    LevelFilter,
};


#[cfg(test)]
pub use crate::tests::run_test;
