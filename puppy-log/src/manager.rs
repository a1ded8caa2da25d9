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

//! This module is the anchor point for configuring and initializing the [log](https://crates.io/crates/log) system.

use crate::config::{LogConfig, LogOutput};
use failure::Fail;
use fern::Dispatch;
use lazy_static::lazy_static;
use log::{info, warn};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

const LOG_NOT_INITIALIZED: usize = 0;
const LOG_INITIALIZING: usize = 1;
const LOG_INITIALIZED: usize = 2;
// LOG_STATE transitions: LOG_NOT_INITIALIZED -> LOG_INITIALIZING -> LOG_INITIALIZED
static LOG_STATE: AtomicUsize = AtomicUsize::new(LOG_NOT_INITIALIZED);

lazy_static! {
    static ref LOG_CONFIG: RwLock<Option<LogConfig>> = RwLock::new(None);
}

/// Initializes the logging system
/// - if the logging system is already initialized, then a warning is logged and the config is
///   ignored
/// - if another thread is initializing, then this call waits for it to finish. If that attempt
///   failed, then initialization is retried using this call's config.
pub fn init(config: LogConfig) -> Result<(), LogInitError> {
    match LOG_STATE.compare_exchange(
        LOG_NOT_INITIALIZED,
        LOG_INITIALIZING,
        Ordering::SeqCst,
        Ordering::SeqCst,
    ) {
        Ok(_) => {
            let mut dispatch = Dispatch::new().level(config.root_level().to_level_filter());
            if let Some(target_levels) = config.target_levels() {
                for (target, level) in target_levels {
                    dispatch = dispatch.level_for(target.to_string(), level.to_level_filter());
                }
            }
            dispatch = configure_output(&config, configure_console_format(dispatch));

            if let Err(err) = dispatch.apply() {
                LOG_STATE.store(LOG_NOT_INITIALIZED, Ordering::SeqCst);
                return Err(LogInitError::LoggerAlreadySet(err.to_string()));
            }
            let config_json = serde_json::to_string(&config).unwrap_or_default();
            *LOG_CONFIG.write() = Some(config);
            LOG_STATE.store(LOG_INITIALIZED, Ordering::SeqCst);
            info!("logging has been initialized using config: {}", config_json);
        }
        Err(LOG_INITIALIZING) => {
            while LOG_STATE.load(Ordering::SeqCst) == LOG_INITIALIZING {
                std::thread::yield_now();
            }
            if !is_initialized() {
                return init(config);
            }
        }
        Err(_) => warn!("logging has already been initialized"),
    }
    Ok(())
}

fn configure_output(config: &LogConfig, dispatch: Dispatch) -> Dispatch {
    match config.output() {
        LogOutput::Stdout => dispatch.chain(std::io::stdout()),
        LogOutput::Stderr => dispatch.chain(std::io::stderr()),
    }
}

fn configure_console_format(dispatch: Dispatch) -> Dispatch {
    dispatch.format(|out, message, record| {
        out.finish(format_args!(
            "{}[{}][{}][{}:{}] {}",
            chrono::Local::now().format("[%H:%M:%S%.3f]"),
            record.level(),
            record.target(),
            record.file().unwrap_or("<unknown>"),
            record.line().unwrap_or(0),
            message
        ))
    })
}

/// Returns true if the logging system has been initialized by [init](fn.init.html)
pub fn is_initialized() -> bool {
    LOG_STATE.load(Ordering::SeqCst) == LOG_INITIALIZED
}

/// Returns the LogConfig used to initialize the log system.
pub fn config() -> Option<LogConfig> {
    LOG_CONFIG.read().clone()
}

/// Logging initialization errors
#[derive(Fail, Debug)]
pub enum LogInitError {
    /// Another logger was installed outside of this crate.
    #[fail(display = "Failed to install logger: {}", _0)]
    LoggerAlreadySet(String),
}
