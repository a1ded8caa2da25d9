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

//! This crate curates the Puppy modules in a central location.
//!
//! - [execution](execution/index.html): runs tasks on thread pools and delivers their outcome to
//!   success and failure callbacks
//! - [message](message/index.html): message results, e.g., `FailResult`
//! - [log](log/index.html): logging configuration and initialization

#![deny(missing_docs, missing_debug_implementations)]
#![doc(html_root_url = "https://docs.rs/puppy/0.1.0")]

pub use puppy_async::execution;
pub use puppy_log as log;
pub use puppy_message as message;

/// re-export log macros
pub use puppy_log::{debug, error, info, log, log_enabled, trace, warn};

pub use puppy_async::{
    global_executor, AdmissionPolicy, Executor, ExecutorBuilder, ExecutorError, ExecutorId,
    TaskFailure, TaskHandle,
};
pub use puppy_message::{create_fail_result, FailResult, FailResultFactory};
