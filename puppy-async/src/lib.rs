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

//! **Puppy Async** runs tasks on thread pools and delivers their outcome asynchronously.
//!
//! ```rust
//! use puppy_async::execution::{ExecutorBuilder, ExecutorId, TaskFailure};
//! use std::num::NonZeroUsize;
//!
//! let executor = ExecutorBuilder::new(ExecutorId::generate())
//!     .set_pool_size(NonZeroUsize::new(4).unwrap())
//!     .build()
//!     .unwrap();
//!
//! let (tx, rx) = crossbeam::channel::bounded(1);
//! let failure_tx = tx.clone();
//! executor
//!     .run(
//!         || "42".parse::<u32>(),
//!         move |value| tx.send(Ok(value)).unwrap(),
//!         move |failure: TaskFailure<_>| failure_tx.send(Err(failure.to_string())).unwrap(),
//!     )
//!     .unwrap();
//! assert_eq!(rx.recv().unwrap(), Ok(42));
//!
//! // the same task, delivered through a future
//! let handle = executor.submit(|| "x".parse::<u32>()).unwrap();
//! assert!(handle.wait().unwrap_err().error().is_some());
//! ```

#![deny(missing_docs, missing_debug_implementations)]
#![doc(html_root_url = "https://docs.rs/puppy_async/0.1.0")]

#[allow(unused_imports)]
#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

pub mod execution;

pub use crate::execution::{
    global_executor, AdmissionPolicy, Executor, ExecutorBuilder, ExecutorError, ExecutorId,
    TaskFailure, TaskHandle,
};

#[cfg(test)]
fn configure_logging() {
    use puppy_log::{Level, LogConfigBuilder, Target};

    let log_config = LogConfigBuilder::new(Level::Warn)
        .target_level(Target::from(env!("CARGO_PKG_NAME")), Level::Debug)
        .build();
    puppy_log::init(log_config).unwrap();
}
