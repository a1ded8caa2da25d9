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

//! Message results that are exchanged between Puppy components.

#![deny(missing_docs, missing_debug_implementations)]
#![doc(html_root_url = "https://docs.rs/puppy_message/0.1.0")]

pub mod factory;

pub use crate::factory::{create_fail_result, FailResultFactory};

use serde::{Deserialize, Serialize};

/// Signals that a request could not be fulfilled.
/// - it carries no data, i.e., every FailResult is equal to every other
/// - serializes as an empty map, e.g. `{}` in JSON
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FailResult {}

impl FailResult {
    /// constructor
    pub fn new() -> Self {
        Self {}
    }
}
