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

//! Message factories

use crate::FailResult;

/// Creates [FailResult](../struct.FailResult.html) instances.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailResultFactory;

impl FailResultFactory {
    /// Returns a new default FailResult
    pub fn create(&self) -> FailResult {
        FailResult::default()
    }
}

/// Shorthand for `FailResultFactory.create()`
pub fn create_fail_result() -> FailResult {
    FailResultFactory.create()
}
