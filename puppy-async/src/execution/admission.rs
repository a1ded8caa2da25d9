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

//! Admission control for task submissions.

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};

/// Governs what happens to a task that is submitted while all of the Executor's worker threads
/// are busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdmissionPolicy {
    /// Tasks are queued without limit, i.e., submissions are never rejected, only delayed.
    Unbounded,
    /// At most `pool size + queue_capacity` tasks may be in flight. Submitting blocks the calling
    /// thread until a slot frees up.
    ///
    /// Submitting from a task that runs on the same Executor can deadlock once the limit is
    /// reached.
    Block {
        /// number of tasks that may wait for a worker thread
        queue_capacity: usize,
    },
    /// At most `pool size + queue_capacity` tasks may be in flight. Submissions beyond that fail
    /// immediately.
    Reject {
        /// number of tasks that may wait for a worker thread
        queue_capacity: usize,
    },
}

impl AdmissionPolicy {
    /// The largest in flight limit a bounded policy may resolve to. Slots are preallocated, so
    /// larger limits are rejected when the Executor is built.
    pub const MAX_IN_FLIGHT_LIMIT: usize = 1 << 20;

    /// Returns the max number of in flight tasks, i.e., queued and running, for the specified
    /// pool size. None means there is no limit.
    pub fn max_in_flight(&self, pool_size: usize) -> Option<usize> {
        match *self {
            AdmissionPolicy::Unbounded => None,
            AdmissionPolicy::Block { queue_capacity }
            | AdmissionPolicy::Reject { queue_capacity } => {
                Some(pool_size.saturating_add(queue_capacity))
            }
        }
    }
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        AdmissionPolicy::Unbounded
    }
}

/// Hands out in flight slots according to an AdmissionPolicy.
/// - slots are tokens in a bounded channel: admitting a task sends a token, releasing its Permit
///   receives one
#[derive(Debug, Clone)]
pub(crate) struct Admission {
    policy: AdmissionPolicy,
    slots: Option<Slots>,
}

#[derive(Debug, Clone)]
struct Slots {
    acquire: Sender<()>,
    release: Receiver<()>,
    max_in_flight: usize,
}

impl Admission {
    pub(crate) fn new(policy: AdmissionPolicy, pool_size: usize) -> Self {
        let slots = policy.max_in_flight(pool_size).map(|max_in_flight| {
            let (acquire, release) = channel::bounded(max_in_flight);
            Slots {
                acquire,
                release,
                max_in_flight,
            }
        });
        Self { policy, slots }
    }

    pub(crate) fn policy(&self) -> AdmissionPolicy {
        self.policy
    }

    /// Returns the number of tasks currently holding a slot, or None if admission is unbounded.
    pub(crate) fn in_flight(&self) -> Option<usize> {
        self.slots.as_ref().map(|slots| slots.acquire.len())
    }

    pub(crate) fn admit(&self) -> Result<Permit, AdmissionError> {
        let slots = match self.slots {
            Some(ref slots) => slots,
            None => return Ok(Permit { release: None }),
        };
        match self.policy {
            AdmissionPolicy::Block { .. } => slots
                .acquire
                .send(())
                .map_err(|_| AdmissionError::Closed)?,
            _ => slots.acquire.try_send(()).map_err(|err| match err {
                TrySendError::Full(_) => AdmissionError::Saturated {
                    max_in_flight: slots.max_in_flight,
                },
                TrySendError::Disconnected(_) => AdmissionError::Closed,
            })?,
        }
        Ok(Permit {
            release: Some(slots.release.clone()),
        })
    }
}

/// Reasons a submission was not admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AdmissionError {
    Saturated { max_in_flight: usize },
    Closed,
}

/// Holds an in flight slot, which is released when the Permit is dropped.
#[derive(Debug)]
pub(crate) struct Permit {
    release: Option<Receiver<()>>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        if let Some(ref release) = self.release {
            let _ = release.try_recv();
        }
    }
}
