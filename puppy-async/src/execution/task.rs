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

//! Task outcomes: the failure values delivered to failure handlers and task handles, and the
//! [TaskHandle](struct.TaskHandle.html) future returned by `Executor::submit`.

use super::ExecutorId;
use failure::Fail;
use futures::{
    channel::oneshot,
    future::{Future, FutureExt},
    task::{Context, Poll},
};
use std::{any::Any, error, fmt, pin::Pin};

/// The reason a task did not produce a value.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskFailure<E> {
    /// The task returned an error.
    Error(E),
    /// The task panicked.
    Panic(PanicError),
    /// The task was dropped before it completed.
    /// - can only be observed through a [TaskHandle](struct.TaskHandle.html); callbacks never
    ///   receive it
    Abandoned,
}

impl<E> TaskFailure<E> {
    /// Returns the error returned by the task, if any.
    pub fn error(&self) -> Option<&E> {
        match self {
            TaskFailure::Error(err) => Some(err),
            _ => None,
        }
    }

    /// Consumes the failure, returning the error returned by the task, if any.
    pub fn into_error(self) -> Option<E> {
        match self {
            TaskFailure::Error(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the panic, if the task panicked.
    pub fn panic(&self) -> Option<&PanicError> {
        match self {
            TaskFailure::Panic(panic) => Some(panic),
            _ => None,
        }
    }

    /// true if the task panicked
    pub fn is_panic(&self) -> bool {
        self.panic().is_some()
    }
}

impl<E: fmt::Display> fmt::Display for TaskFailure<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TaskFailure::Error(err) => write!(f, "Task failed: {}", err),
            TaskFailure::Panic(panic) => write!(f, "Task panicked: {}", panic),
            TaskFailure::Abandoned => f.write_str("Task was abandoned before it completed"),
        }
    }
}

impl<E: error::Error + 'static> error::Error for TaskFailure<E> {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            TaskFailure::Error(err) => Some(err),
            _ => None,
        }
    }
}

/// A caught panic
#[derive(Fail, Debug, Clone, PartialEq, Eq)]
#[fail(display = "{}", message)]
pub struct PanicError {
    message: String,
}

impl PanicError {
    /// Returns the panic message.
    /// - panics raised with a non-string payload are reported as `Box<Any>`
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<Box<dyn Any + Send>> for PanicError {
    fn from(payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(message) => (*message).to_string(),
                Err(_) => "Box<Any>".to_string(),
            },
        };
        Self { message }
    }
}

/// Identifies which callback raised an [UncaughtError](struct.UncaughtError.html)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Callback {
    /// the success handler
    Success,
    /// the failure handler
    Failure,
}

impl fmt::Display for Callback {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Callback::Success => f.write_str("success"),
            Callback::Failure => f.write_str("failure"),
        }
    }
}

/// A panic raised by a success or failure callback.
///
/// It is never routed to the other callback. Executors log it, count it, and hand it to their
/// uncaught error handler when one is configured.
#[derive(Fail, Debug, Clone, PartialEq, Eq)]
#[fail(
    display = "The {} callback panicked on Executor({}): {}",
    callback, executor_id, panic
)]
pub struct UncaughtError {
    executor_id: ExecutorId,
    callback: Callback,
    panic: PanicError,
}

impl UncaughtError {
    pub(crate) fn new(executor_id: ExecutorId, callback: Callback, panic: PanicError) -> Self {
        Self {
            executor_id,
            callback,
            panic,
        }
    }

    /// The Executor that ran the callback
    pub fn executor_id(&self) -> ExecutorId {
        self.executor_id
    }

    /// Which callback panicked
    pub fn callback(&self) -> Callback {
        self.callback
    }

    /// The caught panic
    pub fn panic(&self) -> &PanicError {
        &self.panic
    }
}

/// Resolves to the outcome of a task submitted via `Executor::submit`.
#[must_use = "the task outcome is lost if the handle is dropped"]
pub struct TaskHandle<T, E> {
    receiver: oneshot::Receiver<Result<T, TaskFailure<E>>>,
}

impl<T, E> TaskHandle<T, E> {
    pub(crate) fn new(receiver: oneshot::Receiver<Result<T, TaskFailure<E>>>) -> Self {
        Self { receiver }
    }

    /// Blocks the calling thread until the task completes.
    ///
    /// ## Notes
    /// Waiting from a task that runs on the same Executor ties up one of its workers for as long
    /// as the awaited task takes. On a single threaded Executor this never returns.
    pub fn wait(self) -> Result<T, TaskFailure<E>> {
        futures::executor::block_on(self)
    }
}

impl<T, E> Future for TaskHandle<T, E> {
    type Output = Result<T, TaskFailure<E>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.receiver.poll_unpin(cx).map(|result| match result {
            Ok(outcome) => outcome,
            Err(oneshot::Canceled) => Err(TaskFailure::Abandoned),
        })
    }
}

impl<T, E> fmt::Debug for TaskHandle<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("TaskHandle")
    }
}
