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

//! Asynchronous task execution on thread pool based Executors.
//!
//! A task is a closure that produces a value or fails. [Executor::run](struct.Executor.html#method.run)
//! schedules the task on the Executor's thread pool and returns immediately. When the task
//! completes, exactly one of the supplied callbacks is invoked on the worker thread:
//! - the success callback with the produced value
//! - the failure callback with a [TaskFailure](enum.TaskFailure.html), if the task returned an
//!   error or panicked
//!
//! [Executor::submit](struct.Executor.html#method.submit) provides the same delivery guarantees
//! through a [TaskHandle](struct.TaskHandle.html) future instead of callbacks.
//!
//! Executors are either built standalone via [ExecutorBuilder::build](struct.ExecutorBuilder.html#method.build),
//! or registered in the global registry via [ExecutorBuilder::register](struct.ExecutorBuilder.html#method.register).
//! The registry also provides a global Executor with [Executor::GLOBAL_POOL_SIZE](struct.Executor.html#associatedconstant.GLOBAL_POOL_SIZE)
//! worker threads.

pub mod admission;
pub mod metrics;
pub mod task;

pub use self::{
    admission::AdmissionPolicy,
    task::{Callback, PanicError, TaskFailure, TaskHandle, UncaughtError},
};

use self::{
    admission::{Admission, AdmissionError},
    metrics::ExecutorMetrics,
};
use failure::Fail;
use futures::{
    channel::oneshot,
    executor::ThreadPool,
    task::{FutureObj, Spawn, SpawnError, SpawnExt},
};
use lazy_static::lazy_static;
use parking_lot::RwLock;
use puppy_log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::{
    fmt, io,
    num::NonZeroUsize,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};

lazy_static! {
    /// Global Executor registry
    static ref EXECUTORS: RwLock<ExecutorRegistry> = RwLock::new(ExecutorRegistry::default());

    static ref GLOBAL_EXECUTOR: Executor = ExecutorBuilder::global().build().unwrap();
}

/// An executor can only be registered once, and once it is registered, it stays registered for the
/// life of the app.
/// - returns an error if an executor with the same ID is already registered
pub fn register(builder: &ExecutorBuilder) -> Result<Executor, ExecutorRegistryError> {
    EXECUTORS.write().register(builder)
}

/// Returns the registered executor IDs
pub fn executor_ids() -> smallvec::SmallVec<[ExecutorId; 16]> {
    EXECUTORS.read().executor_ids()
}

/// returns the Executor for the specified ID
pub fn executor(id: ExecutorId) -> Option<Executor> {
    EXECUTORS.read().executor(id)
}

/// Returns the global executor, which is provided by default.
/// - it is created on first use
pub fn global_executor() -> Executor {
    GLOBAL_EXECUTOR.clone()
}

/// Executor registry
#[derive(Default)]
pub struct ExecutorRegistry {
    thread_pools: fnv::FnvHashMap<ExecutorId, Executor>,
}

impl ExecutorRegistry {
    /// An executor can only be registered once, and once it is registered, it stays registered for the
    /// life of the app.
    /// - returns an error if an executor with the same ID is already registered
    pub fn register(&mut self, builder: &ExecutorBuilder) -> Result<Executor, ExecutorRegistryError> {
        let id = builder.executor_id();
        if id == Executor::GLOBAL_EXECUTOR_ID || self.thread_pools.contains_key(&id) {
            return Err(ExecutorRegistryError::ExecutorAlreadyRegistered(id));
        }
        let executor = builder.build()?;
        self.thread_pools.insert(id, executor.clone());
        Ok(executor)
    }

    /// Returns the registered executor IDs
    pub fn executor_ids(&self) -> smallvec::SmallVec<[ExecutorId; 16]> {
        self.thread_pools.keys().cloned().collect()
    }

    /// returns the Executor for the specified ID
    pub fn executor(&self, id: ExecutorId) -> Option<Executor> {
        match self.thread_pools.get(&id) {
            Some(executor) => Some(executor.clone()),
            None if id == Executor::GLOBAL_EXECUTOR_ID => Some(global_executor()),
            None => None,
        }
    }
}

impl fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Executors(thread pool count = {})",
            self.thread_pools.len()
        )
    }
}

/// Invoked with panics raised by success and failure callbacks
pub type UncaughtErrorHandler = Arc<dyn Fn(&UncaughtError) + Send + Sync>;

/// A thread pool based executor for running tasks and delivering their outcome to callbacks.
/// - The thread pool multiplexes any number of tasks onto a fixed number of worker threads.
/// - This type is a clonable handle to the threadpool itself. Cloning it will only create a new
///   reference, not a new threadpool.
/// - Panics raised by tasks and callbacks are caught, i.e., they never take down a worker thread.
#[derive(Clone)]
pub struct Executor {
    id: ExecutorId,
    thread_pool: ThreadPool,
    pool_size: usize,
    admission: Admission,
    uncaught_error_handler: Option<UncaughtErrorHandler>,
    metrics: ExecutorMetrics,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Executor({})", self.id)
    }
}

impl Executor {
    /// Global ExecutorId, i.e., for the global Executor
    pub const GLOBAL_EXECUTOR_ID: ExecutorId = ExecutorId(1871427164235073850597045237139528853);

    /// Number of worker threads in the global Executor
    pub const GLOBAL_POOL_SIZE: usize = 1000;

    /// Returns the ExecutorId
    pub const fn id(&self) -> ExecutorId {
        self.id
    }

    /// Returns the number of worker threads
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Returns the admission policy
    pub fn admission_policy(&self) -> AdmissionPolicy {
        self.admission.policy()
    }

    /// Returns the number of tasks that are queued or running.
    /// - only tracked for bounded admission policies, i.e., returns None for `AdmissionPolicy::Unbounded`
    pub fn in_flight(&self) -> Option<usize> {
        self.admission.in_flight()
    }

    /// Schedules the task to run on this Executor's thread pool and returns without waiting for it.
    ///
    /// When the task completes, exactly one callback is invoked, exactly once, on the worker thread:
    /// - `on_success` with the value the task produced
    /// - `on_failure` with the error the task returned, or with the panic if the task panicked
    ///
    /// A panic raised by either callback is not routed to the other callback. It is logged and
    /// reported to the Executor's uncaught error handler, if one is configured.
    ///
    /// ## Errors
    /// An error means the task was not scheduled and neither callback will be invoked:
    /// - [ExecutorError::Rejected](enum.ExecutorError.html#variant.Rejected) if the admission policy
    ///   rejected it
    /// - [ExecutorError::SpawnError](enum.ExecutorError.html#variant.SpawnError) if the thread pool
    ///   failed to spawn it
    pub fn run<T, E, F, S, H>(&self, task: F, on_success: S, on_failure: H) -> Result<(), ExecutorError>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        S: FnOnce(T) + Send + 'static,
        H: FnOnce(TaskFailure<E>) + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let callbacks = CallbackGuard {
            executor_id: self.id,
            callback_panics: self.metrics.callback_panics.clone(),
            uncaught_error_handler: self.uncaught_error_handler.clone(),
        };
        self.dispatch(task, move |outcome| match outcome {
            Ok(value) => callbacks.invoke(Callback::Success, move || on_success(value)),
            Err(failure) => callbacks.invoke(Callback::Failure, move || on_failure(failure)),
        })
    }

    /// Schedules the task to run on this Executor's thread pool, and returns a handle that resolves
    /// to the task's outcome.
    ///
    /// ## Errors
    /// Same as [run](struct.Executor.html#method.run)
    pub fn submit<T, E, F>(&self, task: F) -> Result<TaskHandle<T, E>, ExecutorError>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        self.dispatch(task, move |outcome| {
            // the handle may have been dropped, in which case nobody is interested in the outcome
            let _ = sender.send(outcome);
        })?;
        Ok(TaskHandle::new(receiver))
    }

    fn dispatch<T, E, F, C>(&self, task: F, complete: C) -> Result<(), ExecutorError>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        C: FnOnce(Result<T, TaskFailure<E>>) + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let permit = self.admission.admit().map_err(|err| match err {
            AdmissionError::Saturated { max_in_flight } => {
                self.metrics.rejected.inc();
                warn!(
                    "Executor({}) rejected task: max in flight tasks = {}",
                    self.id, max_in_flight
                );
                ExecutorError::Rejected {
                    executor_id: self.id,
                    max_in_flight,
                }
            }
            AdmissionError::Closed => ExecutorError::SpawnError {
                is_executor_shutdown: true,
            },
        })?;
        let executor_id = self.id;
        let metrics = self.metrics.clone();
        self.spawn(async move {
            // the slot is held until the outcome has been delivered
            let _permit = permit;
            let outcome = match catch_unwind(AssertUnwindSafe(task)) {
                Ok(Ok(value)) => {
                    metrics.succeeded.inc();
                    Ok(value)
                }
                Ok(Err(err)) => {
                    metrics.failed.inc();
                    debug!("Executor({}) task failed", executor_id);
                    Err(TaskFailure::Error(err))
                }
                Err(payload) => {
                    metrics.failed.inc();
                    metrics.panicked.inc();
                    let panic = PanicError::from(payload);
                    debug!("Executor({}) task panicked: {}", executor_id, panic);
                    Err(TaskFailure::Panic(panic))
                }
            };
            complete(outcome);
        })
        .map_err(|err| ExecutorError::SpawnError {
            is_executor_shutdown: err.is_shutdown(),
        })
    }

    /// returns the number of tasks that have been spawned by this Executor
    pub fn spawned_task_count(&self) -> u64 {
        self.metrics.spawned.get()
    }

    /// returns the number of tasks that produced a value
    pub fn succeeded_task_count(&self) -> u64 {
        self.metrics.succeeded.get()
    }

    /// returns the number of tasks that returned an error or panicked
    pub fn failed_task_count(&self) -> u64 {
        self.metrics.failed.get()
    }

    /// returns the number of tasks that panicked
    pub fn panicked_task_count(&self) -> u64 {
        self.metrics.panicked.get()
    }

    /// returns the number of submissions that were rejected by the admission policy
    pub fn rejected_task_count(&self) -> u64 {
        self.metrics.rejected.get()
    }

    /// returns the number of callbacks that panicked
    pub fn callback_panic_count(&self) -> u64 {
        self.metrics.callback_panics.get()
    }
}

/// Futures spawned directly through this trait bypass admission control, and they are not guarded
/// against panics. A panicking future takes its worker thread down with it.
impl Spawn for Executor {
    fn spawn_obj(&self, future: FutureObj<'static, ()>) -> Result<(), SpawnError> {
        self.thread_pool.spawn_obj(future)?;
        self.metrics.spawned.inc();
        Ok(())
    }

    fn status(&self) -> Result<(), SpawnError> {
        self.thread_pool.status()
    }
}

/// Invokes callbacks, catching and reporting their panics
struct CallbackGuard {
    executor_id: ExecutorId,
    callback_panics: prometheus::IntCounter,
    uncaught_error_handler: Option<UncaughtErrorHandler>,
}

impl CallbackGuard {
    fn invoke<F: FnOnce()>(&self, callback: Callback, f: F) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(f)) {
            self.callback_panics.inc();
            let err = UncaughtError::new(self.executor_id, callback, PanicError::from(payload));
            error!("{}", err);
            if let Some(ref handler) = self.uncaught_error_handler {
                if catch_unwind(AssertUnwindSafe(|| handler(&err))).is_err() {
                    error!(
                        "Executor({}) uncaught error handler panicked",
                        self.executor_id
                    );
                }
            }
        }
    }
}

/// Unique Executor ID, which is a [ULID](https://github.com/ulid/spec)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExecutorId(pub u128);

impl ExecutorId {
    /// Generates a new unique ExecutorId
    pub fn generate() -> Self {
        ExecutorId(rusty_ulid::Ulid::generate().into())
    }
}

impl fmt::Display for ExecutorId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", rusty_ulid::Ulid::from(self.0))
    }
}

/// Executor registry related errors
#[derive(Fail, Debug)]
pub enum ExecutorRegistryError {
    /// When a ThreadPool creation failure occurs.
    #[fail(display = "Failed to create ThreadPool: {}", _0)]
    ThreadPoolCreateFailed(io::Error),
    /// When trying to register an Executor using an ID that is already registered.
    #[fail(display = "Executor is already registered: {}", _0)]
    ExecutorAlreadyRegistered(ExecutorId),
    /// When the admission policy resolves to more in flight tasks than can be tracked.
    #[fail(
        display = "Admission limit is too large: max in flight tasks = {}, limit = {}",
        max_in_flight, limit
    )]
    AdmissionLimitTooLarge {
        /// pool size + queue capacity
        max_in_flight: usize,
        /// AdmissionPolicy::MAX_IN_FLIGHT_LIMIT
        limit: usize,
    },
}

/// Executor related errors
#[derive(Fail, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// The admission policy rejected the task because the max number of in flight tasks was reached.
    #[fail(
        display = "Executor({}) rejected the task: max in flight tasks = {}",
        executor_id, max_in_flight
    )]
    Rejected {
        /// the Executor that rejected the task
        executor_id: ExecutorId,
        /// max number of queued and running tasks
        max_in_flight: usize,
    },
    /// An error that occurred during spawning.
    #[fail(
        display = "Spawning Future failed: executor shutdown = {}",
        is_executor_shutdown
    )]
    SpawnError {
        /// whether spawning failed to the executor being shut down
        is_executor_shutdown: bool,
    },
}

/// Executor config and builder
/// - the uncaught error handler is not serialized
#[derive(Clone, Serialize, Deserialize)]
pub struct ExecutorBuilder {
    id: ExecutorId,
    stack_size: Option<NonZeroUsize>,
    pool_size: Option<NonZeroUsize>,
    #[serde(default)]
    admission_policy: AdmissionPolicy,
    #[serde(skip)]
    uncaught_error_handler: Option<UncaughtErrorHandler>,
}

impl fmt::Debug for ExecutorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ExecutorBuilder")
            .field("id", &self.id)
            .field("stack_size", &self.stack_size)
            .field("pool_size", &self.pool_size)
            .field("admission_policy", &self.admission_policy)
            .field(
                "uncaught_error_handler",
                &self.uncaught_error_handler.is_some(),
            )
            .finish()
    }
}

impl ExecutorBuilder {
    /// constructor
    pub fn new(id: ExecutorId) -> Self {
        Self {
            id,
            stack_size: None,
            pool_size: None,
            admission_policy: AdmissionPolicy::default(),
            uncaught_error_handler: None,
        }
    }

    fn global() -> Self {
        Self {
            pool_size: NonZeroUsize::new(Executor::GLOBAL_POOL_SIZE),
            ..Self::new(Executor::GLOBAL_EXECUTOR_ID)
        }
    }

    /// Sets the thread stack size
    pub fn set_stack_size(self, size: NonZeroUsize) -> Self {
        let mut this = self;
        this.stack_size = Some(size);
        this
    }

    /// Sets the thread pool size
    pub fn set_pool_size(self, size: NonZeroUsize) -> Self {
        let mut this = self;
        this.pool_size = Some(size);
        this
    }

    /// Sets the admission policy
    pub fn set_admission_policy(self, policy: AdmissionPolicy) -> Self {
        let mut this = self;
        this.admission_policy = policy;
        this
    }

    /// Sets the handler for panics raised by success and failure callbacks
    pub fn set_uncaught_error_handler<F>(self, handler: F) -> Self
    where
        F: Fn(&UncaughtError) + Send + Sync + 'static,
    {
        let mut this = self;
        this.uncaught_error_handler = Some(Arc::new(handler));
        this
    }

    /// Returns the ExecutorId
    pub fn executor_id(&self) -> ExecutorId {
        self.id
    }

    /// Returns the thread stack size
    pub fn stack_size(&self) -> Option<usize> {
        self.stack_size.map(|size| size.get())
    }

    /// Returns the thread pool size
    /// - if not set, the number of CPUs is used
    pub fn pool_size(&self) -> Option<usize> {
        self.pool_size.map(|size| size.get())
    }

    /// Returns the admission policy
    pub fn admission_policy(&self) -> AdmissionPolicy {
        self.admission_policy
    }

    /// Builds a standalone Executor, i.e., the Executor is not registered.
    /// - each built Executor permanently adds its own labelled series to the executor metrics
    pub fn build(&self) -> Result<Executor, ExecutorRegistryError> {
        let id = self.id;
        let pool_size = self
            .pool_size()
            .unwrap_or_else(|| num_cpus::get().max(1));
        if let Some(max_in_flight) = self.admission_policy.max_in_flight(pool_size) {
            if max_in_flight > AdmissionPolicy::MAX_IN_FLIGHT_LIMIT {
                return Err(ExecutorRegistryError::AdmissionLimitTooLarge {
                    max_in_flight,
                    limit: AdmissionPolicy::MAX_IN_FLIGHT_LIMIT,
                });
            }
        }
        let mut builder = ThreadPool::builder();
        builder
            .pool_size(pool_size)
            .name_prefix(format!("{}-", id))
            .after_start(move |thread_index| {
                debug!("Executor thread has started: {}-{}", id, thread_index)
            })
            .before_stop(move |thread_index| {
                debug!("Executor thread is stopping: {}-{}", id, thread_index)
            });
        if let Some(size) = self.stack_size() {
            builder.stack_size(size);
        }
        let thread_pool = builder
            .create()
            .map_err(ExecutorRegistryError::ThreadPoolCreateFailed)?;
        Ok(Executor {
            id,
            thread_pool,
            pool_size,
            admission: Admission::new(self.admission_policy, pool_size),
            uncaught_error_handler: self.uncaught_error_handler.clone(),
            metrics: ExecutorMetrics::new(id, pool_size),
        })
    }

    /// Tries to build and register the Executor with the global ExecutorRegistry
    pub fn register(&self) -> Result<Executor, ExecutorRegistryError> {
        register(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configure_logging;
    use crossbeam::channel;
    use futures::executor::block_on;
    use puppy_log::info;
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Barrier,
        },
        thread,
        time::Duration,
    };

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn executor(pool_size: usize) -> Executor {
        ExecutorBuilder::new(ExecutorId::generate())
            .set_pool_size(NonZeroUsize::new(pool_size).unwrap())
            .build()
            .unwrap()
    }

    #[derive(Debug, PartialEq)]
    enum Delivered {
        Success(usize),
        Failure(TaskFailure<String>),
    }

    fn run_and_collect<F>(executor: &Executor, task: F) -> channel::Receiver<Delivered>
    where
        F: FnOnce() -> Result<usize, String> + Send + 'static,
    {
        let (tx, rx) = channel::unbounded();
        let failure_tx = tx.clone();
        executor
            .run(
                task,
                move |value| tx.send(Delivered::Success(value)).unwrap(),
                move |failure| failure_tx.send(Delivered::Failure(failure)).unwrap(),
            )
            .unwrap();
        rx
    }

    #[test]
    fn success_invokes_success_callback_only() {
        configure_logging();
        let executor = executor(2);
        let rx = run_and_collect(&executor, || Ok(42));
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), Delivered::Success(42));
        // both callbacks have been consumed, which disconnects the channel
        assert!(rx.recv_timeout(TIMEOUT).is_err());
        assert_eq!(executor.succeeded_task_count(), 1);
        assert_eq!(executor.failed_task_count(), 0);
    }

    #[test]
    fn error_invokes_failure_callback_only() {
        configure_logging();
        let executor = executor(2);
        let rx = run_and_collect(&executor, || Err("BOOM".to_string()));
        assert_eq!(
            rx.recv_timeout(TIMEOUT).unwrap(),
            Delivered::Failure(TaskFailure::Error("BOOM".to_string()))
        );
        assert!(rx.recv_timeout(TIMEOUT).is_err());
        assert_eq!(executor.failed_task_count(), 1);
        assert_eq!(executor.succeeded_task_count(), 0);
    }

    #[test]
    fn panic_invokes_failure_callback() {
        configure_logging();
        let executor = executor(1);
        let rx = run_and_collect(&executor, || panic!("BOOM!!"));
        match rx.recv_timeout(TIMEOUT).unwrap() {
            Delivered::Failure(TaskFailure::Panic(panic)) => assert_eq!(panic.message(), "BOOM!!"),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(executor.panicked_task_count(), 1);

        // the worker thread survived the panic
        let rx = run_and_collect(&executor, || Ok(1));
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), Delivered::Success(1));
    }

    #[test]
    fn run_does_not_block_the_caller() {
        configure_logging();
        let executor = executor(1);
        let (gate_tx, gate_rx) = channel::bounded::<()>(0);
        let rx = run_and_collect(&executor, move || {
            gate_rx.recv().unwrap();
            Ok(7)
        });
        // run has returned while the task is still blocked on the gate
        assert!(rx.try_recv().is_err());
        gate_tx.send(()).unwrap();
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), Delivered::Success(7));
    }

    #[test]
    fn concurrent_tasks_do_not_cross_talk() {
        configure_logging();
        const TASK_COUNT: usize = 16;
        let executor = executor(TASK_COUNT);
        // every task waits on the barrier, which proves they all run concurrently
        let barrier = Arc::new(Barrier::new(TASK_COUNT));
        let (tx, rx) = channel::unbounded();
        for i in 0..TASK_COUNT {
            let barrier = barrier.clone();
            let tx = tx.clone();
            executor
                .run(
                    move || {
                        barrier.wait();
                        Ok::<_, ()>(i * 10)
                    },
                    move |value| tx.send((i, value)).unwrap(),
                    |_| panic!("no task fails"),
                )
                .unwrap();
        }
        drop(tx);
        let mut delivered: Vec<_> = rx.iter().take(TASK_COUNT).collect();
        delivered.sort();
        let expected: Vec<_> = (0..TASK_COUNT).map(|i| (i, i * 10)).collect();
        assert_eq!(delivered, expected);
        assert_eq!(executor.spawned_task_count(), TASK_COUNT as u64);
    }

    #[test]
    fn success_callback_panic_is_reported_as_uncaught() {
        configure_logging();
        let (uncaught_tx, uncaught_rx) = channel::unbounded();
        let executor = ExecutorBuilder::new(ExecutorId::generate())
            .set_pool_size(NonZeroUsize::new(1).unwrap())
            .set_uncaught_error_handler(move |err| uncaught_tx.send(err.clone()).unwrap())
            .build()
            .unwrap();
        let failure_count = Arc::new(AtomicUsize::new(0));
        {
            let failure_count = failure_count.clone();
            executor
                .run(
                    || Ok::<_, ()>(1),
                    |_| panic!("success callback BOOM"),
                    move |_| {
                        failure_count.fetch_add(1, Ordering::SeqCst);
                    },
                )
                .unwrap();
        }
        let err = uncaught_rx.recv_timeout(TIMEOUT).unwrap();
        info!("uncaught error: {}", err);
        assert_eq!(err.executor_id(), executor.id());
        assert_eq!(err.callback(), Callback::Success);
        assert_eq!(err.panic().message(), "success callback BOOM");
        assert_eq!(failure_count.load(Ordering::SeqCst), 0);
        assert_eq!(executor.callback_panic_count(), 1);
    }

    #[test]
    fn failure_callback_panic_does_not_affect_other_tasks() {
        configure_logging();
        let (uncaught_tx, uncaught_rx) = channel::unbounded();
        let executor = ExecutorBuilder::new(ExecutorId::generate())
            .set_pool_size(NonZeroUsize::new(1).unwrap())
            .set_uncaught_error_handler(move |err| uncaught_tx.send(err.callback()).unwrap())
            .build()
            .unwrap();
        executor
            .run(
                || Err::<(), _>("task failed"),
                |_| {},
                |_| panic!("failure callback BOOM"),
            )
            .unwrap();
        assert_eq!(uncaught_rx.recv_timeout(TIMEOUT).unwrap(), Callback::Failure);

        // the single worker thread is still alive
        let rx = run_and_collect(&executor, || Ok(2));
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), Delivered::Success(2));
    }

    #[test]
    fn uncaught_error_handler_panic_is_contained() {
        configure_logging();
        let executor = ExecutorBuilder::new(ExecutorId::generate())
            .set_pool_size(NonZeroUsize::new(1).unwrap())
            .set_uncaught_error_handler(|_| panic!("handler BOOM"))
            .build()
            .unwrap();
        executor
            .run(|| Ok::<_, ()>(()), |_| panic!("BOOM"), |_| {})
            .unwrap();
        let rx = run_and_collect(&executor, || Ok(3));
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), Delivered::Success(3));
        assert_eq!(executor.callback_panic_count(), 1);
    }

    #[test]
    fn submit_resolves_to_task_outcome() {
        configure_logging();
        let executor = executor(2);
        let handle = executor.submit(|| Ok::<_, String>(42)).unwrap();
        assert_eq!(handle.wait(), Ok(42));

        let handle = executor.submit(|| Err::<usize, _>("bad".to_string())).unwrap();
        assert_eq!(handle.wait(), Err(TaskFailure::Error("bad".to_string())));

        let handle = executor
            .submit(|| -> Result<usize, String> { panic!("BOOM") })
            .unwrap();
        assert!(handle.wait().unwrap_err().is_panic());

        let handle = executor.submit(|| Ok::<_, ()>("async")).unwrap();
        assert_eq!(block_on(handle), Ok("async"));
    }

    #[test]
    fn reject_policy_rejects_when_saturated() {
        configure_logging();
        let executor = ExecutorBuilder::new(ExecutorId::generate())
            .set_pool_size(NonZeroUsize::new(1).unwrap())
            .set_admission_policy(AdmissionPolicy::Reject { queue_capacity: 1 })
            .build()
            .unwrap();
        let (gate_tx, gate_rx) = channel::unbounded::<()>();
        let mut handles = vec![];
        for _ in 0..2 {
            let gate_rx = gate_rx.clone();
            handles.push(
                executor
                    .submit(move || gate_rx.recv().map_err(|_| ()))
                    .unwrap(),
            );
        }
        assert_eq!(executor.in_flight(), Some(2));
        match executor.run(|| Ok::<_, ()>(()), |_| {}, |_| {}) {
            Err(ExecutorError::Rejected {
                executor_id,
                max_in_flight,
            }) => {
                assert_eq!(executor_id, executor.id());
                assert_eq!(max_in_flight, 2);
            }
            other => panic!("expected ExecutorError::Rejected: {:?}", other),
        }
        assert_eq!(executor.rejected_task_count(), 1);

        gate_tx.send(()).unwrap();
        gate_tx.send(()).unwrap();
        for handle in handles {
            assert_eq!(handle.wait(), Ok(()));
        }
        // slots are released after the outcome is delivered
        for _ in 0..500 {
            if executor.in_flight() == Some(0) {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(executor.in_flight(), Some(0));
        assert_eq!(executor.submit(|| Ok::<_, ()>(1)).unwrap().wait(), Ok(1));
    }

    #[test]
    fn block_policy_blocks_submitter_until_a_slot_frees() {
        configure_logging();
        let executor = ExecutorBuilder::new(ExecutorId::generate())
            .set_pool_size(NonZeroUsize::new(1).unwrap())
            .set_admission_policy(AdmissionPolicy::Block { queue_capacity: 0 })
            .build()
            .unwrap();
        let (gate_tx, gate_rx) = channel::bounded::<()>(0);
        let first = executor
            .submit(move || gate_rx.recv().map_err(|_| ()))
            .unwrap();

        let (submitted_tx, submitted_rx) = channel::bounded(1);
        let submitter = {
            let executor = executor.clone();
            thread::spawn(move || {
                let handle = executor.submit(|| Ok::<_, ()>(2));
                submitted_tx.send(()).unwrap();
                handle.unwrap().wait()
            })
        };
        assert!(submitted_rx
            .recv_timeout(Duration::from_millis(100))
            .is_err());
        gate_tx.send(()).unwrap();
        assert_eq!(first.wait(), Ok(()));
        submitted_rx.recv_timeout(TIMEOUT).unwrap();
        assert_eq!(submitter.join().unwrap(), Ok(2));
    }

    #[test]
    fn spawn_futures() {
        configure_logging();
        let executor = executor(2);
        let task_executor = executor.clone();
        let handle = executor
            .spawn_with_handle(async move {
                info!("spawn_futures(): task #1");
                task_executor
                    .spawn_with_handle(async { 1 + 1 })
                    .unwrap()
                    .await
            })
            .unwrap();
        assert_eq!(block_on(handle), 2);
        assert_eq!(executor.spawned_task_count(), 2);
    }

    #[test]
    fn registered_executors() {
        configure_logging();

        for _ in 0..8 {
            assert!(ExecutorBuilder::new(ExecutorId::generate())
                .set_pool_size(NonZeroUsize::new(1).unwrap())
                .register()
                .is_ok());
        }

        let builder = ExecutorBuilder::new(ExecutorId::generate())
            .set_pool_size(NonZeroUsize::new(1).unwrap());
        let executor = builder.register().unwrap();
        assert!(executor_ids().contains(&builder.executor_id()));
        assert_eq!(
            super::executor(builder.executor_id()).unwrap().id(),
            executor.id()
        );
        match builder
            .register()
            .expect_err("expected ExecutorAlreadyRegistered")
        {
            ExecutorRegistryError::ExecutorAlreadyRegistered(id) => {
                assert_eq!(id, builder.executor_id())
            }
            err => panic!(
                "expected ExecutorAlreadyRegistered, but error was : {:?}",
                err
            ),
        }
        assert!(super::executor(ExecutorId::generate()).is_none());
    }

    #[test]
    fn global_executor_id_is_reserved() {
        let mut registry = ExecutorRegistry::default();
        match registry.register(&ExecutorBuilder::new(Executor::GLOBAL_EXECUTOR_ID)) {
            Err(ExecutorRegistryError::ExecutorAlreadyRegistered(id)) => {
                assert_eq!(id, Executor::GLOBAL_EXECUTOR_ID)
            }
            other => panic!("expected ExecutorAlreadyRegistered: {:?}", other),
        }
        assert!(registry.executor_ids().is_empty());
    }

    #[test]
    fn executor_builder_config() {
        let id = ExecutorId::generate();
        let config = ExecutorBuilder::new(id);
        assert_eq!(config.executor_id(), id);
        assert!(config.stack_size().is_none());
        assert!(config.pool_size().is_none());
        assert_eq!(config.admission_policy(), AdmissionPolicy::Unbounded);
        let config = config.set_stack_size(NonZeroUsize::new(1024 * 1024).unwrap());
        assert_eq!(config.stack_size().unwrap(), 1024 * 1024);
        assert!(config.pool_size().is_none());
        let config = config.set_pool_size(NonZeroUsize::new(64).unwrap());
        assert_eq!(config.stack_size().unwrap(), 1024 * 1024);
        assert_eq!(config.pool_size().unwrap(), 64);
        let config = config.set_admission_policy(AdmissionPolicy::Block { queue_capacity: 8 });
        assert_eq!(
            config.admission_policy(),
            AdmissionPolicy::Block { queue_capacity: 8 }
        );
    }

    #[test]
    fn executor_builder_json() {
        let builder = ExecutorBuilder::new(ExecutorId::generate())
            .set_pool_size(NonZeroUsize::new(8).unwrap())
            .set_admission_policy(AdmissionPolicy::Reject { queue_capacity: 4 })
            .set_uncaught_error_handler(|_| {});
        let json = serde_json::to_string(&builder).unwrap();
        info!("{}", json);
        let decoded: ExecutorBuilder = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.executor_id(), builder.executor_id());
        assert_eq!(decoded.pool_size(), Some(8));
        assert!(decoded.stack_size().is_none());
        assert_eq!(
            decoded.admission_policy(),
            AdmissionPolicy::Reject { queue_capacity: 4 }
        );
        assert!(decoded.uncaught_error_handler.is_none());

        let decoded: ExecutorBuilder = serde_json::from_str(
            r#"{"id":1871427164235073850597045237139528853,"stack_size":null,"pool_size":null}"#,
        )
        .unwrap();
        assert_eq!(decoded.executor_id(), Executor::GLOBAL_EXECUTOR_ID);
        assert_eq!(decoded.admission_policy(), AdmissionPolicy::Unbounded);
    }

    #[test]
    fn build_rejects_oversized_admission_limit() {
        configure_logging();
        let policies = [
            AdmissionPolicy::Reject {
                queue_capacity: usize::MAX,
            },
            AdmissionPolicy::Block {
                queue_capacity: usize::MAX,
            },
            AdmissionPolicy::Reject {
                queue_capacity: AdmissionPolicy::MAX_IN_FLIGHT_LIMIT,
            },
        ];
        for policy in policies.iter() {
            let builder = ExecutorBuilder::new(ExecutorId::generate())
                .set_pool_size(NonZeroUsize::new(2).unwrap())
                .set_admission_policy(*policy);
            match builder.build() {
                Err(ExecutorRegistryError::AdmissionLimitTooLarge {
                    max_in_flight,
                    limit,
                }) => {
                    info!("{:?} -> {} > {}", policy, max_in_flight, limit);
                    assert_eq!(max_in_flight, policy.max_in_flight(2).unwrap());
                    assert_eq!(limit, AdmissionPolicy::MAX_IN_FLIGHT_LIMIT);
                }
                other => panic!("expected AdmissionLimitTooLarge, but got: {:?}", other),
            }
        }

        // a limit that is decoded from config is checked the same way
        let builder: ExecutorBuilder = serde_json::from_str(&format!(
            r#"{{"id":1,"stack_size":null,"pool_size":1,"admission_policy":{{"Block":{{"queue_capacity":{}}}}}}}"#,
            usize::MAX
        ))
        .unwrap();
        assert!(builder.build().is_err());

        // the limit itself is accepted
        let executor = ExecutorBuilder::new(ExecutorId::generate())
            .set_pool_size(NonZeroUsize::new(1).unwrap())
            .set_admission_policy(AdmissionPolicy::Reject {
                queue_capacity: AdmissionPolicy::MAX_IN_FLIGHT_LIMIT - 1,
            })
            .build()
            .unwrap();
        assert_eq!(executor.pool_size(), 1);
    }

    #[test]
    fn executor_id_is_displayed_as_ulid() {
        let id = ExecutorId::generate();
        let text = id.to_string();
        assert_eq!(text.len(), 26);
        let ulid: rusty_ulid::Ulid = text.parse().unwrap();
        assert_eq!(u128::from(ulid), id.0);
    }
}
