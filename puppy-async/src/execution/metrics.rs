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

//! execution related metrics
//! - every metric is labeled with the ExecutorId, see [EXECUTOR_ID_LABEL](constant.EXECUTOR_ID_LABEL.html)

use super::ExecutorId;
use lazy_static::lazy_static;
use prometheus::{
    core::{Collector, Desc},
    register_int_counter_vec, register_int_gauge_vec, IntCounter, IntCounterVec, IntGaugeVec,
};

/// The ExecutorId will be used as the label value
pub const EXECUTOR_ID_LABEL: &str = "executor_id";

lazy_static! {
    /// Metric: Number of tasks that the Executor has spawned
    static ref TASK_SPAWNED_COUNTER: IntCounterVec = register_int_counter_vec!(
        "puppy_executor_task_spawned_count",
        "Task spawned count",
        &[EXECUTOR_ID_LABEL]
    ).unwrap();

    /// Metric: Number of tasks that produced a value
    static ref TASK_SUCCEEDED_COUNTER: IntCounterVec = register_int_counter_vec!(
        "puppy_executor_task_succeeded_count",
        "Task succeeded count",
        &[EXECUTOR_ID_LABEL]
    ).unwrap();

    /// Metric: Number of tasks that failed, including tasks that panicked
    static ref TASK_FAILED_COUNTER: IntCounterVec = register_int_counter_vec!(
        "puppy_executor_task_failed_count",
        "Task failed count",
        &[EXECUTOR_ID_LABEL]
    ).unwrap();

    /// Metric: Number of tasks that panicked
    static ref TASK_PANIC_COUNTER: IntCounterVec = register_int_counter_vec!(
        "puppy_executor_task_panic_count",
        "Task panic count",
        &[EXECUTOR_ID_LABEL]
    ).unwrap();

    /// Metric: Number of submissions that were rejected by the admission policy
    static ref TASK_REJECTED_COUNTER: IntCounterVec = register_int_counter_vec!(
        "puppy_executor_task_rejected_count",
        "Task rejected count",
        &[EXECUTOR_ID_LABEL]
    ).unwrap();

    /// Metric: Number of success or failure callbacks that panicked
    static ref CALLBACK_PANIC_COUNTER: IntCounterVec = register_int_counter_vec!(
        "puppy_executor_callback_panic_count",
        "Callback panic count",
        &[EXECUTOR_ID_LABEL]
    ).unwrap();

    /// Metric: Executor thread pool sizes
    static ref THREAD_POOL_SIZE_GAUGE: IntGaugeVec = register_int_gauge_vec!(
        "puppy_executor_thread_pool_size",
        "Thread pool size",
        &[EXECUTOR_ID_LABEL]
    ).unwrap();
}

/// The metrics for a single Executor
#[derive(Debug, Clone)]
pub(crate) struct ExecutorMetrics {
    pub(crate) spawned: IntCounter,
    pub(crate) succeeded: IntCounter,
    pub(crate) failed: IntCounter,
    pub(crate) panicked: IntCounter,
    pub(crate) rejected: IntCounter,
    pub(crate) callback_panics: IntCounter,
}

impl ExecutorMetrics {
    /// Registers the Executor's labelled series with every executor metric.
    ///
    /// The series are never removed, i.e., each built Executor permanently adds one series per
    /// metric to the default prometheus registry, even after the Executor is dropped. Executors
    /// are meant to be built once and shared, not built per request.
    pub(crate) fn new(id: ExecutorId, pool_size: usize) -> Self {
        let label = id.to_string();
        let labels = [label.as_str()];
        THREAD_POOL_SIZE_GAUGE
            .with_label_values(&labels)
            .set(pool_size as i64);
        Self {
            spawned: TASK_SPAWNED_COUNTER.with_label_values(&labels),
            succeeded: TASK_SUCCEEDED_COUNTER.with_label_values(&labels),
            failed: TASK_FAILED_COUNTER.with_label_values(&labels),
            panicked: TASK_PANIC_COUNTER.with_label_values(&labels),
            rejected: TASK_REJECTED_COUNTER.with_label_values(&labels),
            callback_panics: CALLBACK_PANIC_COUNTER.with_label_values(&labels),
        }
    }
}

/// Gathers Executor related metrics
pub fn gather_metrics() -> Vec<prometheus::proto::MetricFamily> {
    let mut mfs = Vec::with_capacity(7);
    mfs.extend(TASK_SPAWNED_COUNTER.collect());
    mfs.extend(TASK_SUCCEEDED_COUNTER.collect());
    mfs.extend(TASK_FAILED_COUNTER.collect());
    mfs.extend(TASK_PANIC_COUNTER.collect());
    mfs.extend(TASK_REJECTED_COUNTER.collect());
    mfs.extend(CALLBACK_PANIC_COUNTER.collect());
    mfs.extend(THREAD_POOL_SIZE_GAUGE.collect());
    mfs
}

/// Returns Executor related metric descriptors
pub fn metric_descs() -> Vec<&'static Desc> {
    let mut descs = Vec::with_capacity(7);
    descs.extend(TASK_SPAWNED_COUNTER.desc());
    descs.extend(TASK_SUCCEEDED_COUNTER.desc());
    descs.extend(TASK_FAILED_COUNTER.desc());
    descs.extend(TASK_PANIC_COUNTER.desc());
    descs.extend(TASK_REJECTED_COUNTER.desc());
    descs.extend(CALLBACK_PANIC_COUNTER.desc());
    descs.extend(THREAD_POOL_SIZE_GAUGE.desc());
    descs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executor_metrics_are_labeled_by_executor_id() {
        let id = ExecutorId::generate();
        let metrics = ExecutorMetrics::new(id, 3);
        metrics.spawned.inc();
        metrics.spawned.inc();
        metrics.rejected.inc();

        let label = id.to_string();
        let value_for = |name: &str| {
            gather_metrics()
                .into_iter()
                .find(|mf| mf.get_name() == name)
                .and_then(|mf| {
                    mf.get_metric()
                        .iter()
                        .find(|metric| {
                            metric.get_label().iter().any(|pair| {
                                pair.get_name() == EXECUTOR_ID_LABEL && pair.get_value() == label
                            })
                        })
                        .map(|metric| {
                            if metric.has_gauge() {
                                metric.get_gauge().get_value()
                            } else {
                                metric.get_counter().get_value()
                            }
                        })
                })
        };
        assert_eq!(value_for("puppy_executor_task_spawned_count"), Some(2.0));
        assert_eq!(value_for("puppy_executor_task_rejected_count"), Some(1.0));
        assert_eq!(value_for("puppy_executor_thread_pool_size"), Some(3.0));
    }

    #[test]
    fn metric_descs_are_registered() {
        let names: Vec<_> = metric_descs()
            .iter()
            .map(|desc| desc.fq_name.clone())
            .collect();
        assert_eq!(names.len(), 7);
        assert!(names.contains(&"puppy_executor_callback_panic_count".to_string()));
    }
}
