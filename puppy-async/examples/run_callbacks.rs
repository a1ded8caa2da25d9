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

//! Runs a handful of tasks on a small Executor and prints where each outcome was delivered.

use puppy_async::execution::{ExecutorBuilder, ExecutorId, TaskFailure};
use puppy_log::{info, Level, LogConfigBuilder, LogOutput, Target};
use std::{num::NonZeroUsize, thread, time::Duration};

fn main() -> Result<(), failure::Error> {
    puppy_log::init(
        LogConfigBuilder::new(Level::Info)
            .target_level(Target::from("puppy_async"), Level::Debug)
            .output(LogOutput::Stderr)
            .build(),
    )?;

    let executor = ExecutorBuilder::new(ExecutorId::generate())
        .set_pool_size(NonZeroUsize::new(4).unwrap())
        .set_uncaught_error_handler(|err| eprintln!("uncaught: {}", err))
        .build()?;

    let (tx, rx) = crossbeam::channel::unbounded();
    for input in vec!["1", "2", "three", "4"] {
        let success_tx = tx.clone();
        let failure_tx = tx.clone();
        executor.run(
            move || input.parse::<u32>(),
            move |value| {
                success_tx
                    .send(format!("{:?} parsed {} -> {}", thread::current().name(), input, value))
                    .unwrap()
            },
            move |failure: TaskFailure<_>| {
                failure_tx
                    .send(format!("{:?} failed {}: {}", thread::current().name(), input, failure))
                    .unwrap()
            },
        )?;
    }
    drop(tx);

    for line in rx.iter() {
        info!("{}", line);
    }

    // the success callback panics: it is reported as uncaught, never routed to the failure callback
    executor.run(|| Ok::<_, ()>(()), |_| panic!("BOOM"), |_| unreachable!())?;
    thread::sleep(Duration::from_millis(100));
    info!("callback panics: {}", executor.callback_panic_count());
    Ok(())
}
