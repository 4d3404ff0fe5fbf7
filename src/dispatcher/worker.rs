// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crossbeam_channel::RecvTimeoutError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::dispatcher::{BoxedTask, PoolShared};
use crate::observability::messages::dispatcher::{WorkerRetired, WorkerTaskPanicked};
use crate::observability::messages::StructuredLog;
use crate::utils::panic_message;

/// Worker thread body: run the first task, then serve the queue until retired or closed.
pub(crate) fn run(shared: Arc<PoolShared>, worker_id: usize, first: BoxedTask) {
    execute(worker_id, first);

    let keep_alive = shared.config().keep_alive();
    loop {
        match shared.receiver().recv_timeout(keep_alive) {
            Ok(task) => {
                if shared.is_shut_down() {
                    task.abandon(shared.shutdown_error());
                } else {
                    execute(worker_id, task);
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if let Some(live_workers) = shared.try_retire_worker() {
                    WorkerRetired {
                        worker_id,
                        live_workers,
                        idle: keep_alive,
                    }
                    .log();
                    return;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    shared.release_worker();
}

fn execute(worker_id: usize, task: BoxedTask) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(move || task.run())) {
        WorkerTaskPanicked {
            worker_id,
            message: &panic_message(panic.as_ref()),
        }
        .log();
    }
}
