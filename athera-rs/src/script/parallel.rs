//! Fork/join execution for `run parallel`.
//!
//! Each unit is a closure over an independently owned interpreter fork.  Units
//! run on the blocking pool of a tokio runtime and the caller waits for all of
//! them before continuing.  The runtime is the ambient one when the caller is
//! already inside a tokio context (the CLI drives the interpreter from a
//! blocking task), otherwise a process-wide runtime built on first use.
//!
//! Joining uses `Handle::block_on`, so callers must not be running on an async
//! worker thread.  Programs should run on a runtime from [`build_runtime`] so
//! that deep recursion reaches the depth limit before the thread stack runs out.

use std::sync::LazyLock;

use log::debug;
use tokio::runtime::{Builder, Handle, Runtime};

use super::fault::Fault;
use super::interp::MAX_DEPTH_LIMIT;

/// Stack reserved per level of nested `run`, plus a fixed base.
const STACK_PER_LEVEL: usize = 64 * 1024;
const STACK_BASE: usize = 2 * 1024 * 1024;

/// A runtime whose threads can hold `max_depth` nested task calls, with
/// enough blocking threads for `run parallel` nested that deep.
pub fn build_runtime(max_depth: usize) -> std::io::Result<Runtime> {
    Builder::new_multi_thread()
        .thread_name("athera")
        .thread_stack_size(STACK_BASE + max_depth * STACK_PER_LEVEL)
        .max_blocking_threads(max_depth + 64)
        .enable_all()
        .build()
}

static FALLBACK: LazyLock<Result<Runtime, String>> =
    LazyLock::new(|| build_runtime(MAX_DEPTH_LIMIT).map_err(|e| e.to_string()));

fn runtime_handle() -> Result<Handle, Fault> {
    if let Ok(handle) = Handle::try_current() {
        return Ok(handle);
    }
    match &*FALLBACK {
        Ok(rt) => Ok(rt.handle().clone()),
        Err(e) => Err(Fault::Scheduler(e.clone())),
    }
}

/// Run every job concurrently and wait for all of them.  Results come back in
/// launch order.  A job that panics is reported as a scheduler fault once
/// every other job has finished.
pub(crate) fn fork_join<T, F>(jobs: Vec<F>) -> Result<Vec<T>, Fault>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let handle = runtime_handle()?;
    debug!("launching {} parallel units", jobs.len());

    let pending: Vec<_> = jobs.into_iter().map(|job| handle.spawn_blocking(job)).collect();

    let mut results = Vec::with_capacity(pending.len());
    let mut failure = None;
    for task in pending {
        match handle.block_on(task) {
            Ok(value) => results.push(value),
            Err(e) => {
                debug!("parallel unit failed to complete: {e}");
                failure.get_or_insert_with(|| Fault::Scheduler(e.to_string()));
            }
        }
    }

    match failure {
        Some(fault) => Err(fault),
        None => Ok(results),
    }
}
