// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! The dispatcher and its fixed group of workers.
//!
//! The dispatcher keeps at most `worker_count` tasks in flight on a bounded task
//! channel and blocks on the result channel for the next completion. Once every
//! result is in, or the batch fails, it sends one stop message per worker and joins
//! them.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, info};

use super::cancel::CancelHandle;
use super::DistributeError;

/// How long the dispatcher waits for a result when no liveness timeout is set.
const IDLE_WAIT: Duration = Duration::from_millis(100);

/// Settings for one batch.
#[derive(Debug, Clone, Default)]
pub struct PoolOptions {
    /// Number of worker threads. 0 runs every task in the calling thread.
    pub worker_count: usize,
    /// Fail the batch if no result arrives for this long.
    pub liveness_timeout: Option<Duration>,
    /// Cancels the batch from outside.
    pub cancel: CancelHandle,
}

impl PoolOptions {
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count,
            ..Default::default()
        }
    }

    pub fn with_liveness_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.liveness_timeout = timeout;
        self
    }
}

/// A message on the task channel.
enum Message<T> {
    Task(usize, T),
    Stop,
}

/// How a task ended.
enum Outcome<R, E> {
    Done(R),
    Failed(E),
    Panicked(String),
}

/// Runs `worker_fn` over every task with `worker_count` workers sharing `shared`.
///
/// Results come back in completion order.
pub fn run<T, S, R, E, F>(
    worker_count: usize,
    tasks: Vec<T>,
    shared: S,
    worker_fn: F,
) -> Result<Vec<R>, DistributeError<E>>
where
    T: Send + 'static,
    S: Send + Sync + 'static,
    R: Send + 'static,
    E: std::error::Error + Send + 'static,
    F: Fn(&S, T) -> Result<R, E> + Send + Sync + 'static,
{
    run_with(&PoolOptions::new(worker_count), tasks, shared, worker_fn)
}

/// Like [run], with a liveness timeout and an external cancel handle.
pub fn run_with<T, S, R, E, F>(
    options: &PoolOptions,
    tasks: Vec<T>,
    shared: S,
    worker_fn: F,
) -> Result<Vec<R>, DistributeError<E>>
where
    T: Send + 'static,
    S: Send + Sync + 'static,
    R: Send + 'static,
    E: std::error::Error + Send + 'static,
    F: Fn(&S, T) -> Result<R, E> + Send + Sync + 'static,
{
    if options.worker_count == 0 {
        return run_sequential(&options.cancel, tasks, &shared, &worker_fn);
    }

    let task_count = tasks.len();
    let worker_count = options.worker_count.min(task_count.max(1));
    info!(workers = worker_count, tasks = task_count, "Starting worker pool");

    let (task_tx, task_rx) = crossbeam_channel::bounded::<Message<T>>(worker_count);
    let (result_tx, result_rx) = crossbeam_channel::unbounded::<(usize, Outcome<R, E>)>();
    let shared = Arc::new(shared);
    let worker_fn = Arc::new(worker_fn);

    let workers: Vec<JoinHandle<()>> = (0..worker_count)
        .map(|id| {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            let shared = shared.clone();
            let worker_fn = worker_fn.clone();
            let cancel = options.cancel.clone();
            thread::spawn(move || worker(id, task_rx, result_tx, shared, worker_fn, cancel))
        })
        .collect();
    drop(result_tx);

    let collected = dispatch(options, &task_tx, &result_rx, tasks, worker_count);

    match &collected {
        Err(DistributeError::Timeout(_)) => {
            // A stalled worker would never join. Ask the rest to stop and leave them.
            options.cancel.cancel();
            for _ in 0..worker_count {
                let _ = task_tx.try_send(Message::Stop);
            }
        }
        _ => {
            if collected.is_err() {
                options.cancel.cancel();
            }
            for _ in 0..worker_count {
                if task_tx.send(Message::Stop).is_err() {
                    break;
                }
            }
            for handle in workers {
                if handle.join().is_err() {
                    error!("Worker thread exited abnormally");
                }
            }
        }
    }

    collected
}

/// Feeds tasks and collects results until every task has reported back.
fn dispatch<T, R, E>(
    options: &PoolOptions,
    task_tx: &Sender<Message<T>>,
    result_rx: &Receiver<(usize, Outcome<R, E>)>,
    tasks: Vec<T>,
    worker_count: usize,
) -> Result<Vec<R>, DistributeError<E>>
where
    E: std::error::Error + 'static,
{
    let task_count = tasks.len();
    let mut pending = tasks.into_iter().enumerate();
    let mut results = Vec::with_capacity(task_count);
    let mut in_flight = 0;
    let mut idle = Duration::ZERO;

    while results.len() < task_count {
        if options.cancel.is_cancelled() {
            return Err(DistributeError::Cancelled);
        }

        while in_flight < worker_count {
            let Some((index, task)) = pending.next() else {
                break;
            };
            task_tx
                .send(Message::Task(index, task))
                .map_err(|_| DistributeError::Disconnected)?;
            in_flight += 1;
        }

        let wait = options.liveness_timeout.map_or(IDLE_WAIT, |t| t.min(IDLE_WAIT));
        match result_rx.recv_timeout(wait) {
            Ok((index, outcome)) => {
                in_flight -= 1;
                idle = Duration::ZERO;
                results.push(into_result(index, outcome)?);
            }
            Err(RecvTimeoutError::Timeout) => {
                idle += wait;
                if let Some(timeout) = options.liveness_timeout {
                    if idle >= timeout {
                        error!(timeout = ?timeout, in_flight, "Worker pool stalled");
                        return Err(DistributeError::Timeout(timeout));
                    }
                }
            }
            Err(RecvTimeoutError::Disconnected) => return Err(DistributeError::Disconnected),
        }
    }

    Ok(results)
}

fn worker<T, S, R, E, F>(
    id: usize,
    task_rx: Receiver<Message<T>>,
    result_tx: Sender<(usize, Outcome<R, E>)>,
    shared: Arc<S>,
    worker_fn: Arc<F>,
    cancel: CancelHandle,
) where
    F: Fn(&S, T) -> Result<R, E>,
{
    debug!(worker = id, "Worker started");
    while let Ok(Message::Task(index, task)) = task_rx.recv() {
        if cancel.is_cancelled() {
            continue;
        }
        let outcome = execute(&*shared, &*worker_fn, task);
        if result_tx.send((index, outcome)).is_err() {
            break;
        }
    }
    debug!(worker = id, "Worker stopped");
}

/// Runs a task, turning a panic into an outcome instead of tearing down the worker.
fn execute<T, S, R, E, F>(shared: &S, worker_fn: &F, task: T) -> Outcome<R, E>
where
    F: Fn(&S, T) -> Result<R, E>,
{
    match panic::catch_unwind(AssertUnwindSafe(|| worker_fn(shared, task))) {
        Ok(Ok(result)) => Outcome::Done(result),
        Ok(Err(e)) => Outcome::Failed(e),
        Err(payload) => Outcome::Panicked(panic_message(payload)),
    }
}

fn into_result<R, E>(index: usize, outcome: Outcome<R, E>) -> Result<R, DistributeError<E>>
where
    E: std::error::Error + 'static,
{
    match outcome {
        Outcome::Done(result) => Ok(result),
        Outcome::Failed(source) => Err(DistributeError::Task { index, source }),
        Outcome::Panicked(message) => Err(DistributeError::Panic { index, message }),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Runs every task in order on the calling thread.
fn run_sequential<T, S, R, E, F>(
    cancel: &CancelHandle,
    tasks: Vec<T>,
    shared: &S,
    worker_fn: &F,
) -> Result<Vec<R>, DistributeError<E>>
where
    E: std::error::Error + 'static,
    F: Fn(&S, T) -> Result<R, E>,
{
    debug!(tasks = tasks.len(), "Running tasks sequentially");
    tasks
        .into_iter()
        .enumerate()
        .map(|(index, task)| {
            if cancel.is_cancelled() {
                return Err(DistributeError::Cancelled);
            }
            into_result(index, execute(shared, worker_fn, task))
        })
        .collect()
}
