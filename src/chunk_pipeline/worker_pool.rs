// In: src/chunk_pipeline/worker_pool.rs

//! A bounded-concurrency task scheduler with key-ordered result delivery.
//!
//! Tasks are independent, pure chunk transforms (byte chunk -> colors, frame ->
//! symbols). They run on a dedicated `rayon` thread pool of `N` threads, so at
//! most `N` execute at once. Completions come back over a `crossbeam-channel`
//! as tagged `TaskEvent`s and are reordered by their caller-supplied order key:
//! a sparse map holds results that finished early, and a `next_expected_key`
//! cursor releases them strictly in ascending key order.
//!
//! Backpressure: `submit` blocks, absorbing completions, while the number of
//! submitted-but-not-yet-released keys has reached `max_pending`.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use hashbrown::{HashMap, HashSet};

use crate::error::ChromaError;
use crate::progress::{NoProgress, ProgressObserver, ProgressTracker};

//==================================================================================
// 1. Worker Messages
//==================================================================================

/// The single message type workers send back to the coordinator.
#[derive(Debug)]
pub enum TaskEvent<T> {
    /// Incremental work units (bytes, pixels) finished by a running task.
    Progress { key: u64, units: u64 },
    Success { key: u64, output: T },
    Failure { key: u64, error: ChromaError },
}

/// Handed to each task so it can report progress while it runs.
pub struct ProgressReporter<T> {
    key: u64,
    sender: Sender<TaskEvent<T>>,
}

impl<T> ProgressReporter<T> {
    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn report(&self, units: u64) {
        // The coordinator may already be gone during an abort; nothing to do then.
        let _ = self.sender.send(TaskEvent::Progress {
            key: self.key,
            units,
        });
    }
}

/// Receipt for a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskTicket {
    key: u64,
}

impl TaskTicket {
    pub fn key(&self) -> u64 {
        self.key
    }
}

//==================================================================================
// 2. The Pool
//==================================================================================

pub struct WorkerPool<T: Send + 'static> {
    name: String,
    threads: Option<rayon::ThreadPool>,
    worker_count: usize,
    sender: Sender<TaskEvent<T>>,
    receiver: Receiver<TaskEvent<T>>,
    /// Keys submitted and not yet released, whether running or parked.
    outstanding: HashSet<u64>,
    /// Results that completed ahead of the cursor.
    parked: HashMap<u64, T>,
    /// Results already in order, waiting for the caller.
    ready: VecDeque<(u64, T)>,
    next_expected_key: u64,
    in_flight: usize,
    max_pending: usize,
    closed: bool,
    progress: ProgressTracker,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Creates a pool with `workers` threads that holds at most `max_pending`
    /// unreleased tasks.
    pub fn new(name: &str, workers: usize, max_pending: usize) -> Result<Self, ChromaError> {
        if workers == 0 || max_pending == 0 {
            return Err(ChromaError::InvalidConfig(format!(
                "worker pool '{}' needs at least one worker and one pending slot",
                name
            )));
        }
        let thread_prefix = name.to_string();
        let threads = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(move |i| format!("{}-{}", thread_prefix, i))
            .build()
            .map_err(|e| {
                ChromaError::InternalError(format!("failed to start worker pool '{}': {}", name, e))
            })?;
        let (sender, receiver) = crossbeam_channel::unbounded();

        log::debug!(
            "Worker pool '{}' started: {} workers, {} pending slots",
            name,
            workers,
            max_pending
        );

        Ok(Self {
            name: name.to_string(),
            threads: Some(threads),
            worker_count: workers,
            sender,
            receiver,
            outstanding: HashSet::new(),
            parked: HashMap::new(),
            ready: VecDeque::new(),
            next_expected_key: 0,
            in_flight: 0,
            max_pending,
            closed: false,
            progress: ProgressTracker::new(Box::new(NoProgress)),
        })
    }

    /// Installs the observer that receives the tasks' progress events.
    pub fn with_observer(mut self, observer: Box<dyn ProgressObserver>) -> Self {
        self.progress = ProgressTracker::new(observer);
        self
    }

    /// Starts a new progress stage for subsequent `Progress` events.
    pub fn begin_progress(&mut self, label: &str, total: Option<u64>) {
        self.progress.begin(label, total);
    }

    pub fn finish_progress(&mut self) {
        self.progress.finish();
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Submitted keys not yet released to the caller.
    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Schedules `task` under `order_key`. Keys must be dense, start at 0 and
    /// never repeat. Blocks while the pending window is full.
    ///
    /// A task failure observed while waiting is returned here.
    pub fn submit<F>(&mut self, order_key: u64, task: F) -> Result<TaskTicket, ChromaError>
    where
        F: FnOnce(&ProgressReporter<T>) -> Result<T, ChromaError> + Send + 'static,
    {
        if self.closed {
            return Err(ChromaError::PoolClosed);
        }
        if order_key < self.next_expected_key || self.outstanding.contains(&order_key) {
            return Err(ChromaError::InternalError(format!(
                "order key {} was already submitted to pool '{}'",
                order_key, self.name
            )));
        }

        while self.outstanding.len() >= self.max_pending {
            self.receive_blocking()?;
        }

        let threads = self.threads.as_ref().ok_or(ChromaError::PoolClosed)?;
        let sender = self.sender.clone();
        threads.spawn(move || {
            let reporter = ProgressReporter {
                key: order_key,
                sender,
            };
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| task(&reporter)));
            let event = match outcome {
                Ok(Ok(output)) => TaskEvent::Success {
                    key: order_key,
                    output,
                },
                Ok(Err(error)) => TaskEvent::Failure {
                    key: order_key,
                    error,
                },
                Err(payload) => TaskEvent::Failure {
                    key: order_key,
                    error: ChromaError::TaskFailed {
                        key: order_key,
                        message: panic_message(payload.as_ref()),
                        source: None,
                    },
                },
            };
            let _ = reporter.sender.send(event);
        });

        self.outstanding.insert(order_key);
        self.in_flight += 1;
        Ok(TaskTicket { key: order_key })
    }

    /// Returns every result that can be released in order right now, without blocking.
    pub fn drain_ready(&mut self) -> Result<Vec<(u64, T)>, ChromaError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => self.handle_event(event)?,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        Ok(self.ready.drain(..).collect())
    }

    /// Blocks until the next result in key order is available. `None` once every
    /// submitted task has been released.
    pub fn next_ordered(&mut self) -> Option<Result<(u64, T), ChromaError>> {
        loop {
            if let Some(item) = self.ready.pop_front() {
                return Some(Ok(item));
            }
            if self.outstanding.is_empty() {
                return None;
            }
            if let Err(err) = self.receive_blocking() {
                return Some(Err(err));
            }
        }
    }

    /// Iterates over all remaining results in key order.
    pub fn results(&mut self) -> OrderedResults<'_, T> {
        OrderedResults { pool: self }
    }

    /// Stops accepting work, waits for every in-flight task, then releases the
    /// worker threads. Results that completed meanwhile stay retrievable.
    /// Returns the first task failure seen while waiting, if any.
    pub fn shutdown(&mut self) -> Result<(), ChromaError> {
        self.closed = true;
        let mut first_failure = None;
        while self.in_flight > 0 {
            let event = match self.receiver.recv() {
                Ok(event) => event,
                Err(_) => break,
            };
            if let Err(err) = self.handle_event(event) {
                log::warn!("Pool '{}': task failed during shutdown: {}", self.name, err);
                first_failure.get_or_insert(err);
            }
        }
        if self.threads.take().is_some() {
            log::debug!("Worker pool '{}' shut down", self.name);
        }
        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    //==============================================================================
    // Internal Event Handling
    //==============================================================================

    fn receive_blocking(&mut self) -> Result<(), ChromaError> {
        if self.in_flight == 0 {
            return Err(ChromaError::InternalError(format!(
                "pool '{}' is waiting for order key {} which was never submitted",
                self.name, self.next_expected_key
            )));
        }
        let event = self.receiver.recv().map_err(|_| {
            ChromaError::InternalError(format!("pool '{}' lost its event channel", self.name))
        })?;
        self.handle_event(event)
    }

    fn handle_event(&mut self, event: TaskEvent<T>) -> Result<(), ChromaError> {
        match event {
            TaskEvent::Progress { units, .. } => {
                self.progress.advance(units);
                Ok(())
            }
            TaskEvent::Success { key, output } => {
                self.in_flight -= 1;
                self.parked.insert(key, output);
                self.release_in_order();
                Ok(())
            }
            TaskEvent::Failure { key, error } => {
                self.in_flight -= 1;
                self.outstanding.remove(&key);
                Err(match error {
                    err @ ChromaError::TaskFailed { .. } => err,
                    other => ChromaError::TaskFailed {
                        key,
                        message: other.to_string(),
                        source: Some(Box::new(other)),
                    },
                })
            }
        }
    }

    fn release_in_order(&mut self) {
        while let Some(output) = self.parked.remove(&self.next_expected_key) {
            self.outstanding.remove(&self.next_expected_key);
            self.ready.push_back((self.next_expected_key, output));
            self.next_expected_key += 1;
        }
    }
}

impl<T: Send + 'static> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        if !self.closed || self.in_flight > 0 {
            let _ = self.shutdown();
        }
    }
}

/// Iterator returned by `WorkerPool::results`.
pub struct OrderedResults<'a, T: Send + 'static> {
    pool: &'a mut WorkerPool<T>,
}

impl<'a, T: Send + 'static> Iterator for OrderedResults<'a, T> {
    type Item = Result<(u64, T), ChromaError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.pool.next_ordered()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("task panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("task panicked: {}", s)
    } else {
        "task panicked".to_string()
    }
}

#[cfg(test)]
#[path = "worker_pool_tests.rs"]
mod tests;
