use std::future::Future;
use tokio::task::{JoinError, JoinSet};

/// Bounded pool of fetch tasks whose results are collected by one owner.
///
/// Tasks never touch crawl state; they only hand their output back through
/// [`TaskPool::next_completed`].
#[derive(Debug)]
pub struct TaskPool<T> {
    tasks: JoinSet<T>,
    capacity: usize,
}

impl<T: Send + 'static> TaskPool<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            tasks: JoinSet::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn outstanding(&self) -> usize {
        self.tasks.len()
    }

    pub fn has_capacity(&self) -> bool {
        self.outstanding() < self.capacity
    }

    /// Refill threshold: fewer than half the workers are busy.
    pub fn below_half(&self) -> bool {
        self.outstanding() < self.capacity.div_ceil(2)
    }

    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        self.tasks.spawn(task);
    }

    /// Wait for the next task to finish. `None` once the pool is empty.
    pub async fn next_completed(&mut self) -> Option<Result<T, JoinError>> {
        self.tasks.join_next().await
    }

    /// Abort whatever is still running and wait for it to wind down.
    pub async fn shutdown(&mut self) {
        self.tasks.shutdown().await;
    }
}
