//! Pre-populated task queue shared by all workers

use std::collections::VecDeque;

use tokio::sync::Mutex;

use crate::types::AttemptTask;

/// Finite, thread-safe queue of attempt tasks.
///
/// Population is eager and happens before workers start, so consumers never
/// race a producer: `try_dequeue` hands each task to exactly one caller and
/// returns `None` without blocking once the queue is exhausted. Tasks are
/// never requeued.
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: Mutex<VecDeque<AttemptTask>>,
}

impl TaskQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(VecDeque::new()),
        }
    }

    /// Create a queue holding the given tasks in order
    pub fn from_tasks(tasks: Vec<AttemptTask>) -> Self {
        Self {
            tasks: Mutex::new(VecDeque::from(tasks)),
        }
    }

    /// Append a task during population
    pub async fn enqueue(&self, task: AttemptTask) {
        self.tasks.lock().await.push_back(task);
    }

    /// Pop the next task, or `None` once the queue is exhausted
    pub async fn try_dequeue(&self) -> Option<AttemptTask> {
        self.tasks.lock().await.pop_front()
    }

    /// Number of tasks not yet handed to a worker
    pub async fn remaining(&self) -> usize {
        self.tasks.lock().await.len()
    }
}
