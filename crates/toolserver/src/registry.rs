//! In-memory registry of download tasks.
//!
//! Every read hands out an owned copy, so callers never hold the lock and
//! never observe a half-applied update.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::task::{MediaFormat, Task, TaskStatus, TaskUpdate};

/// Errors returned by [`TaskRegistry::update`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Task not found: {id}")]
    NotFound { id: String },

    /// The task already reached `success` or `error`.
    #[error("Task {id} is already {status}")]
    Terminal { id: String, status: TaskStatus },

    #[error("Task {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: TaskStatus,
        to: TaskStatus,
    },
}

struct Entry {
    seq: u64,
    task: Task,
}

#[derive(Default)]
struct Inner {
    tasks: HashMap<String, Entry>,
    next_seq: u64,
}

/// Thread-safe map of task id to task record. Tasks are never evicted.
#[derive(Default)]
pub struct TaskRegistry {
    inner: Mutex<Inner>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers a new `pending` task and returns a snapshot of it.
    pub fn create(&self, url: impl Into<String>, format: MediaFormat, height: Option<u32>) -> Task {
        let id = Uuid::new_v4().simple().to_string();

        // stamped under the lock so creation time follows registration order
        let mut inner = self.lock();
        let task = Task::new(id.clone(), url.into(), format, height);
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.tasks.insert(
            id,
            Entry {
                seq,
                task: task.clone(),
            },
        );
        task
    }

    /// Merges `update` into the task and returns the resulting snapshot.
    ///
    /// Terminal tasks are never mutated and status changes must follow the
    /// task state machine.
    pub fn update(&self, id: &str, update: TaskUpdate) -> Result<Task, RegistryError> {
        let mut inner = self.lock();
        let entry = inner
            .tasks
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound { id: id.to_string() })?;
        let task = &mut entry.task;

        if task.status.is_terminal() {
            return Err(RegistryError::Terminal {
                id: id.to_string(),
                status: task.status,
            });
        }
        if let Some(next) = update.status {
            if !task.status.can_transition_to(next) {
                return Err(RegistryError::InvalidTransition {
                    id: id.to_string(),
                    from: task.status,
                    to: next,
                });
            }
        }

        let from = task.status;
        task.apply(update);
        if task.status != from {
            debug!(task_id = id, %from, to = %task.status, "task transition");
        }
        Ok(task.clone())
    }

    pub fn get(&self, id: &str) -> Option<Task> {
        self.lock().tasks.get(id).map(|entry| entry.task.clone())
    }

    /// All tasks in the order they were registered.
    pub fn list(&self) -> Vec<Task> {
        let mut entries: Vec<(u64, Task)> = {
            let inner = self.lock();
            inner
                .tasks
                .values()
                .map(|entry| (entry.seq, entry.task.clone()))
                .collect()
        };
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, task)| task).collect()
    }

    /// The newest task still in flight, or else the newest task overall.
    pub fn latest_relevant(&self) -> Option<Task> {
        let tasks = self.list();
        tasks
            .iter()
            .rev()
            .find(|task| !task.status.is_terminal())
            .or_else(|| tasks.last())
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
