//! Task store: a thread-safe registry of async task records.
//!
//! Records are keyed by lowercased ID so that lookups are
//! case-insensitive; task IDs travel through URIs and clients do not
//! reliably preserve case. A bounded store evicts the oldest finished
//! record to make room, and refuses admission when every record is still
//! in flight.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

/// Status of an async task. Linear state machine; terminal states never
/// transition out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Created, not yet picked up by its execution thread.
    Pending,
    /// The execution thread is running the command.
    Running,
    /// Finished; the record's message holds the command output.
    Completed,
    /// Finished; the record's message holds the error detail.
    Failed,
}

impl TaskStatus {
    /// Pending or running.
    pub fn is_active(self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Running)
    }

    /// Completed or failed.
    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

/// A single tracked task.
#[derive(Debug, Clone)]
pub struct Task {
    /// Opaque identifier; unique case-insensitively within the store.
    pub id: String,
    /// Name of the configured tool that spawned this task. Admission
    /// control keys on this.
    pub tool: String,
    pub status: TaskStatus,
    /// Progress text while active; final output on completed; error
    /// detail on failed.
    pub message: String,
    pub start_time: DateTime<Utc>,
    /// Unset until the task reaches a terminal state.
    pub end_time: Option<DateTime<Utc>>,
}

impl Task {
    /// Human-readable status snapshot: status label, elapsed or total
    /// duration, and the message/output/error selected by status.
    pub fn format_status(&self) -> String {
        let duration = match self.end_time {
            Some(end) => end - self.start_time,
            None => Utc::now() - self.start_time,
        };
        let duration = format!("{}s", duration.num_seconds().max(0));

        match self.status {
            TaskStatus::Completed => format!(
                "Status: completed\nCompleted In: {}\nOutput: {}",
                duration, self.message
            ),
            TaskStatus::Failed => format!(
                "Status: failed\nFailed After: {}\nError: {}",
                duration, self.message
            ),
            _ => format!(
                "Status: {}\nRunning For: {}\nMessage: {}",
                self.status.as_str(),
                duration,
                self.message
            ),
        }
    }
}

/// Store errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("task store is at capacity ({capacity}) and every tracked task is still active")]
    CapacityExhausted { capacity: usize },
}

/// Thread-safe task registry.
///
/// Clone-shareable via internal `Arc<RwLock>`; inject one instance into
/// the orchestrator rather than keeping global state.
#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    tasks: Arc<RwLock<HashMap<String, Task>>>,
    capacity: Option<usize>,
}

impl TaskStore {
    /// Create an unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that tracks at most `capacity` records.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            capacity: Some(capacity),
        }
    }

    /// Insert a new task in `pending` status, started now.
    ///
    /// Silently overwrites an existing record with the same ID; callers
    /// guarantee uniqueness through fresh ID generation.
    pub fn create(&self, id: &str, tool: &str) -> Task {
        let task = Task {
            id: id.to_string(),
            tool: tool.to_string(),
            status: TaskStatus::Pending,
            message: "Task has been queued.".to_string(),
            start_time: Utc::now(),
            end_time: None,
        };

        self.tasks
            .write()
            .expect("task store lock poisoned")
            .insert(id.to_lowercase(), task.clone());

        tracing::debug!(task_id = %id, tool = %tool, "created task");
        task
    }

    /// Case-insensitive lookup.
    pub fn get(&self, id: &str) -> Option<Task> {
        self.tasks
            .read()
            .expect("task store lock poisoned")
            .get(&id.to_lowercase())
            .cloned()
    }

    /// Update a task's status and message. Silent no-op when the ID is
    /// unknown. Stamps `end_time` when the status is terminal.
    pub fn set_status(&self, id: &str, status: TaskStatus, message: &str) {
        let mut tasks = self.tasks.write().expect("task store lock poisoned");
        if let Some(task) = tasks.get_mut(&id.to_lowercase()) {
            task.status = status;
            task.message = message.to_string();
            if status.is_terminal() {
                task.end_time = Some(Utc::now());
            }
            tracing::debug!(task_id = %id, status = status.as_str(), "task status updated");
        }
    }

    /// All pending or running tasks, in unspecified order.
    pub fn list_active(&self) -> Vec<Task> {
        self.tasks
            .read()
            .expect("task store lock poisoned")
            .values()
            .filter(|task| task.status.is_active())
            .cloned()
            .collect()
    }

    /// Admission-control predicate: is any task of this tool still
    /// pending or running?
    pub fn has_active(&self, tool: &str) -> bool {
        self.tasks
            .read()
            .expect("task store lock poisoned")
            .values()
            .any(|task| task.tool == tool && task.status.is_active())
    }

    /// Prepare room for one more record.
    ///
    /// Below capacity (or unbounded): `Ok(None)`. At capacity with at
    /// least one finished record: `Ok(Some(id))` naming the terminal
    /// record with the oldest `end_time`, which the caller should
    /// [`delete`](Self::delete). At capacity with only active records:
    /// fails, and the caller must reject the new admission rather than
    /// drop live state.
    pub fn prepare_slot(&self) -> Result<Option<String>, StoreError> {
        let capacity = match self.capacity {
            Some(c) => c,
            None => return Ok(None),
        };

        let tasks = self.tasks.read().expect("task store lock poisoned");
        if tasks.len() < capacity {
            return Ok(None);
        }

        let evictable = tasks
            .values()
            .filter(|task| task.status.is_terminal())
            .min_by_key(|task| task.end_time)
            .map(|task| task.id.clone());

        match evictable {
            Some(id) => Ok(Some(id)),
            None => Err(StoreError::CapacityExhausted { capacity }),
        }
    }

    /// Remove a record outright. Silent no-op when the ID is unknown.
    pub fn delete(&self, id: &str) {
        self.tasks
            .write()
            .expect("task store lock poisoned")
            .remove(&id.to_lowercase());
    }

    /// Number of tracked records.
    pub fn len(&self) -> usize {
        self.tasks.read().expect("task store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let store = TaskStore::new();
        store.create("task-1", "Upgrade");

        let task = store.get("task-1").unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.end_time.is_none());

        store.set_status("task-1", TaskStatus::Running, "executing");
        assert_eq!(store.get("task-1").unwrap().status, TaskStatus::Running);

        store.set_status("task-1", TaskStatus::Completed, "done");
        let task = store.get("task-1").unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.end_time.is_some());
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let store = TaskStore::new();
        store.create("Task-Upgrade-Bold-Swift-Falcon", "Upgrade");

        let lower = store.get("task-upgrade-bold-swift-falcon").unwrap();
        let upper = store.get("TASK-UPGRADE-BOLD-SWIFT-FALCON").unwrap();
        assert_eq!(lower.id, upper.id);
        assert_eq!(lower.id, "Task-Upgrade-Bold-Swift-Falcon");
    }

    #[test]
    fn test_set_status_unknown_id_is_noop() {
        let store = TaskStore::new();
        store.set_status("nope", TaskStatus::Failed, "ignored");
        assert!(store.get("nope").is_none());
    }

    #[test]
    fn test_delete_unknown_id_is_noop() {
        let store = TaskStore::new();
        store.delete("nope");
        assert!(store.is_empty());
    }

    #[test]
    fn test_has_active_tracks_state_machine() {
        let store = TaskStore::new();
        assert!(!store.has_active("Upgrade"));

        store.create("t1", "Upgrade");
        assert!(store.has_active("Upgrade"));
        assert!(!store.has_active("Reboot"));

        store.set_status("t1", TaskStatus::Running, "executing");
        assert!(store.has_active("Upgrade"));

        store.set_status("t1", TaskStatus::Completed, "done");
        assert!(!store.has_active("Upgrade"));
    }

    #[test]
    fn test_list_active_excludes_terminal() {
        let store = TaskStore::new();
        store.create("t1", "A");
        store.create("t2", "B");
        store.create("t3", "C");
        store.set_status("t2", TaskStatus::Failed, "boom");

        let active: Vec<String> = store.list_active().into_iter().map(|t| t.id).collect();
        assert_eq!(active.len(), 2);
        assert!(active.contains(&"t1".to_string()));
        assert!(active.contains(&"t3".to_string()));
    }

    #[test]
    fn test_list_active_under_concurrent_creation() {
        let store = TaskStore::new();
        let n = 16;

        let handles: Vec<_> = (0..n)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let id = format!("t{}", i);
                    store.create(&id, &format!("tool{}", i));
                    store.set_status(&id, TaskStatus::Running, "executing");
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Exactly the non-terminal records, none observed twice, none lost.
        let active = store.list_active();
        assert_eq!(active.len(), n);
        let mut ids: Vec<String> = active.into_iter().map(|t| t.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), n);
    }

    #[test]
    fn test_create_overwrites_existing_id() {
        let store = TaskStore::new();
        store.create("t1", "First");
        store.create("t1", "Second");

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("t1").unwrap().tool, "Second");
    }

    #[test]
    fn test_prepare_slot_below_capacity() {
        let store = TaskStore::with_capacity(2);
        store.create("t1", "A");
        assert_eq!(store.prepare_slot(), Ok(None));
    }

    #[test]
    fn test_prepare_slot_unbounded() {
        let store = TaskStore::new();
        for i in 0..100 {
            store.create(&format!("t{}", i), "A");
        }
        assert_eq!(store.prepare_slot(), Ok(None));
    }

    #[test]
    fn test_prepare_slot_evicts_oldest_terminal_first() {
        let store = TaskStore::with_capacity(2);
        store.create("older", "A");
        store.create("newer", "B");
        store.set_status("older", TaskStatus::Completed, "done");
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.set_status("newer", TaskStatus::Failed, "boom");

        // Oldest end_time goes first.
        assert_eq!(store.prepare_slot(), Ok(Some("older".to_string())));
        store.delete("older");
        store.create("fresh", "C");

        assert_eq!(store.prepare_slot(), Ok(Some("newer".to_string())));
    }

    #[test]
    fn test_prepare_slot_fails_when_all_active() {
        let store = TaskStore::with_capacity(2);
        store.create("t1", "A");
        store.create("t2", "B");
        store.set_status("t1", TaskStatus::Running, "executing");

        assert_eq!(
            store.prepare_slot(),
            Err(StoreError::CapacityExhausted { capacity: 2 })
        );
    }

    #[test]
    fn test_format_status_variants() {
        let store = TaskStore::new();
        store.create("t1", "A");

        let snapshot = store.get("t1").unwrap().format_status();
        assert!(snapshot.starts_with("Status: pending"));
        assert!(snapshot.contains("Running For:"));

        store.set_status("t1", TaskStatus::Completed, "all good");
        let snapshot = store.get("t1").unwrap().format_status();
        assert!(snapshot.starts_with("Status: completed"));
        assert!(snapshot.contains("Completed In:"));
        assert!(snapshot.contains("Output: all good"));

        store.create("t2", "B");
        store.set_status("t2", TaskStatus::Failed, "broke");
        let snapshot = store.get("t2").unwrap().format_status();
        assert!(snapshot.contains("Failed After:"));
        assert!(snapshot.contains("Error: broke"));
    }
}
