//! Async task tracking.
//!
//! Task states: pending → running → {completed | failed}. The store is
//! the only structure in the gateway mutated from multiple threads; all
//! access goes through its internal reader/writer lock.

mod id;
mod store;

pub use id::generate_task_id;
pub use store::{StoreError, Task, TaskStatus, TaskStore};

/// URI prefix under which task status snapshots are addressable.
pub const TASK_URI_PREFIX: &str = "opsgate://tasks/";
