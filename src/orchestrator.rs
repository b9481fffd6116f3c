//! Tool invocation and async task orchestration.
//!
//! Synchronous tools execute inline and block the request. Asynchronous
//! tools get one `std::thread` each; admission control (one active task
//! per tool, bounded store) caps how many can exist, so no pool is
//! needed. A panic inside a task thread is caught and recorded as a
//! failed task, never propagated.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use opsgate_protocol::{ErrorCode, GateError};

use crate::config::Tool;
use crate::executor::{self, ExecError, Execution};
use crate::tasks::{generate_task_id, Task, TaskStatus, TaskStore, TASK_URI_PREFIX};
use crate::template::{self, Materialized};

/// Executes a materialized command. The default implementation shells
/// out via [`executor::run`]; tests substitute their own runner to
/// exercise the fault boundary.
pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        materialized: &Materialized,
        timeout: Duration,
        workdir: Option<&Path>,
    ) -> Result<Execution, ExecError>;
}

struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(
        &self,
        materialized: &Materialized,
        timeout: Duration,
        workdir: Option<&Path>,
    ) -> Result<Execution, ExecError> {
        executor::run(materialized, timeout, workdir)
    }
}

/// What an invocation produced.
#[derive(Debug)]
pub enum InvokeOutcome {
    /// Synchronous tool: the command ran to completion inline.
    Sync {
        output: String,
        exit_code: i32,
        duration: Duration,
    },
    /// Asynchronous tool: a task was admitted and spawned.
    Async { task_uri: String, snapshot: String },
}

pub struct Orchestrator {
    tools: Vec<Tool>,
    store: TaskStore,
    /// Working directory for command execution, when configured.
    workdir: Option<PathBuf>,
    runner: Arc<dyn CommandRunner>,
}

impl Orchestrator {
    pub fn new(tools: Vec<Tool>, store: TaskStore, workdir: Option<PathBuf>) -> Self {
        Self::with_runner(tools, store, workdir, Arc::new(ShellRunner))
    }

    /// Build an orchestrator with a custom command runner.
    pub fn with_runner(
        tools: Vec<Tool>,
        store: TaskStore,
        workdir: Option<PathBuf>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            tools,
            store,
            workdir,
            runner,
        }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    /// Invoke a configured tool with the given parameter values.
    pub fn invoke(
        &self,
        tool_name: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<InvokeOutcome, GateError> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name == tool_name)
            .ok_or_else(|| GateError::unknown_tool(tool_name))?;

        // Bind exactly the declared parameters.
        let mut bound = BTreeMap::new();
        for name in &tool.parameters {
            let value = params.get(name).ok_or_else(|| {
                GateError::invalid_request(format!(
                    "missing required parameter '{}' for tool '{}'",
                    name, tool.name
                ))
            })?;
            bound.insert(name.clone(), value.clone());
        }
        for name in params.keys() {
            if !tool.parameters.contains(name) {
                return Err(GateError::invalid_request(format!(
                    "tool '{}' does not declare parameter '{}'",
                    tool.name, name
                )));
            }
        }

        let materialized = template::materialize(&tool.command, &bound)
            .map_err(|e| GateError::invalid_request(e.to_string()))?;

        if !tool.is_async {
            tracing::debug!(tool = %tool.name, "executing sync tool");
            let execution = self
                .runner
                .run(&materialized, tool.timeout, self.workdir.as_deref())
                .map_err(exec_error)?;
            return Ok(InvokeOutcome::Sync {
                output: execution.output,
                exit_code: execution.exit_code,
                duration: execution.duration,
            });
        }

        // Admission: one active task per tool.
        if self.store.has_active(&tool.name) {
            return Err(GateError::task_already_active(&tool.name));
        }
        match self.store.prepare_slot() {
            Ok(None) => {}
            Ok(Some(evict_id)) => self.store.delete(&evict_id),
            Err(e) => return Err(GateError::new(ErrorCode::TaskCapacity, e.to_string())),
        }

        let id = generate_task_id(&tool.name);
        let task = self.store.create(&id, &tool.name);

        let store = self.store.clone();
        let timeout = tool.timeout;
        let workdir = self.workdir.clone();
        let runner = Arc::clone(&self.runner);
        let thread_id = id.clone();
        let tool_name = tool.name.clone();
        thread::spawn(move || {
            store.set_status(&thread_id, TaskStatus::Running, "Command is executing.");
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                runner.run(&materialized, timeout, workdir.as_deref())
            }));
            match result {
                Ok(Ok(execution)) => {
                    store.set_status(&thread_id, TaskStatus::Completed, &execution.output);
                }
                Ok(Err(err)) => {
                    let detail = if err.output.is_empty() {
                        err.to_string()
                    } else {
                        format!("{}\n{}", err, err.output)
                    };
                    store.set_status(&thread_id, TaskStatus::Failed, &detail);
                }
                Err(payload) => {
                    let detail = panic_message(payload.as_ref());
                    tracing::error!(task_id = %thread_id, tool = %tool_name, detail, "task thread panicked");
                    store.set_status(
                        &thread_id,
                        TaskStatus::Failed,
                        &format!("internal fault: {}", detail),
                    );
                }
            }
        });

        Ok(InvokeOutcome::Async {
            task_uri: format!("{}{}", TASK_URI_PREFIX, task.id),
            snapshot: task.format_status(),
        })
    }

    /// Status snapshot for a task, accepting either a bare ID or a full
    /// `opsgate://tasks/` URI.
    pub fn task_status(&self, id_or_uri: &str) -> Result<String, GateError> {
        let id = id_or_uri
            .strip_prefix(TASK_URI_PREFIX)
            .unwrap_or(id_or_uri);
        self.store
            .get(id)
            .map(|task| task.format_status())
            .ok_or_else(|| GateError::task_not_found(id))
    }

    /// All currently pending or running tasks.
    pub fn list_tasks(&self) -> Vec<Task> {
        self.store.list_active()
    }
}

fn exec_error(err: ExecError) -> GateError {
    GateError::with_data(
        ErrorCode::ExecFailed,
        err.to_string(),
        serde_json::json!({
            "output": err.output,
            "exit_code": err.exit_code,
            "duration_ms": err.duration.as_millis() as u64,
        }),
    )
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn tool(name: &str, command: &str, parameters: &[&str], is_async: bool) -> Tool {
        Tool {
            name: name.to_string(),
            description: String::new(),
            command: command.to_string(),
            parameters: parameters.iter().map(|s| s.to_string()).collect(),
            timeout: Duration::from_secs(5),
            is_async,
        }
    }

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn wait_terminal(store: &TaskStore, id: &str) -> Task {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let task = store.get(id).unwrap();
            if task.status.is_terminal() {
                return task;
            }
            assert!(Instant::now() < deadline, "task never finished");
            thread::sleep(Duration::from_millis(10));
        }
    }

    fn strip_uri(uri: &str) -> &str {
        uri.strip_prefix(TASK_URI_PREFIX).unwrap()
    }

    #[test]
    fn test_unknown_tool() {
        let orch = Orchestrator::new(Vec::new(), TaskStore::new(), None);
        let err = orch.invoke("nope", &BTreeMap::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownTool);
    }

    #[test]
    fn test_missing_parameter() {
        let tools = vec![tool("greet", "echo \"{{.name}}\"", &["name"], false)];
        let orch = Orchestrator::new(tools, TaskStore::new(), None);
        let err = orch.invoke("greet", &BTreeMap::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRequest);
        assert!(err.message.contains("name"));
    }

    #[test]
    fn test_undeclared_parameter_rejected() {
        let tools = vec![tool("plain", "echo hi", &[], false)];
        let orch = Orchestrator::new(tools, TaskStore::new(), None);
        let err = orch.invoke("plain", &params(&[("extra", "x")])).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRequest);
    }

    #[test]
    fn test_sync_invoke() {
        let tools = vec![tool("greet", "echo \"hello {{.name}}\"", &["name"], false)];
        let orch = Orchestrator::new(tools, TaskStore::new(), None);

        match orch.invoke("greet", &params(&[("name", "world")])).unwrap() {
            InvokeOutcome::Sync {
                output, exit_code, ..
            } => {
                assert_eq!(output.trim(), "hello world");
                assert_eq!(exit_code, 0);
            }
            other => panic!("expected sync outcome, got {:?}", other),
        }
        assert!(orch.store().is_empty());
    }

    #[test]
    fn test_sync_failure_preserves_output() {
        let tools = vec![tool("fail", "echo oops >&2; exit 3", &[], false)];
        let orch = Orchestrator::new(tools, TaskStore::new(), None);

        let err = orch.invoke("fail", &BTreeMap::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::ExecFailed);
        let data = err.data.unwrap();
        assert_eq!(data["exit_code"], 3);
        assert!(data["output"].as_str().unwrap().contains("oops"));
    }

    #[test]
    fn test_async_invoke_lifecycle() {
        let tools = vec![tool("job", "echo done", &[], true)];
        let orch = Orchestrator::new(tools, TaskStore::new(), None);

        let (uri, snapshot) = match orch.invoke("job", &BTreeMap::new()).unwrap() {
            InvokeOutcome::Async { task_uri, snapshot } => (task_uri, snapshot),
            other => panic!("expected async outcome, got {:?}", other),
        };
        assert!(uri.starts_with(TASK_URI_PREFIX));
        assert!(snapshot.starts_with("Status:"));

        let task = wait_terminal(orch.store(), strip_uri(&uri));
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.message.trim(), "done");

        let status = orch.task_status(&uri).unwrap();
        assert!(status.contains("Status: completed"));
    }

    #[test]
    fn test_async_admission_one_per_tool() {
        let tools = vec![tool("job", "sleep 2", &[], true)];
        let orch = Orchestrator::new(tools, TaskStore::new(), None);

        orch.invoke("job", &BTreeMap::new()).unwrap();
        let err = orch.invoke("job", &BTreeMap::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::TaskAlreadyActive);
        assert!(err.message.contains("task_status"));
    }

    #[test]
    fn test_async_capacity_rejection() {
        let tools = vec![
            tool("a", "sleep 2", &[], true),
            tool("b", "sleep 2", &[], true),
        ];
        let orch = Orchestrator::new(tools, TaskStore::with_capacity(1), None);

        orch.invoke("a", &BTreeMap::new()).unwrap();
        let err = orch.invoke("b", &BTreeMap::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::TaskCapacity);
    }

    #[test]
    fn test_async_failure_recorded() {
        let tools = vec![tool("bad", "echo broken >&2; exit 1", &[], true)];
        let orch = Orchestrator::new(tools, TaskStore::new(), None);

        let uri = match orch.invoke("bad", &BTreeMap::new()).unwrap() {
            InvokeOutcome::Async { task_uri, .. } => task_uri,
            other => panic!("expected async outcome, got {:?}", other),
        };

        let task = wait_terminal(orch.store(), strip_uri(&uri));
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.message.contains("broken"));

        let status = orch.task_status(strip_uri(&uri)).unwrap();
        assert!(status.contains("Failed After:"));
    }

    struct FaultyRunner;

    impl CommandRunner for FaultyRunner {
        fn run(
            &self,
            _materialized: &Materialized,
            _timeout: Duration,
            _workdir: Option<&Path>,
        ) -> Result<Execution, ExecError> {
            panic!("runner blew up");
        }
    }

    #[test]
    fn test_task_thread_panic_recorded_as_failed() {
        let tools = vec![tool("job", "echo hi", &[], true)];
        let orch = Orchestrator::with_runner(
            tools,
            TaskStore::new(),
            None,
            Arc::new(FaultyRunner),
        );

        let uri = match orch.invoke("job", &BTreeMap::new()).unwrap() {
            InvokeOutcome::Async { task_uri, .. } => task_uri,
            other => panic!("expected async outcome, got {:?}", other),
        };

        let task = wait_terminal(orch.store(), strip_uri(&uri));
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.message.contains("internal fault"));
        assert!(task.message.contains("runner blew up"));

        // The store is still usable and the tool can be invoked again.
        assert!(orch.list_tasks().is_empty());
        assert!(orch.invoke("job", &BTreeMap::new()).is_ok());
    }

    #[test]
    fn test_task_status_unknown() {
        let orch = Orchestrator::new(Vec::new(), TaskStore::new(), None);
        let err = orch.task_status("task-nope").unwrap_err();
        assert_eq!(err.code, ErrorCode::TaskNotFound);
    }

    #[test]
    fn test_list_tasks_active_only() {
        let tools = vec![tool("quick", "echo hi", &[], true)];
        let orch = Orchestrator::new(tools, TaskStore::new(), None);

        let uri = match orch.invoke("quick", &BTreeMap::new()).unwrap() {
            InvokeOutcome::Async { task_uri, .. } => task_uri,
            other => panic!("expected async outcome, got {:?}", other),
        };
        wait_terminal(orch.store(), strip_uri(&uri));
        assert!(orch.list_tasks().is_empty());
    }
}
