//! Line-oriented JSON request handler.
//!
//! Reads one JSON request per line from stdin and writes one JSON
//! response per line to stdout, until EOF. Every error path still
//! produces a well-formed response line; the loop itself only fails on
//! I/O errors of the underlying streams.

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};

use serde::Deserialize;
use serde_json::json;

use opsgate_protocol::{ops, ErrorCode, GateError, Request, Response, PROTOCOL_VERSION};

use crate::orchestrator::{InvokeOutcome, Orchestrator};
use crate::resources::ResourceSet;
use crate::scratch::{Scratch, ScratchError};
use crate::tasks::TASK_URI_PREFIX;

pub struct Handler {
    orchestrator: Orchestrator,
    resources: ResourceSet,
    scratch: Option<Scratch>,
}

impl Handler {
    pub fn new(orchestrator: Orchestrator, resources: ResourceSet, scratch: Option<Scratch>) -> Self {
        Self {
            orchestrator,
            resources,
            scratch,
        }
    }

    /// Serve stdin/stdout until EOF.
    pub fn run(&self) -> io::Result<()> {
        self.run_with_io(&mut io::stdin().lock(), &mut io::stdout().lock())
    }

    /// Serve custom I/O (for testing).
    pub fn run_with_io<R: BufRead, W: Write>(&self, reader: &mut R, writer: &mut W) -> io::Result<()> {
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Ok(());
            }
            if line.trim().is_empty() {
                continue;
            }

            let response = match serde_json::from_str::<Request>(&line) {
                Ok(request) => self.handle(&request),
                Err(e) => Response::error(
                    String::new(),
                    GateError::invalid_request(format!("invalid JSON: {}", e)),
                ),
            };
            self.write_response(writer, &response)?;
        }
    }

    fn handle(&self, request: &Request) -> Response {
        if request.protocol_version != PROTOCOL_VERSION {
            return Response::error(
                request.request_id.clone(),
                GateError::unsupported_protocol(request.protocol_version, PROTOCOL_VERSION),
            );
        }

        tracing::debug!(op = %request.op, request_id = %request.request_id, "dispatching request");
        let result = self.dispatch(&request.op, &request.payload);
        match result {
            Ok(payload) => Response::success(request.request_id.clone(), payload),
            Err(error) => Response::error(request.request_id.clone(), error),
        }
    }

    fn dispatch(
        &self,
        op: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, GateError> {
        match op {
            ops::names::PING => Ok(json!("pong")),
            ops::names::INVOKE => self.op_invoke(payload),
            ops::names::TASK_STATUS => self.op_task_status(payload),
            ops::names::LIST_TASKS => self.op_list_tasks(),
            ops::names::LIST_RESOURCES => self.op_list_resources(),
            ops::names::GET_RESOURCE => self.op_get_resource(payload),
            ops::names::SEARCH_RESOURCES => self.op_search_resources(payload),
            ops::names::CREATE_FILE
            | ops::names::READ_FILE
            | ops::names::DELETE_FILE
            | ops::names::MODIFY_FILE
            | ops::names::SEARCH_REPLACE
            | ops::names::LIST_DIRECTORY
            | ops::names::CREATE_DIRECTORY
            | ops::names::REMOVE_DIRECTORY
            | ops::names::COPY_RESOURCE
            | ops::names::COPY_RESOURCE_TREE => self.dispatch_scratch(op, payload),
            other => Err(GateError::unknown_operation(other)),
        }
    }

    fn op_invoke(&self, payload: &serde_json::Value) -> Result<serde_json::Value, GateError> {
        #[derive(Deserialize)]
        struct InvokePayload {
            tool: String,
            #[serde(default)]
            params: BTreeMap<String, String>,
        }
        let p: InvokePayload = parse_payload(payload)?;

        match self.orchestrator.invoke(&p.tool, &p.params)? {
            InvokeOutcome::Sync {
                output,
                exit_code,
                duration,
            } => Ok(json!({
                "output": output,
                "exit_code": exit_code,
                "duration_ms": duration.as_millis() as u64,
            })),
            InvokeOutcome::Async { task_uri, snapshot } => Ok(json!({
                "task_uri": task_uri,
                "status": snapshot,
            })),
        }
    }

    fn op_task_status(&self, payload: &serde_json::Value) -> Result<serde_json::Value, GateError> {
        #[derive(Deserialize)]
        struct TaskStatusPayload {
            task_id: String,
        }
        let p: TaskStatusPayload = parse_payload(payload)?;
        let snapshot = self.orchestrator.task_status(&p.task_id)?;
        Ok(json!(snapshot))
    }

    fn op_list_tasks(&self) -> Result<serde_json::Value, GateError> {
        let tasks: Vec<serde_json::Value> = self
            .orchestrator
            .list_tasks()
            .into_iter()
            .map(|task| {
                json!({
                    "task_uri": format!("{}{}", TASK_URI_PREFIX, task.id),
                    "tool": task.tool,
                    "status": task.format_status(),
                })
            })
            .collect();
        Ok(json!({ "count": tasks.len(), "tasks": tasks }))
    }

    fn op_list_resources(&self) -> Result<serde_json::Value, GateError> {
        let resources = self.resources.summaries();
        Ok(json!({ "count": resources.len(), "resources": resources }))
    }

    fn op_get_resource(&self, payload: &serde_json::Value) -> Result<serde_json::Value, GateError> {
        #[derive(Deserialize)]
        struct GetResourcePayload {
            uri: String,
        }
        let p: GetResourcePayload = parse_payload(payload)?;
        let content = self
            .resources
            .content_of(&p.uri)
            .ok_or_else(|| GateError::resource_not_found(&p.uri))?;
        Ok(json!({ "uri": p.uri, "content": content }))
    }

    fn op_search_resources(
        &self,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, GateError> {
        #[derive(Deserialize)]
        struct SearchPayload {
            pattern: String,
        }
        let p: SearchPayload = parse_payload(payload)?;
        let matches = self
            .resources
            .search(&p.pattern)
            .map_err(|e| GateError::invalid_request(format!("invalid pattern: {}", e)))?;
        let entries: Vec<serde_json::Value> = matches
            .iter()
            .map(|r| json!({ "uri": r.uri, "description": r.description }))
            .collect();
        Ok(json!({
            "summary": format!("Found {} matching resources", entries.len()),
            "count": entries.len(),
            "matches": entries,
        }))
    }

    fn dispatch_scratch(
        &self,
        op: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, GateError> {
        let scratch = self.scratch.as_ref().ok_or_else(GateError::scratch_disabled)?;

        #[derive(Deserialize)]
        struct PathPayload {
            #[serde(default)]
            path: String,
        }
        #[derive(Deserialize)]
        struct CreateFilePayload {
            path: String,
            #[serde(default)]
            content: String,
        }
        #[derive(Deserialize)]
        struct ModifyFilePayload {
            path: String,
            diff: String,
        }
        #[derive(Deserialize)]
        struct SearchReplacePayload {
            path: String,
            search: String,
            replace: String,
        }
        #[derive(Deserialize)]
        struct CopyResourcePayload {
            uri: String,
            path: String,
        }

        match op {
            ops::names::CREATE_FILE => {
                let p: CreateFilePayload = parse_payload(payload)?;
                scratch.create_file(&p.path, &p.content).map_err(scratch_error)?;
                Ok(json!(format!("Created file: {}", p.path)))
            }
            ops::names::READ_FILE => {
                let p: PathPayload = parse_payload(payload)?;
                let content = scratch.read_file(&p.path).map_err(scratch_error)?;
                Ok(json!({ "path": p.path, "content": content }))
            }
            ops::names::DELETE_FILE => {
                let p: PathPayload = parse_payload(payload)?;
                scratch.delete_file(&p.path).map_err(scratch_error)?;
                Ok(json!(format!("Deleted file: {}", p.path)))
            }
            ops::names::MODIFY_FILE => {
                let p: ModifyFilePayload = parse_payload(payload)?;
                scratch.modify_file(&p.path, &p.diff).map_err(scratch_error)?;
                Ok(json!(format!("Modified file: {}", p.path)))
            }
            ops::names::SEARCH_REPLACE => {
                let p: SearchReplacePayload = parse_payload(payload)?;
                scratch
                    .search_replace(&p.path, &p.search, &p.replace)
                    .map_err(scratch_error)?;
                Ok(json!(format!("Modified file: {}", p.path)))
            }
            ops::names::LIST_DIRECTORY => {
                let p: PathPayload = parse_payload(payload)?;
                let listing = scratch.list_directory(&p.path).map_err(scratch_error)?;
                Ok(json!({ "path": p.path, "listing": listing }))
            }
            ops::names::CREATE_DIRECTORY => {
                let p: PathPayload = parse_payload(payload)?;
                scratch.create_directory(&p.path).map_err(scratch_error)?;
                Ok(json!(format!("Created directory: {}", p.path)))
            }
            ops::names::REMOVE_DIRECTORY => {
                let p: PathPayload = parse_payload(payload)?;
                scratch.remove_directory(&p.path).map_err(scratch_error)?;
                Ok(json!(format!("Removed directory: {}", p.path)))
            }
            ops::names::COPY_RESOURCE => {
                let p: CopyResourcePayload = parse_payload(payload)?;
                scratch
                    .copy_resource(&self.resources, &p.uri, &p.path)
                    .map_err(scratch_error)?;
                Ok(json!(format!("Copied {} to {}", p.uri, p.path)))
            }
            ops::names::COPY_RESOURCE_TREE => {
                let p: CopyResourcePayload = parse_payload(payload)?;
                let copied = scratch
                    .copy_resource_tree(&self.resources, &p.uri, &p.path)
                    .map_err(scratch_error)?;
                Ok(json!({
                    "copied": copied,
                    "summary": format!("Copied {} resources to {}", copied, p.path),
                }))
            }
            _ => Err(GateError::unknown_operation(op)),
        }
    }

    fn write_response<W: Write>(&self, writer: &mut W, response: &Response) -> io::Result<()> {
        let json = serde_json::to_string(response)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writeln!(writer, "{}", json)?;
        writer.flush()
    }
}

fn parse_payload<'a, T: Deserialize<'a>>(payload: &'a serde_json::Value) -> Result<T, GateError> {
    T::deserialize(payload)
        .map_err(|e| GateError::invalid_request(format!("invalid payload: {}", e)))
}

fn scratch_error(err: ScratchError) -> GateError {
    let code = match &err {
        ScratchError::Sandbox(_) => ErrorCode::SandboxViolation,
        ScratchError::PatchInvalid(_) | ScratchError::PatchFailed { .. } => ErrorCode::PatchFailed,
        ScratchError::ResourceNotFound { .. } | ScratchError::NoMatchingResources { .. } => {
            ErrorCode::ResourceNotFound
        }
        ScratchError::Io { .. } | ScratchError::SearchNotFound { .. } => ErrorCode::InvalidRequest,
    };
    GateError::new(code, err.to_string())
}
