//! Operation name registry.

/// Operation name constants.
///
/// Fixed operations live here; configured tools are invoked through
/// [`names::INVOKE`] with the tool name in the payload.
pub mod names {
    /// Liveness check; responds with "pong".
    pub const PING: &str = "ping";
    /// Invoke a configured tool (sync or async per its config).
    pub const INVOKE: &str = "invoke";
    /// Get the status snapshot of an async task by ID or task URI.
    pub const TASK_STATUS: &str = "task_status";
    /// List all pending or running async tasks.
    pub const LIST_TASKS: &str = "list_tasks";
    /// List all configured resources.
    pub const LIST_RESOURCES: &str = "list_resources";
    /// Read the current content of a resource by URI.
    pub const GET_RESOURCE: &str = "get_resource";
    /// Search resources by regular expression.
    pub const SEARCH_RESOURCES: &str = "search_resources";

    /// Create a file in the scratch space.
    pub const CREATE_FILE: &str = "create_file";
    /// Read a file from the scratch space.
    pub const READ_FILE: &str = "read_file";
    /// Delete a file from the scratch space.
    pub const DELETE_FILE: &str = "delete_file";
    /// Apply a unified-diff patch to a scratch file.
    pub const MODIFY_FILE: &str = "modify_file";
    /// Literal search/replace inside a scratch file.
    pub const SEARCH_REPLACE: &str = "search_replace";
    /// List a scratch directory.
    pub const LIST_DIRECTORY: &str = "list_directory";
    /// Create a scratch directory.
    pub const CREATE_DIRECTORY: &str = "create_directory";
    /// Remove an empty scratch directory.
    pub const REMOVE_DIRECTORY: &str = "remove_directory";
    /// Materialize a resource's content into a scratch file.
    pub const COPY_RESOURCE: &str = "copy_resource";
    /// Materialize all resources under a URI prefix into a scratch tree.
    pub const COPY_RESOURCE_TREE: &str = "copy_resource_tree";
}
