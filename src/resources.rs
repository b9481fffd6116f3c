//! Read-only context resources exposed to clients.
//!
//! A resource pairs a URI with descriptive text and content. Content can
//! be declared inline, loaded from a file at config time, or produced by
//! a shell command at read time. Resources are held in URI order so
//! listings and tree copies are deterministic.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::executor;
use crate::template::Materialized;

/// Timeout applied to command-backed resource reads.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Resource {
    pub uri: String,
    pub description: String,
    /// Static content, possibly empty when the resource is command-backed.
    pub content: String,
    /// Optional command whose output is appended to the static content on
    /// every read.
    pub command: Option<String>,
}

/// Listing entry returned by `list_resources`.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceSummary {
    pub uri: String,
    pub description: String,
}

/// All configured resources, keyed by URI.
#[derive(Debug, Clone, Default)]
pub struct ResourceSet {
    resources: BTreeMap<String, Resource>,
    /// Working directory for command-backed reads.
    workdir: Option<PathBuf>,
}

impl ResourceSet {
    pub fn new(resources: Vec<Resource>) -> Self {
        let resources = resources
            .into_iter()
            .map(|r| (r.uri.clone(), r))
            .collect();
        Self {
            resources,
            workdir: None,
        }
    }

    /// Run command-backed resources in the given directory instead of
    /// the executor default.
    pub fn with_workdir(mut self, workdir: Option<PathBuf>) -> Self {
        self.workdir = workdir;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn get(&self, uri: &str) -> Option<&Resource> {
        self.resources.get(uri)
    }

    pub fn summaries(&self) -> Vec<ResourceSummary> {
        self.resources
            .values()
            .map(|r| ResourceSummary {
                uri: r.uri.clone(),
                description: r.description.clone(),
            })
            .collect()
    }

    /// Read a resource's content, running its command if it has one.
    ///
    /// Command failures are reported inside the returned text rather than
    /// failing the read; a resource that is partially available is more
    /// useful than an error.
    pub fn content_of(&self, uri: &str) -> Option<String> {
        let resource = self.resources.get(uri)?;
        let mut content = resource.content.clone();

        if let Some(cmd) = &resource.command {
            let materialized = Materialized {
                command: cmd.clone(),
                env: Vec::new(),
            };
            let addition = match executor::run(&materialized, COMMAND_TIMEOUT, self.workdir.as_deref())
            {
                Ok(execution) => execution.output,
                Err(err) => {
                    tracing::warn!(uri, error = %err, "resource command failed");
                    format!("Error executing command: {}\n{}", err, err.output)
                }
            };
            if !content.is_empty() && !content.ends_with('\n') {
                content.push('\n');
            }
            content.push_str(&addition);
        }

        Some(content)
    }

    /// Search URIs, descriptions, and static content against a regular
    /// expression. Command output is not consulted, so searching never
    /// spawns subprocesses. Matches come back in URI order.
    pub fn search(&self, pattern: &str) -> Result<Vec<&Resource>, regex_lite::Error> {
        let re = regex_lite::Regex::new(pattern)?;
        let matches = self
            .resources
            .values()
            .filter(|r| {
                re.is_match(&r.uri) || re.is_match(&r.description) || re.is_match(&r.content)
            })
            .collect();
        Ok(matches)
    }

    /// Select every resource under a URI prefix, in URI order.
    ///
    /// The prefix must match on a path-segment boundary: `app://docs`
    /// selects `app://docs` and `app://docs/guide` but not
    /// `app://docs-internal`.
    pub fn select_tree(&self, prefix: &str) -> Vec<&Resource> {
        self.resources
            .values()
            .filter(|r| {
                r.uri.starts_with(prefix)
                    && (prefix.ends_with('/')
                        || r.uri.len() == prefix.len()
                        || r.uri[prefix.len()..].starts_with('/'))
            })
            .collect()
    }
}
