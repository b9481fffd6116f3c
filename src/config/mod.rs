//! YAML configuration loading and validation.
//!
//! A gateway is described by a single k8s-flavoured YAML document that
//! declares the tools (shell command templates) and resources it exposes,
//! plus optional runtime options. All validation happens at load time so a
//! bad config never reaches the server loop.

mod options;

pub use options::{Options, DEFAULT_MAX_ASYNC_TASKS};

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::executor::DEFAULT_TIMEOUT;
use crate::resources::Resource;
use crate::template::{self, TemplateError};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config '{path}': {source}")]
    Io { path: String, source: io::Error },

    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("'tools' and 'contextItems' are mutually exclusive; use 'tools'")]
    BothToolKeys,

    #[error("tool name must not be empty")]
    EmptyToolName,

    #[error("duplicate tool name '{0}'")]
    DuplicateToolName(String),

    #[error("tool '{tool}' has an empty command")]
    EmptyCommand { tool: String },

    #[error("tool '{tool}' declares invalid parameter name '{name}' (allowed: letters, digits, '_', '-')")]
    BadParameterName { tool: String, name: String },

    #[error("tool '{tool}' has an invalid command template: {source}")]
    Template { tool: String, source: TemplateError },

    #[error("resource URI must not be empty")]
    EmptyResourceUri,

    #[error("duplicate resource URI '{0}'")]
    DuplicateResourceUri(String),

    #[error("resource '{uri}': cannot read contentFile '{path}': {source}")]
    ContentFile {
        uri: String,
        path: String,
        source: io::Error,
    },

    #[error("resource '{uri}': cannot walk directory '{path}': {source}")]
    DirectoryWalk {
        uri: String,
        path: String,
        source: walkdir::Error,
    },
}

// Raw YAML shapes. Validation produces the public model below.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct Document {
    #[allow(dead_code)]
    api_version: String,
    #[allow(dead_code)]
    kind: String,
    metadata: Metadata,
    spec: SpecSection,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    name: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SpecSection {
    scratch_dir: Option<String>,
    verbose: Option<bool>,
    max_async_tasks: Option<usize>,
    tools: Option<Vec<ToolSpec>>,
    /// Legacy alias for `tools`.
    context_items: Option<Vec<ToolSpec>>,
    #[serde(default)]
    resources: Vec<ResourceSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ToolSpec {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    command: String,
    #[serde(default)]
    parameters: Vec<String>,
    timeout_seconds: Option<u64>,
    #[serde(default, rename = "async")]
    is_async: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ResourceSpec {
    uri: String,
    #[serde(default)]
    description: String,
    content: Option<String>,
    content_file: Option<String>,
    directory: Option<String>,
    command: Option<String>,
}

/// A validated tool declaration.
#[derive(Debug, Clone)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub command: String,
    pub parameters: Vec<String>,
    pub timeout: Duration,
    pub is_async: bool,
}

/// A fully loaded and validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub name: String,
    pub scratch_dir: Option<PathBuf>,
    pub verbose: Option<bool>,
    pub max_async_tasks: Option<usize>,
    pub tools: Vec<Tool>,
    pub resources: Vec<Resource>,
}

impl Config {
    /// Load and validate a config file. Relative paths inside the file
    /// (contentFile, directory, scratchDir) resolve against the file's
    /// own directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&text, base)
    }

    fn parse(text: &str, base: &Path) -> Result<Self, ConfigError> {
        let doc: Document = serde_yaml::from_str(text)?;
        let spec = doc.spec;

        let tool_specs = match (spec.tools, spec.context_items) {
            (Some(_), Some(_)) => return Err(ConfigError::BothToolKeys),
            (Some(tools), None) | (None, Some(tools)) => tools,
            (None, None) => Vec::new(),
        };

        let mut seen_names = HashSet::new();
        let mut tools = Vec::with_capacity(tool_specs.len());
        for spec in tool_specs {
            if spec.name.is_empty() {
                return Err(ConfigError::EmptyToolName);
            }
            if !seen_names.insert(spec.name.to_lowercase()) {
                return Err(ConfigError::DuplicateToolName(spec.name));
            }
            if spec.command.trim().is_empty() {
                return Err(ConfigError::EmptyCommand { tool: spec.name });
            }
            for param in &spec.parameters {
                if !valid_parameter_name(param) {
                    return Err(ConfigError::BadParameterName {
                        tool: spec.name,
                        name: param.clone(),
                    });
                }
            }
            template::validate(&spec.command, &spec.parameters).map_err(|source| {
                ConfigError::Template {
                    tool: spec.name.clone(),
                    source,
                }
            })?;
            tools.push(Tool {
                name: spec.name,
                description: spec.description,
                command: spec.command,
                parameters: spec.parameters,
                timeout: spec
                    .timeout_seconds
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_TIMEOUT),
                is_async: spec.is_async,
            });
        }

        let mut seen_uris = HashSet::new();
        let mut resources = Vec::new();
        for spec in spec.resources {
            for resource in expand_resource(spec, base)? {
                if resource.uri.is_empty() {
                    return Err(ConfigError::EmptyResourceUri);
                }
                if !seen_uris.insert(resource.uri.clone()) {
                    return Err(ConfigError::DuplicateResourceUri(resource.uri));
                }
                resources.push(resource);
            }
        }

        let scratch_dir = spec.scratch_dir.map(|d| resolve_against(base, &d));

        tracing::debug!(
            name = doc.metadata.name,
            tools = tools.len(),
            resources = resources.len(),
            "loaded configuration"
        );

        Ok(Self {
            name: doc.metadata.name,
            scratch_dir,
            verbose: spec.verbose,
            max_async_tasks: spec.max_async_tasks,
            tools,
            resources,
        })
    }

    pub fn tool(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.name == name)
    }
}

fn valid_parameter_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn resolve_against(base: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

/// Turn one resource declaration into concrete resources. A `directory`
/// declaration expands into one resource per file beneath it.
fn expand_resource(spec: ResourceSpec, base: &Path) -> Result<Vec<Resource>, ConfigError> {
    let mut content = spec.content.unwrap_or_default();

    if let Some(file) = &spec.content_file {
        let full = resolve_against(base, file);
        let file_content = fs::read_to_string(&full).map_err(|source| ConfigError::ContentFile {
            uri: spec.uri.clone(),
            path: full.display().to_string(),
            source,
        })?;
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(&file_content);
    }

    if let Some(dir) = &spec.directory {
        let root = resolve_against(base, dir);
        let mut expanded = Vec::new();
        for entry in walkdir::WalkDir::new(&root).sort_by_file_name() {
            let entry = entry.map_err(|source| ConfigError::DirectoryWalk {
                uri: spec.uri.clone(),
                path: root.display().to_string(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");
            let file_content =
                fs::read_to_string(entry.path()).map_err(|source| ConfigError::ContentFile {
                    uri: spec.uri.clone(),
                    path: entry.path().display().to_string(),
                    source,
                })?;
            expanded.push(Resource {
                uri: format!("{}/{}", spec.uri.trim_end_matches('/'), relative),
                description: spec.description.clone(),
                content: file_content,
                command: None,
            });
        }
        return Ok(expanded);
    }

    Ok(vec![Resource {
        uri: spec.uri,
        description: spec.description,
        content,
        command: spec.command,
    }])
}
