//! Runtime option resolution.
//!
//! Three layers, highest precedence first: CLI flags given explicitly,
//! the config file's `spec` fields, built-in defaults.

use std::path::PathBuf;

use super::Config;

pub const DEFAULT_MAX_ASYNC_TASKS: usize = 20;

/// Resolved runtime options.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub scratch_dir: Option<PathBuf>,
    pub verbose: bool,
    pub max_async_tasks: usize,
}

impl Options {
    pub fn resolve(
        config: &Config,
        cli_scratch_dir: Option<PathBuf>,
        cli_verbose: Option<bool>,
        cli_max_async_tasks: Option<usize>,
    ) -> Self {
        Self {
            scratch_dir: cli_scratch_dir.or_else(|| config.scratch_dir.clone()),
            verbose: cli_verbose.or(config.verbose).unwrap_or(false),
            max_async_tasks: cli_max_async_tasks
                .or(config.max_async_tasks)
                .unwrap_or(DEFAULT_MAX_ASYNC_TASKS),
        }
    }
}
