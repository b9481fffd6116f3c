//! opsgate - declarative shell-command and resource gateway
//!
//! This crate implements the opsgate gateway: declaratively-configured
//! shell commands ("tools") and text resources exposed to automated
//! agents over a line-oriented JSON protocol on stdin/stdout, with
//! sandboxed scratch-space file operations and async task orchestration.

pub mod config;
pub mod executor;
pub mod orchestrator;
pub mod resources;
pub mod sandbox;
pub mod scratch;
pub mod server;
pub mod tasks;
pub mod template;

pub use config::{Config, Options};
pub use orchestrator::{InvokeOutcome, Orchestrator};
pub use server::Handler;
pub use tasks::{Task, TaskStatus, TaskStore};

pub use opsgate_protocol::{ErrorCode, GateError, Request, Response, PROTOCOL_VERSION};
