//! Wire envelope for the opsgate gateway.
//!
//! Callers send one JSON request per line and receive one JSON response
//! per line. This crate defines the envelope types, the stable error
//! codes, and the operation name registry shared by the gateway and its
//! clients.

mod error;
pub mod ops;
mod request;
mod response;

pub use error::{ErrorCode, GateError};
pub use request::Request;
pub use response::Response;

/// The single protocol version currently spoken by the gateway.
pub const PROTOCOL_VERSION: i32 = 1;
