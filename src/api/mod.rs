//! HTTP API for the bridge.

pub mod handlers;
pub mod policy;
mod routes;
pub mod types;

pub use routes::build_router;
