//! Storage layer for the bridge.

mod repository;

pub use repository::*;
