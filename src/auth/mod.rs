//! Authentication for the bridge.
//!
//! Two independent schemes, selected per path group by the route access
//! policy:
//! - Webhook token: a single secret bearer token, stored only as a digest
//! - Session/basic: configured operator users for the management surface

pub mod csrf;
mod middleware;
mod session;
mod token;

pub use middleware::*;
pub use session::*;
pub use token::*;
