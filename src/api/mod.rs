//! HTTP surface of the relay.

pub mod routes;
pub mod staging;

pub use routes::{ApiError, ApiState, relay_routes};
