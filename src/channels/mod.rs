//! Messaging channel abstraction and the HTTP bridge implementation.

pub mod bridge;
pub mod client;
pub mod session;

pub use bridge::BridgeClient;
pub use client::*;
pub use session::wait_until_ready;
