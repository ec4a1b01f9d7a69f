//! wa-relay: send a message plus attachment to a messaging contact and
//! confirm delivery by reading the chat back.

pub mod api;
pub mod channels;
pub mod config;
pub mod error;
pub mod relay;

#[cfg(test)]
pub(crate) mod testing;
