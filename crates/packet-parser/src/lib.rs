#![warn(clippy::unwrap_used)]
#![warn(clippy::uninlined_format_args)]

pub mod capture;
pub mod decoder;
pub mod fork_digest;
pub mod gossip;
pub mod labels;
pub mod multistream;
pub mod output;
pub mod packet;
pub mod rpc;

#[cfg(test)]
mod test_utils;

/// Largest uncompressed payload accepted from a req/resp stream or a gossip message.
pub const MAX_PAYLOAD_SIZE: usize = 10 * 1024 * 1024;
