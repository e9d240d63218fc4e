#![warn(clippy::uninlined_format_args)]
#![warn(clippy::unwrap_used)]
mod client;
pub use crate::client::*;

pub mod clock;
pub mod config;
pub mod consensus;
pub mod database;
pub mod errors;
pub mod sync_service;
pub mod watch;
