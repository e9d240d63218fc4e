#![warn(clippy::unwrap_used)]

pub mod bytes;
pub mod dir;
pub mod log;
pub mod version;
