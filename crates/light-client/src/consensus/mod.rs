pub mod constants;
pub mod errors;
pub mod rpc;
pub mod store;
pub mod sync_protocol;
pub mod types;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_utils;
