use anyhow::Error as AnyhowError;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("rpc error on method: {method}, message: {error}")]
pub struct RpcError<E: ToString> {
    method: String,
    error: E,
}

impl<E: ToString> RpcError<E> {
    pub fn new(method: &str, err: E) -> Self {
        Self {
            method: method.to_string(),
            error: err,
        }
    }
}

/// Errors that can occur while running the light client
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("unable to read the current slot")]
    UnableToReadSlot,

    #[error("consensus client creation error: {0}")]
    ConsensusClientCreationError(AnyhowError),

    #[error("consensus sync error: {0}")]
    ConsensusSyncError(AnyhowError),
}
