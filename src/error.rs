use thiserror::Error;

/// Errors raised while configuring, building or verifying a tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Builder or hasher configuration is missing or out of range.
    #[error("invalid tree configuration: {0}")]
    ConfigInvalid(String),

    /// Nothing to build from: no items, or no nodes left to pair.
    #[error("the merkle tree data cannot be empty")]
    EmptyInput,

    /// Algorithm identifier outside of the supported set.
    #[error("hash<{0}> is not recognized")]
    HashNotSupported(String),

    /// The digest computation did not accept its input.
    #[error("hash write failed: {0}")]
    HashWriteFailure(String),

    /// The caller aborted the operation through its `CancelToken`.
    #[error("operation cancelled")]
    Cancelled,
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
