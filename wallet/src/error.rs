//! Error taxonomy for wallet operations.

use thiserror::Error as ThisError;

use crate::{repository, signer};

/// Errors surfaced by wallet operations.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Coin selection exhausted the candidate set before reaching the
    /// required amount. Carries exact integer amounts so callers can assert
    /// on them verbatim.
    #[error("insufficient funds: {available} available, {required} required to cover the transaction")]
    InsufficientFunds {
        /// Total value of the candidate outputs that were available.
        available: u64,
        /// Value the selection needed to reach (target plus any additive fee).
        required: u64,
    },
    /// Structural failure while assembling a transaction.
    #[error("failed creating a transaction: {0}")]
    CreateTransaction(String),
    /// The backing store failed.
    #[error("storage failed: {0}")]
    Storage(#[from] repository::Error),
    /// A node request failed; see [`satsync_net::Error`] for the taxonomy
    /// mapped from the node's JSON-RPC error codes.
    #[error("node request failed: {0}")]
    Node(#[from] satsync_net::Error),
    /// A block contained an input shape the indexer cannot classify through
    /// a code path that requires a prior transaction. Reported, never
    /// silently skipped.
    #[error("unsupported input: {0}")]
    UnsupportedInput(String),
    /// The external signer/encoder failed.
    #[error("signer failed: {0}")]
    Signer(String),
    /// The wallet was constructed with unusable parameters or capabilities.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<signer::SignerError> for Error {
    fn from(err: signer::SignerError) -> Self {
        Error::Signer(err.0)
    }
}
