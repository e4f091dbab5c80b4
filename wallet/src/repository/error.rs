use thiserror::Error as ThisError;

use crate::db;

/// Errors raised by ledger operations.
#[derive(Debug, ThisError)]
pub enum Error {
    /// The internal write mutex was poisoned by a panicking thread.
    #[error("mutex poison error")]
    MutexPoison,
    /// A submission tried to reserve an output that is absent or already
    /// consumed.
    #[error("output {txid}:{output_no} is already spent")]
    OutputConflict {
        /// Transaction that created the contested output.
        txid: String,
        /// Index of the contested output.
        output_no: u32,
    },
    /// The backing store failed.
    #[error("database failed: {0}")]
    Db(#[from] db::Error),
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(_err: std::sync::PoisonError<T>) -> Self {
        Error::MutexPoison
    }
}
