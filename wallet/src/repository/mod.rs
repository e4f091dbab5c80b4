//! Persistent ledger state: watched addresses, UTXO rows and the sync
//! cursor, with atomic operations on top of the storage layer.

mod error;
pub mod keys;
mod ledger;

pub use error::Error;
pub use ledger::Ledger;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, Error>;
