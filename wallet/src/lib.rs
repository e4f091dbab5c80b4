//! Locally materialized, continuously synchronized view of a remote UTXO
//! ledger for a set of watched addresses, plus construction and dispatch of
//! new spend transactions on top of that view.
//!
//! The crate is a library boundary: it consumes a node's JSON-RPC interface
//! (through [`satsync_net`]) and an injected signer/encoder capability, and
//! owns everything in between — the persistent ledger store, the chain
//! monitor that replays blocks into it, coin selection, and the transaction
//! director exposing `send` and `speed_up`.

#![deny(rust_2018_idioms)]
#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]
#![deny(missing_docs)]

pub mod constants;
pub mod db;
pub mod error;
pub mod factory;
pub mod model;
pub mod monitor;
pub mod node;
pub mod params;
pub mod repository;
pub mod signer;
#[cfg(test)]
mod test_utils;
pub mod types;
mod wallet;

pub use error::Error;
pub use wallet::{SendOptions, UtxoWallet};

/// Result type for wallet operations.
pub type Result<T> = std::result::Result<T, Error>;
