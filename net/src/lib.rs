//! HTTP JSON-RPC client used to talk to a UTXO ledger node.
//!
//! The node is expected to expose the usual Bitcoin-Core-style JSON-RPC 2.0
//! interface over a single HTTP endpoint, optionally protected by basic auth.

#![deny(rust_2018_idioms)]
#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]
#![deny(missing_docs)]

pub mod client;

pub use client::{Error, JsonRpcClient};
