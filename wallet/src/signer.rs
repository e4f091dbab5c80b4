//! Capability interfaces for key custody and transaction encoding.
//!
//! Key derivation, address encoding, signing and binary serialization are
//! delegated to an external implementation injected at construction time.
//! The wallet invokes these as opaque capabilities; it owns none of the
//! cryptography.

use async_trait::async_trait;
use thiserror::Error as ThisError;

use crate::model::{Keypair, Utxo};

/// Error raised by a signer/encoder implementation.
#[derive(Debug, ThisError)]
#[error("{0}")]
pub struct SignerError(pub String);

/// Result type for signer operations.
pub type Result<T> = std::result::Result<T, SignerError>;

/// Derives and resolves keys for the wallet's addresses.
pub trait KeyStore: Send + Sync {
    /// Derive a fresh keypair.
    fn derive_keypair(&self) -> Result<Keypair>;

    /// The address controlled by `private_key`.
    fn address_for(&self, private_key: &str) -> Result<String>;
}

/// Builds, signs and serializes transactions.
///
/// `build` and `sign` are suspension points: an implementation may reach a
/// remote signing service and is expected to carry its own timeouts.
#[async_trait]
pub trait TxEncoder: Send + Sync {
    /// Opaque transaction under construction.
    type Handle: Send;

    /// Build an unsigned transaction from inputs and `(address, amount)`
    /// outputs.
    async fn build(&self, inputs: &[Utxo], outputs: &[(String, u64)]) -> Result<Self::Handle>;

    /// Sign `handle` with one key per input, in input order.
    async fn sign(&self, handle: Self::Handle, private_keys: &[String]) -> Result<Self::Handle>;

    /// Estimated serialized size of the transaction in bytes. Only
    /// meaningful on a signed handle, since signatures dominate the weight.
    fn estimate_size(&self, handle: &Self::Handle) -> Result<usize>;

    /// Fee for the transaction at `fee_rate` minor units per 1024 bytes.
    fn compute_fee(&self, handle: &Self::Handle, fee_rate: u64) -> Result<u64>;

    /// Raw serialized transaction, hex encoded, ready for broadcast.
    fn serialize(&self, handle: &Self::Handle) -> Result<String>;
}
