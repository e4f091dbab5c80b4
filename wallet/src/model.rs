//! Types persisted in the ledger store or returned to callers.

use serde::{Deserialize, Serialize};

/// An unspent transaction output tracked for a watched address.
///
/// Primary key is `(tx_id, output_no)`. A row with `used == true` is still
/// persisted but no longer visible to coin selection; the row is removed
/// entirely once its consumption is observed in a confirmed block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    /// Id of the transaction that created this output.
    pub tx_id: String,
    /// Index of this output within its transaction.
    pub output_no: u32,
    /// Address that owns the output.
    pub address: String,
    /// Value in integer minor units.
    pub amount: u64,
    /// Whether the output has been consumed by a transaction we submitted.
    pub used: bool,
}

impl Utxo {
    /// `(tx_id, output_no)` key of this row.
    pub fn key(&self) -> (&str, u32) {
        (&self.tx_id, self.output_no)
    }
}

/// A keypair derived by the external key store.
#[derive(Debug, Clone)]
pub struct Keypair {
    /// Private key, encoded however the key store encodes it.
    pub private_key: String,
    /// Corresponding public key.
    pub public_key: String,
    /// Address controlled by the private key.
    pub address: String,
}
