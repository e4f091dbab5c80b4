//! Types exchanged with the node's JSON-RPC interface.

use serde::{Deserialize, Serialize};

use crate::constants;

/// Fee estimation mode understood by `estimatesmartfee`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeEstimateMode {
    /// Conservative estimate, less responsive to short-lived fee drops.
    #[serde(rename = "CONSERVATIVE")]
    Conservative,
    /// Economical estimate, more responsive to current conditions.
    #[serde(rename = "ECONOMICAL")]
    Economical,
}

impl FeeEstimateMode {
    /// Wire representation expected by the node.
    pub fn as_str(self) -> &'static str {
        match self {
            FeeEstimateMode::Conservative => "CONSERVATIVE",
            FeeEstimateMode::Economical => "ECONOMICAL",
        }
    }
}

/// A block with fully decoded transactions (`getblock` verbosity 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// Block hash.
    pub hash: String,
    /// Decoded transactions, in block order.
    #[serde(rename = "tx", default)]
    pub transactions: Vec<TransactionData>,
}

/// A decoded transaction as reported by the node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionData {
    /// Transaction id.
    pub txid: String,
    /// Inputs, in transaction order.
    #[serde(default)]
    pub vin: Vec<TxInput>,
    /// Outputs, in transaction order.
    #[serde(default)]
    pub vout: Vec<TxOutput>,
}

/// A transaction input as reported by the node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TxInput {
    /// Referenced transaction id; absent on miner-origin inputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
    /// Referenced output index; absent on miner-origin inputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vout: Option<u32>,
    /// Coinbase payload; present only on miner-origin inputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coinbase: Option<String>,
}

/// A transaction output as reported by the node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxOutput {
    /// Value in whole coins, as the node reports it.
    pub value: f64,
    /// Output index within the transaction.
    pub n: u32,
    /// Locking script metadata.
    #[serde(rename = "scriptPubKey", default)]
    pub script_pub_key: Option<ScriptPubKey>,
}

impl TxOutput {
    /// Destination address, when the locking script resolves to one.
    ///
    /// Nodes report either a single `address` or an `addresses` list
    /// depending on version and script type; non-standard scripts report
    /// neither and the output is not indexable.
    pub fn destination(&self) -> Option<&str> {
        let script = self.script_pub_key.as_ref()?;
        if let Some(address) = &script.address {
            return Some(address);
        }
        script
            .addresses
            .as_ref()
            .and_then(|list| list.first())
            .map(String::as_str)
    }

    /// Output value in integer minor units.
    pub fn amount(&self) -> u64 {
        to_minor_units(self.value)
    }
}

/// Locking script metadata attached to an output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptPubKey {
    /// Destination address (newer node versions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Destination address list (older node versions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<String>>,
}

/// Convert a coin-denominated value to integer minor units, rounding to the
/// nearest unit to absorb float representation noise.
pub fn to_minor_units(value: f64) -> u64 {
    (value * constants::COIN as f64).round() as u64
}

/// Convert integer minor units to whole coins.
pub fn from_minor_units(amount: u64) -> f64 {
    amount as f64 / constants::COIN as f64
}
