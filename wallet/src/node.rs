//! Typed access to the remote ledger node.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use satsync_net::JsonRpcClient;

use crate::error::Error;
use crate::types::{self, Block, FeeEstimateMode, TransactionData};

type Result<T> = std::result::Result<T, Error>;

/// Subset of the node RPC consumed by the chain monitor and the transaction
/// director. Abstracted as a trait so tests can drive both against a mock
/// node.
#[async_trait]
pub trait NodeRpc: Send + Sync {
    /// Height of the chain tip.
    async fn current_height(&self) -> Result<u64>;

    /// Hash of the block at `height`.
    async fn block_hash(&self, height: u64) -> Result<String>;

    /// Full block with decoded transactions.
    async fn block(&self, hash: &str) -> Result<Block>;

    /// Decoded transaction by id.
    async fn raw_transaction(&self, txid: &str) -> Result<TransactionData>;

    /// Submit a raw transaction; returns the new transaction id.
    async fn broadcast(&self, raw_hex: &str) -> Result<String>;

    /// Fee rate in minor units per 1024 bytes for confirmation within
    /// `target` blocks.
    async fn estimate_fee_rate(&self, target: u16, mode: FeeEstimateMode) -> Result<u64>;

    /// Total fee paid by a confirmed transaction: input value minus output
    /// value, resolving every input against its prior transaction.
    async fn tx_fee(&self, txid: &str) -> Result<u64> {
        let tx = self.raw_transaction(txid).await?;
        let output_total: u64 = tx.vout.iter().map(types::TxOutput::amount).sum();

        let mut input_total: u64 = 0;
        for input in &tx.vin {
            let prev_txid = input.txid.as_deref().ok_or_else(|| {
                Error::UnsupportedInput(format!(
                    "input of {txid} has no prior transaction (miner origin)"
                ))
            })?;
            let output_no = input.vout.ok_or_else(|| {
                Error::UnsupportedInput(format!("input of {txid} has no output index"))
            })?;
            let prev = self.raw_transaction(prev_txid).await?;
            let referenced = prev
                .vout
                .iter()
                .find(|output| output.n == output_no)
                .ok_or_else(|| {
                    Error::UnsupportedInput(format!(
                        "input of {txid} references missing output {prev_txid}:{output_no}"
                    ))
                })?;
            input_total += referenced.amount();
        }

        // outputs can never exceed inputs in a valid confirmed transaction
        Ok(input_total.saturating_sub(output_total))
    }
}

/// JSON-RPC implementation of [`NodeRpc`] against a Bitcoin-Core-style node.
pub struct NodeClient {
    client: JsonRpcClient,
}

impl NodeClient {
    /// Wrap a JSON-RPC client.
    pub fn new(client: JsonRpcClient) -> Self {
        Self { client }
    }

    fn decode<T>(value: Value) -> Result<T>
    where
        T: DeserializeOwned,
    {
        serde_json::from_value(value)
            .map_err(|e| Error::Node(satsync_net::Error::Decode(e.to_string())))
    }
}

#[derive(Deserialize)]
struct EstimateSmartFee {
    feerate: Option<f64>,
    #[serde(default)]
    errors: Vec<String>,
}

#[async_trait]
impl NodeRpc for NodeClient {
    async fn current_height(&self) -> Result<u64> {
        let value = self.client.call("getblockcount", json!([])).await?;

        Self::decode(value)
    }

    async fn block_hash(&self, height: u64) -> Result<String> {
        let value = self.client.call("getblockhash", json!([height])).await?;

        Self::decode(value)
    }

    async fn block(&self, hash: &str) -> Result<Block> {
        // verbosity 2: full block with decoded transactions
        let value = self.client.call("getblock", json!([hash, 2])).await?;

        Self::decode(value)
    }

    async fn raw_transaction(&self, txid: &str) -> Result<TransactionData> {
        let value = self
            .client
            .call("getrawtransaction", json!([txid, 2]))
            .await?;

        Self::decode(value)
    }

    async fn broadcast(&self, raw_hex: &str) -> Result<String> {
        let value = self
            .client
            .call("sendrawtransaction", json!([raw_hex]))
            .await?;

        Self::decode(value)
    }

    async fn estimate_fee_rate(&self, target: u16, mode: FeeEstimateMode) -> Result<u64> {
        let value = self
            .client
            .call("estimatesmartfee", json!([target, mode.as_str()]))
            .await?;
        let estimate: EstimateSmartFee = Self::decode(value)?;

        match estimate.feerate {
            Some(rate) => Ok(types::to_minor_units(rate)),
            None => Err(Error::Node(satsync_net::Error::Decode(format!(
                "node returned no fee rate: {}",
                estimate.errors.join("; ")
            )))),
        }
    }
}
