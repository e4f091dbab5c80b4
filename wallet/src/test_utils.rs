//! Test doubles shared by the monitor and wallet tests: an in-memory node,
//! a deterministic key store and a stub transaction encoder.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::error::Error;
use crate::model::{Keypair, Utxo};
use crate::node::NodeRpc;
use crate::signer::{self, KeyStore, SignerError, TxEncoder};
use crate::types::{self, Block, FeeEstimateMode, ScriptPubKey, TransactionData, TxInput, TxOutput};

/// Route `log` output through the test harness. Safe to call repeatedly.
pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn output(n: u32, address: &str, amount: u64) -> TxOutput {
    TxOutput {
        value: types::from_minor_units(amount),
        n,
        script_pub_key: Some(ScriptPubKey {
            address: Some(address.to_string()),
            addresses: None,
        }),
    }
}

pub fn coinbase_tx(txid: &str, vout: Vec<TxOutput>) -> TransactionData {
    TransactionData {
        txid: txid.to_string(),
        vin: vec![TxInput {
            txid: None,
            vout: None,
            coinbase: Some("03abc".to_string()),
        }],
        vout,
    }
}

pub fn spend_tx(txid: &str, vin: Vec<(&str, u32)>, vout: Vec<TxOutput>) -> TransactionData {
    TransactionData {
        txid: txid.to_string(),
        vin: vin
            .into_iter()
            .map(|(prev, n)| TxInput {
                txid: Some(prev.to_string()),
                vout: Some(n),
                coinbase: None,
            })
            .collect(),
        vout,
    }
}

pub fn block(transactions: Vec<TransactionData>) -> Block {
    Block {
        hash: String::new(),
        transactions,
    }
}

#[derive(Default)]
struct MockNodeState {
    height: u64,
    blocks_by_height: HashMap<u64, String>,
    blocks: HashMap<String, Block>,
    transactions: HashMap<String, TransactionData>,
    broadcasts: Vec<String>,
    fee_rate: u64,
    broadcast_failure: Option<String>,
}

/// In-memory stand-in for a node: blocks and transactions are registered up
/// front, broadcasts are recorded and assigned sequential ids.
#[derive(Default)]
pub struct MockNode {
    state: Mutex<MockNodeState>,
}

impl MockNode {
    pub fn set_height(&self, height: u64) {
        self.state.lock().unwrap().height = height;
    }

    pub fn set_fee_rate(&self, rate: u64) {
        self.state.lock().unwrap().fee_rate = rate;
    }

    /// Register `block` at `height` under the hash `hash{height}` and make
    /// its transactions resolvable by id.
    pub fn add_block(&self, height: u64, mut block: Block) {
        let hash = format!("hash{height}");
        block.hash = hash.clone();
        let mut state = self.state.lock().unwrap();
        for tx in &block.transactions {
            state.transactions.insert(tx.txid.clone(), tx.clone());
        }
        state.blocks_by_height.insert(height, hash.clone());
        state.blocks.insert(hash, block);
    }

    pub fn add_transaction(&self, tx: TransactionData) {
        let mut state = self.state.lock().unwrap();
        state.transactions.insert(tx.txid.clone(), tx);
    }

    /// Raw payloads broadcast so far, in submission order.
    pub fn broadcasts(&self) -> Vec<String> {
        self.state.lock().unwrap().broadcasts.clone()
    }

    /// Make the next broadcast fail with `message` instead of accepting the
    /// payload.
    pub fn fail_next_broadcast(&self, message: &str) {
        self.state.lock().unwrap().broadcast_failure = Some(message.to_string());
    }
}

#[async_trait]
impl NodeRpc for MockNode {
    async fn current_height(&self) -> Result<u64, Error> {
        Ok(self.state.lock().unwrap().height)
    }

    async fn block_hash(&self, height: u64) -> Result<String, Error> {
        self.state
            .lock()
            .unwrap()
            .blocks_by_height
            .get(&height)
            .cloned()
            .ok_or_else(|| {
                Error::Node(satsync_net::Error::BlockNotFound(format!(
                    "no block at height {height}"
                )))
            })
    }

    async fn block(&self, hash: &str) -> Result<Block, Error> {
        self.state
            .lock()
            .unwrap()
            .blocks
            .get(hash)
            .cloned()
            .ok_or_else(|| Error::Node(satsync_net::Error::BlockNotFound(hash.to_string())))
    }

    async fn raw_transaction(&self, txid: &str) -> Result<TransactionData, Error> {
        self.state
            .lock()
            .unwrap()
            .transactions
            .get(txid)
            .cloned()
            .ok_or_else(|| {
                Error::Node(satsync_net::Error::BlockNotFound(format!(
                    "no such transaction {txid}"
                )))
            })
    }

    async fn broadcast(&self, raw_hex: &str) -> Result<String, Error> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.broadcast_failure.take() {
            return Err(Error::Node(satsync_net::Error::Connection {
                code: -25,
                message,
            }));
        }
        state.broadcasts.push(raw_hex.to_string());
        Ok(format!("sent{}", state.broadcasts.len()))
    }

    async fn estimate_fee_rate(&self, _target: u16, _mode: FeeEstimateMode) -> Result<u64, Error> {
        Ok(self.state.lock().unwrap().fee_rate)
    }
}

/// Deterministic key store: the n-th derived keypair is
/// `priv{n}` / `pub{n}` / `mockaddr{n}`.
#[derive(Default)]
pub struct MockKeyStore {
    counter: Mutex<u64>,
}

impl KeyStore for MockKeyStore {
    fn derive_keypair(&self) -> signer::Result<Keypair> {
        let mut counter = self.counter.lock().unwrap();
        *counter += 1;
        Ok(Keypair {
            private_key: format!("priv{counter}"),
            public_key: format!("pub{counter}"),
            address: format!("mockaddr{counter}"),
        })
    }

    fn address_for(&self, private_key: &str) -> signer::Result<String> {
        let suffix = private_key
            .strip_prefix("priv")
            .ok_or_else(|| SignerError(format!("unknown private key {private_key}")))?;
        Ok(format!("mockaddr{suffix}"))
    }
}

/// A transaction under construction by [`MockEncoder`].
pub struct MockHandle {
    pub inputs: Vec<Utxo>,
    pub outputs: Vec<(String, u64)>,
    pub signed: bool,
}

/// Stub encoder reporting a fixed serialized size. `sign` enforces one key
/// per input, matching what a real encoder would require. When `build_gate`
/// is set, `build` suspends until the gate is notified, which lets tests
/// hold a submission in flight.
pub struct MockEncoder {
    pub size: usize,
    pub build_gate: Option<Arc<Notify>>,
}

impl Default for MockEncoder {
    fn default() -> Self {
        Self {
            size: 256,
            build_gate: None,
        }
    }
}

#[async_trait]
impl TxEncoder for MockEncoder {
    type Handle = MockHandle;

    async fn build(
        &self,
        inputs: &[Utxo],
        outputs: &[(String, u64)],
    ) -> signer::Result<Self::Handle> {
        if let Some(gate) = &self.build_gate {
            gate.notified().await;
        }
        Ok(MockHandle {
            inputs: inputs.to_vec(),
            outputs: outputs.to_vec(),
            signed: false,
        })
    }

    async fn sign(
        &self,
        mut handle: Self::Handle,
        private_keys: &[String],
    ) -> signer::Result<Self::Handle> {
        if private_keys.len() != handle.inputs.len() {
            return Err(SignerError(format!(
                "{} keys for {} inputs",
                private_keys.len(),
                handle.inputs.len()
            )));
        }
        handle.signed = true;
        Ok(handle)
    }

    fn estimate_size(&self, handle: &Self::Handle) -> signer::Result<usize> {
        if !handle.signed {
            return Err(SignerError("cannot size an unsigned transaction".to_string()));
        }
        Ok(self.size)
    }

    fn compute_fee(&self, handle: &Self::Handle, fee_rate: u64) -> signer::Result<u64> {
        let size = self.estimate_size(handle)?;
        Ok(size as u64 * fee_rate / crate::constants::FEE_RATE_UNIT_BYTES)
    }

    fn serialize(&self, handle: &Self::Handle) -> signer::Result<String> {
        if !handle.signed {
            return Err(SignerError(
                "cannot serialize an unsigned transaction".to_string(),
            ));
        }
        let inputs: Vec<String> = handle
            .inputs
            .iter()
            .map(|utxo| format!("{}:{}", utxo.tx_id, utxo.output_no))
            .collect();
        let outputs: Vec<String> = handle
            .outputs
            .iter()
            .map(|(address, amount)| format!("{address}={amount}"))
            .collect();
        Ok(format!("raw[{}][{}]", inputs.join(","), outputs.join(",")))
    }
}
