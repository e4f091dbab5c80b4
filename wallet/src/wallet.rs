//! The wallet director: address management, balances, and construction,
//! signing and dispatch of spend transactions over the synchronized ledger.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::constants;
use crate::db::Database;
use crate::error::Error;
use crate::factory;
use crate::model::{Keypair, Utxo};
use crate::monitor::ChainMonitor;
use crate::node::NodeRpc;
use crate::params::Params;
use crate::repository::{self, Ledger};
use crate::signer::{KeyStore, TxEncoder};
use crate::types::FeeEstimateMode;

type Result<T> = std::result::Result<T, Error>;

/// Per-send knobs. Every field defaults to "let the wallet decide".
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Exact total fee in minor units. When set, no estimation happens.
    pub total_fee: Option<u64>,
    /// Fee rate in minor units per byte; overrides the node's fee oracle.
    pub fee_per_byte: Option<u64>,
    /// Confirmation window for the fee oracle; defaults to the wallet's.
    pub conf_target: Option<u16>,
    /// Estimation mode for the fee oracle; defaults to the wallet's.
    pub estimate_mode: Option<FeeEstimateMode>,
    /// Pay the fee out of the sent amounts instead of on top of them.
    pub deduct_fee: bool,
}

/// Wallet over a locally synchronized UTXO ledger.
///
/// Owns the persistent store and the in-memory key table; delegates chain
/// access to a [`NodeRpc`] implementation and all cryptography to the
/// injected [`KeyStore`] and [`TxEncoder`] capabilities.
pub struct UtxoWallet<T, N, K, E> {
    ledger: Arc<Ledger<T>>,
    node: Arc<N>,
    key_store: K,
    encoder: E,
    params: Params,
    keys: Mutex<HashMap<String, String>>,
}

impl<T, N, K, E> UtxoWallet<T, N, K, E>
where
    T: Database,
    N: NodeRpc,
    K: KeyStore,
    E: TxEncoder,
{
    /// Create a wallet over `db`, talking to `node`.
    pub fn new(db: T, node: Arc<N>, key_store: K, encoder: E, params: Params) -> Result<Self> {
        // the network name is embedded in store keys with `-` separators,
        // so it must not be able to alias another network's prefix
        if params.network.is_empty()
            || !params.network.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(Error::Configuration(
                "network name must be non-empty and ASCII alphanumeric".to_string(),
            ));
        }
        if params.conf_target == 0 {
            return Err(Error::Configuration(
                "confirmation target must be at least 1".to_string(),
            ));
        }
        if params.speed_up_fee_factor == 0 {
            return Err(Error::Configuration(
                "speed-up fee factor must be at least 1".to_string(),
            ));
        }
        if params.poll_interval.is_zero() || params.requests_timeout.is_zero() {
            return Err(Error::Configuration(
                "poll interval and request timeout must be positive".to_string(),
            ));
        }

        let ledger = Arc::new(Ledger::new(db, params.network.clone()));

        Ok(Self {
            ledger,
            node,
            key_store,
            encoder,
            params,
            keys: Mutex::new(HashMap::new()),
        })
    }

    /// The ledger backing this wallet.
    pub fn ledger(&self) -> &Ledger<T> {
        &self.ledger
    }

    /// A chain monitor feeding this wallet's ledger. Drive it with
    /// [`ChainMonitor::run`] or tick it manually.
    pub fn monitor(&self) -> ChainMonitor<T, N> {
        ChainMonitor::new(self.ledger.clone(), self.node.clone())
    }

    /// Initialize the sync cursor at the remote tip if this is a fresh
    /// store. Safe to call on every startup.
    pub async fn initialize(&self) -> Result<()> {
        let height = self.node.current_height().await?;
        self.ledger.init_cursor(height)?;
        log::info!(
            "wallet for network {} initialized, chain tip at {}",
            self.params.network,
            height
        );

        Ok(())
    }

    /// Derive a fresh keypair and start watching its address from the
    /// current position. No history replay: a new address has none.
    pub async fn generate_address(&self) -> Result<Keypair> {
        let keypair = self.key_store.derive_keypair()?;
        let height = match self.ledger.cursor()? {
            Some(height) => height,
            None => self.node.current_height().await?,
        };
        self.ledger.upsert_address(&keypair.address, height)?;
        self.keys
            .lock()
            .map_err(repository::Error::from)?
            .insert(keypair.address.clone(), keypair.private_key.clone());
        log::debug!("generated address {} watched from {}", keypair.address, height);

        Ok(keypair)
    }

    /// Watch `address` (without a key: receive-only) from `from_height`,
    /// lowering the cursor so the monitor replays its history.
    pub fn import_address(&self, address: &str, from_height: u64) -> Result<()> {
        self.ledger.upsert_address(address, from_height)?;
        self.ledger.floor_cursor(from_height)?;
        log::debug!("imported address {} watched from {}", address, from_height);

        Ok(())
    }

    /// Import a private key, watch its address from `from_height` and return
    /// the address.
    pub fn import_key(&self, private_key: &str, from_height: u64) -> Result<String> {
        let address = self.key_store.address_for(private_key)?;
        self.import_address(&address, from_height)?;
        self.keys
            .lock()
            .map_err(repository::Error::from)?
            .insert(address.clone(), private_key.to_string());

        Ok(address)
    }

    /// Spendable balance of `address` in minor units.
    pub fn balance(&self, address: &str) -> Result<u64> {
        self.ledger.balance(address).map_err(Error::from)
    }

    /// Spendable outputs of `address`.
    pub fn unspent(&self, address: &str) -> Result<Vec<Utxo>> {
        self.ledger.unspent(address).map_err(Error::from)
    }

    /// Send `amount` minor units from `from_address` to `to_address`.
    /// Returns the broadcast transaction id.
    pub async fn send(
        &self,
        from_address: &str,
        to_address: &str,
        amount: u64,
        options: SendOptions,
    ) -> Result<String> {
        self.send_bulk(
            from_address,
            &[(to_address.to_string(), amount)],
            options,
        )
        .await
    }

    /// Send to several destinations in one transaction. Returns the
    /// broadcast transaction id.
    pub async fn send_bulk(
        &self,
        from_address: &str,
        destinations: &[(String, u64)],
        options: SendOptions,
    ) -> Result<String> {
        let candidates = self.ledger.unspent(from_address)?;
        let fee = match options.total_fee {
            Some(fee) => fee,
            None => {
                self.estimate_fee_for(&candidates, from_address, destinations, &options)
                    .await?
            }
        };

        self.submit(from_address, &candidates, destinations, fee, options.deduct_fee)
            .await
    }

    /// Total fee a send to `destinations` would pay under `options`, from a
    /// signed zero-fee draft of the exact transaction.
    pub async fn estimate_total_fee(
        &self,
        from_address: &str,
        destinations: &[(String, u64)],
        options: &SendOptions,
    ) -> Result<u64> {
        let candidates = self.ledger.unspent(from_address)?;

        self.estimate_fee_for(&candidates, from_address, destinations, options)
            .await
    }

    /// Replace a stuck transaction's effective fee by immediately spending
    /// its outputs back to their owner at a multiple of the current fee
    /// rate, so the child's fee also pays for the ancestor.
    pub async fn speed_up(&self, txid: &str, options: SendOptions) -> Result<String> {
        let originals = self.ledger.utxos_of_transaction(txid)?;
        if originals.is_empty() {
            return Err(Error::CreateTransaction(format!(
                "transaction {txid} has no outputs tracked by this wallet"
            )));
        }
        // an output already consumed by a later send cannot be respent; the
        // whole original set must still be spendable
        if let Some(spent) = originals.iter().find(|utxo| utxo.used) {
            return Err(Error::CreateTransaction(format!(
                "output {txid}:{} is already being respent",
                spent.output_no
            )));
        }
        let from_address = originals[0].address.clone();
        let original_value: u64 = originals.iter().map(|utxo| utxo.amount).sum();

        // the stuck outputs go first so selection is forced to spend them
        let mut candidates = originals;
        for utxo in self.ledger.unspent(&from_address)? {
            if utxo.tx_id != txid {
                candidates.push(utxo);
            }
        }

        let total_fee = match options.total_fee {
            Some(fee) => fee,
            None => {
                let mut draft_options = options.clone();
                draft_options.deduct_fee = true;
                let estimated = self
                    .estimate_fee_for(
                        &candidates,
                        &from_address,
                        &[(from_address.clone(), original_value)],
                        &draft_options,
                    )
                    .await?;
                estimated * self.params.speed_up_fee_factor
            }
        };

        // learn how much input value covering the fee pulls in, then send
        // exactly that back to the owner with the fee deducted
        let (_, input_value) = factory::select_utxos(&candidates, total_fee, 0, true)?;
        log::info!(
            "speeding up {} with a fee of {} over {} of input value",
            txid,
            total_fee,
            input_value
        );

        self.submit(
            &from_address,
            &candidates,
            &[(from_address.clone(), input_value)],
            total_fee,
            true,
        )
        .await
    }

    /// Total fee paid by a confirmed transaction.
    pub async fn tx_fee(&self, txid: &str) -> Result<u64> {
        self.node.tx_fee(txid).await
    }

    /// Current fee rate in minor units per 1024 bytes, from the node's fee
    /// oracle.
    pub async fn estimate_fee(
        &self,
        conf_target: Option<u16>,
        mode: Option<FeeEstimateMode>,
    ) -> Result<u64> {
        self.node
            .estimate_fee_rate(
                conf_target.unwrap_or(self.params.conf_target),
                mode.unwrap_or(self.params.estimate_mode),
            )
            .await
    }

    async fn estimate_fee_for(
        &self,
        candidates: &[Utxo],
        from_address: &str,
        destinations: &[(String, u64)],
        options: &SendOptions,
    ) -> Result<u64> {
        // sign a zero-fee draft of the real transaction: signatures dominate
        // the serialized size, so an unsigned size would undershoot
        let draft = factory::plan(candidates, destinations, from_address, 0, options.deduct_fee)?;
        let handle = self.encoder.build(&draft.inputs, &draft.outputs).await?;
        let keys = self.signing_keys(&draft.inputs)?;
        let handle = self.encoder.sign(handle, &keys).await?;
        let size = self.encoder.estimate_size(&handle)?;
        log::debug!("fee draft of {} bytes over {} inputs", size, draft.inputs.len());

        let fee_rate = match options.fee_per_byte {
            Some(per_byte) => per_byte * constants::FEE_RATE_UNIT_BYTES,
            None => {
                self.node
                    .estimate_fee_rate(
                        options.conf_target.unwrap_or(self.params.conf_target),
                        options.estimate_mode.unwrap_or(self.params.estimate_mode),
                    )
                    .await?
            }
        };

        Ok(self.encoder.compute_fee(&handle, fee_rate)?)
    }

    async fn submit(
        &self,
        from_address: &str,
        candidates: &[Utxo],
        destinations: &[(String, u64)],
        fee: u64,
        deduct_fee: bool,
    ) -> Result<String> {
        let info = factory::plan(candidates, destinations, from_address, fee, deduct_fee)?;

        // reserve the inputs before anything can suspend: a send selecting
        // from now on sees them as used and fails selection, and of two
        // submissions racing over one output only the reservation winner
        // ever reaches the node
        self.ledger
            .reserve_utxos(&info.inputs)
            .map_err(|err| match err {
                repository::Error::OutputConflict { txid, output_no } => {
                    Error::CreateTransaction(format!(
                        "output {txid}:{output_no} was consumed by a concurrent transaction"
                    ))
                }
                other => Error::Storage(other),
            })?;

        let submitted: Result<String> = async {
            let handle = self.encoder.build(&info.inputs, &info.outputs).await?;
            let keys = self.signing_keys(&info.inputs)?;
            let handle = self.encoder.sign(handle, &keys).await?;
            let raw = self.encoder.serialize(&handle)?;

            self.node.broadcast(&raw).await
        }
        .await;
        let txid = match submitted {
            Ok(txid) => txid,
            Err(err) => {
                // nothing reached the node, the reservation must not stick
                if let Err(release) = self.ledger.release_utxos(&info.inputs) {
                    log::error!(
                        "failed releasing the inputs of an aborted submission: {}",
                        release
                    );
                }
                return Err(err);
            }
        };

        let pending: Vec<Utxo> = info
            .outputs
            .iter()
            .enumerate()
            .filter(|(_, (address, _))| address == from_address)
            .map(|(n, (address, amount))| Utxo {
                tx_id: txid.clone(),
                output_no: n as u32,
                address: address.clone(),
                amount: *amount,
                used: false,
            })
            .collect();
        self.ledger.apply_submission(&info.inputs, &pending)?;

        log::info!(
            "broadcast {} spending {} over {} inputs with a fee of {}",
            txid,
            info.input_value,
            info.inputs.len(),
            info.fee
        );

        Ok(txid)
    }

    fn signing_keys(&self, inputs: &[Utxo]) -> Result<Vec<String>> {
        let keys = self.keys.lock().map_err(repository::Error::from)?;

        inputs
            .iter()
            .map(|utxo| {
                keys.get(&utxo.address).cloned().ok_or_else(|| {
                    Error::Signer(format!("no private key for address {}", utxo.address))
                })
            })
            .collect()
    }
}
