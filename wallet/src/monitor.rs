//! Chain monitor: incremental replay of remote blocks into the ledger.
//!
//! One poll tick processes at most one block past the local cursor, which
//! bounds per-tick work and memory. The tick is a small state machine,
//! `Idle -> Fetching -> Applying -> Idle`; a failure before the cursor moves
//! leaves the tick safely retryable from the same height.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;

use crate::db::Database;
use crate::error::Error;
use crate::node::NodeRpc;
use crate::repository::Ledger;
use crate::types::{Block, TransactionData};

type Result<T> = std::result::Result<T, Error>;

/// Outcome of an observer callback. Failures are logged and do not abort
/// the tick: the store mutation they follow has already committed.
pub type ObserverResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Callback fired when the monitor enters a new block.
pub type BlockObserver = Box<dyn Fn(u64) -> BoxFuture<'static, ObserverResult> + Send + Sync>;

/// Callback fired with a single transaction.
pub type TransactionObserver =
    Box<dyn Fn(TransactionData) -> BoxFuture<'static, ObserverResult> + Send + Sync>;

/// Callback fired with a block's full transaction list.
pub type BlockCompleteObserver =
    Box<dyn Fn(Vec<TransactionData>) -> BoxFuture<'static, ObserverResult> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Fetching,
    Applying,
}

/// Polls the node one block past the local cursor, applies the block to the
/// ledger and dispatches ordered notifications to registered observers.
///
/// `tick` takes `&mut self`, so a single monitor can never run two ticks
/// concurrently: tick N's cursor advance is a precondition for tick N+1.
pub struct ChainMonitor<T, N> {
    ledger: Arc<Ledger<T>>,
    node: Arc<N>,
    phase: Phase,
    block_entered: Vec<BlockObserver>,
    new_output: Vec<TransactionObserver>,
    transaction: Vec<TransactionObserver>,
    block_complete: Vec<BlockCompleteObserver>,
}

impl<T, N> ChainMonitor<T, N>
where
    T: Database,
    N: NodeRpc,
{
    /// Create a monitor over `ledger`, fed by `node`.
    pub fn new(ledger: Arc<Ledger<T>>, node: Arc<N>) -> Self {
        Self {
            ledger,
            node,
            phase: Phase::Idle,
            block_entered: Vec::new(),
            new_output: Vec::new(),
            transaction: Vec::new(),
            block_complete: Vec::new(),
        }
    }

    /// Whether the monitor is between ticks (or a tick returned early).
    /// A monitor abandoned mid-tick by a failure reports its last phase.
    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    /// Register a callback fired once per applied block, with the height,
    /// before any transaction of the block is processed.
    pub fn on_block_entered(&mut self, observer: BlockObserver) {
        self.block_entered.push(observer);
    }

    /// Register a callback fired for every output newly indexed for a
    /// watched address, with the owning transaction.
    pub fn on_new_output(&mut self, observer: TransactionObserver) {
        self.new_output.push(observer);
    }

    /// Register a callback fired once per transaction in block order, for
    /// every transaction of the block.
    pub fn on_transaction(&mut self, observer: TransactionObserver) {
        self.transaction.push(observer);
    }

    /// Register a callback fired once per applied block with the full
    /// transaction list, after everything else.
    pub fn on_block_complete(&mut self, observer: BlockCompleteObserver) {
        self.block_complete.push(observer);
    }

    /// One poll tick: fetch at most one block past the cursor and apply it.
    ///
    /// A missing cursor is initialized to the remote height (first startup).
    /// When the remote chain is shorter than the cursor the tick is a no-op;
    /// the monitor never steps backward.
    pub async fn tick(&mut self) -> Result<()> {
        self.phase = Phase::Idle;
        let remote_height = self.node.current_height().await?;
        let height = match self.ledger.cursor()? {
            Some(cursor) => cursor,
            None => remote_height,
        };

        if remote_height < height {
            log::debug!(
                "chain is at {} but cursor is at {}, nothing to do",
                remote_height,
                height
            );
            return Ok(());
        }

        self.phase = Phase::Fetching;
        let hash = self.node.block_hash(height).await?;
        let block = self.node.block(&hash).await?;

        self.phase = Phase::Applying;
        self.apply_block(height, &block).await?;
        self.ledger.set_cursor(height + 1)?;
        self.phase = Phase::Idle;

        Ok(())
    }

    /// Apply one block at `height` to the ledger, firing observers in their
    /// fixed category order. Re-applying the same block (restart replay) is
    /// idempotent.
    pub async fn apply_block(&self, height: u64, block: &Block) -> Result<()> {
        // persist the cursor first: a crash mid-apply restarts at this
        // block and re-applies only idempotent work
        self.ledger.set_cursor(height)?;
        log::debug!(
            "applying block {} at height {} ({} transactions)",
            block.hash,
            height,
            block.transactions.len()
        );

        for observer in &self.block_entered {
            if let Err(err) = observer(height).await {
                log::warn!("block-entered observer failed: {}", err);
            }
        }

        // outputs before inputs: an output created and spent within this
        // block must exist before its consuming input is processed
        let watched = self.ledger.addresses()?;
        for tx in &block.transactions {
            for output in &tx.vout {
                let address = match output.destination() {
                    Some(address) => address,
                    // non-standard script, not indexable
                    None => continue,
                };
                if !watched.contains(address) {
                    continue;
                }

                self.ledger
                    .upsert_utxo(address, &tx.txid, output.n, output.amount())?;
                log::debug!(
                    "new output {}:{} of {} for {}",
                    tx.txid,
                    output.n,
                    output.amount(),
                    address
                );
                for observer in &self.new_output {
                    if let Err(err) = observer(tx.clone()).await {
                        log::warn!("new-output observer failed: {}", err);
                    }
                }
            }
        }

        // one membership set for the whole block instead of a point lookup
        // per input
        let tracked = self.ledger.utxo_tx_ids()?;
        for tx in &block.transactions {
            for input in &tx.vin {
                let (txid, output_no) = match (&input.txid, input.vout) {
                    (Some(txid), Some(output_no)) => (txid, output_no),
                    // miner-origin input, nothing to look up
                    _ => continue,
                };
                if tracked.contains(txid.as_str()) {
                    self.ledger.delete_utxo(txid, output_no)?;
                    log::debug!("spent output {}:{} removed", txid, output_no);
                }
            }
        }

        for tx in &block.transactions {
            for observer in &self.transaction {
                if let Err(err) = observer(tx.clone()).await {
                    log::warn!("transaction observer failed: {}", err);
                }
            }
        }

        for observer in &self.block_complete {
            if let Err(err) = observer(block.transactions.clone()).await {
                log::warn!("block-complete observer failed: {}", err);
            }
        }

        Ok(())
    }

    /// Drive ticks forever at `interval`, one at a time. A failed tick is
    /// logged and retried from the same height on the next round.
    pub async fn run(&mut self, interval: Duration) {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            timer.tick().await;
            if let Err(err) = self.tick().await {
                log::warn!("chain monitor tick failed: {}", err);
            }
        }
    }
}
