use std::collections::HashSet;
use std::sync::Mutex;

use crate::db::{Database, WriteBatch as _};
use crate::model;

use super::{keys, Error, Result};

/// Persistent store for watched addresses, UTXO rows and the sync cursor.
///
/// Every operation is a single atomic commit against the backing store.
/// Read-modify-write sections serialize on an internal mutex that is only
/// held across synchronous storage calls, never across a suspension point,
/// so concurrent callers targeting the same row observe each other's writes.
pub struct Ledger<T> {
    db: T,
    network: String,
    write_mutex: Mutex<()>,
}

impl<T> Ledger<T>
where
    T: Database,
{
    /// Create a ledger scoped to `network`.
    pub fn new(db: T, network: impl Into<String>) -> Self {
        Self {
            db,
            network: network.into(),
            write_mutex: Mutex::new(()),
        }
    }

    /// Name of the network this ledger is scoped to.
    pub fn network(&self) -> &str {
        &self.network
    }

    /// Start watching `address` from `height`, or lower the stored
    /// watch-from height if the address is already watched. An address is
    /// never un-watched and its height never raised.
    pub fn upsert_address(&self, address: &str, height: u64) -> Result<()> {
        let _lock = self.write_mutex.lock()?;
        let key = keys::address(&self.network, address);
        let height = match self.db.get_opt::<_, u64>(&key)? {
            Some(stored) => stored.min(height),
            None => height,
        };
        self.db.put(&key, &height)?;

        Ok(())
    }

    /// The set of watched addresses, loaded in one scan.
    pub fn addresses(&self) -> Result<HashSet<String>> {
        let prefix = keys::address_prefix(&self.network);
        let rows: Vec<(Vec<u8>, u64)> = self.db.prefix(prefix.as_bytes())?;

        Ok(rows
            .into_iter()
            .map(|(key, _)| String::from_utf8_lossy(&key[prefix.len()..]).into_owned())
            .collect())
    }

    /// Insert a UTXO row, or reset its `used` flag if the key is already
    /// present. Re-observing the same (txid, output index) is idempotent and
    /// keeps a single row for the key.
    pub fn upsert_utxo(&self, address: &str, txid: &str, output_no: u32, amount: u64) -> Result<()> {
        let _lock = self.write_mutex.lock()?;
        let key = keys::utxo(&self.network, txid, output_no);
        let row = match self.db.get_opt::<_, model::Utxo>(&key)? {
            Some(mut existing) => {
                existing.used = false;
                existing
            }
            None => model::Utxo {
                tx_id: txid.to_string(),
                output_no,
                address: address.to_string(),
                amount,
                used: false,
            },
        };
        self.db.put(&key, &row)?;

        Ok(())
    }

    /// Mark a UTXO as consumed by a transaction we submitted. Idempotent: an
    /// absent key is a no-op, mirroring at-least-once redelivery of block
    /// data. Spend detection is address-agnostic: (txid, output index) is
    /// globally unique, so no owning-address check is needed.
    pub fn mark_used(&self, txid: &str, output_no: u32) -> Result<()> {
        let _lock = self.write_mutex.lock()?;
        let key = keys::utxo(&self.network, txid, output_no);
        if let Some(mut row) = self.db.get_opt::<_, model::Utxo>(&key)? {
            row.used = true;
            self.db.put(&key, &row)?;
        }

        Ok(())
    }

    /// Remove a UTXO row once its consumption is observed in a confirmed
    /// block. No-op if the key is absent.
    pub fn delete_utxo(&self, txid: &str, output_no: u32) -> Result<()> {
        let _lock = self.write_mutex.lock()?;
        let mut batch = self.db.batch();
        batch.delete(keys::utxo(&self.network, txid, output_no));
        self.db.write(batch)?;

        Ok(())
    }

    /// Spendable outputs of `address`, in stable key order.
    pub fn unspent(&self, address: &str) -> Result<Vec<model::Utxo>> {
        let rows = self.all_utxos()?;

        Ok(rows
            .into_iter()
            .filter(|utxo| utxo.address == address && !utxo.used)
            .collect())
    }

    /// Every UTXO row created by transaction `txid`, used or not.
    pub fn utxos_of_transaction(&self, txid: &str) -> Result<Vec<model::Utxo>> {
        let prefix = keys::utxo_tx_prefix(&self.network, txid);
        let rows: Vec<(Vec<u8>, model::Utxo)> = self.db.prefix(prefix.as_bytes())?;

        Ok(rows.into_iter().map(|(_, utxo)| utxo).collect())
    }

    /// Ids of every transaction with at least one tracked UTXO row, loaded
    /// in one scan so block application avoids per-input point lookups.
    pub fn utxo_tx_ids(&self) -> Result<HashSet<String>> {
        let rows = self.all_utxos()?;

        Ok(rows.into_iter().map(|utxo| utxo.tx_id).collect())
    }

    /// Spendable balance of `address` in minor units.
    pub fn balance(&self, address: &str) -> Result<u64> {
        let unspent = self.unspent(address)?;

        Ok(unspent.iter().map(|utxo| utxo.amount).sum())
    }

    /// Next block height to process, if a cursor has been initialized.
    pub fn cursor(&self) -> Result<Option<u64>> {
        Ok(self.db.get_opt(keys::cursor(&self.network))?)
    }

    /// Advance the cursor. Only the chain monitor calls this.
    pub fn set_cursor(&self, height: u64) -> Result<()> {
        self.db.put(&keys::cursor(&self.network), &height)?;

        Ok(())
    }

    /// Initialize the cursor iff it does not exist yet.
    pub fn init_cursor(&self, height: u64) -> Result<()> {
        let _lock = self.write_mutex.lock()?;
        if self.db.get_opt::<_, u64>(keys::cursor(&self.network))?.is_none() {
            self.db.put(&keys::cursor(&self.network), &height)?;
        }

        Ok(())
    }

    /// Lower the cursor to `height` if it is absent or further ahead, so
    /// replay reaches back to a newly imported address's history.
    pub fn floor_cursor(&self, height: u64) -> Result<()> {
        let _lock = self.write_mutex.lock()?;
        let key = keys::cursor(&self.network);
        match self.db.get_opt::<_, u64>(&key)? {
            Some(stored) if stored <= height => {}
            _ => self.db.put(&key, &height)?,
        }

        Ok(())
    }

    /// Reserve the inputs of a transaction about to be submitted: every row
    /// must exist and be unspent, or nothing is changed and the conflicting
    /// key is reported. Reservation happens before broadcast, so two
    /// submissions racing over the same output can never both reach the
    /// node.
    pub fn reserve_utxos(&self, inputs: &[model::Utxo]) -> Result<()> {
        let _lock = self.write_mutex.lock()?;
        let mut rows = Vec::with_capacity(inputs.len());
        for input in inputs {
            let key = keys::utxo(&self.network, &input.tx_id, input.output_no);
            match self.db.get_opt::<_, model::Utxo>(&key)? {
                Some(row) if !row.used => rows.push((key, row)),
                _ => {
                    return Err(Error::OutputConflict {
                        txid: input.tx_id.clone(),
                        output_no: input.output_no,
                    });
                }
            }
        }

        let mut batch = self.db.batch();
        for (key, mut row) in rows {
            row.used = true;
            batch.put(&key, &row)?;
        }
        self.db.write(batch)?;

        Ok(())
    }

    /// Undo a reservation after a submission failed before reaching the
    /// node. Rows that disappeared in the meantime are skipped.
    pub fn release_utxos(&self, inputs: &[model::Utxo]) -> Result<()> {
        let _lock = self.write_mutex.lock()?;
        let mut batch = self.db.batch();
        for input in inputs {
            let key = keys::utxo(&self.network, &input.tx_id, input.output_no);
            if let Some(mut row) = self.db.get_opt::<_, model::Utxo>(&key)? {
                row.used = false;
                batch.put(&key, &row)?;
            }
        }
        self.db.write(batch)?;

        Ok(())
    }

    /// Post-submission update: mark the consumed inputs of a submitted
    /// transaction as used and materialize its self-directed outputs as
    /// pending rows, all in one atomic batch. Inputs already reserved stay
    /// used.
    pub fn apply_submission(
        &self,
        inputs: &[model::Utxo],
        pending: &[model::Utxo],
    ) -> Result<()> {
        let _lock = self.write_mutex.lock()?;
        let mut batch = self.db.batch();

        for input in inputs {
            let key = keys::utxo(&self.network, &input.tx_id, input.output_no);
            if let Some(mut row) = self.db.get_opt::<_, model::Utxo>(&key)? {
                row.used = true;
                batch.put(&key, &row)?;
            }
        }
        for utxo in pending {
            let key = keys::utxo(&self.network, &utxo.tx_id, utxo.output_no);
            batch.put(&key, utxo)?;
        }

        self.db.write(batch)?;

        Ok(())
    }

    fn all_utxos(&self) -> Result<Vec<model::Utxo>> {
        let prefix = keys::utxo_prefix(&self.network);
        let rows: Vec<(Vec<u8>, model::Utxo)> = self.db.prefix(prefix.as_bytes())?;

        Ok(rows.into_iter().map(|(_, utxo)| utxo).collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::HashMapDb;

    use super::*;

    fn ledger() -> Ledger<HashMapDb> {
        Ledger::new(HashMapDb::default(), "testnet")
    }

    #[test]
    fn upsert_address_keeps_the_lowest_height() {
        let ledger = ledger();

        ledger.upsert_address("addr1", 100).unwrap();
        ledger.upsert_address("addr1", 50).unwrap();
        ledger.upsert_address("addr1", 80).unwrap();

        let key = keys::address("testnet", "addr1");
        let stored: u64 = ledger.db.get(key).unwrap();
        assert_eq!(stored, 50);
        assert_eq!(ledger.addresses().unwrap().len(), 1);
    }

    #[test]
    fn upsert_utxo_is_idempotent_and_resets_used() {
        let ledger = ledger();

        ledger.upsert_utxo("addr1", "tx1", 0, 1_000).unwrap();
        ledger.mark_used("tx1", 0).unwrap();
        assert!(ledger.unspent("addr1").unwrap().is_empty());

        // re-observation (e.g. re-import) resets the flag, row count stays 1
        ledger.upsert_utxo("addr1", "tx1", 0, 1_000).unwrap();
        let unspent = ledger.unspent("addr1").unwrap();
        assert_eq!(unspent.len(), 1);
        assert!(!unspent[0].used);
        assert_eq!(ledger.utxos_of_transaction("tx1").unwrap().len(), 1);
    }

    #[test]
    fn mark_used_excludes_from_unspent_and_tolerates_absent_keys() {
        let ledger = ledger();

        ledger.upsert_utxo("addr1", "tx1", 0, 500).unwrap();
        ledger.upsert_utxo("addr1", "tx1", 1, 700).unwrap();
        ledger.mark_used("tx1", 0).unwrap();

        let unspent = ledger.unspent("addr1").unwrap();
        assert_eq!(unspent.len(), 1);
        assert_eq!(unspent[0].output_no, 1);
        assert_eq!(ledger.balance("addr1").unwrap(), 700);

        // absent key: no-op, not an error
        ledger.mark_used("never-seen", 3).unwrap();
    }

    #[test]
    fn delete_utxo_removes_the_row() {
        let ledger = ledger();

        ledger.upsert_utxo("addr1", "tx1", 0, 500).unwrap();
        ledger.delete_utxo("tx1", 0).unwrap();

        assert!(ledger.unspent("addr1").unwrap().is_empty());
        assert!(ledger.utxos_of_transaction("tx1").unwrap().is_empty());

        ledger.delete_utxo("tx1", 0).unwrap();
    }

    #[test]
    fn utxo_tx_ids_collects_used_and_unspent_rows() {
        let ledger = ledger();

        ledger.upsert_utxo("addr1", "tx1", 0, 500).unwrap();
        ledger.upsert_utxo("addr2", "tx2", 1, 700).unwrap();
        ledger.mark_used("tx2", 1).unwrap();

        let ids = ledger.utxo_tx_ids().unwrap();
        assert!(ids.contains("tx1"));
        assert!(ids.contains("tx2"));
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn cursor_lifecycle() {
        let ledger = ledger();
        assert_eq!(ledger.cursor().unwrap(), None);

        ledger.init_cursor(100).unwrap();
        assert_eq!(ledger.cursor().unwrap(), Some(100));

        // init is idempotent once a cursor exists
        ledger.init_cursor(999).unwrap();
        assert_eq!(ledger.cursor().unwrap(), Some(100));

        ledger.set_cursor(101).unwrap();
        assert_eq!(ledger.cursor().unwrap(), Some(101));

        // floor only ever moves the cursor down
        ledger.floor_cursor(90).unwrap();
        assert_eq!(ledger.cursor().unwrap(), Some(90));
        ledger.floor_cursor(95).unwrap();
        assert_eq!(ledger.cursor().unwrap(), Some(90));
    }

    #[test]
    fn reserving_the_same_output_twice_fails() {
        let ledger = ledger();
        ledger.upsert_utxo("addr1", "tx1", 0, 1_000).unwrap();

        let snapshot = ledger.unspent("addr1").unwrap();
        ledger.reserve_utxos(&snapshot).unwrap();
        assert!(ledger.unspent("addr1").unwrap().is_empty());

        // a second submission planned from the same snapshot loses the race
        let err = ledger.reserve_utxos(&snapshot).unwrap_err();
        assert!(matches!(
            err,
            crate::repository::Error::OutputConflict { .. }
        ));
    }

    #[test]
    fn failed_reservation_changes_nothing() {
        let ledger = ledger();
        ledger.upsert_utxo("addr1", "tx1", 0, 500).unwrap();
        ledger.upsert_utxo("addr1", "tx2", 0, 700).unwrap();
        ledger.mark_used("tx2", 0).unwrap();

        let inputs = vec![
            ledger.unspent("addr1").unwrap().remove(0),
            crate::model::Utxo {
                tx_id: "tx2".into(),
                output_no: 0,
                address: "addr1".into(),
                amount: 700,
                used: false,
            },
        ];
        let err = ledger.reserve_utxos(&inputs).unwrap_err();
        assert!(matches!(
            err,
            crate::repository::Error::OutputConflict { .. }
        ));

        // the unspent row was not touched by the aborted reservation
        assert_eq!(ledger.unspent("addr1").unwrap().len(), 1);
    }

    #[test]
    fn released_outputs_are_selectable_again() {
        let ledger = ledger();
        ledger.upsert_utxo("addr1", "tx1", 0, 1_000).unwrap();
        let inputs = ledger.unspent("addr1").unwrap();

        ledger.reserve_utxos(&inputs).unwrap();
        ledger.release_utxos(&inputs).unwrap();

        assert_eq!(ledger.balance("addr1").unwrap(), 1_000);
    }

    #[test]
    fn apply_submission_marks_inputs_and_adds_pending_in_one_commit() {
        let ledger = ledger();
        ledger.upsert_utxo("addr1", "tx1", 0, 39_000_000).unwrap();

        let inputs = ledger.unspent("addr1").unwrap();
        let pending = vec![crate::model::Utxo {
            tx_id: "tx2".into(),
            output_no: 0,
            address: "addr1".into(),
            amount: 28_500_000,
            used: false,
        }];
        ledger.apply_submission(&inputs, &pending).unwrap();

        let unspent = ledger.unspent("addr1").unwrap();
        assert_eq!(unspent.len(), 1);
        assert_eq!(unspent[0].tx_id, "tx2");
        assert_eq!(unspent[0].amount, 28_500_000);
        assert_eq!(ledger.balance("addr1").unwrap(), 28_500_000);
    }

    #[test]
    fn networks_are_isolated() {
        let db = HashMapDb::default();
        let mainnet = Ledger::new(db.clone(), "mainnet");
        let testnet = Ledger::new(db, "testnet");

        mainnet.upsert_utxo("addr1", "tx1", 0, 500).unwrap();

        assert_eq!(mainnet.unspent("addr1").unwrap().len(), 1);
        assert!(testnet.unspent("addr1").unwrap().is_empty());
        assert_eq!(testnet.cursor().unwrap(), None);
    }
}
