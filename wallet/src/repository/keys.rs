//! Key builders for the rows persisted by the ledger.
//!
//! Every key starts with the network name so that one physical database can
//! host the state of several networks side by side. Fields are joined with
//! `-`, so network names must not contain it; wallet construction enforces
//! alphanumeric names.

/// Watch-from height of a watched address.
#[inline]
pub fn address(network: &str, address: &str) -> String {
    format!("addr-{}-{}", network, address)
}

/// Prefix under which every watched address of a network lives.
#[inline]
pub fn address_prefix(network: &str) -> String {
    format!("addr-{}-", network)
}

/// A UTXO row, keyed by (transaction id, output index).
#[inline]
pub fn utxo(network: &str, txid: &str, output_no: u32) -> String {
    format!("utxo-{}-{}-{}", network, txid, output_no)
}

/// Prefix under which every UTXO row of one transaction lives.
#[inline]
pub fn utxo_tx_prefix(network: &str, txid: &str) -> String {
    format!("utxo-{}-{}-", network, txid)
}

/// Prefix under which every UTXO row of a network lives.
#[inline]
pub fn utxo_prefix(network: &str) -> String {
    format!("utxo-{}-", network)
}

/// The chain monitor's replay cursor: next block height to process.
#[inline]
pub fn cursor(network: &str) -> String {
    format!("cursor-{}", network)
}
