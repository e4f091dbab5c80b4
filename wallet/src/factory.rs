//! Pure transaction planning: coin selection and output assembly.
//!
//! Selection is intentionally order-sensitive: candidates are walked in the
//! order supplied by the caller, so callers control prioritization by
//! pre-sorting or pre-pending candidates (the speed-up operation relies on
//! this to force reuse of the stuck transaction's outputs).

use crate::error::Error;
use crate::model::Utxo;

type Result<T> = std::result::Result<T, Error>;

/// Summary of a planned transaction.
#[derive(Debug, Clone)]
pub struct TransactionInfo {
    /// Inputs to consume, in selection order.
    pub inputs: Vec<Utxo>,
    /// `(address, amount)` outputs: change first (if any), then the
    /// requested destinations in caller-supplied order.
    pub outputs: Vec<(String, u64)>,
    /// Total value of the selected inputs.
    pub input_value: u64,
    /// Fee the plan accounts for.
    pub fee: u64,
}

/// Select enough UTXOs to cover `target` (plus `fee` when the fee is paid on
/// top). Walks `candidates` in order, accumulating until the threshold is
/// reached.
///
/// Returns the selected inputs and their total value, or
/// [`Error::InsufficientFunds`] with the exact available and required
/// amounts once the candidate list is exhausted.
pub fn select_utxos(
    candidates: &[Utxo],
    target: u64,
    fee: u64,
    deduct_fee: bool,
) -> Result<(Vec<Utxo>, u64)> {
    let required = if deduct_fee {
        target
    } else {
        target
            .checked_add(fee)
            .ok_or_else(|| Error::CreateTransaction("transaction value overflow".to_string()))?
    };

    let mut selected = Vec::new();
    let mut accumulated: u64 = 0;

    for utxo in candidates {
        accumulated = accumulated
            .checked_add(utxo.amount)
            .ok_or_else(|| Error::CreateTransaction("input value overflow".to_string()))?;
        selected.push(utxo.clone());

        if accumulated >= required {
            return Ok((selected, accumulated));
        }
    }

    Err(Error::InsufficientFunds {
        available: accumulated,
        required,
    })
}

/// Assemble the output list for a planned spend: the change output first
/// when there is a positive leftover, then every destination in the
/// caller-supplied order.
///
/// When `deduct_fee` is set the fee is split evenly across destinations
/// (integer truncation; the residual minor units are absorbed by the fee,
/// not redistributed).
pub fn build_outputs(
    input_value: u64,
    destinations: &[(String, u64)],
    change_address: &str,
    fee: u64,
    deduct_fee: bool,
) -> Result<Vec<(String, u64)>> {
    if destinations.is_empty() {
        return Err(Error::CreateTransaction(
            "transaction has no destinations".to_string(),
        ));
    }

    let target: u64 = destinations.iter().map(|(_, amount)| amount).sum();
    let leftover = if deduct_fee {
        i128::from(input_value) - i128::from(target)
    } else {
        i128::from(input_value) - i128::from(target) - i128::from(fee)
    };

    let mut outputs = Vec::with_capacity(destinations.len() + 1);
    // a zero or negative leftover produces no change output
    if leftover > 0 {
        outputs.push((change_address.to_string(), leftover as u64));
    }

    let deducted = if deduct_fee {
        fee / destinations.len() as u64
    } else {
        0
    };
    for (address, amount) in destinations {
        let amount = amount.checked_sub(deducted).ok_or_else(|| {
            Error::CreateTransaction(format!(
                "fee share {} exceeds the amount sent to {}",
                deducted, address
            ))
        })?;
        outputs.push((address.clone(), amount));
    }

    Ok(outputs)
}

/// Plan a full transaction: selection plus output assembly.
pub fn plan(
    candidates: &[Utxo],
    destinations: &[(String, u64)],
    change_address: &str,
    fee: u64,
    deduct_fee: bool,
) -> Result<TransactionInfo> {
    let target: u64 = destinations.iter().map(|(_, amount)| amount).sum();
    let (inputs, input_value) = select_utxos(candidates, target, fee, deduct_fee)?;
    let outputs = build_outputs(input_value, destinations, change_address, fee, deduct_fee)?;

    Ok(TransactionInfo {
        inputs,
        outputs,
        input_value,
        fee,
    })
}
