//! Wallet configuration parameters.

use std::time::Duration;

use crate::constants;
use crate::types::FeeEstimateMode;

/// Initialization parameters for a wallet instance.
#[derive(Clone)]
pub struct Params {
    /// Name of the network this wallet operates on. Scopes every persisted
    /// row, so one physical database can host several networks. Must be
    /// non-empty and ASCII alphanumeric (the name is embedded in store
    /// keys).
    pub network: String,
    /// Timeout for JSON-RPC requests sent to the node.
    pub requests_timeout: Duration,
    /// Default confirmation window used when estimating fee rates.
    pub conf_target: u16,
    /// Default fee estimation mode.
    pub estimate_mode: FeeEstimateMode,
    /// Interval between two chain monitor poll ticks.
    pub poll_interval: Duration,
    /// Multiplier applied to the estimated fee when speeding up a
    /// transaction.
    pub speed_up_fee_factor: u64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            network: "bitcoin".to_string(),
            requests_timeout: Duration::from_millis(constants::DEFAULT_REQUESTS_TIMEOUT_MILLIS),
            conf_target: constants::DEFAULT_CONF_TARGET,
            estimate_mode: FeeEstimateMode::Conservative,
            poll_interval: Duration::from_millis(constants::DEFAULT_POLL_INTERVAL_MILLIS),
            speed_up_fee_factor: constants::SPEED_UP_FEE_FACTOR,
        }
    }
}
