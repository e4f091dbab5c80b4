//! Constants shared across the crate.

/// Minor units in one whole coin.
pub const COIN: u64 = 100_000_000;

/// Fee rates are expressed in minor units per this many bytes.
pub const FEE_RATE_UNIT_BYTES: u64 = 1024;

/// Default confirmation window used when asking the node for a fee rate.
pub const DEFAULT_CONF_TARGET: u16 = 6;

/// Multiplier applied to the estimated fee of a speed-up transaction, so the
/// child's fee also amortizes the stuck ancestor's.
pub const SPEED_UP_FEE_FACTOR: u64 = 3;

/// Default interval between two chain monitor poll ticks, in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MILLIS: u64 = 5_000;

/// Default timeout for requests sent to the node, in milliseconds.
pub const DEFAULT_REQUESTS_TIMEOUT_MILLIS: u64 = 30_000;
