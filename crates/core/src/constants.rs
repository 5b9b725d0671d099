//! Canonical constants shared by the chain, cache and staking layers.

/// SS58 address format of the generic Substrate / Bittensor network.
pub const SS58_FORMAT: u8 = 42;

/// Textual length of a prefix-42 SS58 address for a 32-byte account id.
pub const SS58_ADDRESS_LEN: usize = 48;

/// Pallet that owns the dividend storage map.
pub const SUBTENSOR_MODULE: &str = "SubtensorModule";

/// Storage double map `(netuid, hotkey) -> dividend`.
pub const TAO_DIVIDENDS_PER_SUBNET: &str = "TaoDividendsPerSubnet";

/// Cache key for the whole dividend corpus.
pub const CACHE_KEY_ALL: &str = "dividends:all";

/// Number of rao in one TAO.
pub const RAO_PER_TAO: u64 = 1_000_000_000;

/// Default stake moved per sentiment point, in TAO.
pub const DEFAULT_TAO_PER_SENTIMENT_POINT: f64 = 0.01;

/// Lower bound of a sentiment score.
pub const MIN_SENTIMENT: f64 = -100.0;

/// Upper bound of a sentiment score.
pub const MAX_SENTIMENT: f64 = 100.0;
