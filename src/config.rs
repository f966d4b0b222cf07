//! Configuration for the payout processor
//!
//! Settings are read from a JSON file whose `payments` section mirrors the
//! pool's payment configuration. Every field has a default, so a partial file
//! is valid, but unknown keys are rejected: a misspelled cap must not silently
//! become "unlimited". Zero or negative values that would break the pipeline fall back
//! to their defaults with a warning instead of failing startup.
//!
//! ```json
//! {
//!   "payments": {
//!     "coin": "xmr",
//!     "min_payment": 10000000000,
//!     "denomination": 100000000,
//!     "transfer_fee": 5000000000,
//!     "max_transaction_amount": 1000000000000,
//!     "interval_secs": 600
//!   },
//!   "redis": { "url": "redis://127.0.0.1:6379" },
//!   "wallet": { "url": "http://127.0.0.1:8082" }
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use log::warn;
use serde::Deserialize;

use crate::types::{Amount, ConfigError};

/// What happens to the part of a payout that does not fit in the current batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapOverflow {
    /// Leave the remainder in the account balance for a later cycle.
    /// Each account appears in at most one batch per cycle.
    #[default]
    Defer,

    /// Spill the remainder into the following batches of the same cycle.
    Carry,
}

/// How the miner-paid fee share is charged when an account's payout spans
/// several destinations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinerFeeShare {
    /// Charged once per account per cycle
    #[default]
    PerAccount,

    /// Charged for every destination the account receives
    PerDestination,
}

/// Payment policy and scheduling settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PaymentsConfig {
    /// Namespace prefix for every store key
    pub coin: String,

    /// Default minimum payout for accounts without their own level
    pub min_payment: Amount,

    /// Payout granularity; balances are rounded down to a multiple of this
    pub denomination: Amount,

    /// Flat fee per transfer when dynamic fees are off
    pub transfer_fee: Amount,

    /// Charge `transfer_fee_per_payee` per destination instead of the flat fee
    pub use_dynamic_transfer_fee: bool,

    /// Per-destination fee under dynamic fees
    pub transfer_fee_per_payee: Amount,

    /// Deduct the per-destination fee from the payee's payout
    pub miner_pays_fee: bool,

    /// Upper bound on a batch's destination total; `None` or 0 means unlimited
    pub max_transaction_amount: Option<Amount>,

    /// Account scan page size
    pub max_addresses: usize,

    /// Privacy parameter forwarded with every transfer
    pub mixin: u64,

    /// Pause between the end of one cycle and the start of the next
    pub interval_secs: u64,

    /// Treatment of payouts that exceed the remaining batch capacity
    pub cap_overflow: CapOverflow,

    /// Treatment of the miner fee share for split payouts
    pub miner_fee_share: MinerFeeShare,

    /// Maximum transfer calls in flight at once
    pub max_concurrent_transfers: usize,

    /// Bound on a single transfer call; `None` or 0 waits forever
    pub transfer_timeout_secs: Option<u64>,

    /// Stop scheduling cycles after a ledger update fails post-transfer
    pub halt_on_ledger_failure: bool,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            coin: "pool".to_string(),
            min_payment: 10_000_000_000,
            denomination: 100_000_000,
            transfer_fee: 5_000_000_000,
            use_dynamic_transfer_fee: false,
            transfer_fee_per_payee: 500_000_000,
            miner_pays_fee: false,
            max_transaction_amount: None,
            max_addresses: 50,
            mixin: 3,
            interval_secs: 600,
            cap_overflow: CapOverflow::Defer,
            miner_fee_share: MinerFeeShare::PerAccount,
            max_concurrent_transfers: num_cpus::get(),
            transfer_timeout_secs: Some(60),
            halt_on_ledger_failure: false,
        }
    }
}

impl PaymentsConfig {
    /// Replace values the pipeline cannot work with by their defaults
    ///
    /// Prints a warning for every corrected field.
    pub fn validated(self) -> Self {
        let default = Self::default();

        let denomination = positive_or_default("denomination", self.denomination, default.denomination);
        let min_payment = if self.min_payment < 0 {
            warn!(
                "Invalid min_payment ({}), using default ({})",
                self.min_payment, default.min_payment
            );
            default.min_payment
        } else {
            self.min_payment
        };

        let max_addresses = if self.max_addresses == 0 {
            warn!(
                "Invalid max_addresses ({}), using default ({})",
                self.max_addresses, default.max_addresses
            );
            default.max_addresses
        } else {
            self.max_addresses
        };

        let max_concurrent_transfers = if self.max_concurrent_transfers == 0 {
            warn!(
                "Invalid max_concurrent_transfers ({}), using default ({})",
                self.max_concurrent_transfers, default.max_concurrent_transfers
            );
            default.max_concurrent_transfers
        } else {
            self.max_concurrent_transfers
        };

        // 0 (or less) means unlimited, same as absent
        let max_transaction_amount = self.max_transaction_amount.filter(|cap| *cap > 0);
        let transfer_timeout_secs = self.transfer_timeout_secs.filter(|secs| *secs > 0);

        let transfer_fee = non_negative_or_default("transfer_fee", self.transfer_fee, default.transfer_fee);
        let transfer_fee_per_payee = non_negative_or_default(
            "transfer_fee_per_payee",
            self.transfer_fee_per_payee,
            default.transfer_fee_per_payee,
        );

        Self {
            denomination,
            min_payment,
            max_addresses,
            max_concurrent_transfers,
            max_transaction_amount,
            transfer_timeout_secs,
            transfer_fee,
            transfer_fee_per_payee,
            ..self
        }
    }

    /// Pause between cycles
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Bound on a single transfer call, if any
    pub fn transfer_timeout(&self) -> Option<Duration> {
        self.transfer_timeout_secs.map(Duration::from_secs)
    }
}

fn positive_or_default(field: &str, value: Amount, default: Amount) -> Amount {
    if value <= 0 {
        warn!("Invalid {} ({}), using default ({})", field, value, default);
        default
    } else {
        value
    }
}

fn non_negative_or_default(field: &str, value: Amount, default: Amount) -> Amount {
    if value < 0 {
        warn!("Invalid {} ({}), using default ({})", field, value, default);
        default
    } else {
        value
    }
}

/// Ledger store connection settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RedisConfig {
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

/// Transfer service connection settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WalletConfig {
    pub url: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8082".to_string(),
        }
    }
}

/// Complete process configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub payments: PaymentsConfig,
    pub redis: RedisConfig,
    pub wallet: WalletConfig,
}

impl Settings {
    /// Load and validate settings from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&raw)
    }

    /// Parse and validate settings from a JSON string
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_json::from_str(raw)?;
        Ok(Self {
            payments: settings.payments.validated(),
            ..settings
        })
    }
}
