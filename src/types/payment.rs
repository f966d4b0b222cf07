//! Payment history records
//!
//! One record is written per settled batch to the global history and, per
//! destination, to the account's own history. Records are immutable once
//! written and ordered by `timestamp`.

use super::account::Amount;
use super::batch::{Batch, Destination};

/// History record for one settled batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRecord {
    /// Transaction hash with delimiters stripped
    pub tx_hash: String,

    /// Total amount sent by the batch
    pub amount: Amount,

    /// Transfer fee paid for the batch
    pub fee: Amount,

    /// Privacy parameter the transfer was sent with
    pub mixin: u64,

    /// Number of payees in the batch
    pub destination_count: usize,

    /// Unix seconds plus the per-cycle ordering offset
    pub timestamp: i64,
}

impl PaymentRecord {
    /// Create the record for a confirmed batch
    pub fn new(tx_hash: &str, batch: &Batch, mixin: u64, timestamp: i64) -> Self {
        PaymentRecord {
            tx_hash: strip_tx_hash(tx_hash),
            amount: batch.amount,
            fee: batch.fee,
            mixin,
            destination_count: batch.destination_count(),
            timestamp,
        }
    }

    /// Global history payload: `txHash:amount:fee:mixin:destinationCount`
    pub fn global_entry(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.tx_hash, self.amount, self.fee, self.mixin, self.destination_count
        )
    }

    /// Per-account history payload: `txHash:amount:fee:mixin`
    pub fn account_entry(&self, destination: &Destination) -> String {
        format!(
            "{}:{}:{}:{}",
            self.tx_hash, destination.amount, self.fee, self.mixin
        )
    }
}

/// Remove the `<`/`>` delimiters some wallets wrap transaction hashes in
pub fn strip_tx_hash(raw: &str) -> String {
    raw.chars().filter(|c| *c != '<' && *c != '>').collect()
}
