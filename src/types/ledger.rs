//! Store-facing record types
//!
//! These types describe what the payout pipeline asks of the ledger store
//! without committing to a wire protocol. Store adapters translate them into
//! concrete commands.

use super::account::{Address, Amount};

/// One page of an account scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor for the next page; `0` means the scan has wrapped and is complete
    pub cursor: u64,

    /// Account identifiers on this page (may repeat identifiers from
    /// earlier pages)
    pub addresses: Vec<Address>,
}

/// Raw balance fields exactly as stored
///
/// Parsing and defaulting belong to the balance fetcher, not to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawBalance {
    pub balance: Option<String>,
    pub min_payout_level: Option<String>,
    /// Cumulative paid counter, read so a corrupt value is caught before a transfer
    pub paid: Option<String>,
}

/// A single mutation inside a settlement write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerOp {
    /// Atomic increment of the account's `balance` field (negative to debit)
    IncrementBalance { address: Address, delta: Amount },

    /// Atomic increment of the account's cumulative `paid` field
    IncrementPaid { address: Address, delta: Amount },

    /// Append to the pool-wide payment history
    AppendGlobalHistory { score: i64, entry: String },

    /// Append to one account's payment history
    AppendAccountHistory {
        address: Address,
        score: i64,
        entry: String,
    },
}

/// Grouped mutations for one settled batch
///
/// Stores apply the whole write as one unit that no reader sees half-done.
/// A store that cannot roll back a failing operation (Redis `MULTI`/`EXEC`)
/// may still leave the others applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettlementWrite {
    pub ops: Vec<LedgerOp>,
}

impl SettlementWrite {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }
}
