//! Account-related types for the payout processor
//!
//! This module defines the account snapshot read from the store and the
//! per-cycle payout candidate derived from it.

/// Account identifier
///
/// The last `:`-separated segment of the account's store key, typically a
/// wallet address.
pub type Address = String;

/// Amount in integer minor units of the paid currency
pub type Amount = i64;

/// Account state as read at the start of a settlement cycle
///
/// The store owns `balance`; only upstream credit logic and the settlement
/// executor mutate it. This snapshot is never written back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Unique account identifier
    pub address: Address,

    /// Unpaid balance in minor units
    ///
    /// Missing or non-numeric values in the store read as zero.
    pub balance: Amount,

    /// Minimum payout threshold for this account
    ///
    /// Falls back to the configured default when the account has none.
    pub min_payout_level: Amount,
}

impl Account {
    /// Create an account snapshot
    pub fn new(address: impl Into<Address>, balance: Amount, min_payout_level: Amount) -> Self {
        Account {
            address: address.into(),
            balance,
            min_payout_level,
        }
    }
}

/// Payout decision for one account in one cycle
///
/// Pure function of an [`Account`] and the payout configuration; discarded at
/// the end of the cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutCandidate {
    /// Account the payout belongs to
    pub address: Address,

    /// Amount to send: the balance rounded down to the denomination, minus
    /// `fee_share`
    pub payout: Amount,

    /// Miner-paid fee share deducted from the rounded balance (0 when the
    /// pool pays transfer fees)
    pub fee_share: Amount,

    /// Whether the payout clears both zero and the account's minimum level
    pub eligible: bool,
}

impl PayoutCandidate {
    /// Total amount this payout removes from the account balance
    pub fn balance_debit(&self) -> Amount {
        self.payout + self.fee_share
    }
}
