//! Settlement batch types
//!
//! A batch groups several destinations under one transfer call. It is built
//! once by the batch builder, consumed once by the settlement executor and
//! then discarded.

use super::account::{Address, Amount};

/// One payee within a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// Receiving account
    pub address: Address,

    /// Amount sent to the account by this transfer
    pub amount: Amount,

    /// Miner-paid fee share charged to the account for this destination
    ///
    /// Debited from the balance together with `amount`, but never credited
    /// to `paid`.
    pub fee_share: Amount,
}

impl Destination {
    /// Amount this destination removes from the account balance
    pub fn balance_debit(&self) -> Amount {
        self.amount + self.fee_share
    }
}

/// A sealed settlement transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Payees in assignment order
    pub destinations: Vec<Destination>,

    /// Sum of all destination amounts
    pub amount: Amount,

    /// Transfer fee for this batch, fixed at seal time
    pub fee: Amount,
}

impl Batch {
    /// Number of payees in the batch
    pub fn destination_count(&self) -> usize {
        self.destinations.len()
    }

    /// Sum of all balance debits (amounts plus miner-paid fee shares)
    pub fn balance_debit(&self) -> Amount {
        self.destinations.iter().map(Destination::balance_debit).sum()
    }
}
