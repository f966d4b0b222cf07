//! Payout eligibility
//!
//! Pure computation: round the balance down to the denomination, deduct the
//! miner fee share, and keep only payouts that clear both zero and the
//! account's minimum payout level. Ineligible accounts need nothing more this
//! cycle, so their completion handles are resolved on the spot.

use log::debug;

use super::balances::PendingAccount;
use super::completion::{AccountOutcome, Completion};
use super::fee::FeePolicy;
use crate::types::{Account, Amount, PayoutCandidate};

/// An eligible payout still waiting for settlement
#[derive(Debug)]
pub struct EligiblePayout {
    pub candidate: PayoutCandidate,
    pub completion: Completion,
}

/// Round `balance` down to a multiple of `denomination`
///
/// The result never exceeds `balance`, including for negative balances.
pub fn round_to_denomination(balance: Amount, denomination: Amount) -> Amount {
    if denomination <= 1 {
        return balance;
    }
    balance - balance.rem_euclid(denomination)
}

/// Decides which accounts are owed a payout this cycle
#[derive(Debug, Clone, Copy)]
pub struct PayoutFilter {
    denomination: Amount,
    fee_share: Amount,
}

impl PayoutFilter {
    pub fn new(denomination: Amount, fees: &FeePolicy) -> Self {
        Self {
            denomination,
            fee_share: fees.miner_fee_share(),
        }
    }

    /// Evaluate one account
    ///
    /// Eligible iff `rounded − fee_share` is strictly greater than both 0 and
    /// the account's minimum payout level.
    pub fn evaluate(&self, account: &Account) -> PayoutCandidate {
        let payout = round_to_denomination(account.balance, self.denomination) - self.fee_share;
        PayoutCandidate {
            address: account.address.clone(),
            payout,
            fee_share: self.fee_share,
            eligible: payout > 0 && payout > account.min_payout_level,
        }
    }

    /// Split a fetched page into eligible payouts, resolving the rest
    pub fn apply(&self, accounts: Vec<PendingAccount>) -> Vec<EligiblePayout> {
        let mut eligible = Vec::new();

        for PendingAccount {
            account,
            completion,
        } in accounts
        {
            let candidate = self.evaluate(&account);
            if candidate.eligible {
                eligible.push(EligiblePayout {
                    candidate,
                    completion,
                });
            } else {
                debug!(
                    "Worker {} not eligible: payout {} vs level {}",
                    account.address, candidate.payout, account.min_payout_level
                );
                completion.resolve(AccountOutcome::Ineligible);
            }
        }

        eligible
    }
}
