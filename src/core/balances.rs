//! Bulk balance reads for a page of accounts
//!
//! One store round trip per page fetches `balance`, `minPayoutLevel` and
//! `paid`. Raw values are parsed here so every store adapter gets the same
//! defaulting rules.
//!
//! An account whose stored `paid` counter is not an integer is resolved as
//! failed and left out of the cycle: incrementing it would fail inside the
//! settlement write after the transfer had already gone out.

use log::{debug, warn};

use super::completion::{AccountOutcome, Completion};
use super::traits::LedgerStore;
use crate::types::{Account, Amount, RawBalance, StoreError};

/// An account snapshot still waiting for its terminal outcome
#[derive(Debug)]
pub struct PendingAccount {
    pub account: Account,
    pub completion: Completion,
}

/// Reads balances and payout thresholds for discovered accounts
pub struct BalanceFetcher<'a> {
    store: &'a dyn LedgerStore,
    default_min_payout: Amount,
}

impl<'a> BalanceFetcher<'a> {
    pub fn new(store: &'a dyn LedgerStore, default_min_payout: Amount) -> Self {
        Self {
            store,
            default_min_payout,
        }
    }

    /// Fetch one page of accounts in a single bulk read
    ///
    /// On store error every account of the page is resolved as failed and
    /// nothing is mutated.
    pub async fn fetch(&self, page: Vec<Completion>) -> Result<Vec<PendingAccount>, StoreError> {
        let addresses: Vec<String> = page.iter().map(|c| c.address().to_string()).collect();

        let raw = match self.store.fetch_balances(&addresses).await {
            Ok(raw) if raw.len() == page.len() => raw,
            Ok(raw) => {
                let error = StoreError::command(
                    "fetch_balances",
                    format!("expected {} replies, got {}", page.len(), raw.len()),
                );
                fail_all(page);
                return Err(error);
            }
            Err(e) => {
                fail_all(page);
                return Err(e);
            }
        };

        Ok(page
            .into_iter()
            .zip(raw)
            .filter_map(|(completion, raw)| {
                if !paid_is_valid(raw.paid.as_deref()) {
                    warn!(
                        "Skipping worker {}: stored paid value {:?} is not an integer",
                        completion.address(),
                        raw.paid.as_deref().unwrap_or_default()
                    );
                    completion.resolve(AccountOutcome::Failed);
                    return None;
                }

                let account = self.parse(completion.address(), &raw);
                debug!(
                    "Using payout level {} for worker {} (default: {})",
                    account.min_payout_level, account.address, self.default_min_payout
                );
                Some(PendingAccount {
                    account,
                    completion,
                })
            })
            .collect())
    }

    /// Turn raw store fields into an account snapshot
    ///
    /// A missing or non-numeric balance reads as 0. A missing, non-numeric or
    /// non-positive payout level falls back to the configured default.
    pub fn parse(&self, address: &str, raw: &RawBalance) -> Account {
        let balance = parse_amount(raw.balance.as_deref()).unwrap_or(0);
        let min_payout_level = parse_amount(raw.min_payout_level.as_deref())
            .filter(|level| *level > 0)
            .unwrap_or(self.default_min_payout);
        Account::new(address, balance, min_payout_level)
    }
}

fn parse_amount(value: Option<&str>) -> Option<Amount> {
    value.and_then(|v| v.trim().parse::<Amount>().ok())
}

/// A missing counter is fine, the first increment creates it
fn paid_is_valid(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.parse::<Amount>().is_ok())
}

fn fail_all(page: Vec<Completion>) {
    for completion in page {
        completion.resolve(AccountOutcome::Failed);
    }
}
