//! Per-account completion signals
//!
//! Every account discovered in a cycle gets a [`Completion`] handle that
//! travels with it through the pipeline. Whatever stage finishes with the
//! account resolves the handle; the cycle driver waits on all of them through
//! a single join-all barrier owned by [`CompletionSet`].
//!
//! # Exactly-once resolution
//!
//! `Completion::resolve` consumes the handle, so an account cannot be resolved
//! twice. A handle dropped without being resolved (an aborted stage, an early
//! return, a panic) resolves itself as [`AccountOutcome::Failed`], so the
//! barrier can never hang on a forgotten account.

use futures::future::join_all;
use tokio::sync::oneshot;

use crate::types::{Address, Amount};

/// Terminal state of one account for one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountOutcome {
    /// Balance below threshold; nothing to do this cycle
    Ineligible,

    /// Transfer confirmed and ledger updated
    Paid {
        /// Total amount sent to the account this cycle
        amount: Amount,
    },

    /// Transfer failed; balance untouched and retried next cycle
    Unpaid,

    /// Transfer confirmed but the ledger update failed
    LedgerFailed,

    /// The account could not be processed (store error, aborted stage)
    Failed,
}

impl AccountOutcome {
    /// Combine the outcomes of several batches carrying the same account
    ///
    /// A ledger failure dominates everything, then successful payments
    /// accumulate, then an unpaid batch.
    pub fn merge(self, other: AccountOutcome) -> AccountOutcome {
        use AccountOutcome::*;
        match (self, other) {
            (LedgerFailed, _) | (_, LedgerFailed) => LedgerFailed,
            (Paid { amount: a }, Paid { amount: b }) => Paid { amount: a + b },
            (Paid { amount }, _) | (_, Paid { amount }) => Paid { amount },
            (Unpaid, _) | (_, Unpaid) => Unpaid,
            (Failed, _) | (_, Failed) => Failed,
            (Ineligible, Ineligible) => Ineligible,
        }
    }
}

/// Handle that must be resolved once the account reaches a terminal state
#[derive(Debug)]
pub struct Completion {
    address: Address,
    sender: Option<oneshot::Sender<AccountOutcome>>,
}

impl Completion {
    /// Account this handle belongs to
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Resolve the account with its terminal outcome
    pub fn resolve(mut self, outcome: AccountOutcome) {
        if let Some(sender) = self.sender.take() {
            // The receiver only disappears if the cycle itself was dropped
            let _ = sender.send(outcome);
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(AccountOutcome::Failed);
        }
    }
}

/// All completion signals of one cycle
#[derive(Debug, Default)]
pub struct CompletionSet {
    pending: Vec<(Address, oneshot::Receiver<AccountOutcome>)>,
}

impl CompletionSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account and return its completion handle
    pub fn register(&mut self, address: impl Into<Address>) -> Completion {
        let address = address.into();
        let (sender, receiver) = oneshot::channel();
        self.pending.push((address.clone(), receiver));
        Completion {
            address,
            sender: Some(sender),
        }
    }

    /// Number of registered accounts
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Wait until every registered account has resolved
    ///
    /// Returns outcomes in registration order.
    pub async fn join_all(self) -> Vec<(Address, AccountOutcome)> {
        join_all(self.pending.into_iter().map(|(address, receiver)| async move {
            let outcome = receiver.await.unwrap_or(AccountOutcome::Failed);
            (address, outcome)
        }))
        .await
    }
}
