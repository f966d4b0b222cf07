//! Per-cycle summary

use log::{info, warn};

use crate::core::{AccountOutcome, SettlementSummary};
use crate::types::{Address, Amount};

/// What one payout cycle did, assembled after every account has resolved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Accounts discovered by the scan
    pub accounts: usize,
    pub paid: usize,
    pub ineligible: usize,
    pub unpaid: usize,
    pub ledger_failed: usize,
    pub failed: usize,

    /// Total sent to payees
    pub amount_paid: Amount,
    /// Total left in balances by the transaction cap
    pub amount_deferred: Amount,

    pub batches_settled: usize,
    pub batches_failed: usize,
    pub ledger_failures: usize,
    /// Failed batches whose transfer may still have gone through
    pub transfers_unknown: usize,

    /// The account scan stopped early; unscanned accounts wait for the next cycle
    pub scan_aborted: bool,
}

impl CycleReport {
    /// Tally resolved account outcomes
    pub fn from_outcomes(outcomes: &[(Address, AccountOutcome)]) -> Self {
        let mut report = Self {
            accounts: outcomes.len(),
            ..Self::default()
        };

        for (_, outcome) in outcomes {
            match outcome {
                AccountOutcome::Paid { amount } => {
                    report.paid += 1;
                    report.amount_paid += amount;
                }
                AccountOutcome::Ineligible => report.ineligible += 1,
                AccountOutcome::Unpaid => report.unpaid += 1,
                AccountOutcome::LedgerFailed => report.ledger_failed += 1,
                AccountOutcome::Failed => report.failed += 1,
            }
        }

        report
    }

    /// Add batch-level counts from the settlement stage
    pub fn with_settlement(mut self, summary: &SettlementSummary, amount_deferred: Amount) -> Self {
        self.batches_settled = summary.batches_settled();
        self.batches_failed = summary.batches_failed();
        self.ledger_failures = summary.ledger_failures();
        self.transfers_unknown = summary.unknown_outcomes();
        self.amount_deferred = amount_deferred;
        self
    }

    /// Batches that need an operator before funds can safely move again
    pub fn needs_reconciliation(&self) -> usize {
        self.ledger_failures + self.transfers_unknown
    }

    pub fn log(&self) {
        info!(
            "Payout cycle done: {} account(s), {} paid ({}), {} ineligible, {} unpaid, {} failed, {} batch(es) sent, {} batch(es) failed, {} ledger failure(s)",
            self.accounts,
            self.paid,
            self.amount_paid,
            self.ineligible,
            self.unpaid,
            self.failed,
            self.batches_settled,
            self.batches_failed,
            self.ledger_failures
        );
        if self.transfers_unknown > 0 {
            warn!(
                "{} batch(es) failed with an unknown outcome and will be paid again next cycle",
                self.transfers_unknown
            );
        }
        if self.amount_deferred > 0 {
            info!("{} left in balances by the transaction cap", self.amount_deferred);
        }
        if self.scan_aborted {
            warn!("Account scan was incomplete; remaining accounts wait for the next cycle");
        }
    }
}
