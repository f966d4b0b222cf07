//! Cycle scheduling and pipeline orchestration

use std::sync::Arc;

use log::{debug, error, info};

use super::report::CycleReport;
use crate::config::PaymentsConfig;
use crate::core::{
    AccountEnumerator, BalanceFetcher, BatchBuilder, CompletionSet, FeePolicy, LedgerStore,
    PayoutFilter, SettlementExecutor, TransferService, ALERT_TARGET,
};
use crate::types::PayoutError;

/// Runs payout cycles against one store and one transfer service
///
/// Stages run in order within a cycle; only settlement fans out. Cycles never
/// overlap: the next one is scheduled `interval` after the previous one ends,
/// whatever its outcome.
#[derive(Clone)]
pub struct CycleDriver {
    store: Arc<dyn LedgerStore>,
    executor: SettlementExecutor,
    config: PaymentsConfig,
}

impl CycleDriver {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        transfer: Arc<dyn TransferService>,
        config: PaymentsConfig,
    ) -> Self {
        let executor = SettlementExecutor::new(Arc::clone(&store), transfer, &config);
        Self {
            store,
            executor,
            config,
        }
    }

    pub fn config(&self) -> &PaymentsConfig {
        &self.config
    }

    /// Run a single payout cycle to completion
    ///
    /// Returns once every discovered account has resolved. A failed balance
    /// read aborts the cycle with no store mutation.
    pub async fn run_cycle(&self) -> Result<CycleReport, PayoutError> {
        let config = &self.config;
        let store = self.store.as_ref();
        let fees = FeePolicy::from_config(config);
        let filter = PayoutFilter::new(config.denomination, &fees);
        let fetcher = BalanceFetcher::new(store, config.min_payment);

        let mut completions = CompletionSet::new();
        let discovery = AccountEnumerator::new(store, config.max_addresses)
            .discover(&mut completions)
            .await;
        let scan_aborted = discovery.aborted.is_some();
        debug!("Discovered {} account(s)", discovery.account_count());

        let mut eligible = Vec::new();
        let mut fetch_error = None;
        for page in discovery.pages {
            match fetcher.fetch(page).await {
                Ok(accounts) => eligible.extend(filter.apply(accounts)),
                Err(e) => {
                    fetch_error = Some(e);
                    break;
                }
            }
        }

        if let Some(e) = fetch_error {
            // Unfetched pages are already gone; collected payouts resolve Failed on drop
            drop(eligible);
            let outcomes = completions.join_all().await;
            let mut report = CycleReport::from_outcomes(&outcomes);
            report.scan_aborted = scan_aborted;
            report.log();
            return Err(PayoutError::store_unavailable("balance fetch", e));
        }

        if eligible.is_empty() {
            info!("No balances reached the minimum payment threshold");
        }

        let (candidates, handles): (Vec<_>, Vec<_>) = eligible
            .into_iter()
            .map(|payout| (payout.candidate, payout.completion))
            .unzip();

        let plan = BatchBuilder::new(config.max_transaction_amount, config.cap_overflow, fees)
            .build(candidates);
        for deferral in &plan.deferred {
            info!(
                "Deferring {} of worker {} to a later cycle (transaction cap)",
                deferral.amount, deferral.address
            );
        }
        let amount_deferred = plan.total_deferred();
        debug!(
            "Built {} batch(es) totalling {}",
            plan.batches.len(),
            plan.total_amount()
        );

        let summary = self.executor.execute(plan.batches, handles).await;
        let outcomes = completions.join_all().await;

        let mut report = CycleReport::from_outcomes(&outcomes).with_settlement(&summary, amount_deferred);
        report.scan_aborted = scan_aborted;
        report.log();
        Ok(report)
    }

    /// Run one cycle on its own task, converting a panic into an error
    pub async fn run_once(&self) -> Result<CycleReport, PayoutError> {
        let driver = self.clone();
        match tokio::spawn(async move { driver.run_cycle().await }).await {
            Ok(result) => result,
            Err(e) => Err(PayoutError::Runtime {
                message: format!("payout cycle panicked: {}", e),
            }),
        }
    }

    /// Run cycles back to back, `interval` apart
    ///
    /// Cycle errors are logged and the next cycle is scheduled regardless.
    /// Stops after `limit` cycles if given, or on the first ledger failure or
    /// unknown transfer outcome when `halt_on_ledger_failure` is set.
    pub async fn run_cycles(&self, limit: Option<usize>) -> Result<(), PayoutError> {
        let mut cycles = 0;

        loop {
            match self.run_once().await {
                Ok(report) if report.needs_reconciliation() > 0 && self.config.halt_on_ledger_failure => {
                    error!(
                        target: ALERT_TARGET,
                        "Halting payouts after {} ledger failure(s) and {} unknown transfer outcome(s); reconcile the ledger before restarting",
                        report.ledger_failures,
                        report.transfers_unknown
                    );
                    return Err(PayoutError::Halted {
                        count: report.needs_reconciliation(),
                    });
                }
                Ok(_) => {}
                Err(e) => error!("Payout cycle failed: {}", e),
            }

            cycles += 1;
            if limit.is_some_and(|limit| cycles >= limit) {
                return Ok(());
            }

            debug!("Next payout cycle in {}s", self.config.interval_secs);
            tokio::time::sleep(self.config.interval()).await;
        }
    }

    /// Run cycles until the process is stopped
    pub async fn run_forever(&self) -> Result<(), PayoutError> {
        self.run_cycles(None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{MemoryStore, MockTransfer};
    use crate::types::TransferError;

    fn config() -> PaymentsConfig {
        PaymentsConfig {
            min_payment: 100,
            denomination: 10,
            transfer_fee: 10,
            max_addresses: 2,
            max_concurrent_transfers: 2,
            interval_secs: 0,
            ..PaymentsConfig::default()
        }
    }

    fn driver(store: &Arc<MemoryStore>, transfer: &Arc<MockTransfer>, config: PaymentsConfig) -> CycleDriver {
        CycleDriver::new(store.clone(), transfer.clone(), config)
    }

    #[tokio::test]
    async fn test_cycle_pays_eligible_accounts() {
        let store = Arc::new(MemoryStore::new());
        let transfer = Arc::new(MockTransfer::new());
        store.insert_account("w1", 155, None);
        store.insert_account("w2", 99, None);
        store.insert_account("w3", 300, Some(500));

        let report = driver(&store, &transfer, config()).run_cycle().await.unwrap();

        assert_eq!(report.accounts, 3);
        assert_eq!(report.paid, 1);
        assert_eq!(report.ineligible, 2);
        assert_eq!(report.amount_paid, 150);
        assert_eq!(store.balance("w1"), Some(5));
        assert_eq!(transfer.call_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_cycle() {
        let store = Arc::new(MemoryStore::new());
        let transfer = Arc::new(MockTransfer::new());
        store.insert_account("w1", 500, None);
        store.fail_fetch(true);

        let result = driver(&store, &transfer, config()).run_cycle().await;

        assert!(matches!(result, Err(PayoutError::StoreUnavailable { .. })));
        assert_eq!(transfer.call_count(), 0);
        assert_eq!(store.settlement_calls(), 0);
        assert_eq!(store.balance("w1"), Some(500));
    }

    #[tokio::test]
    async fn test_failed_cycle_schedules_next() {
        let store = Arc::new(MemoryStore::new());
        let transfer = Arc::new(MockTransfer::new());
        store.insert_account("w1", 500, None);
        store.fail_fetch(true);

        let result = driver(&store, &transfer, config()).run_cycles(Some(2)).await;

        assert!(result.is_ok());
        assert_eq!(store.fetch_calls(), 2);
    }

    #[tokio::test]
    async fn test_halt_on_ledger_failure() {
        let store = Arc::new(MemoryStore::new());
        let transfer = Arc::new(MockTransfer::new());
        store.insert_account("w1", 500, None);
        store.fail_settlement(true);

        let config = PaymentsConfig {
            halt_on_ledger_failure: true,
            ..config()
        };
        let result = driver(&store, &transfer, config).run_cycles(Some(3)).await;

        assert_eq!(result, Err(PayoutError::Halted { count: 1 }));
        assert_eq!(transfer.call_count(), 1);
    }

    #[tokio::test]
    async fn test_halt_on_unknown_transfer_outcome() {
        let store = Arc::new(MemoryStore::new());
        let transfer = Arc::new(MockTransfer::new());
        store.insert_account("w1", 500, None);
        transfer.push_failure(TransferError::malformed("missing field tx_hash"));

        let config = PaymentsConfig {
            halt_on_ledger_failure: true,
            ..config()
        };
        let result = driver(&store, &transfer, config).run_cycles(Some(3)).await;

        assert_eq!(result, Err(PayoutError::Halted { count: 1 }));
        // The possibly-sent balance is not paid a second time
        assert_eq!(transfer.call_count(), 1);
        assert_eq!(store.balance("w1"), Some(500));
    }

    #[tokio::test]
    async fn test_unknown_outcome_is_reported() {
        let store = Arc::new(MemoryStore::new());
        let transfer = Arc::new(MockTransfer::new());
        store.insert_account("w1", 500, None);
        transfer.push_failure(TransferError::interrupted("connection reset"));

        let report = driver(&store, &transfer, config()).run_cycle().await.unwrap();

        assert_eq!(report.transfers_unknown, 1);
        assert_eq!(report.batches_failed, 1);
        assert_eq!(report.unpaid, 1);
    }

    #[tokio::test]
    async fn test_corrupt_paid_counter_is_never_transferred() {
        let store = Arc::new(MemoryStore::new());
        let transfer = Arc::new(MockTransfer::new());
        store.insert_account("w1", 500, None);
        store.insert_account("w2", 300, None);
        store.corrupt_paid("w1", "not-a-number");

        let report = driver(&store, &transfer, config()).run_cycle().await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.paid, 1);
        assert_eq!(transfer.call_count(), 1);
        assert_eq!(store.balance("w1"), Some(500));
        assert_eq!(store.balance("w2"), Some(0));
    }

    #[tokio::test]
    async fn test_ledger_failure_without_halt_keeps_running() {
        let store = Arc::new(MemoryStore::new());
        let transfer = Arc::new(MockTransfer::new());
        store.insert_account("w1", 500, None);
        store.fail_settlement(true);

        let result = driver(&store, &transfer, config()).run_cycles(Some(2)).await;

        assert!(result.is_ok());
        // Balance was never debited, so the second cycle pays again
        assert_eq!(transfer.call_count(), 2);
    }
}
