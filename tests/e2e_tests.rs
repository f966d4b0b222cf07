//! End-to-end integration tests
//!
//! These tests run complete payout cycles through `CycleDriver` against the
//! in-memory ledger store and the scripted transfer service. Each test:
//! 1. Seeds account balances in a `MemoryStore`
//! 2. Scripts transfer responses on a `MockTransfer`
//! 3. Runs one or more cycles
//! 4. Checks balances, paid totals, payment history and the cycle report
//!
//! Covered:
//! - Happy path (single batch)
//! - Transaction cap, with the remainder deferred or carried
//! - Transfer failure (nothing mutated, paid next cycle)
//! - Ledger failure after a confirmed transfer
//! - Store failures during the scan
//! - Dynamic, miner-paid fees

#[cfg(test)]
mod tests {
    use pool_payouts::io::{MemoryStore, MockTransfer};
    use pool_payouts::{CapOverflow, CycleDriver, PaymentsConfig, TransferError};
    use rstest::rstest;
    use std::sync::Arc;

    struct Harness {
        store: Arc<MemoryStore>,
        transfer: Arc<MockTransfer>,
        driver: CycleDriver,
    }

    /// Build a driver over fresh doubles seeded with `(address, balance)` pairs
    fn harness(accounts: &[(&str, i64)], config: PaymentsConfig) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let transfer = Arc::new(MockTransfer::new());
        for (address, balance) in accounts {
            store.insert_account(address, *balance, None);
        }
        let driver = CycleDriver::new(store.clone(), transfer.clone(), config);
        Harness {
            store,
            transfer,
            driver,
        }
    }

    fn config() -> PaymentsConfig {
        PaymentsConfig {
            coin: "test".to_string(),
            min_payment: 100,
            denomination: 10,
            transfer_fee: 10,
            mixin: 3,
            max_addresses: 2,
            interval_secs: 0,
            max_concurrent_transfers: 2,
            ..PaymentsConfig::default()
        }
    }

    fn destinations(request: &pool_payouts::types::TransferRequest) -> Vec<(String, i64)> {
        request
            .destinations
            .iter()
            .map(|d| (d.address.clone(), d.amount))
            .collect()
    }

    #[tokio::test]
    async fn test_single_batch_pays_everyone() {
        let h = harness(&[("w1", 150), ("w2", 300)], config());
        h.transfer.push_success("<abc123>");

        let report = h.driver.run_cycle().await.unwrap();

        let requests = h.transfer.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            destinations(&requests[0]),
            vec![("w1".to_string(), 150), ("w2".to_string(), 300)]
        );
        assert_eq!(requests[0].fee, 10);
        assert_eq!(requests[0].mixin, 3);

        assert_eq!(h.store.balance("w1"), Some(0));
        assert_eq!(h.store.balance("w2"), Some(0));
        assert_eq!(h.store.paid("w1"), 150);
        assert_eq!(h.store.paid("w2"), 300);

        let global = h.store.global_history();
        assert_eq!(global.len(), 1);
        assert_eq!(global[0].1, "abc123:450:10:3:2");
        assert_eq!(h.store.account_history("w1")[0].1, "abc123:150:10:3");
        assert_eq!(h.store.account_history("w2")[0].1, "abc123:300:10:3");
        assert_eq!(h.store.account_history("w1")[0].0, global[0].0);

        assert_eq!(report.accounts, 2);
        assert_eq!(report.paid, 2);
        assert_eq!(report.amount_paid, 450);
        assert_eq!(report.batches_settled, 1);
    }

    #[tokio::test]
    async fn test_cap_defers_remainder_to_next_cycle() {
        let h = harness(
            &[("w1", 150), ("w2", 300)],
            PaymentsConfig {
                min_payment: 10,
                max_transaction_amount: Some(200),
                cap_overflow: CapOverflow::Defer,
                ..config()
            },
        );

        let report = h.driver.run_cycle().await.unwrap();

        let requests = h.transfer.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            destinations(&requests[0]),
            vec![("w1".to_string(), 150), ("w2".to_string(), 50)]
        );
        assert_eq!(h.store.balance("w1"), Some(0));
        assert_eq!(h.store.balance("w2"), Some(250));
        assert_eq!(report.amount_deferred, 250);
        assert_eq!(report.paid, 2);

        // The deferred remainder is paid by the following cycles
        h.driver.run_cycle().await.unwrap();
        h.driver.run_cycle().await.unwrap();
        assert_eq!(h.store.balance("w2"), Some(0));
        assert_eq!(h.store.paid("w2"), 300);
        assert!(h
            .transfer
            .requests()
            .iter()
            .all(|r| r.destinations.iter().map(|d| d.amount).sum::<i64>() <= 200));
    }

    #[tokio::test]
    async fn test_cap_carries_remainder_within_cycle() {
        let h = harness(
            &[("w1", 150), ("w2", 300)],
            PaymentsConfig {
                max_transaction_amount: Some(200),
                cap_overflow: CapOverflow::Carry,
                max_concurrent_transfers: 1,
                ..config()
            },
        );

        let report = h.driver.run_cycle().await.unwrap();

        let requests = h.transfer.requests();
        let batches: Vec<_> = requests.iter().map(destinations).collect();
        assert_eq!(
            batches,
            vec![
                vec![("w1".to_string(), 150), ("w2".to_string(), 50)],
                vec![("w2".to_string(), 200)],
                vec![("w2".to_string(), 50)],
            ]
        );
        assert_eq!(h.store.balance("w2"), Some(0));
        assert_eq!(h.store.paid("w2"), 300);
        assert_eq!(report.batches_settled, 3);
        assert_eq!(report.amount_paid, 450);

        // Each batch gets its own history timestamp
        let mut scores: Vec<i64> = h.store.global_history().iter().map(|(s, _)| *s).collect();
        scores.dedup();
        assert_eq!(scores.len(), 3);
    }

    #[tokio::test]
    async fn test_transfer_failure_mutates_nothing() {
        let h = harness(&[("w1", 150), ("w2", 300)], config());
        h.transfer.push_failure(TransferError::Rejected {
            code: -4,
            message: "not enough money".to_string(),
        });

        let report = h.driver.run_cycle().await.unwrap();

        assert_eq!(h.store.balance("w1"), Some(150));
        assert_eq!(h.store.balance("w2"), Some(300));
        assert_eq!(h.store.paid("w1"), 0);
        assert!(h.store.global_history().is_empty());
        assert_eq!(h.store.settlement_calls(), 0);
        assert_eq!(report.unpaid, 2);
        assert_eq!(report.batches_failed, 1);
    }

    #[tokio::test]
    async fn test_transfer_failure_is_paid_next_cycle() {
        let h = harness(&[("w1", 150), ("w2", 300)], config());
        h.transfer.push_failure(TransferError::rpc("connection reset"));

        h.driver.run_cycles(Some(2)).await.unwrap();

        assert_eq!(h.transfer.call_count(), 2);
        assert_eq!(h.store.balance("w1"), Some(0));
        assert_eq!(h.store.balance("w2"), Some(0));
        assert_eq!(h.store.global_history().len(), 1);
    }

    #[tokio::test]
    async fn test_ledger_failure_after_transfer_is_not_retried() {
        let h = harness(&[("w1", 150), ("w2", 300)], config());
        h.store.fail_settlement(true);

        let report = h.driver.run_cycle().await.unwrap();

        assert_eq!(h.transfer.call_count(), 1);
        assert_eq!(h.store.settlement_calls(), 1);
        assert_eq!(h.store.balance("w1"), Some(150));
        assert_eq!(h.store.balance("w2"), Some(300));
        assert_eq!(report.ledger_failures, 1);
        assert_eq!(report.ledger_failed, 2);
        assert_eq!(report.paid, 0);
    }

    #[tokio::test]
    async fn test_scan_failure_processes_pages_already_read() {
        let h = harness(
            &[("a", 150), ("b", 150), ("c", 150), ("d", 150)],
            config(),
        );
        h.store.fail_scan_at_page(Some(1));

        let report = h.driver.run_cycle().await.unwrap();

        assert!(report.scan_aborted);
        assert_eq!(report.accounts, 2);
        assert_eq!(report.paid, 2);
        assert_eq!(h.store.balance("a"), Some(0));
        assert_eq!(h.store.balance("c"), Some(150));
    }

    #[tokio::test]
    async fn test_repeated_scan_keys_are_paid_once() {
        let h = harness(
            &[("a", 150), ("b", 150), ("c", 150), ("d", 150), ("e", 150)],
            config(),
        );
        h.store.repeat_scan_keys(true);

        let report = h.driver.run_cycle().await.unwrap();

        assert_eq!(report.accounts, 5);
        let mut paid: Vec<String> = h
            .transfer
            .requests()
            .iter()
            .flat_map(|r| r.destinations.iter().map(|d| d.address.clone()))
            .collect();
        paid.sort();
        assert_eq!(paid, vec!["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn test_miner_paid_dynamic_fee() {
        let h = harness(
            &[("w1", 155), ("w2", 300)],
            PaymentsConfig {
                use_dynamic_transfer_fee: true,
                transfer_fee_per_payee: 5,
                miner_pays_fee: true,
                ..config()
            },
        );

        h.driver.run_cycle().await.unwrap();

        let requests = h.transfer.requests();
        assert_eq!(
            destinations(&requests[0]),
            vec![("w1".to_string(), 145), ("w2".to_string(), 295)]
        );
        assert_eq!(requests[0].fee, 10);
        assert_eq!(h.store.balance("w1"), Some(5));
        assert_eq!(h.store.balance("w2"), Some(0));
        assert_eq!(h.store.paid("w1"), 145);
    }

    #[rstest]
    #[case::defer(CapOverflow::Defer)]
    #[case::carry(CapOverflow::Carry)]
    #[tokio::test]
    async fn test_concurrent_settlement_conserves_funds(#[case] overflow: CapOverflow) {
        let accounts: Vec<(String, i64)> = (0..12)
            .map(|i| (format!("w{:02}", i), 100 + 40 * i))
            .collect();
        let seeded: Vec<(&str, i64)> = accounts.iter().map(|(a, b)| (a.as_str(), *b)).collect();
        let total: i64 = accounts.iter().map(|(_, b)| b).sum();
        let h = harness(
            &seeded,
            PaymentsConfig {
                min_payment: 50,
                max_transaction_amount: Some(500),
                cap_overflow: overflow,
                max_concurrent_transfers: 4,
                ..config()
            },
        );

        let report = h.driver.run_cycle().await.unwrap();

        let remaining: i64 = accounts
            .iter()
            .map(|(a, _)| h.store.balance(a).unwrap_or(0))
            .sum();
        let paid: i64 = accounts.iter().map(|(a, _)| h.store.paid(a)).sum();
        assert_eq!(paid + remaining, total);
        assert_eq!(paid, report.amount_paid);
        assert_eq!(remaining, report.amount_deferred);
        assert_eq!(report.paid, 12);
        assert!(h
            .transfer
            .requests()
            .iter()
            .all(|r| r.destinations.iter().map(|d| d.amount).sum::<i64>() <= 500));
    }
}
