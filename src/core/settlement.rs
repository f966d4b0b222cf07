//! Settlement of sealed batches
//!
//! Each batch moves through a small state machine:
//!
//! ```text
//! PENDING ──► SUBMITTED ──┬──► SUBMIT_FAILED                     (terminal)
//!                         └──► CONFIRMED ──┬──► LEDGER_UPDATED       (terminal)
//!                                          └──► LEDGER_UPDATE_FAILED (terminal)
//! ```
//!
//! A failed submit leaves the store untouched, so the payout simply rolls
//! forward to the next cycle. Once a transfer is confirmed, funds have left
//! the pool: the ledger is updated with a single atomic write, and if that
//! write fails the batch ends in `LEDGER_UPDATE_FAILED`, which is fatal and
//! never retried because the next attempt would pay the same funds again.
//! Those failures are logged on [`ALERT_TARGET`].
//!
//! Transfers for different batches run concurrently, bounded by
//! `max_concurrent_transfers`. Every account completion handle is resolved
//! only after all batches have reached a terminal state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::stream::{self, StreamExt};
use log::{debug, error, info};

use super::completion::{AccountOutcome, Completion};
use super::traits::{LedgerStore, TransferService};
use crate::config::PaymentsConfig;
use crate::types::{
    Batch, LedgerOp, PaymentRecord, SettlementError, SettlementWrite, TransferError,
    TransferReceipt, TransferRequest,
};

/// Log target for conditions that need an operator right away
pub const ALERT_TARGET: &str = "pool_payouts::alert";

/// Lifecycle state of one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Pending,
    Submitted,
    Confirmed,
    SubmitFailed,
    LedgerUpdated,
    LedgerUpdateFailed,
}

impl BatchState {
    /// Whether the batch has finished settling
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BatchState::SubmitFailed | BatchState::LedgerUpdated | BatchState::LedgerUpdateFailed
        )
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_advance_to(self, next: BatchState) -> bool {
        use BatchState::*;
        matches!(
            (self, next),
            (Pending, Submitted)
                | (Submitted, Confirmed)
                | (Submitted, SubmitFailed)
                | (Confirmed, LedgerUpdated)
                | (Confirmed, LedgerUpdateFailed)
        )
    }
}

/// A batch together with its settlement progress
#[derive(Debug, Clone)]
pub struct BatchSettlement {
    /// Position of the batch within its cycle
    pub index: usize,
    pub batch: Batch,
    pub state: BatchState,
    /// Hash of the confirmed transfer, delimiters stripped
    pub tx_hash: Option<String>,
    pub error: Option<SettlementError>,
}

impl BatchSettlement {
    fn new(index: usize, batch: Batch) -> Self {
        Self {
            index,
            batch,
            state: BatchState::Pending,
            tx_hash: None,
            error: None,
        }
    }

    fn advance(&mut self, next: BatchState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal batch transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!("Batch {}: {:?} -> {:?}", self.index, self.state, next);
        self.state = next;
    }

    /// Outcome for a destination of this batch
    fn outcome_for(&self, amount: i64) -> AccountOutcome {
        match self.state {
            BatchState::LedgerUpdated => AccountOutcome::Paid { amount },
            BatchState::LedgerUpdateFailed => AccountOutcome::LedgerFailed,
            BatchState::SubmitFailed => AccountOutcome::Unpaid,
            // Only reachable if settlement was interrupted
            BatchState::Pending | BatchState::Submitted | BatchState::Confirmed => {
                AccountOutcome::Failed
            }
        }
    }
}

/// Result of settling every batch of a cycle
#[derive(Debug, Clone, Default)]
pub struct SettlementSummary {
    /// Settlements ordered by batch index
    pub settlements: Vec<BatchSettlement>,
}

impl SettlementSummary {
    fn count(&self, state: BatchState) -> usize {
        self.settlements.iter().filter(|s| s.state == state).count()
    }

    /// Batches sent and recorded in the ledger
    pub fn batches_settled(&self) -> usize {
        self.count(BatchState::LedgerUpdated)
    }

    /// Batches whose transfer failed
    pub fn batches_failed(&self) -> usize {
        self.count(BatchState::SubmitFailed)
    }

    /// Batches sent but missing from the ledger
    pub fn ledger_failures(&self) -> usize {
        self.count(BatchState::LedgerUpdateFailed)
    }

    /// Failed batches whose transfer may nonetheless have gone through
    pub fn unknown_outcomes(&self) -> usize {
        self.settlements
            .iter()
            .filter(|s| s.error.as_ref().is_some_and(SettlementError::is_ambiguous))
            .count()
    }

    /// Every error raised while settling, in batch order
    pub fn errors(&self) -> Vec<&SettlementError> {
        self.settlements.iter().filter_map(|s| s.error.as_ref()).collect()
    }
}

/// Build the atomic ledger write for a confirmed batch
///
/// Balances are debited by amount plus miner fee share; `paid` is credited
/// with the amount only. One global and one per-destination history entry
/// share the record's timestamp.
pub fn settlement_write(batch: &Batch, record: &PaymentRecord) -> SettlementWrite {
    let mut ops = Vec::with_capacity(batch.destination_count() * 3 + 1);

    for destination in &batch.destinations {
        ops.push(LedgerOp::IncrementBalance {
            address: destination.address.clone(),
            delta: -destination.balance_debit(),
        });
        ops.push(LedgerOp::IncrementPaid {
            address: destination.address.clone(),
            delta: destination.amount,
        });
    }

    ops.push(LedgerOp::AppendGlobalHistory {
        score: record.timestamp,
        entry: record.global_entry(),
    });

    for destination in &batch.destinations {
        ops.push(LedgerOp::AppendAccountHistory {
            address: destination.address.clone(),
            score: record.timestamp,
            entry: record.account_entry(destination),
        });
    }

    SettlementWrite { ops }
}

fn describe_destinations(batch: &Batch) -> String {
    batch
        .destinations
        .iter()
        .map(|d| format!("{}={}", d.address, d.amount))
        .collect::<Vec<_>>()
        .join(", ")
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Submits batches and records their outcome in the ledger
#[derive(Clone)]
pub struct SettlementExecutor {
    store: Arc<dyn LedgerStore>,
    transfer: Arc<dyn TransferService>,
    mixin: u64,
    max_concurrent: usize,
    timeout: Option<Duration>,
}

impl SettlementExecutor {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        transfer: Arc<dyn TransferService>,
        config: &PaymentsConfig,
    ) -> Self {
        Self {
            store,
            transfer,
            mixin: config.mixin,
            max_concurrent: config.max_concurrent_transfers.max(1),
            timeout: config.transfer_timeout(),
        }
    }

    /// Settle all batches of a cycle, then resolve every account handle
    ///
    /// `completions` holds the handles of every account with an eligible
    /// payout. Each is resolved exactly once, with the merged outcome of
    /// all batches it appears in.
    pub async fn execute(&self, batches: Vec<Batch>, completions: Vec<Completion>) -> SettlementSummary {
        // Per-cycle offset keeps history timestamps unique within the cycle
        let offset = AtomicI64::new(0);
        let offset = &offset;

        let mut settlements: Vec<BatchSettlement> = stream::iter(batches.into_iter().enumerate())
            .map(|(index, batch)| self.settle(BatchSettlement::new(index, batch), offset))
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;
        settlements.sort_by_key(|s| s.index);

        let mut outcomes: HashMap<&str, AccountOutcome> = HashMap::new();
        for settlement in &settlements {
            for destination in &settlement.batch.destinations {
                let outcome = settlement.outcome_for(destination.amount);
                outcomes
                    .entry(destination.address.as_str())
                    .and_modify(|existing| *existing = existing.merge(outcome))
                    .or_insert(outcome);
            }
        }

        for completion in completions {
            let outcome = outcomes
                .get(completion.address())
                .copied()
                .unwrap_or(AccountOutcome::Unpaid);
            completion.resolve(outcome);
        }

        SettlementSummary { settlements }
    }

    async fn settle(&self, mut settlement: BatchSettlement, offset: &AtomicI64) -> BatchSettlement {
        let request = TransferRequest::for_batch(&settlement.batch, self.mixin);
        settlement.advance(BatchState::Submitted);

        let receipt = match self.submit(&request).await {
            Ok(receipt) => receipt,
            Err(e) => {
                if e.is_ambiguous() {
                    error!(
                        target: ALERT_TARGET,
                        "Transfer outcome unknown for batch {} ({}); check the wallet before the next cycle pays [{}] again",
                        settlement.index,
                        e,
                        describe_destinations(&settlement.batch)
                    );
                } else {
                    error!("Error with transfer request for batch {}: {}", settlement.index, e);
                }
                error!(
                    "Payments failed to send to [{}]",
                    describe_destinations(&settlement.batch)
                );
                settlement.error = Some(SettlementError::transfer_submit_failed(settlement.index, e));
                settlement.advance(BatchState::SubmitFailed);
                return settlement;
            }
        };
        settlement.advance(BatchState::Confirmed);

        let timestamp = unix_now() + offset.fetch_add(1, Ordering::SeqCst);
        let record = PaymentRecord::new(&receipt.tx_hash, &settlement.batch, self.mixin, timestamp);
        info!(
            "Payment {} sent: amount {}, fee {}, {} destination(s)",
            record.tx_hash, record.amount, record.fee, record.destination_count
        );

        let write = settlement_write(&settlement.batch, &record);
        match self.store.apply_settlement(&write).await {
            Ok(()) => {
                settlement.tx_hash = Some(record.tx_hash);
                settlement.advance(BatchState::LedgerUpdated);
            }
            Err(e) => {
                error!(
                    target: ALERT_TARGET,
                    "Payments sent in {} yet failing to update balances, double payouts likely to happen: {}",
                    record.tx_hash,
                    e
                );
                error!(
                    target: ALERT_TARGET,
                    "Double payments likely to be sent to [{}]",
                    describe_destinations(&settlement.batch)
                );
                settlement.error = Some(SettlementError::ledger_update_after_transfer(
                    settlement.index,
                    &record.tx_hash,
                    e,
                ));
                settlement.tx_hash = Some(record.tx_hash);
                settlement.advance(BatchState::LedgerUpdateFailed);
            }
        }

        settlement
    }

    async fn submit(&self, request: &TransferRequest) -> Result<TransferReceipt, TransferError> {
        match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.transfer.transfer(request)).await {
                Ok(result) => result,
                Err(_) => Err(TransferError::Timeout {
                    secs: limit.as_secs(),
                }),
            },
            None => self.transfer.transfer(request).await,
        }
    }
}
