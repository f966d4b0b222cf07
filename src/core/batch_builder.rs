//! Partitioning of eligible payouts into bounded settlement batches
//!
//! Payouts are assigned in address order so batch membership is reproducible.
//! Destinations accumulate in the open batch until it reaches the configured
//! maximum transaction amount; a payout that would overflow the batch is
//! capped to the remaining capacity. What happens to the capped-off remainder
//! depends on [`CapOverflow`]:
//!
//! ```text
//! cap = 200, payouts w1:150 w2:300
//!
//! defer: [w1:150, w2:50]                      w2 keeps 250 in its balance
//! carry: [w1:150, w2:50] [w2:200] [w2:50]     every batch <= cap
//! ```
//!
//! Batch fees are computed once, when a batch is sealed and its destination
//! count is final.

use super::fee::FeePolicy;
use crate::config::CapOverflow;
use crate::types::{Address, Amount, Batch, Destination, PayoutCandidate};

/// Part of a payout left in the account balance this cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deferral {
    pub address: Address,
    pub amount: Amount,
}

/// Output of the batch builder
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchPlan {
    /// Sealed batches in assignment order
    pub batches: Vec<Batch>,

    /// Remainders left in account balances by capping
    pub deferred: Vec<Deferral>,
}

impl BatchPlan {
    /// Sum of all batch amounts
    pub fn total_amount(&self) -> Amount {
        self.batches.iter().map(|b| b.amount).sum()
    }

    /// Sum of all deferred remainders
    pub fn total_deferred(&self) -> Amount {
        self.deferred.iter().map(|d| d.amount).sum()
    }
}

/// Batch currently accepting destinations
#[derive(Debug, Default)]
struct OpenBatch {
    destinations: Vec<Destination>,
    amount: Amount,
}

impl OpenBatch {
    fn push(&mut self, destination: Destination) {
        self.amount += destination.amount;
        self.destinations.push(destination);
    }

    fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }
}

/// Groups eligible payouts into batches bounded by the maximum transaction amount
#[derive(Debug, Clone)]
pub struct BatchBuilder {
    max_transaction_amount: Option<Amount>,
    overflow: CapOverflow,
    fees: FeePolicy,
}

impl BatchBuilder {
    /// Create a builder; `max_transaction_amount` of `None` means unlimited
    pub fn new(max_transaction_amount: Option<Amount>, overflow: CapOverflow, fees: FeePolicy) -> Self {
        Self {
            max_transaction_amount: max_transaction_amount.filter(|cap| *cap > 0),
            overflow,
            fees,
        }
    }

    /// Partition payouts into sealed batches
    ///
    /// Ineligible candidates are ignored. No batch total exceeds the cap,
    /// and no empty batch is ever produced.
    pub fn build(&self, mut payouts: Vec<PayoutCandidate>) -> BatchPlan {
        payouts.retain(|p| p.eligible && p.payout > 0);
        payouts.sort_by(|a, b| a.address.cmp(&b.address));

        let mut plan = BatchPlan::default();
        let mut open = OpenBatch::default();

        for candidate in payouts {
            let mut remaining = candidate.payout;
            let mut fee_share = candidate.fee_share;

            loop {
                let amount = match self.max_transaction_amount {
                    Some(cap) => remaining.min(cap - open.amount),
                    None => remaining,
                };

                open.push(Destination {
                    address: candidate.address.clone(),
                    amount,
                    fee_share,
                });
                remaining -= amount;

                if self.is_full(&open) {
                    plan.batches.push(self.seal(std::mem::take(&mut open)));
                }

                if remaining <= 0 {
                    break;
                }

                match self.overflow {
                    CapOverflow::Defer => {
                        plan.deferred.push(Deferral {
                            address: candidate.address.clone(),
                            amount: remaining,
                        });
                        break;
                    }
                    CapOverflow::Carry => {
                        let share = self.fees.carried_fee_share();
                        if remaining - share <= 0 {
                            plan.deferred.push(Deferral {
                                address: candidate.address.clone(),
                                amount: remaining,
                            });
                            break;
                        }
                        remaining -= share;
                        fee_share = share;
                    }
                }
            }
        }

        if !open.is_empty() {
            plan.batches.push(self.seal(open));
        }

        plan
    }

    fn is_full(&self, open: &OpenBatch) -> bool {
        matches!(self.max_transaction_amount, Some(cap) if open.amount >= cap)
    }

    fn seal(&self, open: OpenBatch) -> Batch {
        let fee = self.fees.batch_fee(open.destinations.len());
        Batch {
            destinations: open.destinations,
            amount: open.amount,
            fee,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MinerFeeShare;
    use rstest::rstest;

    fn flat_fee() -> FeePolicy {
        FeePolicy {
            transfer_fee: 10,
            dynamic: false,
            fee_per_payee: 0,
            miner_pays: false,
            share_mode: MinerFeeShare::PerAccount,
        }
    }

    fn miner_pays(share_mode: MinerFeeShare) -> FeePolicy {
        FeePolicy {
            transfer_fee: 10,
            dynamic: true,
            fee_per_payee: 5,
            miner_pays: true,
            share_mode,
        }
    }

    fn candidate(address: &str, payout: Amount) -> PayoutCandidate {
        PayoutCandidate {
            address: address.to_string(),
            payout,
            fee_share: 0,
            eligible: true,
        }
    }

    fn dest(address: &str, amount: Amount) -> Destination {
        Destination {
            address: address.to_string(),
            amount,
            fee_share: 0,
        }
    }

    #[test]
    fn test_uncapped_single_batch() {
        let builder = BatchBuilder::new(None, CapOverflow::Defer, flat_fee());

        let plan = builder.build(vec![candidate("w2", 300), candidate("w1", 150)]);

        assert_eq!(
            plan.batches,
            vec![Batch {
                destinations: vec![dest("w1", 150), dest("w2", 300)],
                amount: 450,
                fee: 10,
            }]
        );
        assert!(plan.deferred.is_empty());
    }

    #[test]
    fn test_cap_defers_remainder() {
        let builder = BatchBuilder::new(Some(200), CapOverflow::Defer, flat_fee());

        let plan = builder.build(vec![candidate("w1", 150), candidate("w2", 300)]);

        assert_eq!(
            plan.batches,
            vec![Batch {
                destinations: vec![dest("w1", 150), dest("w2", 50)],
                amount: 200,
                fee: 10,
            }]
        );
        assert_eq!(
            plan.deferred,
            vec![Deferral {
                address: "w2".to_string(),
                amount: 250
            }]
        );
    }

    #[test]
    fn test_cap_carries_remainder() {
        let builder = BatchBuilder::new(Some(200), CapOverflow::Carry, flat_fee());

        let plan = builder.build(vec![candidate("w1", 150), candidate("w2", 300)]);

        let amounts: Vec<Vec<(String, Amount)>> = plan
            .batches
            .iter()
            .map(|b| b.destinations.iter().map(|d| (d.address.clone(), d.amount)).collect())
            .collect();
        assert_eq!(
            amounts,
            vec![
                vec![("w1".to_string(), 150), ("w2".to_string(), 50)],
                vec![("w2".to_string(), 200)],
                vec![("w2".to_string(), 50)],
            ]
        );
        assert_eq!(plan.total_amount(), 450);
        assert!(plan.deferred.is_empty());
    }

    #[test]
    fn test_defer_keeps_account_in_one_batch_and_opens_next() {
        let builder = BatchBuilder::new(Some(200), CapOverflow::Defer, flat_fee());

        let plan = builder.build(vec![
            candidate("a", 150),
            candidate("b", 150),
            candidate("c", 150),
        ]);

        assert_eq!(plan.batches.len(), 2);
        assert_eq!(plan.batches[0].destinations, vec![dest("a", 150), dest("b", 50)]);
        assert_eq!(plan.batches[1].destinations, vec![dest("c", 150)]);
        assert_eq!(plan.total_amount() + plan.total_deferred(), 450);
    }

    #[test]
    fn test_exact_fill_produces_no_empty_batch() {
        let builder = BatchBuilder::new(Some(200), CapOverflow::Defer, flat_fee());

        let plan = builder.build(vec![candidate("a", 100), candidate("b", 100)]);

        assert_eq!(plan.batches.len(), 1);
        assert_eq!(plan.batches[0].amount, 200);
    }

    #[test]
    fn test_empty_input_produces_no_batches() {
        let builder = BatchBuilder::new(Some(200), CapOverflow::Carry, flat_fee());
        assert_eq!(builder.build(vec![]), BatchPlan::default());
    }

    #[test]
    fn test_ineligible_candidates_are_skipped() {
        let builder = BatchBuilder::new(None, CapOverflow::Defer, flat_fee());
        let mut skipped = candidate("x", 500);
        skipped.eligible = false;

        let plan = builder.build(vec![skipped, candidate("a", 100)]);

        assert_eq!(plan.batches[0].destinations, vec![dest("a", 100)]);
    }

    #[test]
    fn test_order_is_independent_of_input_order() {
        let builder = BatchBuilder::new(Some(250), CapOverflow::Carry, flat_fee());
        let forward = vec![candidate("a", 120), candidate("b", 180), candidate("c", 90)];
        let mut reversed = forward.clone();
        reversed.reverse();

        assert_eq!(builder.build(forward), builder.build(reversed));
    }

    #[test]
    fn test_dynamic_fee_uses_final_destination_count() {
        let fees = FeePolicy {
            transfer_fee: 10,
            dynamic: true,
            fee_per_payee: 3,
            miner_pays: false,
            share_mode: MinerFeeShare::PerAccount,
        };
        let builder = BatchBuilder::new(Some(200), CapOverflow::Defer, fees);

        let plan = builder.build(vec![
            candidate("a", 50),
            candidate("b", 50),
            candidate("c", 150),
            candidate("d", 20),
        ]);

        assert_eq!(plan.batches[0].destination_count(), 3);
        assert_eq!(plan.batches[0].fee, 9);
        assert_eq!(plan.batches[1].destination_count(), 1);
        assert_eq!(plan.batches[1].fee, 3);
    }

    #[rstest]
    #[case::per_account(MinerFeeShare::PerAccount, vec![5, 0, 0])]
    #[case::per_destination(MinerFeeShare::PerDestination, vec![5, 5, 5])]
    fn test_carried_fee_share(#[case] mode: MinerFeeShare, #[case] expected_shares: Vec<Amount>) {
        let builder = BatchBuilder::new(Some(100), CapOverflow::Carry, miner_pays(mode));
        let payout = PayoutCandidate {
            address: "w1".to_string(),
            payout: 245,
            fee_share: 5,
            eligible: true,
        };

        let plan = builder.build(vec![payout.clone()]);

        let shares: Vec<Amount> = plan
            .batches
            .iter()
            .flat_map(|b| b.destinations.iter().map(|d| d.fee_share))
            .collect();
        assert_eq!(shares, expected_shares);

        // Total debit across all batches equals the rounded balance the
        // payout was derived from, plus whatever stayed deferred
        let debit: Amount = plan.batches.iter().map(Batch::balance_debit).sum();
        assert_eq!(debit + plan.total_deferred(), payout.balance_debit());
    }

    #[test]
    fn test_carry_defers_remainder_consumed_by_fee_share() {
        let builder = BatchBuilder::new(
            Some(100),
            CapOverflow::Carry,
            miner_pays(MinerFeeShare::PerDestination),
        );
        let payout = PayoutCandidate {
            address: "w1".to_string(),
            payout: 103,
            fee_share: 5,
            eligible: true,
        };

        let plan = builder.build(vec![payout]);

        assert_eq!(plan.batches.len(), 1);
        assert_eq!(
            plan.deferred,
            vec![Deferral {
                address: "w1".to_string(),
                amount: 3
            }]
        );
    }

    #[rstest]
    #[case::even(vec![100, 100, 100, 100], 200)]
    #[case::uneven(vec![130, 70, 90, 10, 160, 40], 200)]
    #[case::single_payouts_at_cap(vec![200, 200, 200], 200)]
    #[case::many_small(vec![7; 50], 30)]
    #[case::mixed(vec![199, 1, 2, 198, 55, 145, 300], 200)]
    fn test_carry_batch_count_is_ceiling(#[case] payouts: Vec<Amount>, #[case] cap: Amount) {
        let builder = BatchBuilder::new(Some(cap), CapOverflow::Carry, flat_fee());
        let candidates: Vec<PayoutCandidate> = payouts
            .iter()
            .enumerate()
            .map(|(i, p)| candidate(&format!("w{:03}", i), *p))
            .collect();
        let total: Amount = payouts.iter().sum();

        let plan = builder.build(candidates);

        let expected = (total + cap - 1) / cap;
        assert_eq!(plan.batches.len() as Amount, expected);
        assert!(plan.batches.iter().all(|b| b.amount <= cap));
        assert_eq!(plan.total_amount(), total);
    }

    #[rstest]
    #[case::all_fit(vec![50, 60, 70], 200)]
    #[case::overflowing(vec![150, 150, 150, 150], 200)]
    #[case::oversized(vec![500, 20, 700], 200)]
    fn test_defer_conserves_total(#[case] payouts: Vec<Amount>, #[case] cap: Amount) {
        let builder = BatchBuilder::new(Some(cap), CapOverflow::Defer, flat_fee());
        let candidates: Vec<PayoutCandidate> = payouts
            .iter()
            .enumerate()
            .map(|(i, p)| candidate(&format!("w{:03}", i), *p))
            .collect();
        let total: Amount = payouts.iter().sum();

        let plan = builder.build(candidates);

        assert!(plan.batches.iter().all(|b| b.amount <= cap && !b.destinations.is_empty()));
        assert_eq!(plan.total_amount() + plan.total_deferred(), total);
        for batch in &plan.batches {
            let mut seen: Vec<&str> = batch.destinations.iter().map(|d| d.address.as_str()).collect();
            seen.dedup();
            assert_eq!(seen.len(), batch.destinations.len());
        }
    }
}
