//! Core business logic module
//!
//! This module contains the payout pipeline stages, in execution order:
//! - `enumerator` - Cursor-paginated account discovery
//! - `balances` - Bulk balance and payout-level reads
//! - `filter` - Denomination rounding and eligibility
//! - `batch_builder` - Partitioning into bounded settlement batches
//! - `settlement` - Transfer submission and atomic ledger updates
//!
//! Supporting pieces:
//! - `traits` - Store and transfer service abstractions
//! - `completion` - Per-account completion signals and the join-all barrier
//! - `fee` - Transfer fee policy

pub mod balances;
pub mod batch_builder;
pub mod completion;
pub mod enumerator;
pub mod fee;
pub mod filter;
pub mod settlement;
pub mod traits;

pub use balances::{BalanceFetcher, PendingAccount};
pub use batch_builder::{BatchBuilder, BatchPlan, Deferral};
pub use completion::{AccountOutcome, Completion, CompletionSet};
pub use enumerator::{AccountEnumerator, Discovery};
pub use fee::FeePolicy;
pub use filter::{round_to_denomination, EligiblePayout, PayoutFilter};
pub use settlement::{
    settlement_write, BatchSettlement, BatchState, SettlementExecutor, SettlementSummary,
    ALERT_TARGET,
};
pub use traits::{LedgerStore, TransferService};
