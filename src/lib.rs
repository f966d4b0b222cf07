//! Pool Payout Library
//! # Overview
//!
//! This library settles accumulated per-account balances of a mining pool by
//! grouping them into bounded transfer batches, submitting each batch to a
//! wallet, and recording every settled payment in the ledger store.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Account, Batch, PaymentRecord, errors)
//! - [`config`] - JSON configuration and validation
//! - [`cli`] - CLI arguments parsing
//! - [`core`] - Pipeline stages:
//!   - [`core::enumerator`] - Cursor-paginated account discovery
//!   - [`core::balances`] - Bulk balance reads
//!   - [`core::filter`] - Denomination rounding and eligibility
//!   - [`core::batch_builder`] - Bounded batch partitioning
//!   - [`core::settlement`] - Transfer submission and atomic ledger updates
//! - [`cycle`] - Cycle scheduling, reporting and service wiring
//! - [`io`] - Store and transfer adapters (Redis, wallet JSON-RPC, in-memory doubles)
//!
//! # Cycle
//!
//! Each cycle runs five stages: enumerate accounts, fetch balances, filter
//! eligible payouts, build batches, settle batches. Every account discovered
//! resolves exactly once per cycle with an [`core::AccountOutcome`]:
//!
//! - **Ineligible**: Below its payout threshold
//! - **Paid**: Transfer confirmed and ledger updated
//! - **Unpaid**: Transfer failed; balance untouched, retried next cycle
//! - **LedgerFailed**: Transfer confirmed but the ledger update failed (needs an operator)
//! - **Failed**: Could not be processed (store unavailable)

// Module declarations
pub mod cli;
pub mod config;
pub mod core;
pub mod cycle;
pub mod io;
pub mod types;

pub use crate::config::{CapOverflow, MinerFeeShare, PaymentsConfig, Settings};
pub use crate::core::{AccountOutcome, BatchBuilder, LedgerStore, SettlementExecutor, TransferService};
pub use cycle::{CycleDriver, CycleReport};
pub use types::{
    Account, Address, Amount, Batch, Destination, PaymentRecord, PayoutError, SettlementError,
    StoreError, TransferError,
};
