//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `account`: Account snapshots and per-cycle payout candidates
//! - `batch`: Settlement batches and their destinations
//! - `ledger`: Store-facing records (scan pages, raw balances, settlement writes)
//! - `payment`: Payment history records
//! - `transfer`: Transfer service request/response types
//! - `error`: Error types for the payout processor

pub mod account;
pub mod batch;
pub mod error;
pub mod ledger;
pub mod payment;
pub mod transfer;

pub use account::{Account, Address, Amount, PayoutCandidate};
pub use batch::{Batch, Destination};
pub use error::{ConfigError, PayoutError, SettlementError, StoreError, TransferError};
pub use ledger::{LedgerOp, RawBalance, ScanPage, SettlementWrite};
pub use payment::PaymentRecord;
pub use transfer::{TransferDestination, TransferReceipt, TransferRequest};
