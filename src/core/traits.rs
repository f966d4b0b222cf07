//! Core traits for the ledger store and the transfer service
//!
//! These are the two external collaborators of the payout pipeline. The
//! pipeline only depends on these traits, so production adapters (Redis,
//! wallet JSON-RPC) and in-memory test doubles are interchangeable.

use async_trait::async_trait;

use crate::types::{
    Address, RawBalance, ScanPage, SettlementWrite, StoreError, TransferError, TransferReceipt,
    TransferRequest,
};

/// Shared store holding account balances and payment history
///
/// # Contract
///
/// - `scan_accounts` is weakly consistent: accounts present at scan start are
///   returned at least once, possibly more than once.
/// - `fetch_balances` is a single round trip and returns one entry per
///   requested address, in request order.
/// - `apply_settlement` is applied as one isolated unit, and balance changes
///   are store-native increments so concurrent credits are never overwritten.
///   A store without rollback may partly apply a write whose operations fail
///   at run time, so callers treat any error as needing reconciliation.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Read one page of account identifiers starting at `cursor`
    async fn scan_accounts(&self, cursor: u64, count: usize) -> Result<ScanPage, StoreError>;

    /// Bulk-read balance and minimum payout level for a page of accounts
    async fn fetch_balances(&self, addresses: &[Address]) -> Result<Vec<RawBalance>, StoreError>;

    /// Atomically apply every operation of a settlement write
    async fn apply_settlement(&self, write: &SettlementWrite) -> Result<(), StoreError>;
}

/// External service that moves funds
///
/// # Contract
///
/// - Implementations must not retry internally: a retried transfer can pay twice.
/// - An `Err` means the service reported failure or could not be reached.
#[async_trait]
pub trait TransferService: Send + Sync {
    /// Submit one settlement transaction
    async fn transfer(&self, request: &TransferRequest) -> Result<TransferReceipt, TransferError>;
}
