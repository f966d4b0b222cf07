//! In-memory ledger store
//!
//! `MemoryStore` implements [`LedgerStore`] on top of `DashMap`, with the same
//! observable semantics as the Redis adapter: scans are cursor-paginated over
//! the sorted account set, balance changes are increments, and settlement
//! writes are applied as one unit. It also exposes failure injection and call
//! counters so pipeline behaviour under store failures can be exercised
//! without a server.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::core::LedgerStore;
use crate::types::{Address, Amount, LedgerOp, RawBalance, ScanPage, SettlementWrite, StoreError};

/// Stored fields of one account hash
#[derive(Debug, Clone, Default)]
struct AccountRecord {
    balance: Option<Amount>,
    min_payout_level: Option<Amount>,
    paid: Amount,
}

/// History entries as `(score, payload)` pairs
type History = Vec<(i64, String)>;

/// Thread-safe in-memory ledger
#[derive(Debug)]
pub struct MemoryStore {
    accounts: DashMap<Address, AccountRecord>,
    global_history: Mutex<History>,
    account_history: DashMap<Address, History>,
    /// Stored `paid` values that are not integers, by account
    corrupt_paid: DashMap<Address, String>,

    /// Serializes settlement writes so each one lands as a unit
    write_lock: Mutex<()>,

    fail_scan_at_page: AtomicUsize,
    repeat_scan_keys: AtomicBool,
    fail_fetch: AtomicBool,
    fail_settlement: AtomicBool,

    fetch_calls: AtomicUsize,
    settlement_calls: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            global_history: Mutex::new(Vec::new()),
            account_history: DashMap::new(),
            corrupt_paid: DashMap::new(),
            write_lock: Mutex::new(()),
            fail_scan_at_page: AtomicUsize::new(usize::MAX),
            repeat_scan_keys: AtomicBool::new(false),
            fail_fetch: AtomicBool::new(false),
            fail_settlement: AtomicBool::new(false),
            fetch_calls: AtomicUsize::new(0),
            settlement_calls: AtomicUsize::new(0),
        }
    }

    /// Create or overwrite an account's balance and payout level
    pub fn insert_account(&self, address: &str, balance: Amount, min_payout_level: Option<Amount>) {
        let mut record = self.accounts.entry(address.to_string()).or_default();
        record.balance = Some(balance);
        record.min_payout_level = min_payout_level;
    }

    /// Increment an account's balance, as upstream credit logic would
    pub fn credit(&self, address: &str, amount: Amount) {
        let mut record = self.accounts.entry(address.to_string()).or_default();
        record.balance = Some(record.balance.unwrap_or(0) + amount);
    }

    /// Current balance, `None` if the account or field is absent
    pub fn balance(&self, address: &str) -> Option<Amount> {
        self.accounts.get(address).and_then(|r| r.balance)
    }

    /// Cumulative amount paid to the account
    pub fn paid(&self, address: &str) -> Amount {
        self.accounts.get(address).map(|r| r.paid).unwrap_or(0)
    }

    /// Pool-wide payment history in insertion order
    pub fn global_history(&self) -> History {
        self.global_history
            .lock()
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    /// Payment history of one account in insertion order
    pub fn account_history(&self, address: &str) -> History {
        self.account_history
            .get(address)
            .map(|h| h.value().clone())
            .unwrap_or_default()
    }

    /// Store a raw, non-integer `paid` value for an account
    pub fn corrupt_paid(&self, address: &str, raw: &str) {
        self.accounts.entry(address.to_string()).or_default();
        self.corrupt_paid.insert(address.to_string(), raw.to_string());
    }

    /// Fail the scan page with the given index (`None` to disable)
    pub fn fail_scan_at_page(&self, page: Option<usize>) {
        self.fail_scan_at_page
            .store(page.unwrap_or(usize::MAX), Ordering::SeqCst);
    }

    /// Make every page after the first repeat the previous page's last key
    pub fn repeat_scan_keys(&self, enabled: bool) {
        self.repeat_scan_keys.store(enabled, Ordering::SeqCst);
    }

    /// Fail every bulk balance read
    pub fn fail_fetch(&self, enabled: bool) {
        self.fail_fetch.store(enabled, Ordering::SeqCst);
    }

    /// Fail every settlement write
    pub fn fail_settlement(&self, enabled: bool) {
        self.fail_settlement.store(enabled, Ordering::SeqCst);
    }

    /// Number of bulk balance reads so far
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Number of settlement writes attempted so far
    pub fn settlement_calls(&self) -> usize {
        self.settlement_calls.load(Ordering::SeqCst)
    }

    fn apply(&self, op: &LedgerOp) -> Result<(), StoreError> {
        match op {
            LedgerOp::IncrementBalance { address, delta } => {
                let mut record = self.accounts.entry(address.clone()).or_default();
                record.balance = Some(record.balance.unwrap_or(0) + delta);
            }
            LedgerOp::IncrementPaid { address, delta } => {
                let mut record = self.accounts.entry(address.clone()).or_default();
                record.paid += delta;
            }
            LedgerOp::AppendGlobalHistory { score, entry } => {
                self.global_history
                    .lock()
                    .map_err(|_| StoreError::command("zadd", "history lock poisoned"))?
                    .push((*score, entry.clone()));
            }
            LedgerOp::AppendAccountHistory {
                address,
                score,
                entry,
            } => {
                self.account_history
                    .entry(address.clone())
                    .or_default()
                    .push((*score, entry.clone()));
            }
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn scan_accounts(&self, cursor: u64, count: usize) -> Result<ScanPage, StoreError> {
        let count = count.max(1);
        let cursor = cursor as usize;

        if cursor / count == self.fail_scan_at_page.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("scan failed"));
        }

        let mut keys: Vec<Address> = self.accounts.iter().map(|e| e.key().clone()).collect();
        keys.sort();

        let start = if cursor > 0 && self.repeat_scan_keys.load(Ordering::SeqCst) {
            cursor - 1
        } else {
            cursor
        };
        let end = (cursor + count).min(keys.len());
        let addresses = if start < end {
            keys[start..end].to_vec()
        } else {
            Vec::new()
        };
        let next = if end >= keys.len() { 0 } else { end as u64 };

        Ok(ScanPage {
            cursor: next,
            addresses,
        })
    }

    async fn fetch_balances(&self, addresses: &[Address]) -> Result<Vec<RawBalance>, StoreError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("fetch failed"));
        }

        Ok(addresses
            .iter()
            .map(|address| match self.accounts.get(address) {
                Some(record) => RawBalance {
                    balance: record.balance.map(|b| b.to_string()),
                    min_payout_level: record.min_payout_level.map(|l| l.to_string()),
                    paid: Some(
                        self.corrupt_paid
                            .get(address)
                            .map(|raw| raw.value().clone())
                            .unwrap_or_else(|| record.paid.to_string()),
                    ),
                },
                None => RawBalance::default(),
            })
            .collect())
    }

    async fn apply_settlement(&self, write: &SettlementWrite) -> Result<(), StoreError> {
        self.settlement_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_settlement.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("settlement write failed"));
        }

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StoreError::command("exec", "write lock poisoned"))?;
        for op in &write.ops {
            self.apply(op)?;
        }
        Ok(())
    }
}
