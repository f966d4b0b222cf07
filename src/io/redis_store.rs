//! Redis ledger store
//!
//! Key layout, under the configured coin prefix:
//!
//! - `{coin}:workers:{address}` - hash with `balance`, `minPayoutLevel`, `paid`
//! - `{coin}:payments:all` - sorted set of pool-wide payment records
//! - `{coin}:payments:{address}` - sorted set of one account's payment records
//!
//! Settlement writes go out as one `MULTI`/`EXEC` pipeline, so no other
//! client sees a batch half-applied and a dropped connection before `EXEC`
//! applies nothing. Redis does not roll back a transaction when one of its
//! commands fails at run time, though: an `HINCRBY` on a non-integer field
//! errors while the other commands still apply. Balance fetches read `paid`
//! alongside the balance so such accounts are skipped before any transfer.
//!
//! The connection is a [`ConnectionManager`], which reconnects on its own
//! after the server restarts or the socket drops.

use async_trait::async_trait;
use log::debug;
use redis::aio::ConnectionManager;
use redis::Client;

use crate::core::LedgerStore;
use crate::types::{Address, LedgerOp, RawBalance, ScanPage, SettlementWrite, StoreError};

/// Key naming for one coin's namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Hash holding one account's balance fields
    pub fn worker_key(&self, address: &str) -> String {
        format!("{}:workers:{}", self.prefix, address)
    }

    /// Glob matching every account hash
    pub fn worker_pattern(&self) -> String {
        format!("{}:workers:*", self.prefix)
    }

    /// Pool-wide payment history
    pub fn global_payments_key(&self) -> String {
        format!("{}:payments:all", self.prefix)
    }

    /// One account's payment history
    pub fn account_payments_key(&self, address: &str) -> String {
        format!("{}:payments:{}", self.prefix, address)
    }

    /// Account identifier from a worker key (its last `:` segment)
    pub fn address_from_key<'k>(&self, key: &'k str) -> &'k str {
        key.rsplit(':').next().unwrap_or(key)
    }
}

/// Ledger store backed by a Redis server
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    keys: KeySpace,
}

impl RedisStore {
    /// Connect to the server at `url` and use `prefix` as the key namespace
    pub async fn connect(url: &str, prefix: &str) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        debug!("Connected to ledger store at {}", url);

        Ok(Self {
            conn,
            keys: KeySpace::new(prefix),
        })
    }

    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    fn settlement_pipeline(&self, write: &SettlementWrite) -> redis::Pipeline {
        let mut pipe = redis::pipe();
        pipe.atomic();

        for op in &write.ops {
            match op {
                LedgerOp::IncrementBalance { address, delta } => {
                    pipe.hincr(self.keys.worker_key(address), "balance", *delta)
                        .ignore();
                }
                LedgerOp::IncrementPaid { address, delta } => {
                    pipe.hincr(self.keys.worker_key(address), "paid", *delta)
                        .ignore();
                }
                LedgerOp::AppendGlobalHistory { score, entry } => {
                    pipe.zadd(self.keys.global_payments_key(), entry, *score)
                        .ignore();
                }
                LedgerOp::AppendAccountHistory {
                    address,
                    score,
                    entry,
                } => {
                    pipe.zadd(self.keys.account_payments_key(address), entry, *score)
                        .ignore();
                }
            }
        }

        pipe
    }
}

#[async_trait]
impl LedgerStore for RedisStore {
    async fn scan_accounts(&self, cursor: u64, count: usize) -> Result<ScanPage, StoreError> {
        let mut conn = self.conn.clone();
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(self.keys.worker_pattern())
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        Ok(ScanPage {
            cursor: next,
            addresses: keys
                .iter()
                .map(|key| self.keys.address_from_key(key).to_string())
                .collect(),
        })
    }

    async fn fetch_balances(&self, addresses: &[Address]) -> Result<Vec<RawBalance>, StoreError> {
        if addresses.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for address in addresses {
            pipe.cmd("HMGET")
                .arg(self.keys.worker_key(address))
                .arg("balance")
                .arg("minPayoutLevel")
                .arg("paid");
        }

        let mut conn = self.conn.clone();
        let replies: Vec<(Option<String>, Option<String>, Option<String>)> =
            pipe.query_async(&mut conn).await?;

        Ok(replies
            .into_iter()
            .map(|(balance, min_payout_level, paid)| RawBalance {
                balance,
                min_payout_level,
                paid,
            })
            .collect())
    }

    async fn apply_settlement(&self, write: &SettlementWrite) -> Result<(), StoreError> {
        if write.is_empty() {
            return Ok(());
        }

        let pipe = self.settlement_pipeline(write);
        let mut conn = self.conn.clone();
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }
}
