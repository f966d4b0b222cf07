//! Payout service
//!
//! Wires the production adapters into a [`CycleDriver`] and runs it on an
//! explicitly built multi-threaded tokio runtime.
//!
//! # Architecture
//!
//! ```text
//! run_service
//!     ├── RedisStore (ledger)
//!     ├── WalletRpcClient (transfers)
//!     └── CycleDriver
//!         ├── AccountEnumerator ─► BalanceFetcher ─► PayoutFilter
//!         ├── BatchBuilder
//!         └── SettlementExecutor (bounded concurrent transfers)
//! ```

mod driver;
mod report;

pub use driver::CycleDriver;
pub use report::CycleReport;

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info};

use crate::config::Settings;
use crate::io::{RedisStore, WalletRpcClient};
use crate::types::PayoutError;

/// Bound on establishing a connection to the wallet
const WALLET_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the payout service with production adapters
///
/// With `once`, a single cycle runs and its error (if any) is returned;
/// otherwise cycles repeat until the process is stopped or halts.
pub fn run_service(settings: Settings, once: bool) -> Result<(), PayoutError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(settings.payments.max_concurrent_transfers)
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let connect = || RedisStore::connect(&settings.redis.url, &settings.payments.coin);
        let store = if once {
            connect()
                .await
                .map_err(|e| PayoutError::store_unavailable("connect", e))?
        } else {
            connect_with_retry(settings.payments.interval(), connect).await
        };
        let wallet = WalletRpcClient::new(&settings.wallet.url, WALLET_CONNECT_TIMEOUT)?;
        info!(
            "Payout processor started for {}: interval {}s, wallet {}",
            settings.payments.coin,
            settings.payments.interval_secs,
            wallet.url()
        );

        let driver = CycleDriver::new(Arc::new(store), Arc::new(wallet), settings.payments);
        if once {
            driver.run_once().await.map(|_| ())
        } else {
            driver.run_forever().await
        }
    })
}

/// Keep calling `connect` every `retry_after` until it succeeds
///
/// A ledger that is down at startup is treated like one that goes down
/// between cycles: the service waits for it instead of exiting.
async fn connect_with_retry<T, E, F, Fut>(retry_after: Duration, mut connect: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    loop {
        match connect().await {
            Ok(connected) => return connected,
            Err(e) => {
                error!(
                    "Ledger store unavailable at startup: {}; retrying in {}s",
                    e,
                    retry_after.as_secs()
                );
                tokio::time::sleep(retry_after).await;
            }
        }
    }
}
