use clap::Parser;
use std::path::PathBuf;

use crate::config::Settings;

/// Settle accumulated pool balances by batching them into wallet transfers
#[derive(Parser, Debug)]
#[command(name = "pool-payouts")]
#[command(about = "Settle pool balances through batched wallet transfers", long_about = None)]
pub struct CliArgs {
    /// JSON configuration file
    #[arg(long = "config", value_name = "FILE", help = "Path to the JSON config file")]
    pub config: PathBuf,

    /// Run one cycle and exit
    #[arg(long = "once", help = "Run a single payout cycle and exit")]
    pub once: bool,

    /// Override `payments.max_concurrent_transfers`
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Maximum number of transfers in flight (default: CPU cores)"
    )]
    pub max_concurrent: Option<usize>,

    /// Override `payments.interval_secs`
    #[arg(
        long = "interval",
        value_name = "SECS",
        help = "Seconds between the end of one cycle and the start of the next"
    )]
    pub interval: Option<u64>,
}

impl CliArgs {
    /// Apply command-line overrides on top of loaded settings
    ///
    /// Overrides go through the same validation as file values, so a zero
    /// concurrency falls back to the default with a warning.
    pub fn apply_overrides(&self, settings: Settings) -> Settings {
        let mut payments = settings.payments;
        if let Some(max_concurrent) = self.max_concurrent {
            payments.max_concurrent_transfers = max_concurrent;
        }
        if let Some(interval) = self.interval {
            payments.interval_secs = interval;
        }

        Settings {
            payments: payments.validated(),
            ..settings
        }
    }
}
