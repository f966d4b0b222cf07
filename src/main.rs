//! Pool payout processor
//!
//! Periodically scans pool account balances, batches the payable ones into
//! wallet transfers and records each settled payment in the ledger.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=info cargo run -- --config pool.json
//! RUST_LOG=info cargo run -- --config pool.json --once
//! cargo run -- --config pool.json --max-concurrent 4 --interval 60
//! ```
//!
//! # Exit Codes
//!
//! - 0: Success (`--once`), or never returns in service mode
//! - 1: Error (config unreadable, store unreachable, halted after a ledger failure, etc.)

use pool_payouts::config::Settings;
use pool_payouts::{cli, cycle};
use std::process;

fn main() {
    env_logger::init();

    let args = cli::parse_args();

    let settings = match Settings::load(&args.config) {
        Ok(settings) => args.apply_overrides(settings),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = cycle::run_service(settings, args.once) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
