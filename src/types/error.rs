//! Error types for the payout processor
//!
//! This module defines all error types that can occur while settling payouts.
//! Errors carry enough context to tell an operator what failed and whether
//! the failure is safe to leave to the next cycle.
//!
//! # Error Categories
//!
//! - **Store Errors**: The ledger store could not be reached or rejected a command
//! - **Transfer Errors**: The transfer service failed or returned garbage
//! - **Settlement Errors**: Per-batch failures, including the fatal
//!   ledger-update-after-transfer case
//! - **Config Errors**: The configuration file is missing or malformed

use thiserror::Error;

/// Errors raised by a ledger store adapter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store could not be reached (connection refused, dropped, timed out)
    ///
    /// Recoverable: the affected cycle is aborted with no mutation and
    /// retried at the next interval.
    #[error("Store unavailable: {message}")]
    Unavailable {
        /// Description of the connection failure
        message: String,
    },

    /// The store answered but the command failed
    #[error("Store command '{command}' failed: {message}")]
    Command {
        /// Command or operation that failed
        command: String,
        /// Description of the failure
        message: String,
    },
}

impl StoreError {
    /// Create an Unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        StoreError::Unavailable {
            message: message.into(),
        }
    }

    /// Create a Command error
    pub fn command(command: &str, message: impl Into<String>) -> Self {
        StoreError::Command {
            command: command.to_string(),
            message: message.into(),
        }
    }
}

// Conversion from redis::RedisError to StoreError
impl From<redis::RedisError> for StoreError {
    fn from(error: redis::RedisError) -> Self {
        if error.is_io_error() || error.is_connection_refusal() || error.is_timeout() {
            StoreError::unavailable(error.to_string())
        } else {
            StoreError::command(error.code().unwrap_or("redis"), error.to_string())
        }
    }
}

/// Errors raised by a transfer service adapter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    /// Transport-level failure talking to the transfer service
    #[error("Transfer RPC failed: {message}")]
    Rpc {
        /// Description of the transport failure
        message: String,
    },

    /// The transfer service refused the request
    #[error("Transfer rejected (code {code}): {message}")]
    Rejected {
        /// Service error code
        code: i64,
        /// Service error message
        message: String,
    },

    /// The response could not be understood
    ///
    /// The service answered, so the transfer may have gone through.
    #[error("Malformed transfer response: {message}")]
    MalformedResponse {
        /// What was wrong with the response
        message: String,
    },

    /// The request was sent but the response was lost in transit
    ///
    /// The outcome is unknown: the transfer may still have gone through.
    #[error("Transfer interrupted after sending: {message}")]
    Interrupted {
        /// Description of the transport failure
        message: String,
    },

    /// No response within the configured timeout
    ///
    /// The outcome is unknown: the transfer may still have gone through.
    #[error("Transfer timed out after {secs}s")]
    Timeout {
        /// Timeout that elapsed, in seconds
        secs: u64,
    },
}

impl TransferError {
    /// Create an Rpc error
    pub fn rpc(message: impl Into<String>) -> Self {
        TransferError::Rpc {
            message: message.into(),
        }
    }

    /// Create a MalformedResponse error
    pub fn malformed(message: impl Into<String>) -> Self {
        TransferError::MalformedResponse {
            message: message.into(),
        }
    }

    /// Create an Interrupted error
    pub fn interrupted(message: impl Into<String>) -> Self {
        TransferError::Interrupted {
            message: message.into(),
        }
    }

    /// Whether the transfer may have been executed despite the error
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            TransferError::Timeout { .. }
                | TransferError::MalformedResponse { .. }
                | TransferError::Interrupted { .. }
        )
    }
}

// Conversion from reqwest::Error to TransferError
impl From<reqwest::Error> for TransferError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_connect() || error.is_builder() {
            // Never reached the wallet
            TransferError::rpc(error.to_string())
        } else if error.is_decode() {
            TransferError::malformed(error.to_string())
        } else {
            TransferError::interrupted(error.to_string())
        }
    }
}

/// Per-batch settlement failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettlementError {
    /// The transfer call failed; no store mutation was made
    ///
    /// Recoverable: balances are untouched so the payout is simply
    /// reattempted next cycle.
    #[error("Batch {batch} transfer failed: {source}")]
    TransferSubmitFailed {
        /// Index of the batch within its cycle
        batch: usize,
        /// Underlying transfer failure
        #[source]
        source: TransferError,
    },

    /// Funds were sent but the store update failed
    ///
    /// FATAL. Balances were not debited, so the same funds will be paid
    /// again next cycle unless an operator reconciles the ledger by hand.
    /// Never retried automatically.
    #[error("Batch {batch} sent as {tx_hash} but ledger update failed, double payment likely: {source}")]
    LedgerUpdateAfterTransfer {
        /// Index of the batch within its cycle
        batch: usize,
        /// Hash of the transfer that already went out
        tx_hash: String,
        /// Underlying store failure
        #[source]
        source: StoreError,
    },
}

impl SettlementError {
    /// Create a TransferSubmitFailed error
    pub fn transfer_submit_failed(batch: usize, source: TransferError) -> Self {
        SettlementError::TransferSubmitFailed { batch, source }
    }

    /// Create a LedgerUpdateAfterTransfer error
    pub fn ledger_update_after_transfer(batch: usize, tx_hash: &str, source: StoreError) -> Self {
        SettlementError::LedgerUpdateAfterTransfer {
            batch,
            tx_hash: tx_hash.to_string(),
            source,
        }
    }

    /// Whether funds may have left without the ledger knowing
    pub fn is_ambiguous(&self) -> bool {
        match self {
            SettlementError::TransferSubmitFailed { source, .. } => source.is_ambiguous(),
            SettlementError::LedgerUpdateAfterTransfer { .. } => false,
        }
    }

    /// Whether this error requires manual reconciliation
    pub fn is_fatal(&self) -> bool {
        matches!(self, SettlementError::LedgerUpdateAfterTransfer { .. })
    }
}

/// Errors loading or validating configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Cannot read config file {path}: {message}")]
    Io {
        /// Path that was read
        path: String,
        /// Description of the I/O error
        message: String,
    },

    /// The configuration file is not valid JSON for the expected schema
    #[error("Invalid config: {message}")]
    Parse {
        /// Description of the parse error
        message: String,
    },
}

// Conversion from serde_json::Error to ConfigError
impl From<serde_json::Error> for ConfigError {
    fn from(error: serde_json::Error) -> Self {
        ConfigError::Parse {
            message: error.to_string(),
        }
    }
}

/// Top-level error type for the payout processor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayoutError {
    /// A pipeline stage could not read from the store
    #[error("Store unavailable during {stage}: {source}")]
    StoreUnavailable {
        /// Pipeline stage that failed
        stage: String,
        /// Underlying store failure
        #[source]
        source: StoreError,
    },

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The transfer service client could not be set up
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// The async runtime could not be created
    #[error("Runtime error: {message}")]
    Runtime {
        /// Description of the runtime failure
        message: String,
    },

    /// The service stopped after a ledger update failed and halting was requested
    #[error("Halted after {count} unreconciled ledger failure(s)")]
    Halted {
        /// Ledger failures seen in the halting cycle
        count: usize,
    },
}

impl PayoutError {
    /// Create a StoreUnavailable error
    pub fn store_unavailable(stage: &str, source: StoreError) -> Self {
        PayoutError::StoreUnavailable {
            stage: stage.to_string(),
            source,
        }
    }
}

// Conversion from io::Error to PayoutError
impl From<std::io::Error> for PayoutError {
    fn from(error: std::io::Error) -> Self {
        PayoutError::Runtime {
            message: error.to_string(),
        }
    }
}
