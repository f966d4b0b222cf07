//! Scripted transfer service for testing without a wallet
//!
//! Responses are consumed FIFO (first pushed, first returned). When the script
//! is empty, every transfer succeeds with a fresh hash wrapped in `<`/`>`
//! delimiters, the way some wallets return it. Per-address failure rules take
//! priority over the script, which keeps tests deterministic when batches are
//! submitted concurrently.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::TransferService;
use crate::types::{Address, TransferError, TransferReceipt, TransferRequest};

#[derive(Debug)]
enum MockResponse {
    Reply(Result<TransferReceipt, TransferError>),
    /// Never answer
    Hang,
}

/// Transfer service double that records every request
#[derive(Debug, Default)]
pub struct MockTransfer {
    script: Mutex<VecDeque<MockResponse>>,
    address_failures: Mutex<HashMap<Address, TransferError>>,
    requests: Mutex<Vec<TransferRequest>>,
    calls: AtomicUsize,
}

impl MockTransfer {
    /// Create a mock that succeeds unless scripted otherwise
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply with the given raw hash
    pub fn push_success(&self, tx_hash: &str) {
        self.push(MockResponse::Reply(Ok(TransferReceipt {
            tx_hash: tx_hash.to_string(),
        })));
    }

    /// Queue a failed reply
    pub fn push_failure(&self, error: TransferError) {
        self.push(MockResponse::Reply(Err(error)));
    }

    /// Queue a call that never returns
    pub fn push_hang(&self) {
        self.push(MockResponse::Hang);
    }

    /// Fail every transfer that pays `address`
    pub fn fail_for_address(&self, address: &str, error: TransferError) {
        if let Ok(mut failures) = self.address_failures.lock() {
            failures.insert(address.to_string(), error);
        }
    }

    /// Remove every per-address failure rule
    pub fn clear_failures(&self) {
        if let Ok(mut failures) = self.address_failures.lock() {
            failures.clear();
        }
    }

    /// Every request received so far, in arrival order
    pub fn requests(&self) -> Vec<TransferRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Number of transfer calls received so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn push(&self, response: MockResponse) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(response);
        }
    }

    fn address_failure(&self, request: &TransferRequest) -> Option<TransferError> {
        let failures = self.address_failures.lock().ok()?;
        request
            .destinations
            .iter()
            .find_map(|d| failures.get(&d.address).cloned())
    }

    fn next_response(&self) -> Option<MockResponse> {
        self.script.lock().ok().and_then(|mut script| script.pop_front())
    }
}

#[async_trait]
impl TransferService for MockTransfer {
    async fn transfer(&self, request: &TransferRequest) -> Result<TransferReceipt, TransferError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if let Some(error) = self.address_failure(request) {
            return Err(error);
        }

        match self.next_response() {
            Some(MockResponse::Reply(reply)) => reply,
            Some(MockResponse::Hang) => {
                futures::future::pending::<()>().await;
                Err(TransferError::rpc("mock transfer hung"))
            }
            None => Ok(TransferReceipt {
                tx_hash: format!("<{:064x}>", call),
            }),
        }
    }
}
