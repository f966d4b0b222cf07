//! Wallet JSON-RPC transfer client
//!
//! Sends settlement transactions to a wallet daemon's `transfer` method over
//! HTTP (`POST <url>/json_rpc`). The client never retries: a retried transfer
//! can pay the same batch twice.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::core::TransferService;
use crate::types::{TransferError, TransferReceipt, TransferRequest};

#[derive(Debug, Serialize)]
struct RpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: &'static str,
    method: &'a str,
    params: P,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<R> {
    result: Option<R>,
    error: Option<RpcErrorBody>,
}

impl<R> RpcResponse<R> {
    fn into_result(self) -> Result<R, TransferError> {
        if let Some(error) = self.error {
            return Err(TransferError::Rejected {
                code: error.code,
                message: error.message,
            });
        }
        self.result
            .ok_or_else(|| TransferError::malformed("response has neither result nor error"))
    }
}

/// HTTP JSON-RPC client for the wallet daemon
#[derive(Clone)]
pub struct WalletRpcClient {
    url: String,
    client: Client,
}

impl WalletRpcClient {
    /// Create a client for the wallet at `base`
    ///
    /// Only connection setup is bounded here. Whole-call timeouts are applied
    /// by the settlement executor, which treats them as an unknown outcome.
    pub fn new(base: &str, connect_timeout: Duration) -> Result<Self, TransferError> {
        let client = Client::builder().connect_timeout(connect_timeout).build()?;

        Ok(Self {
            url: format!("{}/json_rpc", base.trim_end_matches('/')),
            client,
        })
    }

    /// Endpoint the client posts to
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<P, R>(&self, method: &str, params: &P) -> Result<R, TransferError>
    where
        P: Serialize + Sync,
        R: DeserializeOwned,
    {
        let body = RpcRequest {
            jsonrpc: "2.0",
            id: "0",
            method,
            params,
        };

        let resp = self.client.post(&self.url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(TransferError::rpc(format!("{} failed {} {}", method, status, text)));
        }

        resp.json::<RpcResponse<R>>().await?.into_result()
    }
}

#[async_trait]
impl TransferService for WalletRpcClient {
    async fn transfer(&self, request: &TransferRequest) -> Result<TransferReceipt, TransferError> {
        self.call("transfer", request).await
    }
}
