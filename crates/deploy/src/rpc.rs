//! Shared RPC utilities for interacting with Ethereum JSON-RPC endpoints.

use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes, U64, U128, U256};
use anyhow::Context;
use backon::{ConstantBuilder, Retryable};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use url::Url;

use crate::provider::{FeeData, Provider, TxReceipt, TxRequest};

/// Default timeout for RPC requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between two receipt lookups.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Number of receipt lookups before giving up on a transaction.
const RECEIPT_POLL_ATTEMPTS: usize = 600;

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client() -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// Make a JSON-RPC call and deserialize the result.
///
/// # Arguments
/// * `client` - The HTTP client to use
/// * `url` - The RPC endpoint URL
/// * `method` - The RPC method name
/// * `params` - The method parameters
///
/// # Returns
/// The deserialized result, or an error if the request failed or returned an error response.
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<T, anyhow::Error> {
    let response = client
        .post(url)
        .json(&json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .with_context(|| format!("Failed to send {} request", method))?;

    let result: Value = response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", method))?;

    if let Some(error) = result.get("error") {
        anyhow::bail!(
            "RPC error on {}: {}",
            method,
            error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown")
        );
    }

    let result_value = result
        .get("result")
        .context("No result in response")?
        .clone();

    serde_json::from_value(result_value)
        .with_context(|| format!("Failed to deserialize {} result", method))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcBlock {
    #[serde(default)]
    base_fee_per_gas: Option<U128>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    #[serde(default)]
    contract_address: Option<Address>,
    gas_used: U64,
    /// Absent on pre-Byzantium receipts.
    #[serde(default)]
    status: Option<U64>,
}

impl From<RpcReceipt> for TxReceipt {
    fn from(receipt: RpcReceipt) -> Self {
        Self {
            transaction_hash: receipt.transaction_hash,
            contract_address: receipt.contract_address,
            gas_used: receipt.gas_used.to::<u64>(),
            status: receipt.status.is_none_or(|status| status == U64::from(1)),
        }
    }
}

/// [`Provider`] backed by a JSON-RPC endpoint over HTTP.
#[derive(Debug, Clone)]
pub struct HttpProvider {
    client: reqwest::Client,
    url: Url,
}

impl HttpProvider {
    pub fn new(url: Url) -> anyhow::Result<Self> {
        Ok(Self {
            client: create_client()?,
            url,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn call_rpc<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> anyhow::Result<T> {
        json_rpc_call(&self.client, self.url.as_str(), method, params).await
    }
}

impl Provider for HttpProvider {
    async fn chain_id(&self) -> anyhow::Result<u64> {
        let chain_id: U64 = self.call_rpc("eth_chainId", vec![]).await?;
        Ok(chain_id.to::<u64>())
    }

    async fn transaction_count(&self, account: Address) -> anyhow::Result<u64> {
        let count: U64 = self
            .call_rpc(
                "eth_getTransactionCount",
                vec![json!(account), json!("pending")],
            )
            .await?;
        Ok(count.to::<u64>())
    }

    async fn code_at(&self, address: Address) -> anyhow::Result<Bytes> {
        self.call_rpc("eth_getCode", vec![json!(address), json!("latest")])
            .await
    }

    async fn balance(&self, account: Address) -> anyhow::Result<U256> {
        self.call_rpc("eth_getBalance", vec![json!(account), json!("latest")])
            .await
    }

    async fn fee_data(&self) -> anyhow::Result<FeeData> {
        let gas_price: U128 = self.call_rpc("eth_gasPrice", vec![]).await?;
        let block: Option<RpcBlock> = self
            .call_rpc("eth_getBlockByNumber", vec![json!("latest"), json!(false)])
            .await?;

        Ok(FeeData {
            gas_price: gas_price.to::<u128>(),
            base_fee_per_gas: block
                .and_then(|block| block.base_fee_per_gas)
                .map(|fee| fee.to::<u128>()),
        })
    }

    async fn estimate_gas(&self, tx: &TxRequest) -> anyhow::Result<u64> {
        let gas: U64 = self
            .call_rpc("eth_estimateGas", vec![tx.to_rpc_json()])
            .await?;
        Ok(gas.to::<u64>())
    }

    async fn call(&self, to: Address, data: Bytes) -> anyhow::Result<Bytes> {
        let tx = TxRequest {
            to: Some(to),
            data,
            ..Default::default()
        };
        self.call_rpc("eth_call", vec![tx.to_rpc_json(), json!("latest")])
            .await
    }

    async fn send_transaction(&self, tx: &TxRequest) -> anyhow::Result<B256> {
        self.call_rpc("eth_sendTransaction", vec![tx.to_rpc_json()])
            .await
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> anyhow::Result<B256> {
        self.call_rpc("eth_sendRawTransaction", vec![json!(raw)])
            .await
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> anyhow::Result<TxReceipt> {
        let fetch = || async move {
            let receipt: Option<RpcReceipt> = self
                .call_rpc("eth_getTransactionReceipt", vec![json!(tx_hash)])
                .await?;
            receipt.context("Transaction not yet included")
        };

        let receipt = fetch
            .retry(
                ConstantBuilder::default()
                    .with_delay(RECEIPT_POLL_INTERVAL)
                    .with_max_times(RECEIPT_POLL_ATTEMPTS),
            )
            .notify(|err, _| {
                tracing::trace!(error = %err, %tx_hash, "Receipt not available, polling again...");
            })
            .await
            .with_context(|| format!("Timeout waiting for receipt of transaction {tx_hash}"))?;

        Ok(receipt.into())
    }
}
