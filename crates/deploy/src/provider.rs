//! Network access used by a deployment run.

use std::future::Future;

use alloy_core::primitives::{Address, B256, Bytes, U256};
use serde_json::{Map, Value, json};

use crate::fees::FeeParams;

/// A transaction before signing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxRequest {
    pub from: Option<Address>,
    /// `None` creates a contract.
    pub to: Option<Address>,
    pub data: Bytes,
    pub value: U256,
    pub gas: Option<u64>,
    pub nonce: Option<u64>,
    pub fees: Option<FeeParams>,
}

impl TxRequest {
    /// JSON object accepted by `eth_sendTransaction`, `eth_estimateGas` and `eth_call`.
    pub fn to_rpc_json(&self) -> Value {
        let mut tx = Map::new();

        if let Some(from) = self.from {
            tx.insert("from".to_string(), json!(from));
        }
        if let Some(to) = self.to {
            tx.insert("to".to_string(), json!(to));
        }
        tx.insert("data".to_string(), json!(self.data));
        tx.insert("value".to_string(), json!(format!("0x{:x}", self.value)));
        if let Some(gas) = self.gas {
            tx.insert("gas".to_string(), json!(format!("0x{:x}", gas)));
        }
        if let Some(nonce) = self.nonce {
            tx.insert("nonce".to_string(), json!(format!("0x{:x}", nonce)));
        }
        match self.fees {
            Some(FeeParams::Legacy { gas_price }) => {
                tx.insert("gasPrice".to_string(), json!(format!("0x{:x}", gas_price)));
            }
            Some(FeeParams::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            }) => {
                tx.insert(
                    "maxFeePerGas".to_string(),
                    json!(format!("0x{:x}", max_fee_per_gas)),
                );
                tx.insert(
                    "maxPriorityFeePerGas".to_string(),
                    json!(format!("0x{:x}", max_priority_fee_per_gas)),
                );
            }
            None => {}
        }

        Value::Object(tx)
    }
}

/// Fee market snapshot of the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeData {
    pub gas_price: u128,
    /// Base fee of the latest block, `None` on networks without EIP-1559.
    pub base_fee_per_gas: Option<u128>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub transaction_hash: B256,
    pub contract_address: Option<Address>,
    pub gas_used: u64,
    /// `false` if the transaction reverted.
    pub status: bool,
}

/// Read and write access to a chain.
///
/// [`crate::rpc::HttpProvider`] talks JSON-RPC over HTTP. Every method is a single
/// suspension point of a deployment run.
pub trait Provider: Send + Sync {
    fn chain_id(&self) -> impl Future<Output = anyhow::Result<u64>> + Send;

    /// Number of transactions sent by `account`, pending ones included.
    fn transaction_count(
        &self,
        account: Address,
    ) -> impl Future<Output = anyhow::Result<u64>> + Send;

    fn code_at(&self, address: Address) -> impl Future<Output = anyhow::Result<Bytes>> + Send;

    fn balance(&self, account: Address) -> impl Future<Output = anyhow::Result<U256>> + Send;

    fn fee_data(&self) -> impl Future<Output = anyhow::Result<FeeData>> + Send;

    fn estimate_gas(&self, tx: &TxRequest) -> impl Future<Output = anyhow::Result<u64>> + Send;

    /// Execute a read-only call against the latest state.
    fn call(
        &self,
        to: Address,
        data: Bytes,
    ) -> impl Future<Output = anyhow::Result<Bytes>> + Send;

    /// Submit a transaction signed by the node (unlocked account).
    fn send_transaction(
        &self,
        tx: &TxRequest,
    ) -> impl Future<Output = anyhow::Result<B256>> + Send;

    /// Submit a transaction signed locally.
    fn send_raw_transaction(
        &self,
        raw: Bytes,
    ) -> impl Future<Output = anyhow::Result<B256>> + Send;

    /// Block until the transaction is included and return its receipt.
    fn wait_for_receipt(
        &self,
        tx_hash: B256,
    ) -> impl Future<Output = anyhow::Result<TxReceipt>> + Send;
}
