//! Transaction submission with fee and nonce handling.

use alloy_core::primitives::{Address, Bytes, U256};
use anyhow::Context;

use crate::{
    error::DeployError,
    fees::{FeeConfig, FeeParams},
    nonce::NonceSequencer,
    provider::{Provider, TxReceipt, TxRequest},
    signer::{self, DeploySigner},
};

/// Fee and nonce fields attached to an outgoing transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxOverrides {
    pub fees: FeeParams,
    /// Nonce assigned by the sequencer. `None` lets the network assign it.
    pub nonce: Option<u64>,
}

/// Sends transactions on behalf of the run signer.
///
/// Every submission blocks until the transaction is included. Failures are returned as-is and
/// nothing is ever resubmitted, since a retry with a stale nonce cannot be made safe here.
pub struct Submitter<P> {
    provider: P,
    signer: DeploySigner,
    fees: FeeConfig,
    nonce_sequencer: Option<Box<dyn NonceSequencer>>,
}

impl<P: Provider> Submitter<P> {
    pub fn new(provider: P, signer: DeploySigner, fees: FeeConfig) -> anyhow::Result<Self> {
        fees.validate()?;
        Ok(Self {
            provider,
            signer,
            fees,
            nonce_sequencer: None,
        })
    }

    pub fn with_nonce_sequencer(mut self, sequencer: Box<dyn NonceSequencer>) -> Self {
        self.nonce_sequencer = Some(sequencer);
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn signer(&self) -> &DeploySigner {
        &self.signer
    }

    pub fn account(&self) -> Address {
        self.signer.address()
    }

    /// Resolve the fee scheme and, when a sequencer is configured, the nonce to use.
    pub async fn overrides(&self) -> anyhow::Result<TxOverrides> {
        let fees = self
            .fees
            .resolve(&self.provider)
            .await
            .context("Failed to resolve transaction fees")?;

        Ok(TxOverrides {
            fees,
            nonce: self
                .nonce_sequencer
                .as_ref()
                .map(|sequencer| sequencer.next_nonce()),
        })
    }

    /// Create a contract from `init_code` (linked bytecode followed by encoded constructor args).
    pub async fn deploy(&mut self, init_code: Bytes) -> anyhow::Result<TxReceipt> {
        let receipt = self.submit(None, init_code, U256::ZERO).await?;
        if receipt.contract_address.is_none() {
            return Err(DeployError::MissingContractAddress {
                tx_hash: receipt.transaction_hash,
            }
            .into());
        }
        Ok(receipt)
    }

    /// Send `value` wei and `data` to `to`.
    pub async fn send(
        &mut self,
        to: Address,
        data: Bytes,
        value: U256,
    ) -> anyhow::Result<TxReceipt> {
        self.submit(Some(to), data, value).await
    }

    async fn submit(
        &mut self,
        to: Option<Address>,
        data: Bytes,
        value: U256,
    ) -> anyhow::Result<TxReceipt> {
        let overrides = self.overrides().await?;
        let from = self.signer.address();

        let mut tx = TxRequest {
            from: Some(from),
            to,
            data,
            value,
            gas: None,
            nonce: overrides.nonce,
            fees: Some(overrides.fees),
        };
        let gas = self
            .provider
            .estimate_gas(&tx)
            .await
            .context("Failed to estimate gas")?;
        tx.gas = Some(gas);

        let tx_hash = match &self.signer {
            DeploySigner::Unlocked(_) => self
                .provider
                .send_transaction(&tx)
                .await
                .context("Failed to send transaction")?,
            DeploySigner::Local(key) => {
                let nonce = match tx.nonce {
                    Some(nonce) => nonce,
                    None => self.provider.transaction_count(from).await?,
                };
                let chain_id = self.provider.chain_id().await?;
                let raw = signer::sign_transaction(key, &tx, chain_id, nonce)?;
                self.provider
                    .send_raw_transaction(raw)
                    .await
                    .context("Failed to send raw transaction")?
            }
        };

        tracing::debug!(
            %tx_hash,
            %from,
            gas,
            nonce = ?tx.nonce,
            "Transaction submitted, waiting for inclusion..."
        );

        let receipt = self.provider.wait_for_receipt(tx_hash).await?;

        // An included transaction consumed its nonce, reverted or not.
        if let Some(sequencer) = self.nonce_sequencer.as_mut() {
            sequencer.advance();
        }

        if !receipt.status {
            return Err(DeployError::TransactionReverted { tx_hash }.into());
        }

        Ok(receipt)
    }
}
