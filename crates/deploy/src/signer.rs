//! Transaction signing.

use alloy_consensus::{SignableTransaction, TxEip1559, TxLegacy};
use alloy_core::primitives::{Address, Bytes, TxKind};
use alloy_eips::eip2718::Encodable2718;
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use anyhow::Context;

use crate::{fees::FeeParams, provider::TxRequest};

/// The account a run deploys from.
#[derive(Debug, Clone)]
pub enum DeploySigner {
    /// Account unlocked on the node (local or forked networks). The node signs.
    Unlocked(Address),
    /// Key held by this process.
    Local(PrivateKeySigner),
}

impl DeploySigner {
    pub fn from_private_key(private_key: &str) -> anyhow::Result<Self> {
        let signer: PrivateKeySigner = private_key
            .trim()
            .parse()
            .context("Failed to parse private key")?;
        Ok(Self::Local(signer))
    }

    pub fn address(&self) -> Address {
        match self {
            Self::Unlocked(address) => *address,
            Self::Local(signer) => signer.address(),
        }
    }
}

/// Sign `tx` and return its EIP-2718 encoding.
///
/// The pricing scheme of `tx.fees` selects between a legacy and an EIP-1559 envelope.
pub fn sign_transaction(
    signer: &PrivateKeySigner,
    tx: &TxRequest,
    chain_id: u64,
    nonce: u64,
) -> anyhow::Result<Bytes> {
    let gas_limit = tx.gas.context("Gas limit must be set before signing")?;
    let fees = tx.fees.context("Fees must be set before signing")?;
    let to = tx.to.map_or(TxKind::Create, TxKind::Call);

    let encoded = match fees {
        FeeParams::Legacy { gas_price } => {
            let tx = TxLegacy {
                chain_id: Some(chain_id),
                nonce,
                gas_price,
                gas_limit,
                to,
                value: tx.value,
                input: tx.data.clone(),
            };
            let signature = signer
                .sign_hash_sync(&tx.signature_hash())
                .context("Failed to sign legacy transaction")?;
            tx.into_signed(signature).encoded_2718()
        }
        FeeParams::Eip1559 {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        } => {
            let tx = TxEip1559 {
                chain_id,
                nonce,
                gas_limit,
                max_fee_per_gas,
                max_priority_fee_per_gas,
                to,
                value: tx.value,
                access_list: Default::default(),
                input: tx.data.clone(),
            };
            let signature = signer
                .sign_hash_sync(&tx.signature_hash())
                .context("Failed to sign EIP-1559 transaction")?;
            tx.into_signed(signature).encoded_2718()
        }
    };

    Ok(encoded.into())
}
