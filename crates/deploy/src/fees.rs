//! Transaction fee parameters.

use serde::{Deserialize, Serialize};

use crate::{error::DeployError, provider::Provider};

/// Priority fee used when none is configured (1.5 gwei).
pub const DEFAULT_PRIORITY_FEE: u128 = 1_500_000_000;

/// Fee pricing of a transaction. Exactly one scheme applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeeParams {
    /// Single gas price, in wei.
    Legacy { gas_price: u128 },
    /// Fee cap and priority fee, in wei.
    Eip1559 {
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
    },
}

/// User supplied fee settings, in gwei.
///
/// `gas_price` selects legacy pricing and cannot be combined with the EIP-1559 values.
/// Missing values are derived from the network when a transaction is sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<f64>,
}

impl FeeConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.gas_price.is_some()
            && (self.max_fee_per_gas.is_some() || self.max_priority_fee_per_gas.is_some())
        {
            return Err(DeployError::InvalidFeeConfig {
                reason: "a legacy gas price cannot be combined with EIP-1559 fee values"
                    .to_string(),
            }
            .into());
        }

        for (name, value) in [
            ("gas_price", self.gas_price),
            ("max_fee_per_gas", self.max_fee_per_gas),
            ("max_priority_fee_per_gas", self.max_priority_fee_per_gas),
        ] {
            if let Some(value) = value {
                if !value.is_finite() || value < 0.0 {
                    return Err(DeployError::InvalidFeeConfig {
                        reason: format!("{name} must be a non-negative number of gwei, got {value}"),
                    }
                    .into());
                }
            }
        }

        Ok(())
    }

    /// Resolve the fee scheme for the next transaction.
    pub async fn resolve<P: Provider>(&self, provider: &P) -> anyhow::Result<FeeParams> {
        self.validate()?;

        if let Some(gas_price) = self.gas_price {
            return Ok(FeeParams::Legacy {
                gas_price: gwei_to_wei(gas_price),
            });
        }

        let fee_data = provider.fee_data().await?;
        Ok(self.apply(fee_data))
    }

    fn apply(&self, fee_data: crate::provider::FeeData) -> FeeParams {
        let configured_1559 =
            self.max_fee_per_gas.is_some() || self.max_priority_fee_per_gas.is_some();

        if fee_data.base_fee_per_gas.is_none() && !configured_1559 {
            return FeeParams::Legacy {
                gas_price: fee_data.gas_price,
            };
        }

        let max_priority_fee_per_gas = self
            .max_priority_fee_per_gas
            .map(gwei_to_wei)
            .unwrap_or(DEFAULT_PRIORITY_FEE);
        let max_fee_per_gas = match (self.max_fee_per_gas, fee_data.base_fee_per_gas) {
            (Some(max_fee), _) => gwei_to_wei(max_fee),
            (None, Some(base_fee)) => base_fee * 2 + max_priority_fee_per_gas,
            (None, None) => fee_data.gas_price.max(max_priority_fee_per_gas),
        };

        FeeParams::Eip1559 {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        }
    }
}

/// Convert a gwei amount to wei.
///
/// Rounds to whole wei to avoid floating-point noise.
pub fn gwei_to_wei(gwei: f64) -> u128 {
    (gwei * 1e9).round() as u128
}
