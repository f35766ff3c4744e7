//! External nonce sequencing.

use alloy_core::primitives::Address;

use crate::provider::Provider;

/// Single authority for the nonce of the next submitted transaction.
///
/// The submitter reads [`NonceSequencer::next_nonce`] before signing and calls
/// [`NonceSequencer::advance`] exactly once after the transaction is included.
pub trait NonceSequencer: Send + Sync {
    fn next_nonce(&self) -> u64;

    fn advance(&mut self);
}

/// In-process sequencer counting from a starting nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalNonceSequencer {
    next: u64,
}

impl LocalNonceSequencer {
    pub fn new(next: u64) -> Self {
        Self { next }
    }

    /// Start from the current transaction count of `account`.
    pub async fn from_provider<P: Provider>(
        provider: &P,
        account: Address,
    ) -> anyhow::Result<Self> {
        let next = provider.transaction_count(account).await?;
        tracing::debug!(%account, nonce = next, "Nonce sequencer initialised");
        Ok(Self::new(next))
    }
}

impl NonceSequencer for LocalNonceSequencer {
    fn next_nonce(&self) -> u64 {
        self.next
    }

    fn advance(&mut self) {
        self.next += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_nonce_is_stable_until_advanced() {
        let mut sequencer = LocalNonceSequencer::new(41);
        assert_eq!(sequencer.next_nonce(), 41);
        assert_eq!(sequencer.next_nonce(), 41);

        sequencer.advance();
        assert_eq!(sequencer.next_nonce(), 42);
    }
}
