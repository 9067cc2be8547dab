//! Pooled client abstraction
//!
//! A [`VoucherClient`] is one network handle bound for its whole life to a
//! single account key index. The pool never builds clients itself; it asks a
//! [`ClientConnector`] for one whenever a free key slot has to be filled.
//!
//! [`FlowRestConnector`](crate::FlowRestConnector) is the production
//! connector. Tests plug in in-memory connectors.

use crate::config::VoucherClientConfig;
use crate::error::ClientError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One voucher minted by a batch-mint transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherMetadata {
    /// NFT id assigned by the voucher contract
    pub token_id: u64,
    /// Content hash the voucher was minted for
    pub info_hash: String,
    /// Account the voucher was deposited to, when the deposit event was seen
    pub recipient: Option<String>,
}

/// Outcome of a submit-then-resolve batch mint.
///
/// `tokens` is `None` when the transaction was broadcast but could not be
/// resolved; the id is enough to resolve it again later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMintResult {
    pub transaction_id: String,
    pub tokens: Option<Vec<VoucherMetadata>>,
}

impl BatchMintResult {
    pub fn resolved(transaction_id: impl Into<String>, tokens: Vec<VoucherMetadata>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            tokens: Some(tokens),
        }
    }

    pub fn unresolved(transaction_id: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            tokens: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.tokens.is_some()
    }
}

/// A minter handle bound to one account key index.
#[async_trait]
pub trait VoucherClient: Send + Sync + 'static {
    /// Key index this handle signs with. Never changes.
    fn key_index(&self) -> u32;

    /// Cheap liveness probe against the access node.
    async fn ping(&self) -> Result<(), ClientError>;

    /// Release the underlying connection.
    ///
    /// Returns once the release has completed. Closing twice is a caller bug
    /// and reports [`ClientError::AlreadyClosed`].
    async fn close(&mut self) -> Result<(), ClientError>;

    /// Check `signatures` over `message_hex` against the keys `key_ids` of
    /// `account_address`.
    async fn verify_user_signature(
        &self,
        message_hex: &str,
        account_address: &str,
        key_ids: &[u32],
        signatures: &[String],
    ) -> Result<bool, ClientError>;

    /// Broadcast a batch mint and return its transaction id.
    async fn submit_batch_mint(
        &self,
        recipients: &[String],
        info_hashes: &[String],
    ) -> Result<String, ClientError>;

    /// Wait for `transaction_id` to seal and decode the minted vouchers.
    async fn resolve_batch_mint(
        &self,
        transaction_id: &str,
    ) -> Result<Vec<VoucherMetadata>, ClientError>;
}

/// Builds a [`VoucherClient`] from a per-slot configuration.
#[async_trait]
pub trait ClientConnector: Send + Sync + 'static {
    type Client: VoucherClient;

    async fn connect(&self, config: VoucherClientConfig) -> Result<Self::Client, ClientError>;
}
