//! Voucher minter pool
//!
//! Every operation borrows a client, runs one call (or the submit+resolve
//! pair) on it and releases it on every exit path. Client failures come back
//! as [`MinterError::OperationFailed`] with the key index and the original
//! cause.

use crate::client::{BatchMintResult, ClientConnector, VoucherClient, VoucherMetadata};
use crate::client_pool::{ClientLease, ClientPool};
use crate::config::{PoolConfig, VoucherClientConfig};
use crate::error::{ClientError, MinterError, MinterResult, PoolResult};
use crate::events::{PoolEvent, PoolEventSink, TracingEventSink};
use std::sync::Arc;

pub struct VoucherMinterPool<C: ClientConnector> {
    pool: ClientPool<C>,
    events: Arc<dyn PoolEventSink>,
}

impl<C: ClientConnector> Clone for VoucherMinterPool<C> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            events: self.events.clone(),
        }
    }
}

impl<C: ClientConnector> VoucherMinterPool<C> {
    /// Pool over keys `[key_start_index, key_start_index + key_capacity)` with
    /// default pool settings, logging through `tracing`.
    pub fn new(
        key_start_index: u32,
        key_capacity: u32,
        base_config: VoucherClientConfig,
        connector: C,
    ) -> PoolResult<Self> {
        Self::with_config(
            connector,
            base_config,
            PoolConfig::new(key_start_index, key_capacity),
            Arc::new(TracingEventSink),
        )
    }

    pub fn with_config(
        connector: C,
        base_config: VoucherClientConfig,
        pool_config: PoolConfig,
        events: Arc<dyn PoolEventSink>,
    ) -> PoolResult<Self> {
        let pool = ClientPool::new(connector, base_config, pool_config, events.clone())?;
        Ok(Self { pool, events })
    }

    pub fn pool(&self) -> &ClientPool<C> {
        &self.pool
    }

    /// Check user signatures over `message_hex` against the given account keys.
    pub async fn verify_user_signature(
        &self,
        message_hex: &str,
        account_address: &str,
        key_ids: &[u32],
        signatures: &[String],
    ) -> MinterResult<bool> {
        let client = self.pool.borrow().await?;
        let result = client
            .verify_user_signature(message_hex, account_address, key_ids, signatures)
            .await;
        self.finish(client, "verify_user_signature", result).await
    }

    /// Submit a batch mint and return the transaction id without waiting for it.
    pub async fn batch_mint_voucher(
        &self,
        recipients: &[String],
        info_hashes: &[String],
    ) -> MinterResult<String> {
        let client = self.pool.borrow().await?;
        let result = client.submit_batch_mint(recipients, info_hashes).await;
        let transaction_id = self.finish(client, "batch_mint_voucher", result).await?;
        if transaction_id.is_empty() {
            return Err(MinterError::EmptyTransactionId {
                operation: "batch_mint_voucher",
            });
        }
        Ok(transaction_id)
    }

    /// Wait for a submitted batch mint to seal and decode its vouchers.
    pub async fn resolve_batch_mint_voucher(
        &self,
        transaction_id: &str,
    ) -> MinterResult<Vec<VoucherMetadata>> {
        let client = self.pool.borrow().await?;
        let result = client.resolve_batch_mint(transaction_id).await;
        self.finish(client, "resolve_batch_mint_voucher", result).await
    }

    /// Submit a batch mint, then resolve it
    ///
    /// Fails when nothing was broadcast. Once a transaction id exists the
    /// result is always returned; if resolution fails, `tokens` is `None` and
    /// the id can be passed to [`resolve_batch_mint_voucher`](Self::resolve_batch_mint_voucher)
    /// later.
    pub async fn batch_mint_and_resolve_voucher(
        &self,
        recipients: &[String],
        info_hashes: &[String],
    ) -> MinterResult<BatchMintResult> {
        const OPERATION: &str = "batch_mint_and_resolve_voucher";

        let client = self.pool.borrow().await?;
        let transaction_id = match client.submit_batch_mint(recipients, info_hashes).await {
            Ok(id) if id.is_empty() => {
                client.release().await;
                return Err(MinterError::EmptyTransactionId {
                    operation: OPERATION,
                });
            }
            Ok(id) => id,
            Err(e) => return self.finish(client, OPERATION, Err(e)).await,
        };

        let resolved = client.resolve_batch_mint(&transaction_id).await;
        client.release().await;

        match resolved {
            Ok(tokens) => Ok(BatchMintResult::resolved(transaction_id, tokens)),
            Err(e) => {
                self.events.record(PoolEvent::ResolutionDeferred {
                    transaction_id: transaction_id.clone(),
                    error: e.to_string(),
                });
                Ok(BatchMintResult::unresolved(transaction_id))
            }
        }
    }

    /// Mint one voucher and wait for it, on a single borrowed client.
    ///
    /// A failed resolution after a successful submit is
    /// [`MinterError::Unresolved`], which keeps the transaction id.
    pub async fn mint_voucher(
        &self,
        recipient: &str,
        info_hash: &str,
    ) -> MinterResult<VoucherMetadata> {
        let client = self.pool.borrow().await?;
        let recipients = [recipient.to_string()];
        let info_hashes = [info_hash.to_string()];

        let transaction_id = match client.submit_batch_mint(&recipients, &info_hashes).await {
            Ok(id) if id.is_empty() => {
                client.release().await;
                return Err(MinterError::EmptyTransactionId {
                    operation: "mint_voucher",
                });
            }
            Ok(id) => id,
            Err(e) => return self.finish(client, "mint_voucher", Err(e)).await,
        };

        let key_index = client.key_index();
        let result = client.resolve_batch_mint(&transaction_id).await;
        client.release().await;

        let tokens = match result {
            Ok(tokens) => tokens,
            Err(source) => {
                self.events.record(PoolEvent::ResolutionDeferred {
                    transaction_id: transaction_id.clone(),
                    error: source.to_string(),
                });
                return Err(MinterError::Unresolved {
                    transaction_id,
                    key_index,
                    source,
                });
            }
        };
        tokens
            .into_iter()
            .next()
            .ok_or(MinterError::NothingMinted { transaction_id })
    }

    /// Close the underlying pool. See [`ClientPool::close`].
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Release `client` and wrap a client failure.
    async fn finish<T>(
        &self,
        client: ClientLease<C>,
        operation: &'static str,
        result: Result<T, ClientError>,
    ) -> MinterResult<T> {
        let key_index = client.key_index();
        client.release().await;

        result.map_err(|source| {
            self.events.record(PoolEvent::OperationFailed {
                operation,
                key_index,
                error: source.to_string(),
            });
            MinterError::OperationFailed {
                operation,
                key_index,
                source,
            }
        })
    }
}
