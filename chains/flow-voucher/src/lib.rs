//! Flow Voucher - key-slot pool of Flow voucher minter clients
//!
//! One Flow admin account carries a range of account keys. Each key can have
//! exactly one transaction in flight, so minting concurrently means binding
//! one client to each key and leasing clients out under a strict
//! one-borrower-per-key rule.
//!
//! # Architecture
//!
//! - **[`KeySlots`]**: the fixed range of key indices, split into free and
//!   in-use sets
//! - **[`ClientFactory`]**: binds a [`VoucherClient`] to a free key index,
//!   validates it with a bounded ping and retires it (close, then free the
//!   index)
//! - **[`ClientPool`]**: bounded, blocking-with-timeout leasing with idle
//!   reuse and validation on create/borrow/return
//! - **[`VoucherMinterPool`]**: the minting and verification operations,
//!   each running on a borrowed client that is always given back
//! - **[`FlowRestClient`]**: the production client, speaking the access node
//!   REST API
//!
//! # Example
//!
//! ```rust,no_run
//! use flow_voucher::{FlowRestConnector, MinterConfig, TracingEventSink, VoucherMinterPool};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = MinterConfig::from_path("config/voucher-pool.toml")?;
//! let minter = VoucherMinterPool::with_config(
//!     FlowRestConnector::default(),
//!     config.client.clone(),
//!     config.pool.clone(),
//!     Arc::new(TracingEventSink),
//! )?;
//!
//! let result = minter
//!     .batch_mint_and_resolve_voucher(&["0xf8d6e0586b0a20c7".into()], &["landhash".into()])
//!     .await?;
//! if result.tokens.is_none() {
//!     // broadcast, but not resolved yet: keep the id and retry later
//!     let tokens = minter.resolve_batch_mint_voucher(&result.transaction_id).await?;
//!     println!("minted {} vouchers", tokens.len());
//! }
//!
//! minter.close().await;
//! # Ok(())
//! # }
//! ```

pub mod cadence;
pub mod client;
pub mod client_pool;
pub mod config;
pub mod error;
pub mod events;
pub mod factory;
pub mod key_slots;
pub mod minter_pool;
pub mod rest_client;

pub use client::{BatchMintResult, ClientConnector, VoucherClient, VoucherMetadata};
pub use client_pool::{ClientLease, ClientPool, PoolStats};
pub use config::{MinterConfig, PoolConfig, VoucherClientConfig};
pub use error::{ClientError, MinterError, MinterResult, PoolError, PoolResult};
pub use events::{DestroyReason, MemoryEventSink, PoolEvent, PoolEventSink, TracingEventSink};
pub use factory::ClientFactory;
pub use key_slots::{KeySlots, SlotSnapshot};
pub use minter_pool::VoucherMinterPool;
pub use rest_client::{
    FlowRestClient, FlowRestConnector, ProposalKey, SigningKey, TransactionSigner,
    UnsignedTransaction,
};
