#![allow(dead_code)]

use async_trait::async_trait;
use flow_voucher::{
    ClientConnector, ClientError, MemoryEventSink, PoolConfig, VoucherClient,
    VoucherClientConfig, VoucherMetadata, VoucherMinterPool,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Shared behaviour switches and observations of every [`MockClient`].
#[derive(Default)]
pub struct MockState {
    live: Mutex<HashSet<u32>>,
    busy: Mutex<HashSet<u32>>,
    failing_pings: Mutex<HashSet<u32>>,
    minted: Mutex<HashMap<String, Vec<VoucherMetadata>>>,
    tx_id: Mutex<Option<String>>,
    pub fail_connect: AtomicBool,
    pub fail_close: AtomicBool,
    pub fail_submit: AtomicBool,
    pub fail_resolve: AtomicBool,
    pub fail_verify: AtomicBool,
    pub mint_nothing: AtomicBool,
    pub op_delay_ms: AtomicU64,
    pub ping_delay_ms: AtomicU64,
    pub connects: AtomicUsize,
    pub closes: AtomicUsize,
    pub double_allocations: AtomicUsize,
    pub double_use: AtomicUsize,
    tx_counter: AtomicU64,
}

impl MockState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_ping(&self, key_index: u32) {
        self.failing_pings.lock().insert(key_index);
    }

    pub fn heal_ping(&self, key_index: u32) {
        self.failing_pings.lock().remove(&key_index);
    }

    /// Make every submission return this transaction id.
    pub fn set_tx_id(&self, tx_id: &str) {
        *self.tx_id.lock() = Some(tx_id.to_string());
    }

    /// Keys bound to a connected, unclosed client.
    pub fn live_keys(&self) -> Vec<u32> {
        let mut keys: Vec<u32> = self.live.lock().iter().copied().collect();
        keys.sort_unstable();
        keys
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    async fn enter(&self, key_index: u32) {
        if !self.busy.lock().insert(key_index) {
            self.double_use.fetch_add(1, Ordering::SeqCst);
        }
        let delay = self.op_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }

    fn exit(&self, key_index: u32) {
        self.busy.lock().remove(&key_index);
    }
}

pub struct MockClient {
    key_index: u32,
    state: Arc<MockState>,
    closed: bool,
}

#[async_trait]
impl VoucherClient for MockClient {
    fn key_index(&self) -> u32 {
        self.key_index
    }

    async fn ping(&self) -> Result<(), ClientError> {
        let delay = self.state.ping_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.closed {
            return Err(ClientError::Closed {
                key_index: self.key_index,
            });
        }
        if self.state.failing_pings.lock().contains(&self.key_index) {
            return Err(ClientError::Rpc("access node unreachable".to_string()));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        if self.closed {
            return Err(ClientError::AlreadyClosed {
                key_index: self.key_index,
            });
        }
        tokio::task::yield_now().await;
        self.closed = true;
        self.state.live.lock().remove(&self.key_index);
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_close.load(Ordering::SeqCst) {
            return Err(ClientError::Rpc("connection reset during close".to_string()));
        }
        Ok(())
    }

    async fn verify_user_signature(
        &self,
        _message_hex: &str,
        _account_address: &str,
        key_ids: &[u32],
        signatures: &[String],
    ) -> Result<bool, ClientError> {
        self.state.enter(self.key_index).await;
        self.state.exit(self.key_index);
        if self.state.fail_verify.load(Ordering::SeqCst) {
            return Err(ClientError::Rpc("script execution failed".to_string()));
        }
        Ok(!key_ids.is_empty() && key_ids.len() == signatures.len())
    }

    async fn submit_batch_mint(
        &self,
        recipients: &[String],
        info_hashes: &[String],
    ) -> Result<String, ClientError> {
        self.state.enter(self.key_index).await;
        self.state.exit(self.key_index);
        if self.state.fail_submit.load(Ordering::SeqCst) {
            return Err(ClientError::Rpc("transaction rejected".to_string()));
        }

        let tx_id = match self.state.tx_id.lock().clone() {
            Some(id) => id,
            None => format!(
                "tx-{}-{}",
                self.key_index,
                self.state.tx_counter.fetch_add(1, Ordering::SeqCst)
            ),
        };
        let vouchers = if self.state.mint_nothing.load(Ordering::SeqCst) {
            Vec::new()
        } else {
            recipients
                .iter()
                .zip(info_hashes)
                .enumerate()
                .map(|(i, (recipient, hash))| VoucherMetadata {
                    token_id: 1000 + i as u64,
                    info_hash: hash.clone(),
                    recipient: Some(recipient.clone()),
                })
                .collect()
        };
        self.state.minted.lock().insert(tx_id.clone(), vouchers);
        Ok(tx_id)
    }

    async fn resolve_batch_mint(
        &self,
        transaction_id: &str,
    ) -> Result<Vec<VoucherMetadata>, ClientError> {
        self.state.enter(self.key_index).await;
        self.state.exit(self.key_index);
        if self.state.fail_resolve.load(Ordering::SeqCst) {
            return Err(ClientError::NotSealed {
                transaction_id: transaction_id.to_string(),
                status: "Pending".to_string(),
            });
        }
        Ok(self
            .state
            .minted
            .lock()
            .get(transaction_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Clone)]
pub struct MockConnector {
    pub state: Arc<MockState>,
}

impl MockConnector {
    pub fn new(state: &Arc<MockState>) -> Self {
        Self {
            state: state.clone(),
        }
    }
}

#[async_trait]
impl ClientConnector for MockConnector {
    type Client = MockClient;

    async fn connect(&self, config: VoucherClientConfig) -> Result<MockClient, ClientError> {
        tokio::task::yield_now().await;
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(ClientError::Rpc("connection refused".to_string()));
        }
        if !self.state.live.lock().insert(config.key_index) {
            self.state.double_allocations.fetch_add(1, Ordering::SeqCst);
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(MockClient {
            key_index: config.key_index,
            state: self.state.clone(),
            closed: false,
        })
    }
}

pub fn base_config() -> VoucherClientConfig {
    VoucherClientConfig {
        host: "localhost".to_string(),
        port: 8888,
        private_key_hex: "a996c6d610d93faf82ad5b15407b66d3a2b72a284b5c2fd4097b5a3e735a79e1"
            .to_string(),
        key_index: 0,
        voucher_address: "0x01cf0e2f2f715450".to_string(),
        non_fungible_token_address: "0xf8d6e0586b0a20c7".to_string(),
        fungible_token_address: "0xee82856bf20e2aa6".to_string(),
        fusd_address: "0xf8d6e0586b0a20c7".to_string(),
        flow_token_address: "0x0ae53cb6e3f42a79".to_string(),
        admin_account_address: "0x01cf0e2f2f715450".to_string(),
        wait_for_seal_tries: 3,
        seal_poll_interval_ms: 10,
    }
}

pub fn minter(
    state: &Arc<MockState>,
    pool_config: PoolConfig,
) -> (VoucherMinterPool<MockConnector>, Arc<MemoryEventSink>) {
    let events = MemoryEventSink::new();
    let minter = VoucherMinterPool::with_config(
        MockConnector::new(state),
        base_config(),
        pool_config,
        events.clone(),
    )
    .expect("valid pool config");
    (minter, events)
}

pub fn recipients(n: usize) -> (Vec<String>, Vec<String>) {
    (
        (0..n).map(|i| format!("0x{:016x}", i + 1)).collect(),
        (0..n).map(|i| format!("landhash-{}", i)).collect(),
    )
}
