//! Client Pool - bounded leasing of key-bound minter clients
//!
//! # Architecture
//!
//! The pool lends out [`VoucherClient`]s through an RAII [`ClientLease`]:
//!
//! 1. **Permit**: [`ClientPool::borrow`] waits for one of `capacity` semaphore
//!    permits, bounded by the acquire timeout
//! 2. **Reuse**: the oldest idle client is re-validated and handed out
//! 3. **Create**: with nothing idle, the [`ClientFactory`] binds a new client
//!    to a free key index
//! 4. **Return**: [`ClientLease::release`] (or dropping the lease) parks the
//!    client as idle, or destroys it when the idle list is full, the pool is
//!    closed or return-validation fails
//! 5. **Wake-up**: the permit is given back only after that bookkeeping, which
//!    wakes exactly one waiting borrower
//!
//! # Concurrency Model
//!
//! - **Semaphore** is the only place a borrower suspends
//! - **Mutex** (`parking_lot`) guards the idle list, borrow count and closed
//!   flag; it is never held across an `.await`
//! - Key slots live in the factory behind their own mutex
//!
//! Every client alive is either idle, on loan to exactly one lease, or being
//! checked out or retired by a task that holds its permit. Together with the
//! key slots this bounds live clients by `capacity` and keeps key indices
//! unique.
//!
//! # Example
//!
//! ```rust,no_run
//! use flow_voucher::{ClientPool, FlowRestConnector, MinterConfig, TracingEventSink, VoucherClient};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = MinterConfig::from_path("config/voucher-pool.toml")?;
//! let pool = ClientPool::new(
//!     FlowRestConnector::default(),
//!     config.client.clone(),
//!     config.pool.clone(),
//!     Arc::new(TracingEventSink),
//! )?;
//!
//! let lease = pool.borrow().await?;
//! lease.ping().await?;
//! lease.release().await;
//!
//! pool.close().await;
//! # Ok(())
//! # }
//! ```

use crate::client::{ClientConnector, VoucherClient};
use crate::config::{PoolConfig, VoucherClientConfig};
use crate::error::{PoolError, PoolResult};
use crate::events::{DestroyReason, PoolEvent, PoolEventSink};
use crate::factory::ClientFactory;
use crate::key_slots::SlotSnapshot;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Semaphore, TryAcquireError};

struct PoolState<T> {
    idle: VecDeque<T>,
    borrowed: usize,
    closed: bool,
}

struct PoolInner<C: ClientConnector> {
    factory: ClientFactory<C>,
    config: PoolConfig,
    state: Mutex<PoolState<C::Client>>,
    permits: Semaphore,
}

/// Counters of a [`ClientPool`] at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub capacity: u32,
    pub idle: usize,
    pub borrowed: usize,
    /// Key indices not bound to any live client
    pub free_slots: usize,
    pub created: u64,
    pub destroyed: u64,
}

/// Bounded pool of [`VoucherClient`]s, one per key index.
///
/// Cheap to clone; clones share the same pool.
pub struct ClientPool<C: ClientConnector> {
    inner: Arc<PoolInner<C>>,
}

impl<C: ClientConnector> Clone for ClientPool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// RAII guard for a borrowed client
///
/// Derefs to the client. Call [`release`](Self::release) when done; a lease
/// that is simply dropped is returned as well, on a spawned task when the
/// return needs to await anything.
pub struct ClientLease<C: ClientConnector> {
    client: Option<C::Client>,
    key_index: u32,
    waited: Duration,
    pool: Arc<PoolInner<C>>,
}

impl<C: ClientConnector> ClientLease<C> {
    /// Key index of the leased client.
    pub fn key_index(&self) -> u32 {
        self.key_index
    }

    /// Time spent in [`ClientPool::borrow`] before this lease was granted.
    pub fn waited(&self) -> Duration {
        self.waited
    }

    /// Return the client to the pool and wait until it is parked or retired.
    pub async fn release(mut self) {
        let Some(client) = self.client.take() else {
            return;
        };
        let Some(client) = self.pool.park(client, false) else {
            return;
        };

        // Retire on its own task so cancelling this future cannot strand the slot.
        let pool = self.pool.clone();
        if let Err(e) = tokio::spawn(async move { pool.settle(client).await }).await {
            tracing::error!(
                target: "voucher_pool",
                key_index = self.key_index,
                "Client return task failed: {}",
                e
            );
        }
    }
}

impl<C: ClientConnector> Drop for ClientLease<C> {
    fn drop(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };
        let Some(client) = self.pool.park(client, false) else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let pool = self.pool.clone();
                handle.spawn(async move { pool.settle(client).await });
            }
            Err(_) => {
                tracing::warn!(
                    target: "voucher_pool",
                    key_index = self.key_index,
                    "ClientLease dropped outside a Tokio runtime; discarding client without close"
                );
                self.pool.factory.discard(client);
                self.pool.finish_return();
            }
        }
    }
}

impl<C: ClientConnector> Deref for ClientLease<C> {
    type Target = C::Client;

    fn deref(&self) -> &Self::Target {
        match &self.client {
            Some(client) => client,
            None => unreachable!("lease client is only taken on release"),
        }
    }
}

/// A client between the idle list (or the factory) and a lease.
///
/// Dropped mid-flight, for example when a borrow is cancelled during
/// validation, it gives the key index back.
struct CheckedOut<'a, C: ClientConnector> {
    factory: &'a ClientFactory<C>,
    client: Option<C::Client>,
}

impl<'a, C: ClientConnector> CheckedOut<'a, C> {
    fn new(factory: &'a ClientFactory<C>, client: C::Client) -> Self {
        Self {
            factory,
            client: Some(client),
        }
    }

    async fn validate(&self) -> bool {
        match &self.client {
            Some(client) => self.factory.validate(client).await,
            None => false,
        }
    }

    fn take(mut self) -> Option<C::Client> {
        self.client.take()
    }
}

impl<C: ClientConnector> Drop for CheckedOut<'_, C> {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            self.factory.discard(client);
        }
    }
}

impl<C: ClientConnector> PoolInner<C> {
    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Park `client` as idle if the pool is open, has room, and either
    /// return-validation is off or the client already passed it.
    ///
    /// Hands the client back when it has to be settled asynchronously.
    fn park(&self, client: C::Client, validated: bool) -> Option<C::Client> {
        if self.config.test_on_return && !validated {
            return Some(client);
        }

        let key_index = client.key_index();
        {
            let mut state = self.state.lock();
            if state.closed || state.idle.len() >= self.config.max_idle() {
                return Some(client);
            }
            state.idle.push_back(client);
            state.borrowed = state.borrowed.saturating_sub(1);
        }

        self.permits.add_permits(1);
        self.factory
            .events()
            .record(PoolEvent::ClientReturned { key_index });
        None
    }

    /// Finish returning a client that could not be parked right away.
    async fn settle(&self, client: C::Client) {
        let (client, reason) = if self.is_closed() {
            (client, DestroyReason::Shutdown)
        } else if self.config.test_on_return {
            let checked = CheckedOut::new(&self.factory, client);
            let healthy = checked.validate().await;
            let Some(client) = checked.take() else {
                return;
            };
            if !healthy {
                (client, DestroyReason::FailedValidation)
            } else {
                match self.park(client, true) {
                    None => return,
                    Some(client) => (client, self.overflow_reason()),
                }
            }
        } else {
            (client, self.overflow_reason())
        };

        let _ = self.factory.destroy(client, reason).await;
        self.finish_return();
    }

    fn overflow_reason(&self) -> DestroyReason {
        if self.is_closed() {
            DestroyReason::Shutdown
        } else {
            DestroyReason::IdleOverflow
        }
    }

    /// Bookkeeping for a borrowed client that has been retired.
    fn finish_return(&self) {
        {
            let mut state = self.state.lock();
            state.borrowed = state.borrowed.saturating_sub(1);
        }
        self.permits.add_permits(1);
    }

    /// Hand out an idle client or create one. Caller holds a permit.
    async fn check_out(&self) -> PoolResult<C::Client> {
        loop {
            let idle = {
                let mut state = self.state.lock();
                if state.closed {
                    return Err(PoolError::Closed);
                }
                state.idle.pop_front()
            };

            match idle {
                Some(client) => {
                    if !self.config.test_on_borrow {
                        return Ok(client);
                    }
                    let checked = CheckedOut::new(&self.factory, client);
                    let healthy = checked.validate().await;
                    let Some(client) = checked.take() else {
                        continue;
                    };
                    if healthy {
                        return Ok(client);
                    }
                    let _ = self
                        .factory
                        .destroy(client, DestroyReason::FailedValidation)
                        .await;
                }
                None => {
                    let client = self.factory.create().await?;
                    if !self.config.test_on_create {
                        return Ok(client);
                    }
                    let key_index = client.key_index();
                    let checked = CheckedOut::new(&self.factory, client);
                    let healthy = checked.validate().await;
                    let Some(client) = checked.take() else {
                        return Err(PoolError::CreateValidation { key_index });
                    };
                    if healthy {
                        return Ok(client);
                    }
                    let _ = self
                        .factory
                        .destroy(client, DestroyReason::CreateValidation)
                        .await;
                    return Err(PoolError::CreateValidation { key_index });
                }
            }
        }
    }
}

impl<C: ClientConnector> ClientPool<C> {
    /// Creates a pool over `config.key_start_index..+config.key_capacity`.
    ///
    /// No client is connected until the first borrow. A config that fails
    /// [`PoolConfig::validate`] is rejected with [`PoolError::InvalidConfig`].
    pub fn new(
        connector: C,
        base_config: VoucherClientConfig,
        config: PoolConfig,
        events: Arc<dyn PoolEventSink>,
    ) -> PoolResult<Self> {
        config.validate()?;
        let factory = ClientFactory::new(
            connector,
            base_config,
            config.key_start_index,
            config.key_capacity,
            config.validation_timeout(),
            events,
        )?;
        let permits = Semaphore::new(config.key_capacity as usize);

        Ok(Self {
            inner: Arc::new(PoolInner {
                factory,
                config,
                state: Mutex::new(PoolState {
                    idle: VecDeque::new(),
                    borrowed: 0,
                    closed: false,
                }),
                permits,
            }),
        })
    }

    /// Borrow a client, waiting up to the acquire timeout when all are in use
    ///
    /// # Errors
    ///
    /// - [`PoolError::AcquireTimeout`] - saturated for the whole timeout (or
    ///   at once when `block_when_exhausted` is off)
    /// - [`PoolError::Closed`] - the pool was closed before or while waiting
    /// - [`PoolError::Connect`] / [`PoolError::CreateValidation`] - a new client
    ///   could not be brought up
    pub async fn borrow(&self) -> PoolResult<ClientLease<C>> {
        let inner = &self.inner;
        let started = Instant::now();
        if inner.is_closed() {
            return Err(PoolError::Closed);
        }

        let permit = if inner.config.block_when_exhausted {
            match tokio::time::timeout(inner.config.acquire_timeout(), inner.permits.acquire())
                .await
            {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => return Err(PoolError::Closed),
                Err(_) => {
                    let waited = started.elapsed();
                    inner
                        .factory
                        .events()
                        .record(PoolEvent::AcquireTimedOut { waited });
                    return Err(PoolError::AcquireTimeout { waited });
                }
            }
        } else {
            match inner.permits.try_acquire() {
                Ok(permit) => permit,
                Err(TryAcquireError::Closed) => return Err(PoolError::Closed),
                Err(TryAcquireError::NoPermits) => {
                    inner
                        .factory
                        .events()
                        .record(PoolEvent::AcquireTimedOut {
                            waited: Duration::ZERO,
                        });
                    return Err(PoolError::AcquireTimeout {
                        waited: Duration::ZERO,
                    });
                }
            }
        };

        // An error here drops the permit and frees the capacity unit.
        let client = inner.check_out().await?;
        permit.forget();

        let closed = {
            let mut state = inner.state.lock();
            state.borrowed += 1;
            state.closed
        };
        if closed {
            inner.settle(client).await;
            return Err(PoolError::Closed);
        }

        let key_index = client.key_index();
        let waited = started.elapsed();
        inner
            .factory
            .events()
            .record(PoolEvent::ClientBorrowed { key_index, waited });

        Ok(ClientLease {
            client: Some(client),
            key_index,
            waited,
            pool: inner.clone(),
        })
    }

    /// Close the pool
    ///
    /// Idle clients are destroyed now, clients on loan when their lease comes
    /// back. Waiting and later borrows fail with [`PoolError::Closed`].
    /// Calling it again is a no-op.
    pub async fn close(&self) {
        let idle: Vec<C::Client> = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.idle.drain(..).collect()
        };
        self.inner.permits.close();

        let factory = &self.inner.factory;
        futures::future::join_all(
            idle.into_iter()
                .map(|client| factory.destroy(client, DestroyReason::Shutdown)),
        )
        .await;

        factory.events().record(PoolEvent::PoolClosed);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    pub fn stats(&self) -> PoolStats {
        let (idle, borrowed) = {
            let state = self.inner.state.lock();
            (state.idle.len(), state.borrowed)
        };
        let factory = &self.inner.factory;
        PoolStats {
            capacity: factory.capacity(),
            idle,
            borrowed,
            free_slots: factory.free_slots(),
            created: factory.created_count(),
            destroyed: factory.destroyed_count(),
        }
    }

    /// Borrows that would currently succeed without waiting.
    pub fn available_count(&self) -> usize {
        self.inner.permits.available_permits()
    }

    pub fn capacity(&self) -> u32 {
        self.inner.factory.capacity()
    }

    pub fn slot_snapshot(&self) -> SlotSnapshot {
        self.inner.factory.slot_snapshot()
    }

    pub fn key_range(&self) -> std::ops::Range<u32> {
        self.inner.factory.key_range()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }
}
