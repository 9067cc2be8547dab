//! Client factory
//!
//! Binds clients to key slots. Creation takes a free index and connects a
//! client configured for it; destruction closes the client and gives the
//! index back. The factory never waits for a slot: blocking is the pool's
//! job, so an empty free-list is reported as [`PoolError::Exhausted`].

use crate::client::{ClientConnector, VoucherClient};
use crate::config::VoucherClientConfig;
use crate::error::{ClientError, PoolError, PoolResult};
use crate::events::{DestroyReason, PoolEvent, PoolEventSink};
use crate::key_slots::{KeySlots, SlotSnapshot};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Reclaims a key index when dropped, unless disarmed.
///
/// Keeps the slot accounted for when a create or destroy future is dropped
/// half-way.
struct SlotGuard<'a, C: ClientConnector> {
    factory: &'a ClientFactory<C>,
    key_index: u32,
    armed: bool,
}

impl<'a, C: ClientConnector> SlotGuard<'a, C> {
    fn new(factory: &'a ClientFactory<C>, key_index: u32) -> Self {
        Self {
            factory,
            key_index,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<C: ClientConnector> Drop for SlotGuard<'_, C> {
    fn drop(&mut self) {
        if self.armed {
            self.factory.reclaim(self.key_index);
        }
    }
}

pub struct ClientFactory<C: ClientConnector> {
    connector: C,
    base_config: VoucherClientConfig,
    slots: KeySlots,
    validation_timeout: Duration,
    events: Arc<dyn PoolEventSink>,
    created: AtomicU64,
    destroyed: AtomicU64,
}

impl<C: ClientConnector> ClientFactory<C> {
    pub fn new(
        connector: C,
        base_config: VoucherClientConfig,
        key_start_index: u32,
        key_capacity: u32,
        validation_timeout: Duration,
        events: Arc<dyn PoolEventSink>,
    ) -> PoolResult<Self> {
        let slots = KeySlots::new(key_start_index, key_capacity)?;
        let range = slots.range();
        events.record(PoolEvent::SlotsInitialized {
            start: range.start,
            end: range.end,
        });

        Ok(Self {
            connector,
            base_config,
            slots,
            validation_timeout,
            events,
            created: AtomicU64::new(0),
            destroyed: AtomicU64::new(0),
        })
    }

    /// Create a client bound to the next free key index.
    pub async fn create(&self) -> PoolResult<C::Client> {
        let key_index = self.slots.allocate().ok_or(PoolError::Exhausted {
            capacity: self.slots.capacity(),
        })?;
        let slot = SlotGuard::new(self, key_index);

        let config = self.base_config.with_key_index(key_index);
        match self.connector.connect(config).await {
            Ok(client) => {
                slot.disarm();
                self.created.fetch_add(1, Ordering::Relaxed);
                self.events.record(PoolEvent::ClientCreated { key_index });
                Ok(client)
            }
            Err(source) => Err(PoolError::Connect { key_index, source }),
        }
    }

    /// Close `client` and return its key index to the free-list.
    ///
    /// The index is reclaimed only after `close()` has completed, whether it
    /// succeeded or not. The close outcome is returned.
    pub async fn destroy(
        &self,
        mut client: C::Client,
        reason: DestroyReason,
    ) -> Result<(), ClientError> {
        let key_index = client.key_index();
        let slot = SlotGuard::new(self, key_index);
        let closed = client.close().await;
        drop(client);

        if let Err(e) = &closed {
            tracing::warn!(
                target: "voucher_pool",
                key_index,
                "Error while closing client: {}",
                e
            );
        }

        drop(slot);
        self.destroyed.fetch_add(1, Ordering::Relaxed);
        self.events
            .record(PoolEvent::ClientDestroyed { key_index, reason });
        closed
    }

    /// Drop `client` without closing it and free its key index.
    ///
    /// For clients that can no longer be closed: a lease dropped outside a
    /// runtime, or a borrow cancelled mid check-out.
    pub(crate) fn discard(&self, client: C::Client) {
        let key_index = client.key_index();
        drop(client);
        self.reclaim(key_index);
        self.destroyed.fetch_add(1, Ordering::Relaxed);
        self.events.record(PoolEvent::ClientDestroyed {
            key_index,
            reason: DestroyReason::Abandoned,
        });
    }

    /// Liveness probe bounded by the validation timeout. Errors and timeouts
    /// count as unhealthy.
    pub async fn validate(&self, client: &C::Client) -> bool {
        let key_index = client.key_index();
        let healthy = match tokio::time::timeout(self.validation_timeout, client.ping()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::debug!(target: "voucher_pool", key_index, "Ping failed: {}", e);
                false
            }
            Err(_) => {
                tracing::debug!(
                    target: "voucher_pool",
                    key_index,
                    "Ping timed out after {:?}",
                    self.validation_timeout
                );
                false
            }
        };
        self.events
            .record(PoolEvent::ClientValidated { key_index, healthy });
        healthy
    }

    fn reclaim(&self, key_index: u32) {
        if let Err(e) = self.slots.reclaim(key_index) {
            tracing::error!(target: "voucher_pool", key_index, "Slot bookkeeping error: {}", e);
        }
    }

    pub fn free_slots(&self) -> usize {
        self.slots.free_count()
    }

    pub fn slot_snapshot(&self) -> SlotSnapshot {
        self.slots.snapshot()
    }

    pub fn key_range(&self) -> std::ops::Range<u32> {
        self.slots.range()
    }

    pub fn capacity(&self) -> u32 {
        self.slots.capacity()
    }

    pub fn created_count(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    pub fn destroyed_count(&self) -> u64 {
        self.destroyed.load(Ordering::Relaxed)
    }

    pub fn events(&self) -> &Arc<dyn PoolEventSink> {
        &self.events
    }
}
