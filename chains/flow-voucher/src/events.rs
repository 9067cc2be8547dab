//! Pool observability
//!
//! Every component takes an `Arc<dyn PoolEventSink>` instead of logging
//! through a process-wide logger. [`TracingEventSink`] forwards to `tracing`
//! under the `voucher_pool` target (the target the shared logger enables);
//! [`MemoryEventSink`] keeps events in memory so tests can assert on them.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// `tracing` target used for every pool event.
pub const LOG_TARGET: &str = "voucher_pool";

/// Why a client was destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyReason {
    /// Liveness probe failed on borrow or return
    FailedValidation,
    /// Liveness probe failed right after the client was created
    CreateValidation,
    /// Returned while the idle list was full
    IdleOverflow,
    /// Pool is closing
    Shutdown,
    /// Dropped without a chance to close it
    Abandoned,
}

impl fmt::Display for DestroyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DestroyReason::FailedValidation => "failed validation",
            DestroyReason::CreateValidation => "failed validation on create",
            DestroyReason::IdleOverflow => "idle overflow",
            DestroyReason::Shutdown => "shutdown",
            DestroyReason::Abandoned => "abandoned",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEvent {
    /// Key slots `[start, end)` are ready
    SlotsInitialized { start: u32, end: u32 },
    ClientCreated { key_index: u32 },
    ClientValidated { key_index: u32, healthy: bool },
    ClientDestroyed { key_index: u32, reason: DestroyReason },
    ClientBorrowed { key_index: u32, waited: Duration },
    ClientReturned { key_index: u32 },
    AcquireTimedOut { waited: Duration },
    PoolClosed,
    OperationFailed {
        operation: &'static str,
        key_index: u32,
        error: String,
    },
    /// A batch mint was broadcast but its result could not be resolved yet
    ResolutionDeferred {
        transaction_id: String,
        error: String,
    },
}

impl PoolEvent {
    /// Key index the event is about, if any.
    pub fn key_index(&self) -> Option<u32> {
        match self {
            PoolEvent::ClientCreated { key_index }
            | PoolEvent::ClientValidated { key_index, .. }
            | PoolEvent::ClientDestroyed { key_index, .. }
            | PoolEvent::ClientBorrowed { key_index, .. }
            | PoolEvent::ClientReturned { key_index }
            | PoolEvent::OperationFailed { key_index, .. } => Some(*key_index),
            _ => None,
        }
    }
}

pub trait PoolEventSink: Send + Sync {
    fn record(&self, event: PoolEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl PoolEventSink for TracingEventSink {
    fn record(&self, event: PoolEvent) {
        match event {
            PoolEvent::SlotsInitialized { start, end } => {
                tracing::info!(target: LOG_TARGET, "Key slots [{}, {}) initialized", start, end);
            }
            PoolEvent::ClientCreated { key_index } => {
                tracing::info!(target: LOG_TARGET, key_index, "Client created");
            }
            PoolEvent::ClientValidated { key_index, healthy } => {
                if healthy {
                    tracing::debug!(target: LOG_TARGET, key_index, "Client validated");
                } else {
                    tracing::warn!(target: LOG_TARGET, key_index, "Client failed liveness probe");
                }
            }
            PoolEvent::ClientDestroyed { key_index, reason } => {
                tracing::info!(target: LOG_TARGET, key_index, "Client destroyed ({})", reason);
            }
            PoolEvent::ClientBorrowed { key_index, waited } => {
                tracing::debug!(target: LOG_TARGET, key_index, "Client borrowed after {:?}", waited);
            }
            PoolEvent::ClientReturned { key_index } => {
                tracing::debug!(target: LOG_TARGET, key_index, "Client returned");
            }
            PoolEvent::AcquireTimedOut { waited } => {
                tracing::warn!(target: LOG_TARGET, "No client available after {:?}", waited);
            }
            PoolEvent::PoolClosed => {
                tracing::info!(target: LOG_TARGET, "Pool closed");
            }
            PoolEvent::OperationFailed {
                operation,
                key_index,
                error,
            } => {
                tracing::error!(target: LOG_TARGET, key_index, "{} failed: {}", operation, error);
            }
            PoolEvent::ResolutionDeferred {
                transaction_id,
                error,
            } => {
                tracing::warn!(
                    target: LOG_TARGET,
                    "Transaction {} submitted but not resolved: {}",
                    transaction_id,
                    error
                );
            }
        }
    }
}

/// Records events in memory.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<PoolEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<PoolEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, predicate: impl Fn(&PoolEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    pub fn destroyed_count(&self, reason: DestroyReason) -> usize {
        self.count(|e| matches!(e, PoolEvent::ClientDestroyed { reason: r, .. } if *r == reason))
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl PoolEventSink for MemoryEventSink {
    fn record(&self, event: PoolEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_records_in_order() {
        let sink = MemoryEventSink::new();
        sink.record(PoolEvent::ClientCreated { key_index: 3 });
        sink.record(PoolEvent::ClientDestroyed {
            key_index: 3,
            reason: DestroyReason::IdleOverflow,
        });
        sink.record(PoolEvent::PoolClosed);

        let events = sink.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].key_index(), Some(3));
        assert_eq!(events[2], PoolEvent::PoolClosed);
        assert_eq!(sink.destroyed_count(DestroyReason::IdleOverflow), 1);
        assert_eq!(sink.destroyed_count(DestroyReason::Shutdown), 0);

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_destroy_reason_display() {
        assert_eq!(DestroyReason::Shutdown.to_string(), "shutdown");
        assert_eq!(
            DestroyReason::FailedValidation.to_string(),
            "failed validation"
        );
    }
}
